//! Minimal read-only views over ontology schema JSON, shared by every rule.
//!
//! Rules never see the full `Document`/`VersionStore` machinery — they work
//! against a flat `name -> content` snapshot the same way `oms-merge`'s
//! engine does, so a rule can be unit-tested with nothing but `serde_json`.

use serde_json::Value as Json;
use std::collections::BTreeMap;

/// `name -> content` snapshot of every `ObjectType` on a branch.
pub type ObjectTypeSchema = BTreeMap<String, Json>;
/// `name -> content` snapshot of every `SharedProperty` on a branch.
pub type SharedPropertySchema = BTreeMap<String, Json>;

/// Inputs a rule evaluates: the same schema on two branches.
pub struct ValidationContext<'a> {
    /// `ObjectType`s on the baseline (`target_branch`) schema.
    pub target_object_types: &'a ObjectTypeSchema,
    /// `ObjectType`s on the proposed (`source_branch`) schema.
    pub source_object_types: &'a ObjectTypeSchema,
    /// `SharedProperty`s on the baseline schema.
    pub target_shared_properties: &'a SharedPropertySchema,
    /// `SharedProperty`s on the proposed schema.
    pub source_shared_properties: &'a SharedPropertySchema,
}

/// A property entry within an `ObjectType.properties` array.
pub struct PropertyView<'a> {
    json: &'a Json,
}

impl<'a> PropertyView<'a> {
    /// Property name.
    pub fn name(&self) -> Option<&'a str> {
        self.json.get("name").and_then(Json::as_str)
    }

    /// `dataTypeId`, e.g. `"string"`, `"integer"`, `"long"`.
    pub fn data_type_id(&self) -> Option<&'a str> {
        self.json.get("dataTypeId").and_then(Json::as_str)
    }

    /// Whether this property is the object type's primary key.
    pub fn is_primary_key(&self) -> bool {
        self.json
            .get("primaryKey")
            .and_then(Json::as_bool)
            .unwrap_or(false)
    }

    /// Whether this property is required (non-nullable).
    pub fn is_required(&self) -> bool {
        self.json
            .get("required")
            .and_then(Json::as_bool)
            .unwrap_or(false)
    }

    /// `sharedPropertyId`, if this property is backed by a `SharedProperty`.
    pub fn shared_property_id(&self) -> Option<&'a str> {
        self.json.get("sharedPropertyId").and_then(Json::as_str)
    }
}

/// Parsed view over an `ObjectType`'s content.
pub struct ObjectTypeView<'a> {
    json: &'a Json,
}

impl<'a> ObjectTypeView<'a> {
    /// Wrap raw `ObjectType` content for field access.
    pub fn new(json: &'a Json) -> Self {
        Self { json }
    }

    /// All declared properties, in document order.
    pub fn properties(&self) -> Vec<PropertyView<'a>> {
        self.json
            .get("properties")
            .and_then(Json::as_array)
            .into_iter()
            .flatten()
            .map(|json| PropertyView { json })
            .collect()
    }

    /// The property flagged `primaryKey: true`, if any.
    pub fn primary_key(&self) -> Option<PropertyView<'a>> {
        self.properties().into_iter().find(|p| p.is_primary_key())
    }

    /// Look up a property by name.
    pub fn property(&self, name: &str) -> Option<PropertyView<'a>> {
        self.properties().into_iter().find(|p| p.name() == Some(name))
    }
}

/// Widening type transitions considered non-breaking (§4.5 item 4).
/// `(from, to)` pairs; checked both directions are NOT assumed symmetric —
/// narrowing (e.g. `long` -> `integer`) is not in this table and falls
/// through to [`TypeIncompatibilityRule`].
pub const COMPATIBLE_WIDENINGS: &[(&str, &str)] = &[
    ("integer", "long"),
    ("integer", "double"),
    ("long", "double"),
    ("float", "double"),
    ("short", "integer"),
    ("short", "long"),
    ("string", "text"),
];

/// Whether `from -> to` is a documented safe widening.
pub fn is_compatible_widening(from: &str, to: &str) -> bool {
    COMPATIBLE_WIDENINGS.iter().any(|&(f, t)| f == from && t == to)
}

/// Type pairs considered un-migratable without custom transformation and
/// thus always `Critical` rather than `High` (§4.5 item 3).
pub const HARD_INCOMPATIBLE: &[(&str, &str)] = &[
    ("string", "integer"),
    ("string", "long"),
    ("string", "double"),
    ("string", "boolean"),
    ("boolean", "integer"),
    ("boolean", "string"),
];

/// Whether `from -> to` is in the hard-incompatible table.
pub fn is_hard_incompatible(from: &str, to: &str) -> bool {
    HARD_INCOMPATIBLE.iter().any(|&(f, t)| f == from && t == to)
}
