//! The schema entity kinds carried by this rewrite (§3B).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which kind of schema entity a [`Document`](crate::Document) holds.
///
/// The distilled spec speaks of "schema entities" abstractly; §3B pins the
/// concrete set down from the original `core/schema/service.py` and the
/// GraphQL resolvers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// `ObjectType` — `{name, display_name, type_class, status, properties[], primary_key?, color?}`.
    ObjectType,
    /// `Property` — `{name, data_type_id, required, is_primary_key, default_value?}`.
    Property,
    /// `LinkType` — `{name, from_object_type, to_object_type, cardinality, inverse_name?}`.
    LinkType,
    /// `Interface` — `{name, parents[], properties[]}`.
    Interface,
    /// `SharedProperty` — `{name, data_type_id, description?}`.
    SharedProperty,
    /// `ActionType` — `{name, input_object_type, effects[], referenced_actions[]}`.
    ActionType,
    /// `FunctionType` — `{name, parameters[], runtime_config}`.
    FunctionType,
    /// `DataType` — a closed enumeration entry (`string`, `integer`, ...).
    DataType,
}

impl EntityKind {
    /// All entity kinds, in a fixed order (used for deterministic iteration).
    pub const ALL: [EntityKind; 8] = [
        EntityKind::ObjectType,
        EntityKind::Property,
        EntityKind::LinkType,
        EntityKind::Interface,
        EntityKind::SharedProperty,
        EntityKind::ActionType,
        EntityKind::FunctionType,
        EntityKind::DataType,
    ];

    /// Lowercase, singular name as used in event types (§6: `com.foundry.oms.<resource>.<action>`).
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::ObjectType => "objecttype",
            EntityKind::Property => "property",
            EntityKind::LinkType => "linktype",
            EntityKind::Interface => "interface",
            EntityKind::SharedProperty => "sharedproperty",
            EntityKind::ActionType => "actiontype",
            EntityKind::FunctionType => "functiontype",
            EntityKind::DataType => "datatype",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
