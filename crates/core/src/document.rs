//! The versioned-document data model (§3: "Document").

use crate::contract::{BranchName, CommitHash, Timestamp, Version};
use crate::entity::EntityKind;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Identifies a document's per-key version chain: `(type, id, branch)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentKey {
    /// The entity kind.
    pub kind: EntityKind,
    /// The entity id (its name).
    pub id: String,
    /// The branch this chain lives on.
    pub branch: BranchName,
}

impl DocumentKey {
    /// Build a new document key.
    pub fn new(kind: EntityKind, id: impl Into<String>, branch: BranchName) -> Self {
        Self {
            kind,
            id: id.into(),
            branch,
        }
    }
}

/// What kind of mutation produced a document version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// The document did not previously exist on this branch.
    Create,
    /// A sparse update to an existing document.
    Update,
    /// A tombstone: the key is logically absent at and after this version.
    Delete,
}

/// One version in a document's chain (§3).
///
/// `version_hash` excludes audit fields (`createdAt/By`, `modifiedAt/By`,
/// `versionHash` itself, and any key starting with `@`) per Open Question 1's
/// resolution (DESIGN.md).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Which commit produced this version.
    pub commit_hash: CommitHash,
    /// Monotonic version number, starting at 1.
    pub version: Version,
    /// When this version was written.
    pub modified_at: Timestamp,
    /// Who wrote this version.
    pub modified_by: String,
    /// create | update | delete.
    pub change_type: ChangeType,
    /// The document body. Empty object for tombstones.
    pub content: Json,
    /// Top-level field names that changed relative to the previous version.
    pub fields_changed: Vec<String>,
    /// Content hash of `content`, excluding audit fields.
    pub version_hash: String,
}

impl Document {
    /// Whether this version is a tombstone (§3: "the key is logically absent
    /// at and after that version").
    pub fn is_tombstone(&self) -> bool {
        matches!(self.change_type, ChangeType::Delete)
    }
}

/// An audit-field-excluding content hash, computed the same way document
/// `version_hash`es and merge equality checks are (§4.4 step 1, §9 Open
/// Question 1).
pub fn content_hash_excluding_audit_fields(content: &Json) -> String {
    let scrubbed = scrub_audit_fields(content);
    let bytes = serde_json::to_vec(&scrubbed).unwrap_or_default();
    crate::contract::CommitHash::of(&bytes).to_string()
}

/// Strip audit/system fields (`createdAt`, `createdBy`, `modifiedAt`,
/// `modifiedBy`, `versionHash`, and any key starting with `@`) from a JSON
/// object before comparing or hashing it, per §4.4 step 1.
pub fn scrub_audit_fields(value: &Json) -> Json {
    const AUDIT_FIELDS: &[&str] = &[
        "createdAt",
        "createdBy",
        "modifiedAt",
        "modifiedBy",
        "versionHash",
    ];
    match value {
        Json::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                if AUDIT_FIELDS.contains(&k.as_str()) || k.starts_with('@') {
                    continue;
                }
                out.insert(k.clone(), scrub_audit_fields(v));
            }
            Json::Object(out)
        }
        Json::Array(items) => Json::Array(items.iter().map(scrub_audit_fields).collect()),
        other => other.clone(),
    }
}

/// A single entity-level mutation recorded into a commit (§4.2: "Every
/// successful mutation emits a ChangeRecord").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// The entity kind touched.
    pub entity_type: EntityKind,
    /// The entity id touched.
    pub entity_id: String,
    /// create | update | delete.
    pub operation: ChangeType,
    /// Prior content, if any (absent for create).
    pub old: Option<Json>,
    /// New content, if any (absent for delete).
    pub new: Option<Json>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scrub_removes_audit_fields_recursively() {
        let v = json!({
            "name": "Asset",
            "createdAt": "t0",
            "createdBy": "alice",
            "@system": "x",
            "properties": [{"name": "A", "modifiedAt": "t1"}]
        });
        let scrubbed = scrub_audit_fields(&v);
        assert_eq!(
            scrubbed,
            json!({"name": "Asset", "properties": [{"name": "A"}]})
        );
    }

    #[test]
    fn content_hash_ignores_audit_field_changes() {
        let a = json!({"name": "Asset", "createdAt": "t0"});
        let b = json!({"name": "Asset", "createdAt": "t1"});
        assert_eq!(
            content_hash_excluding_audit_fields(&a),
            content_hash_excluding_audit_fields(&b)
        );
    }

    #[test]
    fn content_hash_detects_real_changes() {
        let a = json!({"name": "Asset"});
        let b = json!({"name": "Widget"});
        assert_ne!(
            content_hash_excluding_audit_fields(&a),
            content_hash_excluding_audit_fields(&b)
        );
    }
}
