//! Conflict and result types for the three-way merge engine (§4.4).
//!
//! Tagged the way the teacher's `strata-concurrency::conflict::ConflictResult`
//! tags JSON read/write conflicts — one enum variant per detectable conflict
//! shape, each carrying exactly the fields needed to explain it to a caller.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Which presence/equality case produced a resource-level conflict (§4.4 step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictKind {
    /// Both branches added the same resource id with different content.
    AddAdd,
    /// Source deleted it, target modified it.
    DeleteModify,
    /// Source modified it, target deleted it.
    ModifyDelete,
    /// Both branches modified it differently and field-level merge still
    /// left at least one field unresolved.
    ModifyModify,
}

/// A field-level conflict within a `ModifyModify` resource conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConflict {
    /// The field name.
    pub field: String,
    /// Value in `base`, if the field existed there.
    pub base: Option<Json>,
    /// Value in `source`.
    pub source: Option<Json>,
    /// Value in `target`.
    pub target: Option<Json>,
}

/// One unresolved resource-level conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    /// The resource id (entity name) in conflict.
    pub resource_id: String,
    /// Which case produced this conflict.
    pub kind: ConflictKind,
    /// Value in `base`, if the resource existed there.
    pub base: Option<Json>,
    /// Value in `source`.
    pub source: Option<Json>,
    /// Value in `target`.
    pub target: Option<Json>,
    /// Per-field detail, populated only for `ModifyModify`.
    pub field_conflicts: Vec<FieldConflict>,
}

/// Aggregate counts over a merge run (§4.4).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStatistics {
    /// Resources present in the merged result.
    pub total_resources: usize,
    /// Resources added by either side relative to base.
    pub added_count: usize,
    /// Resources modified by either side relative to base.
    pub modified_count: usize,
    /// Resources deleted by either side relative to base.
    pub deleted_count: usize,
    /// Resources left in conflict (unresolved).
    pub conflict_count: usize,
}

/// Outcome of a three-way merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeResult {
    /// Resource id -> merged content, for every resource without an
    /// unresolved conflict.
    pub merged: std::collections::BTreeMap<String, Json>,
    /// Unresolved conflicts (empty if `resolutions` covered everything).
    pub conflicts: Vec<Conflict>,
    /// Summary counts.
    pub statistics: MergeStatistics,
}

impl MergeResult {
    /// Whether every resource merged cleanly.
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}
