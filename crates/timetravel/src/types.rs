//! Temporal query data model (§4.8), adapted from
//! `core/time_travel/models.py`.

use oms_core::{ChangeType, CommitHash, Document, EntityKind, OmsError, OmsResult, Timestamp, Version};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::HashMap;

/// A point in time, either absolute or relative to the query's base time
/// (§4.8: "Relative references accepted: `-Nh|-Nd|-Nm|-Nw`").
#[derive(Debug, Clone)]
pub enum TemporalReference {
    /// An absolute timestamp.
    At(Timestamp),
    /// A relative reference like `-1h`, `-7d`.
    Relative(String),
}

impl TemporalReference {
    /// Resolve against `base` (normally "now").
    pub fn resolve(&self, base: Timestamp) -> OmsResult<Timestamp> {
        match self {
            TemporalReference::At(t) => Ok(*t),
            TemporalReference::Relative(s) => Timestamp::parse_relative(s, base)
                .map_err(|e| OmsError::invalid_field("relative_time", e.to_string())),
        }
    }
}

/// One entity version as seen by a temporal query, a thin projection of
/// [`Document`] plus cross-version metadata `ALL_VERSIONS` fills in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalResourceVersion {
    /// Entity kind.
    pub entity_type: EntityKind,
    /// Entity id.
    pub entity_id: String,
    /// Branch this version lives on.
    pub branch: String,
    /// Version number.
    pub version: Version,
    /// Commit that produced this version.
    pub commit_hash: CommitHash,
    /// When this version took effect.
    pub valid_time: Timestamp,
    /// Document body.
    pub content: Json,
    /// Author of this version.
    pub modified_by: String,
    /// create | update | delete.
    pub change_type: ChangeType,
    /// Comma-joined `fields_changed`, if any changed.
    pub change_summary: Option<String>,
    /// Version number of the next version in the chain, if any.
    pub next_version: Option<Version>,
    /// Version number of the previous version in the chain, if any.
    pub previous_version: Option<Version>,
    /// Seconds this version was the current one (`ALL_VERSIONS` only).
    pub version_duration: Option<f64>,
}

impl TemporalResourceVersion {
    pub(crate) fn from_document(kind: EntityKind, id: &str, branch: &str, doc: &Document) -> Self {
        let change_summary = if doc.fields_changed.is_empty() {
            None
        } else {
            Some(doc.fields_changed.join(", "))
        };
        TemporalResourceVersion {
            entity_type: kind,
            entity_id: id.to_string(),
            branch: branch.to_string(),
            version: doc.version,
            commit_hash: doc.commit_hash,
            valid_time: doc.modified_at,
            content: doc.content.clone(),
            modified_by: doc.modified_by.clone(),
            change_type: doc.change_type,
            change_summary,
            next_version: None,
            previous_version: None,
            version_duration: None,
        }
    }
}

/// Result of `AS_OF`/`BETWEEN`/`ALL_VERSIONS` (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalQueryResult {
    /// Matching versions, page-limited.
    pub resources: Vec<TemporalResourceVersion>,
    /// Total matches before pagination.
    pub total_count: usize,
    /// Whether more results exist past this page.
    pub has_more: bool,
    /// Versions examined to produce this result (pre-filter).
    pub versions_scanned: usize,
    /// Whether this result came from the cache.
    pub cache_hit: bool,
}

/// One field-level change within a [`TemporalDiff`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldChange {
    /// Field name.
    pub field: String,
    /// added | removed | modified.
    pub operation: &'static str,
    /// Value before, if the field existed.
    pub old_value: Option<Json>,
    /// Value after, if the field exists.
    pub new_value: Option<Json>,
}

/// Per-entity outcome of a [`crate::engine::TimeTravelEngine::compare`] call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalDiff {
    /// Entity kind.
    pub entity_type: EntityKind,
    /// Entity id.
    pub entity_id: String,
    /// Version at `t1`, if the entity existed then.
    pub from_version: Option<Version>,
    /// Version at `t2`, if the entity existed then.
    pub to_version: Option<Version>,
    /// created | updated | deleted | unchanged.
    pub operation: &'static str,
    /// Field-level changes, populated only for `updated`.
    pub changes: Vec<FieldChange>,
}

/// One event in a [`ResourceTimeline`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// When this version took effect.
    pub timestamp: Timestamp,
    /// Version number.
    pub version: Version,
    /// Commit that produced this version.
    pub commit_hash: CommitHash,
    /// create | update | delete.
    pub event_type: ChangeType,
    /// Author of this version.
    pub modified_by: String,
    /// Top-level fields changed relative to the previous version.
    pub fields_changed: Vec<String>,
}

/// Full version history plus derived activity stats for one entity (§4.8
/// `timeline`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceTimeline {
    /// Entity kind.
    pub entity_type: EntityKind,
    /// Entity id.
    pub entity_id: String,
    /// Branch.
    pub branch: String,
    /// Every version, oldest first.
    pub events: Vec<TimelineEvent>,
    /// Timestamp of the first version.
    pub created_at: Timestamp,
    /// Timestamp of the last version.
    pub last_modified_at: Timestamp,
    /// Timestamp of the delete version, if tombstoned.
    pub deleted_at: Option<Timestamp>,
    /// Number of versions in the chain.
    pub total_versions: usize,
    /// Number of `update` versions in the chain.
    pub total_updates: usize,
    /// Distinct authors across the chain.
    pub unique_contributors: Vec<String>,
    /// Mean seconds between consecutive versions.
    pub average_time_between_changes: Option<f64>,
}

/// Counts-per-type snapshot of a branch at a point in time (§4.8 `snapshot`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalSnapshot {
    /// Branch snapshotted.
    pub branch: String,
    /// The point in time snapshotted.
    pub timestamp: Timestamp,
    /// Live (non-tombstoned) entity count per kind, as of `timestamp`.
    pub resource_counts: HashMap<EntityKind, usize>,
    /// Sum of `resource_counts`.
    pub total_resources: usize,
    /// Total versions written on or before `timestamp`, across all kinds.
    pub total_versions: usize,
    /// Full content dump per kind, only populated when requested.
    pub resources: Option<HashMap<EntityKind, Vec<Json>>>,
}
