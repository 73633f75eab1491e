//! Time-Travel Engine (C8, §4.8): point-in-time and range queries over the
//! version store, backed by the two-tier cache (C9). Grounded in
//! `core/time_travel/service.py::TimeTravelQueryService`'s `query_as_of`/
//! `query_between`/`query_all_versions`/`compare_temporal_states`/
//! `get_resource_timeline`/`create_temporal_snapshot`.

use std::collections::HashMap;
use std::sync::Arc;

use oms_cache::Cache;
use oms_core::{BranchName, Document, EntityKind, OmsError, OmsResult, Timestamp};
use oms_store::VersionStore;
use serde_json::json;
use tracing::debug;

use crate::cache_key::temporal_cache_key;
use crate::types::{
    FieldChange, ResourceTimeline, TemporalDiff, TemporalQueryResult, TemporalReference, TemporalResourceVersion,
    TemporalSnapshot, TimelineEvent,
};

/// Executes temporal queries against a [`VersionStore`], caching results in
/// an [`oms_cache::Cache`] keyed by operator + params (§4.8).
pub struct TimeTravelEngine {
    store: Arc<VersionStore>,
    cache: Arc<Cache<TemporalQueryResult>>,
}

impl TimeTravelEngine {
    /// Build an engine over a shared store and a dedicated query-result cache.
    pub fn new(store: Arc<VersionStore>, cache: Arc<Cache<TemporalQueryResult>>) -> Self {
        TimeTravelEngine { store, cache }
    }

    /// `AS_OF(t)`: newest version with `modified_at <= t`, per id or for the
    /// whole type.
    pub fn as_of(
        &self,
        kind: EntityKind,
        id: Option<&str>,
        branch: &BranchName,
        at: &TemporalReference,
        include_deleted: bool,
        limit: usize,
        offset: usize,
    ) -> OmsResult<TemporalQueryResult> {
        let target = at.resolve(Timestamp::now())?;
        let params = json!({"time": target.to_rfc3339(), "include_deleted": include_deleted});
        let key = temporal_cache_key("as_of", kind, id, branch.as_str(), &params);

        if let Some(mut cached) = self.cache.get(&key) {
            cached.cache_hit = true;
            return Ok(cached);
        }

        let result = self.as_of_uncached(kind, id, branch, target, include_deleted, limit, offset);
        self.cache.put(key, result.clone());
        Ok(result)
    }

    fn as_of_uncached(
        &self,
        kind: EntityKind,
        id: Option<&str>,
        branch: &BranchName,
        target: Timestamp,
        include_deleted: bool,
        limit: usize,
        offset: usize,
    ) -> TemporalQueryResult {
        let mut matched = self.latest_as_of(kind, id, branch, target, include_deleted);
        matched.sort_by(|a, b| a.0.cmp(&b.0));
        paginate(kind, branch, matched, limit, offset)
    }

    /// `BEFORE(t)`: strictly before `t` (§4.8: "thin wrapper").
    pub fn before(
        &self,
        kind: EntityKind,
        id: Option<&str>,
        branch: &BranchName,
        at: &TemporalReference,
        include_deleted: bool,
        limit: usize,
        offset: usize,
    ) -> OmsResult<TemporalQueryResult> {
        let target = at.resolve(Timestamp::now())?;
        // one tick earlier than `target` so the boundary version is excluded
        let just_before = Timestamp::from_datetime(target.as_datetime() - chrono::Duration::nanoseconds(1));
        Ok(self.as_of_uncached(kind, id, branch, just_before, include_deleted, limit, offset))
    }

    /// `AFTER(t)`: the earliest version with `modified_at > t`, per id.
    pub fn after(
        &self,
        kind: EntityKind,
        id: Option<&str>,
        branch: &BranchName,
        at: &TemporalReference,
        include_deleted: bool,
        limit: usize,
        offset: usize,
    ) -> OmsResult<TemporalQueryResult> {
        let target = at.resolve(Timestamp::now())?;
        let keys = self.keys_for(kind, id, branch);
        let mut matched = Vec::new();
        for key_id in keys {
            let versions = self.store.all_versions(&oms_core::DocumentKey::new(kind, key_id.clone(), branch.clone()));
            if let Some(doc) = versions.into_iter().find(|d| d.modified_at > target) {
                if !include_deleted && doc.is_tombstone() {
                    continue;
                }
                matched.push((key_id, doc));
            }
        }
        matched.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(paginate(kind, branch, matched, limit, offset))
    }

    /// `BETWEEN(t1, t2)`: all versions with `t1 <= modified_at <= t2`,
    /// ordered by `(id, version)`. Empty if `t1 > t2` (§8 boundary).
    pub fn between(
        &self,
        kind: EntityKind,
        id: Option<&str>,
        branch: &BranchName,
        t1: &TemporalReference,
        t2: &TemporalReference,
        include_deleted: bool,
        limit: usize,
        offset: usize,
    ) -> OmsResult<TemporalQueryResult> {
        let now = Timestamp::now();
        let start = t1.resolve(now)?;
        let end = t2.resolve(now)?;
        if start > end {
            return Ok(TemporalQueryResult {
                resources: vec![],
                total_count: 0,
                has_more: false,
                versions_scanned: 0,
                cache_hit: false,
            });
        }

        let keys = self.keys_for(kind, id, branch);
        let mut matched = Vec::new();
        let mut scanned = 0;
        for key_id in keys {
            let versions = self.store.all_versions(&oms_core::DocumentKey::new(kind, key_id.clone(), branch.clone()));
            scanned += versions.len();
            for doc in versions {
                if doc.modified_at < start || doc.modified_at > end {
                    continue;
                }
                if !include_deleted && doc.is_tombstone() {
                    continue;
                }
                matched.push((key_id.clone(), doc));
            }
        }
        matched.sort_by(|a, b| (a.0.clone(), a.1.version).cmp(&(b.0.clone(), b.1.version)));

        let total_count = matched.len();
        let page: Vec<_> = matched.into_iter().skip(offset).take(limit).collect();
        let has_more = offset + page.len() < total_count;
        Ok(TemporalQueryResult {
            resources: page
                .into_iter()
                .map(|(rid, doc)| TemporalResourceVersion::from_document(kind, &rid, branch.as_str(), &doc))
                .collect(),
            total_count,
            has_more,
            versions_scanned: scanned,
            cache_hit: false,
        })
    }

    /// `ALL_VERSIONS(type, id, branch)`: complete chain, ordered by version,
    /// with `version_duration`/`next_version`/`previous_version` wired.
    pub fn all_versions(
        &self,
        kind: EntityKind,
        id: &str,
        branch: &BranchName,
        limit: usize,
        offset: usize,
    ) -> TemporalQueryResult {
        let key = oms_core::DocumentKey::new(kind, id, branch.clone());
        let rows = self.store.all_versions(&key);
        let total_count = rows.len();

        let mut versions: Vec<TemporalResourceVersion> = rows
            .iter()
            .map(|d| TemporalResourceVersion::from_document(kind, id, branch.as_str(), d))
            .collect();
        for i in 0..versions.len() {
            if i + 1 < rows.len() {
                let duration = rows[i + 1].modified_at.duration_since(rows[i].modified_at);
                versions[i].version_duration = Some(duration.num_milliseconds() as f64 / 1000.0);
                versions[i].next_version = Some(rows[i + 1].version);
            }
            if i > 0 {
                versions[i].previous_version = Some(rows[i - 1].version);
            }
        }

        let page: Vec<_> = versions.into_iter().skip(offset).take(limit).collect();
        let has_more = offset + page.len() < total_count;
        TemporalQueryResult {
            resources: page,
            total_count,
            has_more,
            versions_scanned: total_count,
            cache_hit: false,
        }
    }

    /// Compare a branch's state at `t1` and `t2` across `kinds`, emitting a
    /// [`TemporalDiff`] per entity that was created, updated, or deleted
    /// between the two points (plus unchanged ones if requested).
    pub fn compare(
        &self,
        t1: &TemporalReference,
        t2: &TemporalReference,
        kinds: &[EntityKind],
        branch: &BranchName,
        include_unchanged: bool,
    ) -> OmsResult<HashMap<EntityKind, Vec<TemporalDiff>>> {
        let now = Timestamp::now();
        let time1 = t1.resolve(now)?;
        let time2 = t2.resolve(now)?;

        let mut out = HashMap::new();
        for &kind in kinds {
            let state1 = self.live_state_at(kind, branch, time1);
            let state2 = self.live_state_at(kind, branch, time2);
            let diffs = diff_states(kind, &state1, &state2, include_unchanged);
            out.insert(kind, diffs);
        }
        Ok(out)
    }

    /// Full version history plus derived activity stats for one entity.
    pub fn timeline(&self, kind: EntityKind, id: &str, branch: &BranchName) -> OmsResult<ResourceTimeline> {
        let key = oms_core::DocumentKey::new(kind, id, branch.clone());
        let rows = self.store.all_versions(&key);
        if rows.is_empty() {
            return Err(OmsError::not_found(&oms_core::EntityRef::new(kind, id, branch.clone())));
        }

        let events: Vec<TimelineEvent> = rows
            .iter()
            .map(|d| TimelineEvent {
                timestamp: d.modified_at,
                version: d.version,
                commit_hash: d.commit_hash,
                event_type: d.change_type,
                modified_by: d.modified_by.clone(),
                fields_changed: d.fields_changed.clone(),
            })
            .collect();

        let created_at = rows.first().unwrap().modified_at;
        let last_modified_at = rows.last().unwrap().modified_at;
        let deleted_at = rows.last().filter(|d| d.is_tombstone()).map(|d| d.modified_at);

        let mut contributors: Vec<String> = rows.iter().map(|d| d.modified_by.clone()).collect();
        contributors.sort();
        contributors.dedup();

        let average_time_between_changes = if rows.len() > 1 {
            let total = last_modified_at.duration_since(created_at).num_milliseconds() as f64 / 1000.0;
            Some(total / (rows.len() - 1) as f64)
        } else {
            None
        };

        Ok(ResourceTimeline {
            entity_type: kind,
            entity_id: id.to_string(),
            branch: branch.as_str().to_string(),
            total_versions: events.len(),
            total_updates: events.iter().filter(|e| e.event_type == oms_core::ChangeType::Update).count(),
            events,
            created_at,
            last_modified_at,
            deleted_at,
            unique_contributors: contributors,
            average_time_between_changes,
        })
    }

    /// Counts-per-type snapshot of a branch at `at`, optionally dumping full
    /// content.
    pub fn snapshot(&self, branch: &BranchName, at: &TemporalReference, include_data: bool) -> OmsResult<TemporalSnapshot> {
        let target = at.resolve(Timestamp::now())?;
        let mut resource_counts = HashMap::new();
        let mut resources = include_data.then(HashMap::new);
        let mut total_versions = 0;

        for kind in EntityKind::ALL {
            let state = self.live_state_at(kind, branch, target);
            resource_counts.insert(kind, state.len());
            if let Some(map) = resources.as_mut() {
                map.insert(kind, state.values().map(|d| d.content.clone()).collect());
            }
            for key_id in self.store.all_keys_for_kind(branch, kind) {
                let key = oms_core::DocumentKey::new(kind, key_id, branch.clone());
                total_versions += self
                    .store
                    .all_versions(&key)
                    .into_iter()
                    .filter(|d| d.modified_at <= target)
                    .count();
            }
        }

        Ok(TemporalSnapshot {
            branch: branch.as_str().to_string(),
            timestamp: target,
            total_resources: resource_counts.values().sum(),
            resource_counts,
            total_versions,
            resources,
        })
    }

    fn keys_for(&self, kind: EntityKind, id: Option<&str>, branch: &BranchName) -> Vec<String> {
        match id {
            Some(id) => vec![id.to_string()],
            None => self.store.all_keys_for_kind(branch, kind).into_iter().map(|k| k.id).collect(),
        }
    }

    fn latest_as_of(
        &self,
        kind: EntityKind,
        id: Option<&str>,
        branch: &BranchName,
        target: Timestamp,
        include_deleted: bool,
    ) -> Vec<(String, Document)> {
        let mut out = Vec::new();
        for key_id in self.keys_for(kind, id, branch) {
            let key = oms_core::DocumentKey::new(kind, key_id.clone(), branch.clone());
            if let Some(doc) = self.store.all_versions(&key).into_iter().rev().find(|d| d.modified_at <= target) {
                if !include_deleted && doc.is_tombstone() {
                    continue;
                }
                out.push((key_id, doc));
            }
        }
        out
    }

    fn live_state_at(&self, kind: EntityKind, branch: &BranchName, at: Timestamp) -> HashMap<String, Document> {
        self.latest_as_of(kind, None, branch, at, false).into_iter().collect()
    }
}

fn paginate(
    kind: EntityKind,
    branch: &BranchName,
    matched: Vec<(String, Document)>,
    limit: usize,
    offset: usize,
) -> TemporalQueryResult {
    let total_count = matched.len();
    debug!(total_count, %kind, "as_of scan complete");
    let page: Vec<_> = matched
        .into_iter()
        .skip(offset)
        .take(limit)
        .map(|(id, doc)| TemporalResourceVersion::from_document(kind, &id, branch.as_str(), &doc))
        .collect();
    let has_more = offset + page.len() < total_count;
    TemporalQueryResult {
        resources: page,
        total_count,
        has_more,
        versions_scanned: total_count,
        cache_hit: false,
    }
}

fn diff_states(
    kind: EntityKind,
    state1: &HashMap<String, Document>,
    state2: &HashMap<String, Document>,
    include_unchanged: bool,
) -> Vec<TemporalDiff> {
    let mut all_ids: Vec<&String> = state1.keys().chain(state2.keys()).collect();
    all_ids.sort();
    all_ids.dedup();

    let mut diffs = Vec::new();
    for id in all_ids {
        match (state1.get(id), state2.get(id)) {
            (Some(before), None) => diffs.push(TemporalDiff {
                entity_type: kind,
                entity_id: id.clone(),
                from_version: Some(before.version),
                to_version: None,
                operation: "deleted",
                changes: vec![],
            }),
            (None, Some(after)) => diffs.push(TemporalDiff {
                entity_type: kind,
                entity_id: id.clone(),
                from_version: None,
                to_version: Some(after.version),
                operation: "created",
                changes: vec![],
            }),
            (Some(before), Some(after)) if before.version != after.version => diffs.push(TemporalDiff {
                entity_type: kind,
                entity_id: id.clone(),
                from_version: Some(before.version),
                to_version: Some(after.version),
                operation: "updated",
                changes: field_changes(&before.content, &after.content),
            }),
            (Some(before), Some(after)) if include_unchanged => diffs.push(TemporalDiff {
                entity_type: kind,
                entity_id: id.clone(),
                from_version: Some(before.version),
                to_version: Some(after.version),
                operation: "unchanged",
                changes: vec![],
            }),
            _ => {}
        }
    }
    diffs
}

fn field_changes(before: &serde_json::Value, after: &serde_json::Value) -> Vec<FieldChange> {
    let (Some(before_obj), Some(after_obj)) = (before.as_object(), after.as_object()) else {
        return vec![];
    };
    let mut fields: Vec<&String> = before_obj.keys().chain(after_obj.keys()).collect();
    fields.sort();
    fields.dedup();

    let mut changes = Vec::new();
    for field in fields {
        match (before_obj.get(field), after_obj.get(field)) {
            (None, Some(v)) => changes.push(FieldChange {
                field: field.clone(),
                operation: "added",
                old_value: None,
                new_value: Some(v.clone()),
            }),
            (Some(v), None) => changes.push(FieldChange {
                field: field.clone(),
                operation: "removed",
                old_value: Some(v.clone()),
                new_value: None,
            }),
            (Some(a), Some(b)) if a != b => changes.push(FieldChange {
                field: field.clone(),
                operation: "modified",
                old_value: Some(a.clone()),
                new_value: Some(b.clone()),
            }),
            _ => {}
        }
    }
    changes
}
