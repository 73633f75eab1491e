//! Three-way merge algorithm (§4.4).
//!
//! Ported directly from the original `ThreeWayMergeAlgorithm` (Python) —
//! `_merge_resource`'s new/deleted/modified dispatch, `_merge_fields`'s
//! per-field matrix with the `properties`-array special case, and
//! `_schemas_equal`'s audit-field-excluding equality — re-expressed with the
//! teacher's tagged-conflict-enum style (`ConflictResult` in
//! `strata-concurrency::conflict`) instead of raising exceptions.

use crate::types::{Conflict, ConflictKind, FieldConflict, MergeResult, MergeStatistics};
use oms_core::document::scrub_audit_fields;
use serde_json::Value as Json;
use std::collections::{BTreeMap, BTreeSet};

enum ResourceOutcome {
    /// Resolved value. `None` means both sides agree the resource is gone.
    Merged(Option<Json>),
    Conflict(Conflict),
}

/// Audit-field-excluding equality (§4.4 step 1; mirrors `_schemas_equal`).
fn schemas_equal(a: Option<&Json>, b: Option<&Json>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(_), None) | (None, Some(_)) => false,
        (Some(a), Some(b)) => scrub_audit_fields(a) == scrub_audit_fields(b),
    }
}

/// Run a three-way merge over every resource id appearing in any of the
/// three maps. `resolutions` supplies caller-chosen values for ids that
/// would otherwise conflict (§4.4 "Tie-breaks").
pub fn three_way_merge(
    base: &BTreeMap<String, Json>,
    source: &BTreeMap<String, Json>,
    target: &BTreeMap<String, Json>,
    resolutions: Option<&BTreeMap<String, Json>>,
) -> MergeResult {
    let mut all_ids: BTreeSet<&String> = BTreeSet::new();
    all_ids.extend(base.keys());
    all_ids.extend(source.keys());
    all_ids.extend(target.keys());

    let mut merged = BTreeMap::new();
    let mut conflicts = Vec::new();

    for id in all_ids {
        let outcome = merge_resource(id, base.get(id), source.get(id), target.get(id));
        match outcome {
            ResourceOutcome::Merged(Some(value)) => {
                merged.insert(id.clone(), value);
            }
            ResourceOutcome::Merged(None) => {}
            ResourceOutcome::Conflict(conflict) => {
                if let Some(resolution) = resolutions.and_then(|r| r.get(id)) {
                    merged.insert(id.clone(), resolution.clone());
                } else {
                    conflicts.push(conflict);
                }
            }
        }
    }

    let statistics = compute_statistics(base, source, target, &merged, conflicts.len());
    MergeResult {
        merged,
        conflicts,
        statistics,
    }
}

fn merge_resource(
    id: &str,
    base: Option<&Json>,
    source: Option<&Json>,
    target: Option<&Json>,
) -> ResourceOutcome {
    match base {
        None => handle_new_resource(id, source, target),
        Some(base) => match (source, target) {
            (None, None) => ResourceOutcome::Merged(None),
            (None, Some(target)) => {
                handle_delete_vs_modify(id, base, target, ConflictKind::DeleteModify, true)
            }
            (Some(source), None) => {
                handle_delete_vs_modify(id, base, source, ConflictKind::ModifyDelete, false)
            }
            (Some(source), Some(target)) => handle_modified(id, base, source, target),
        },
    }
}

fn handle_new_resource(id: &str, source: Option<&Json>, target: Option<&Json>) -> ResourceOutcome {
    match (source, target) {
        (Some(source), Some(target)) => {
            if schemas_equal(Some(source), Some(target)) {
                ResourceOutcome::Merged(Some(source.clone()))
            } else {
                ResourceOutcome::Conflict(Conflict {
                    resource_id: id.to_string(),
                    kind: ConflictKind::AddAdd,
                    base: None,
                    source: Some(source.clone()),
                    target: Some(target.clone()),
                    field_conflicts: vec![],
                })
            }
        }
        (Some(source), None) => ResourceOutcome::Merged(Some(source.clone())),
        (None, Some(target)) => ResourceOutcome::Merged(Some(target.clone())),
        (None, None) => ResourceOutcome::Merged(None),
    }
}

/// `modified` is the non-deleted side's value. `deleted_is_source` controls
/// which slot (`source`/`target`) it's reported under in the conflict.
fn handle_delete_vs_modify(
    id: &str,
    base: &Json,
    modified: &Json,
    kind: ConflictKind,
    deleted_is_source: bool,
) -> ResourceOutcome {
    if schemas_equal(Some(base), Some(modified)) {
        return ResourceOutcome::Merged(None);
    }
    let (source, target) = if deleted_is_source {
        (None, Some(modified.clone()))
    } else {
        (Some(modified.clone()), None)
    };
    ResourceOutcome::Conflict(Conflict {
        resource_id: id.to_string(),
        kind,
        base: Some(base.clone()),
        source,
        target,
        field_conflicts: vec![],
    })
}

fn handle_modified(id: &str, base: &Json, source: &Json, target: &Json) -> ResourceOutcome {
    let source_changed = !schemas_equal(Some(base), Some(source));
    let target_changed = !schemas_equal(Some(base), Some(target));

    match (source_changed, target_changed) {
        (false, false) => ResourceOutcome::Merged(Some(base.clone())),
        (true, false) => ResourceOutcome::Merged(Some(source.clone())),
        (false, true) => ResourceOutcome::Merged(Some(target.clone())),
        (true, true) => {
            if schemas_equal(Some(source), Some(target)) {
                return ResourceOutcome::Merged(Some(source.clone()));
            }
            let (merged_fields, field_conflicts) = merge_fields(base, source, target);
            if field_conflicts.is_empty() {
                ResourceOutcome::Merged(Some(merged_fields))
            } else {
                ResourceOutcome::Conflict(Conflict {
                    resource_id: id.to_string(),
                    kind: ConflictKind::ModifyModify,
                    base: Some(base.clone()),
                    source: Some(source.clone()),
                    target: Some(target.clone()),
                    field_conflicts,
                })
            }
        }
    }
}

/// Field-level merge for a resource both sides changed differently (§4.4
/// "Field-level merge"). System fields (`@`-prefixed) are excluded from the
/// matrix and copied through from `base` unchanged.
fn merge_fields(base: &Json, source: &Json, target: &Json) -> (Json, Vec<FieldConflict>) {
    let empty = serde_json::Map::new();
    let base_obj = base.as_object().unwrap_or(&empty);
    let source_obj = source.as_object().unwrap_or(&empty);
    let target_obj = target.as_object().unwrap_or(&empty);

    let mut all_fields: BTreeSet<&String> = BTreeSet::new();
    all_fields.extend(base_obj.keys());
    all_fields.extend(source_obj.keys());
    all_fields.extend(target_obj.keys());
    all_fields.retain(|f| !f.starts_with('@'));

    let mut merged = serde_json::Map::new();
    let mut conflicts = Vec::new();

    for field in all_fields {
        let base_value = base_obj.get(field);
        let source_value = source_obj.get(field);
        let target_value = target_obj.get(field);

        if base_value == source_value && source_value == target_value {
            if let Some(v) = base_value {
                merged.insert(field.clone(), v.clone());
            }
            continue;
        }
        if source_value == target_value {
            if let Some(v) = source_value {
                merged.insert(field.clone(), v.clone());
            }
            continue;
        }
        if base_value == source_value {
            if let Some(v) = target_value {
                merged.insert(field.clone(), v.clone());
            }
            continue;
        }
        if base_value == target_value {
            if let Some(v) = source_value {
                merged.insert(field.clone(), v.clone());
            }
            continue;
        }

        if field == "properties" && matches!(source_value, Some(Json::Array(_))) {
            let (merged_props, has_conflict) = merge_properties(
                base_value.and_then(Json::as_array),
                source_value.and_then(Json::as_array),
                target_value.and_then(Json::as_array),
            );
            if has_conflict {
                conflicts.push(FieldConflict {
                    field: field.clone(),
                    base: base_value.cloned(),
                    source: source_value.cloned(),
                    target: target_value.cloned(),
                });
            } else {
                merged.insert(field.clone(), Json::Array(merged_props));
            }
        } else {
            conflicts.push(FieldConflict {
                field: field.clone(),
                base: base_value.cloned(),
                source: source_value.cloned(),
                target: target_value.cloned(),
            });
        }
    }

    for (field, value) in base_obj {
        if field.starts_with('@') {
            merged.insert(field.clone(), value.clone());
        }
    }

    (Json::Object(merged), conflicts)
}

/// By-name 3-way merge of a `properties` array (§4.4 "`properties` (list)
/// gets by-name merge"). On a per-property conflict, source wins in the
/// output array but the whole field is still reported as conflicted.
fn merge_properties(
    base: Option<&Vec<Json>>,
    source: Option<&Vec<Json>>,
    target: Option<&Vec<Json>>,
) -> (Vec<Json>, bool) {
    let index = |props: Option<&Vec<Json>>| -> BTreeMap<String, &Json> {
        props
            .into_iter()
            .flatten()
            .filter_map(|p| p.get("name").and_then(Json::as_str).map(|n| (n.to_string(), p)))
            .collect()
    };
    let base_by_name = index(base);
    let source_by_name = index(source);
    let target_by_name = index(target);

    let mut all_names: BTreeSet<&String> = BTreeSet::new();
    all_names.extend(base_by_name.keys());
    all_names.extend(source_by_name.keys());
    all_names.extend(target_by_name.keys());

    let mut merged_props = Vec::new();
    let mut has_conflict = false;

    for name in all_names {
        let outcome = merge_resource(
            name,
            base_by_name.get(name).copied(),
            source_by_name.get(name).copied(),
            target_by_name.get(name).copied(),
        );
        match outcome {
            ResourceOutcome::Merged(Some(value)) => merged_props.push(value),
            ResourceOutcome::Merged(None) => {}
            ResourceOutcome::Conflict(conflict) => {
                has_conflict = true;
                if let Some(source_value) = conflict.source {
                    merged_props.push(source_value);
                }
            }
        }
    }

    (merged_props, has_conflict)
}

fn compute_statistics(
    base: &BTreeMap<String, Json>,
    source: &BTreeMap<String, Json>,
    target: &BTreeMap<String, Json>,
    merged: &BTreeMap<String, Json>,
    conflict_count: usize,
) -> MergeStatistics {
    let mut added = BTreeSet::new();
    let mut deleted = BTreeSet::new();
    let mut modified = BTreeSet::new();

    for (side, other_base) in [(source, base), (target, base)] {
        for id in side.keys() {
            if !other_base.contains_key(id) {
                added.insert(id);
            } else if !schemas_equal(other_base.get(id), side.get(id)) {
                modified.insert(id);
            }
        }
        for id in other_base.keys() {
            if !side.contains_key(id) {
                deleted.insert(id);
            }
        }
    }

    MergeStatistics {
        total_resources: merged.len(),
        added_count: added.len(),
        modified_count: modified.len(),
        deleted_count: deleted.len(),
        conflict_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(pairs: &[(&str, Json)]) -> BTreeMap<String, Json> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn add_add_conflict_on_differing_content() {
        let base = BTreeMap::new();
        let source = map(&[("Asset", json!({"name": "Asset", "color": "#fff"}))]);
        let target = map(&[("Asset", json!({"name": "Asset", "color": "#000"}))]);
        let result = three_way_merge(&base, &source, &target, None);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].kind, ConflictKind::AddAdd);
    }

    #[test]
    fn add_add_takes_either_when_equal() {
        let base = BTreeMap::new();
        let value = json!({"name": "Asset"});
        let source = map(&[("Asset", value.clone())]);
        let target = map(&[("Asset", value.clone())]);
        let result = three_way_merge(&base, &source, &target, None);
        assert!(result.is_clean());
        assert_eq!(result.merged["Asset"], value);
    }

    #[test]
    fn one_side_only_changed_takes_that_side() {
        let base = map(&[("Asset", json!({"name": "Asset", "status": "draft"}))]);
        let source = map(&[("Asset", json!({"name": "Asset", "status": "active"}))]);
        let target = base.clone();
        let result = three_way_merge(&base, &source, &target, None);
        assert!(result.is_clean());
        assert_eq!(result.merged["Asset"]["status"], "active");
    }

    #[test]
    fn delete_vs_unchanged_accepts_deletion() {
        let base = map(&[("Asset", json!({"name": "Asset"}))]);
        let source: BTreeMap<String, Json> = BTreeMap::new();
        let target = base.clone();
        let result = three_way_merge(&base, &source, &target, None);
        assert!(result.is_clean());
        assert!(!result.merged.contains_key("Asset"));
    }

    #[test]
    fn delete_vs_modify_conflicts() {
        let base = map(&[("Asset", json!({"name": "Asset", "status": "draft"}))]);
        let source: BTreeMap<String, Json> = BTreeMap::new();
        let target = map(&[("Asset", json!({"name": "Asset", "status": "active"}))]);
        let result = three_way_merge(&base, &source, &target, None);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].kind, ConflictKind::DeleteModify);
    }

    #[test]
    fn field_level_merge_resolves_disjoint_changes() {
        let base = map(&[(
            "Asset",
            json!({"name": "Asset", "status": "draft", "color": "#fff"}),
        )]);
        let source = map(&[(
            "Asset",
            json!({"name": "Asset", "status": "active", "color": "#fff"}),
        )]);
        let target = map(&[(
            "Asset",
            json!({"name": "Asset", "status": "draft", "color": "#000"}),
        )]);
        let result = three_way_merge(&base, &source, &target, None);
        assert!(result.is_clean());
        assert_eq!(result.merged["Asset"]["status"], "active");
        assert_eq!(result.merged["Asset"]["color"], "#000");
    }

    #[test]
    fn field_level_conflict_on_same_field() {
        let base = map(&[("Asset", json!({"name": "Asset", "status": "draft"}))]);
        let source = map(&[("Asset", json!({"name": "Asset", "status": "active"}))]);
        let target = map(&[("Asset", json!({"name": "Asset", "status": "archived"}))]);
        let result = three_way_merge(&base, &source, &target, None);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].kind, ConflictKind::ModifyModify);
        assert_eq!(result.conflicts[0].field_conflicts[0].field, "status");
    }

    #[test]
    fn resolution_overrides_conflict() {
        let base = BTreeMap::new();
        let source = map(&[("Asset", json!({"name": "Asset", "color": "#fff"}))]);
        let target = map(&[("Asset", json!({"name": "Asset", "color": "#000"}))]);
        let resolution = map(&[("Asset", json!({"name": "Asset", "color": "#123456"}))]);
        let result = three_way_merge(&base, &source, &target, Some(&resolution));
        assert!(result.is_clean());
        assert_eq!(result.merged["Asset"]["color"], "#123456");
    }

    #[test]
    fn properties_merge_by_name() {
        let base = map(&[(
            "Asset",
            json!({
                "name": "Asset",
                "properties": [{"name": "a", "type": "string"}, {"name": "b", "type": "int"}]
            }),
        )]);
        let source = map(&[(
            "Asset",
            json!({
                "name": "Asset",
                "properties": [{"name": "a", "type": "string"}, {"name": "b", "type": "int"}, {"name": "c", "type": "bool"}]
            }),
        )]);
        let target = map(&[(
            "Asset",
            json!({
                "name": "Asset",
                "properties": [{"name": "a", "type": "long"}, {"name": "b", "type": "int"}]
            }),
        )]);
        let result = three_way_merge(&base, &source, &target, None);
        assert!(result.is_clean());
        let props = result.merged["Asset"]["properties"].as_array().unwrap();
        let names: BTreeSet<&str> = props
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, BTreeSet::from(["a", "b", "c"]));
    }

    #[test]
    fn audit_fields_ignored_in_equality() {
        let base = map(&[("Asset", json!({"name": "Asset", "createdAt": "t0"}))]);
        let source = map(&[("Asset", json!({"name": "Asset", "createdAt": "t1"}))]);
        let target = base.clone();
        let result = three_way_merge(&base, &source, &target, None);
        assert!(result.is_clean());
    }
}
