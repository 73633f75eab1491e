//! Cross-entity invariants (§4.2 "Validation rules") that need reads beyond
//! the single document `DocumentRepository::create`/`update` touches.

use oms_core::{BranchName, EntityKind, EntityRef, FieldError, OmsError, OmsResult};
use oms_store::{DocumentRepository, ListFilters};
use serde_json::Value as Json;

/// §4.2: "Color matches `^#[0-9A-Fa-f]{6}$`".
pub fn validate_color(content: &Json) -> OmsResult<()> {
    let Some(color) = content.get("color").and_then(Json::as_str) else {
        return Ok(());
    };
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if valid {
        Ok(())
    } else {
        Err(OmsError::invalid_field(
            "color",
            "must match ^#[0-9A-Fa-f]{6}$",
        ))
    }
}

/// §4.2: "Primary-key Property per ObjectType is at most one."
///
/// `exclude_id` is the property being updated, if any (it shouldn't be
/// counted as a conflicting sibling of itself).
pub fn validate_single_primary_key(
    repo: &DocumentRepository,
    branch: &BranchName,
    object_type_id: &str,
    is_primary_key: bool,
    exclude_id: Option<&str>,
) -> OmsResult<()> {
    if !is_primary_key {
        return Ok(());
    }
    let page = repo.list(EntityKind::Property, branch, &ListFilters::default(), usize::MAX, 0);
    let conflict = page.items.iter().find(|doc| {
        doc.content.get("object_type_id").and_then(Json::as_str) == Some(object_type_id)
            && doc.content.get("is_primary_key").and_then(Json::as_bool) == Some(true)
            && doc.content.get("name").and_then(Json::as_str) != exclude_id
    });
    match conflict {
        Some(doc) => Err(OmsError::invalid_field(
            "is_primary_key",
            format!(
                "ObjectType {object_type_id} already has primary key {}",
                doc.content.get("name").and_then(Json::as_str).unwrap_or("?")
            ),
        )),
        None => Ok(()),
    }
}

/// §4.2: "LinkType endpoints reference existing ObjectTypes in same branch."
pub fn validate_link_type_endpoints(
    repo: &DocumentRepository,
    branch: &BranchName,
    content: &Json,
) -> OmsResult<()> {
    let mut errors = Vec::new();
    for field in ["from_object_type", "to_object_type"] {
        if let Some(id) = content.get(field).and_then(Json::as_str) {
            if repo.get(EntityKind::ObjectType, branch, id).is_none() {
                errors.push(FieldError::new(field, format!("ObjectType {id} not found")));
            }
        } else {
            errors.push(FieldError::new(field, "is required"));
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(OmsError::ValidationFailed { errors })
    }
}

/// §4.2: "Interface parents must exist and not form a cycle."
pub fn validate_interface_parents(
    repo: &DocumentRepository,
    branch: &BranchName,
    self_id: &str,
    parents: &[String],
) -> OmsResult<()> {
    for parent in parents {
        if parent == self_id {
            return Err(OmsError::invalid_field(
                "parents",
                format!("Interface {self_id} cannot extend itself"),
            ));
        }
        if repo.get(EntityKind::Interface, branch, parent).is_none() {
            return Err(OmsError::invalid_field(
                "parents",
                format!("parent Interface {parent} not found"),
            ));
        }
        if would_cycle(repo, branch, parent, self_id) {
            return Err(OmsError::invalid_field(
                "parents",
                format!("Interface {self_id} <- {parent} would form a cycle"),
            ));
        }
    }
    Ok(())
}

/// Whether `start`'s transitive parent chain already reaches `target`.
fn would_cycle(repo: &DocumentRepository, branch: &BranchName, start: &str, target: &str) -> bool {
    let mut seen = std::collections::HashSet::new();
    let mut stack = vec![start.to_string()];
    while let Some(id) = stack.pop() {
        if id == target {
            return true;
        }
        if !seen.insert(id.clone()) {
            continue;
        }
        if let Some(doc) = repo.get(EntityKind::Interface, branch, &id) {
            if let Some(parents) = doc.content.get("parents").and_then(Json::as_array) {
                for p in parents.iter().filter_map(Json::as_str) {
                    stack.push(p.to_string());
                }
            }
        }
    }
    false
}

/// §4.2: "SharedProperty cannot be deleted while referenced by any Property."
pub fn validate_shared_property_not_in_use(
    repo: &DocumentRepository,
    branch: &BranchName,
    shared_property_id: &str,
) -> OmsResult<()> {
    let page = repo.list(EntityKind::Property, branch, &ListFilters::default(), usize::MAX, 0);
    let referenced = page
        .items
        .iter()
        .any(|doc| doc.content.get("shared_property_id").and_then(Json::as_str) == Some(shared_property_id));
    if referenced {
        Err(OmsError::InUse {
            entity_ref: EntityRef::new(EntityKind::SharedProperty, shared_property_id, branch.clone()),
            referenced_by: "Property".to_string(),
        })
    } else {
        Ok(())
    }
}

/// §4.2: "Interface used by ObjectType" — a delete-time referential check.
pub fn validate_interface_not_implemented(
    repo: &DocumentRepository,
    branch: &BranchName,
    interface_id: &str,
) -> OmsResult<()> {
    let page = repo.list(EntityKind::ObjectType, branch, &ListFilters::default(), usize::MAX, 0);
    let referenced = page.items.iter().any(|doc| {
        doc.content
            .get("interfaces")
            .and_then(Json::as_array)
            .is_some_and(|ifaces| ifaces.iter().filter_map(Json::as_str).any(|i| i == interface_id))
    });
    if referenced {
        Err(OmsError::InUse {
            entity_ref: EntityRef::new(EntityKind::Interface, interface_id, branch.clone()),
            referenced_by: "ObjectType".to_string(),
        })
    } else {
        Ok(())
    }
}

/// §4.2: "ActionType referenced actions must exist; no self-cycle."
pub fn validate_action_type_references(
    repo: &DocumentRepository,
    branch: &BranchName,
    self_id: &str,
    referenced_actions: &[String],
) -> OmsResult<()> {
    for action_id in referenced_actions {
        if action_id == self_id {
            return Err(OmsError::invalid_field(
                "referenced_actions",
                format!("ActionType {self_id} cannot reference itself"),
            ));
        }
        if repo.get(EntityKind::ActionType, branch, action_id).is_none() {
            return Err(OmsError::invalid_field(
                "referenced_actions",
                format!("referenced ActionType {action_id} not found"),
            ));
        }
    }
    Ok(())
}

/// Bounds on `FunctionType.runtime_config` (§4.2: "within documented bounds").
pub const MAX_FUNCTION_TIMEOUT_MS: u64 = 60_000;
/// Upper bound on `FunctionType.runtime_config.memory_mb`.
pub const MAX_FUNCTION_MEMORY_MB: u64 = 4_096;

/// §4.2: "FunctionType parameters unique by name; runtime config within documented bounds."
pub fn validate_function_type(content: &Json) -> OmsResult<()> {
    if let Some(params) = content.get("parameters").and_then(Json::as_array) {
        let mut seen = std::collections::HashSet::new();
        for p in params {
            if let Some(name) = p.get("name").and_then(Json::as_str) {
                if !seen.insert(name) {
                    return Err(OmsError::invalid_field(
                        "parameters",
                        format!("duplicate parameter name {name}"),
                    ));
                }
            }
        }
    }
    if let Some(config) = content.get("runtime_config") {
        if let Some(timeout) = config.get("timeout_ms").and_then(Json::as_u64) {
            if timeout > MAX_FUNCTION_TIMEOUT_MS {
                return Err(OmsError::invalid_field(
                    "runtime_config.timeout_ms",
                    format!("exceeds limit of {MAX_FUNCTION_TIMEOUT_MS}"),
                ));
            }
        }
        if let Some(memory) = config.get("memory_mb").and_then(Json::as_u64) {
            if memory > MAX_FUNCTION_MEMORY_MB {
                return Err(OmsError::invalid_field(
                    "runtime_config.memory_mb",
                    format!("exceeds limit of {MAX_FUNCTION_MEMORY_MB}"),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use oms_core::Limits;
    use oms_store::VersionStore;
    use serde_json::json;

    fn repo() -> (DocumentRepository, BranchName) {
        let store = VersionStore::in_memory();
        let branch = BranchName::new("main").unwrap();
        store.create_branch(&branch, None).unwrap();
        (DocumentRepository::new(store, Limits::default()), branch)
    }

    #[test]
    fn color_rejects_bad_hex() {
        assert!(validate_color(&json!({"color": "blue"})).is_err());
        assert!(validate_color(&json!({"color": "#ABCDEF"})).is_ok());
    }

    #[test]
    fn link_type_requires_existing_endpoints() {
        let (repo, branch) = repo();
        let err = validate_link_type_endpoints(
            &repo,
            &branch,
            &json!({"from_object_type": "Asset", "to_object_type": "Widget"}),
        )
        .unwrap_err();
        assert!(matches!(err, OmsError::ValidationFailed { .. }));
    }

    #[test]
    fn interface_parent_cycle_detected() {
        let (repo, branch) = repo();
        let mut tx = repo.begin(branch.clone()).unwrap();
        repo.create(
            &mut tx,
            EntityKind::Interface,
            "Base",
            json!({"name": "Base", "parents": ["Derived"]}),
            "alice",
        )
        .unwrap();
        tx.commit("alice", "add Base").unwrap();

        let err = validate_interface_parents(&repo, &branch, "Derived", &["Base".to_string()]).unwrap_err();
        assert!(matches!(err, OmsError::ValidationFailed { .. }));
    }

    #[test]
    fn shared_property_in_use_blocks_delete() {
        let (repo, branch) = repo();
        let mut tx = repo.begin(branch.clone()).unwrap();
        repo.create(
            &mut tx,
            EntityKind::Property,
            "Asset.owner",
            json!({"name": "owner", "shared_property_id": "Owner"}),
            "alice",
        )
        .unwrap();
        tx.commit("alice", "add property").unwrap();

        let err = validate_shared_property_not_in_use(&repo, &branch, "Owner").unwrap_err();
        assert!(matches!(err, OmsError::InUse { .. }));
    }

    #[test]
    fn function_type_rejects_duplicate_parameter_names() {
        let content = json!({"parameters": [{"name": "x"}, {"name": "x"}]});
        assert!(validate_function_type(&content).is_err());
    }

    #[test]
    fn function_type_rejects_excess_timeout() {
        let content = json!({"runtime_config": {"timeout_ms": 999_999}});
        assert!(validate_function_type(&content).is_err());
    }
}
