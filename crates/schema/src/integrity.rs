//! Graph integrity inspection (§9C), supplemented from
//! `api/v1/graph_health_routes.py`'s health-check surface: the REST routes
//! themselves are out of scope (no HTTP layer here), but the underlying
//! check — orphaned parent references, dangling LinkType endpoints — is
//! carried as a plain report-building pass over [`DocumentRepository`],
//! used by tests and the `oms-cli` diagnostic subcommand.

use oms_core::EntityKind;
use oms_store::{DocumentRepository, ListFilters};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// One integrity defect found in a branch's schema graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityIssue {
    /// Kind of entity the issue was found on.
    pub entity_type: EntityKind,
    /// Offending entity's id.
    pub entity_id: String,
    /// Human-readable description.
    pub detail: String,
}

/// Result of scanning a branch's schema graph for dangling references.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// All issues found, in scan order.
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    /// Whether the scanned branch has no detected issues.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Scan a branch for orphaned Interface parents and dangling LinkType
/// endpoints. Read-only; never mutates the store.
pub fn check_integrity(repo: &DocumentRepository, branch: &oms_core::BranchName) -> IntegrityReport {
    let mut report = IntegrityReport::default();

    let interfaces = repo.list(EntityKind::Interface, branch, &ListFilters::default(), usize::MAX, 0);
    for doc in &interfaces.items {
        let Some(id) = doc.content.get("name").and_then(Json::as_str) else {
            continue;
        };
        if let Some(parents) = doc.content.get("parents").and_then(Json::as_array) {
            for parent in parents.iter().filter_map(Json::as_str) {
                if repo.get(EntityKind::Interface, branch, parent).is_none() {
                    report.issues.push(IntegrityIssue {
                        entity_type: EntityKind::Interface,
                        entity_id: id.to_string(),
                        detail: format!("parent Interface {parent} does not exist"),
                    });
                }
            }
        }
    }

    let link_types = repo.list(EntityKind::LinkType, branch, &ListFilters::default(), usize::MAX, 0);
    for doc in &link_types.items {
        let Some(id) = doc.content.get("name").and_then(Json::as_str) else {
            continue;
        };
        for field in ["from_object_type", "to_object_type"] {
            if let Some(endpoint) = doc.content.get(field).and_then(Json::as_str) {
                if repo.get(EntityKind::ObjectType, branch, endpoint).is_none() {
                    report.issues.push(IntegrityIssue {
                        entity_type: EntityKind::LinkType,
                        entity_id: id.to_string(),
                        detail: format!("{field} {endpoint} does not exist"),
                    });
                }
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use oms_core::{BranchName, Limits};
    use oms_store::VersionStore;
    use serde_json::json;

    #[test]
    fn reports_dangling_link_type_endpoint() {
        let store = VersionStore::in_memory();
        let branch = BranchName::new("main").unwrap();
        store.create_branch(&branch, None).unwrap();
        let repo = DocumentRepository::new(store, Limits::default());

        let mut tx = repo.begin(branch.clone()).unwrap();
        repo.create(
            &mut tx,
            EntityKind::LinkType,
            "owns",
            json!({"name": "owns", "from_object_type": "Asset", "to_object_type": "Widget"}),
            "alice",
        )
        .unwrap();
        tx.commit("alice", "add link type").unwrap();

        let report = check_integrity(&repo, &branch);
        assert_eq!(report.issues.len(), 2);
        assert!(!report.is_clean());
    }

    #[test]
    fn clean_graph_reports_no_issues() {
        let store = VersionStore::in_memory();
        let branch = BranchName::new("main").unwrap();
        store.create_branch(&branch, None).unwrap();
        let repo = DocumentRepository::new(store, Limits::default());

        assert!(check_integrity(&repo, &branch).is_clean());
    }
}
