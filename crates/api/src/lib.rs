#![warn(missing_docs)]
//! Facade entry point (§6): wires the Version Store, Schema Service, Branch
//! Service, Breaking-Change Validator, Outbox, Cache, and Time-Travel Engine
//! into one embeddable [`OntologyService`].

pub mod service;

pub use service::{OntologyService, MAIN_BRANCH};

#[cfg(test)]
mod tests {
    use super::*;
    use oms_cache::CacheConfig;
    use oms_core::{BranchName, EntityKind, Limits};
    use oms_validator::ValidationRequest;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn new_service() -> OntologyService {
        OntologyService::new(Limits::default(), CacheConfig::default()).unwrap()
    }

    #[test]
    fn main_branch_exists_after_construction() {
        let svc = new_service();
        assert!(svc.branch().get_branch(&BranchName::new_unchecked(MAIN_BRANCH), "system").is_ok());
    }

    #[test]
    fn create_and_read_object_type_round_trips() {
        let svc = new_service();
        let main = BranchName::new_unchecked(MAIN_BRANCH);
        svc.schema()
            .create(
                EntityKind::ObjectType,
                main.clone(),
                "Asset",
                json!({"name": "Asset", "display_name": "Asset", "type_class": "object", "status": "active", "properties": []}),
                "alice",
            )
            .unwrap();

        let doc = svc.schema().get(EntityKind::ObjectType, &main, "Asset").unwrap();
        assert_eq!(doc.content["display_name"], "Asset");
    }

    #[test]
    fn validate_finds_no_breaking_changes_between_identical_branches() {
        let svc = new_service();
        let main = BranchName::new_unchecked(MAIN_BRANCH);
        svc.branch().create_branch(&BranchName::new("feature").unwrap(), Some(&main), "alice").unwrap();

        let result = svc
            .validate(ValidationRequest {
                source_branch: "feature".to_string(),
                target_branch: MAIN_BRANCH.to_string(),
                include_impact: true,
                include_warnings: true,
                options: BTreeMap::new(),
            })
            .unwrap();
        assert!(result.is_valid);
        assert!(result.breaking_changes.is_empty());
    }

    #[test]
    fn check_integrity_reports_clean_on_empty_branch() {
        let svc = new_service();
        let main = BranchName::new_unchecked(MAIN_BRANCH);
        assert!(svc.check_integrity(&main).is_clean());
    }
}
