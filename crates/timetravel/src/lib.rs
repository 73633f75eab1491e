#![warn(missing_docs)]
//! Time-Travel Engine (C8, §4.8): `AS_OF`/`BETWEEN`/`ALL_VERSIONS`/`BEFORE`/
//! `AFTER`, state comparison, resource timelines, and branch snapshots over
//! [`oms_store::VersionStore`].

pub mod cache_key;
pub mod cursor;
pub mod engine;
pub mod types;

pub use cache_key::temporal_cache_key;
pub use cursor::Cursor;
pub use engine::TimeTravelEngine;
pub use types::{
    FieldChange, ResourceTimeline, TemporalDiff, TemporalQueryResult, TemporalReference, TemporalResourceVersion,
    TemporalSnapshot, TimelineEvent,
};

#[cfg(test)]
mod tests {
    use super::*;
    use oms_cache::{Cache, CacheConfig};
    use oms_core::{BranchName, EntityKind};
    use oms_store::VersionStore;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn engine_with(branch: &BranchName) -> (TimeTravelEngine, Arc<VersionStore>) {
        let store = VersionStore::in_memory();
        store.create_branch(branch, None).expect("create branch");
        let cache = Arc::new(Cache::new(CacheConfig {
            max_items: 100,
            ttl: Duration::from_secs(60),
        }));
        (TimeTravelEngine::new(store.clone(), cache), store)
    }

    fn write_version(
        store: &Arc<VersionStore>,
        branch: &BranchName,
        kind: EntityKind,
        id: &str,
        author: &str,
        content: serde_json::Value,
    ) {
        let mut tx = store.begin_tx(branch.clone()).expect("begin tx");
        tx.insert_document(
            oms_core::DocumentKey::new(kind, id, branch.clone()),
            content,
            author,
            oms_core::ChangeType::Create,
            vec![],
        );
        tx.commit(author, "test commit").expect("commit to succeed");
    }

    #[test]
    fn as_of_returns_newest_version_before_target() {
        let branch = BranchName::new("main").unwrap();
        let (engine, store) = engine_with(&branch);
        write_version(&store, &branch, EntityKind::ObjectType, "Asset", "alice", json!({"color": "#FFF"}));

        let result = engine
            .as_of(
                EntityKind::ObjectType,
                Some("Asset"),
                &branch,
                &TemporalReference::At(oms_core::Timestamp::now()),
                false,
                10,
                0,
            )
            .unwrap();
        assert_eq!(result.total_count, 1);
        assert_eq!(result.resources[0].entity_id, "Asset");
    }

    #[test]
    fn as_of_second_call_is_a_cache_hit() {
        let branch = BranchName::new("main").unwrap();
        let (engine, store) = engine_with(&branch);
        write_version(&store, &branch, EntityKind::ObjectType, "Asset", "alice", json!({"color": "#FFF"}));
        let at = TemporalReference::At(oms_core::Timestamp::now());

        let first = engine
            .as_of(EntityKind::ObjectType, Some("Asset"), &branch, &at, false, 10, 0)
            .unwrap();
        let second = engine
            .as_of(EntityKind::ObjectType, Some("Asset"), &branch, &at, false, 10, 0)
            .unwrap();
        assert!(!first.cache_hit);
        assert!(second.cache_hit);
    }

    #[test]
    fn between_is_empty_when_t1_after_t2() {
        let branch = BranchName::new("main").unwrap();
        let (engine, _store) = engine_with(&branch);
        let now = oms_core::Timestamp::now();
        let earlier = oms_core::Timestamp::from_datetime(now.as_datetime() - chrono::Duration::hours(1));
        let result = engine
            .between(
                EntityKind::ObjectType,
                None,
                &branch,
                &TemporalReference::At(now),
                &TemporalReference::At(earlier),
                false,
                10,
                0,
            )
            .unwrap();
        assert_eq!(result.total_count, 0);
    }

    #[test]
    fn timeline_errors_on_unknown_entity() {
        let branch = BranchName::new("main").unwrap();
        let (engine, _store) = engine_with(&branch);
        assert!(engine.timeline(EntityKind::ObjectType, "Nope", &branch).is_err());
    }

    #[test]
    fn snapshot_counts_live_resources_per_kind() {
        let branch = BranchName::new("main").unwrap();
        let (engine, store) = engine_with(&branch);
        write_version(&store, &branch, EntityKind::ObjectType, "Asset", "alice", json!({"color": "#FFF"}));
        write_version(&store, &branch, EntityKind::LinkType, "Owns", "alice", json!({}));

        let snap = engine
            .snapshot(&branch, &TemporalReference::At(oms_core::Timestamp::now()), false)
            .unwrap();
        assert_eq!(snap.resource_counts[&EntityKind::ObjectType], 1);
        assert_eq!(snap.resource_counts[&EntityKind::LinkType], 1);
        assert_eq!(snap.total_resources, 2);
    }
}
