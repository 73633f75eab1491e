//! Typed CRUD over schema entities (§4.2), layered on [`VersionStore`]/[`Tx`].
//!
//! Grounded in the teacher's per-primitive handle pattern
//! (`engine/src/primitives/branch/handle.rs`'s `KvHandle`/`StateHandle`/
//! `JsonHandle`): each handle wraps a branch-scoped `Arc<Database>` and
//! delegates into a shared transaction. Here one `DocumentRepository`
//! replaces the primitive-specific handles, since every OMS entity kind
//! shares the same versioned-document shape and only its validation rules
//! differ.

use crate::version_store::VersionStore;
use oms_core::{
    BranchName, ChangeType, Document, DocumentKey, EntityKind, FieldError, Limits, OmsError,
    OmsResult,
};
use serde_json::Value as Json;
use std::sync::Arc;

/// A deterministically ordered page of entities (§4.2 `list`).
#[derive(Debug, Clone, Default)]
pub struct Page<T> {
    /// Items in this page.
    pub items: Vec<T>,
    /// Total matching items across all pages.
    pub total: usize,
}

/// Filters accepted by [`DocumentRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct ListFilters {
    /// Restrict to a `status` field value, if the entity has one.
    pub status: Option<String>,
    /// Restrict to a `type_class` field value, if the entity has one.
    pub type_class: Option<String>,
}

/// CRUD + validation over one entity kind's documents on a branch.
///
/// A thin typed facade — `content` stays `serde_json::Value` internally
/// (schema entities are heterogeneous and evolve independently of this
/// crate), but every operation is scoped to a single [`EntityKind`].
pub struct DocumentRepository {
    store: Arc<VersionStore>,
    limits: Limits,
}

impl DocumentRepository {
    /// Build a repository over a shared store.
    pub fn new(store: Arc<VersionStore>, limits: Limits) -> Self {
        DocumentRepository { store, limits }
    }

    /// Begin a transaction for a batch of operations on `branch`.
    pub fn begin(&self, branch: BranchName) -> OmsResult<crate::version_store::Tx> {
        self.store.begin_tx(branch)
    }

    /// Read the current (non-tombstoned) document for an id.
    pub fn get(&self, kind: EntityKind, branch: &BranchName, id: &str) -> Option<Document> {
        let key = DocumentKey::new(kind, id, branch.clone());
        self.store
            .all_versions(&key)
            .into_iter()
            .last()
            .filter(|d| !d.is_tombstone())
    }

    /// List current documents of a kind on a branch, filtered and paginated,
    /// ordered deterministically by name (§4.2).
    pub fn list(
        &self,
        kind: EntityKind,
        branch: &BranchName,
        filters: &ListFilters,
        limit: usize,
        offset: usize,
    ) -> Page<Document> {
        let mut all: Vec<(String, Document)> = self
            .store
            .current_documents(branch)
            .into_iter()
            .filter(|(key, _)| key.kind == kind)
            .map(|(key, doc)| (key.id, doc))
            .filter(|(_, doc)| matches_filters(doc, filters))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        let total = all.len();
        let items = all
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, doc)| doc)
            .collect();
        Page { items, total }
    }

    /// Create a new entity within an already-open transaction.
    ///
    /// Fails with `AlreadyExists` if the id is already live on this branch,
    /// and with `ValidationFailed` if `validate_name`/entity rules reject
    /// `content` (§4.2).
    pub fn create(
        &self,
        tx: &mut crate::version_store::Tx,
        kind: EntityKind,
        id: &str,
        content: Json,
        author: &str,
    ) -> OmsResult<()> {
        validate_name(id)?;
        validate_size(&content, &self.limits)?;

        let key = DocumentKey::new(kind, id, tx.branch().clone());
        if tx.get_document(&key).is_some() {
            return Err(OmsError::AlreadyExists(format!("{kind}/{id}")));
        }

        tx.insert_document(key, content, author, ChangeType::Create, vec![]);
        Ok(())
    }

    /// Sparse-update an existing entity: fields present in `patch` overwrite,
    /// fields absent are retained from the current version (§4.2).
    pub fn update(
        &self,
        tx: &mut crate::version_store::Tx,
        kind: EntityKind,
        id: &str,
        patch: Json,
        author: &str,
    ) -> OmsResult<Json> {
        let key = DocumentKey::new(kind, id, tx.branch().clone());
        let current = tx
            .get_document(&key)
            .ok_or_else(|| OmsError::NotFound(format!("{kind}/{id}")))?;

        let merged = merge_sparse(&current.content, &patch);
        validate_size(&merged, &self.limits)?;

        let changed_fields = changed_top_level_fields(&current.content, &merged);
        tx.insert_document(
            key,
            merged.clone(),
            author,
            ChangeType::Update,
            changed_fields,
        );
        Ok(merged)
    }

    /// Tombstone an entity. Returns `false` if it was already absent.
    ///
    /// Referential-integrity callers (e.g. `SharedPropertyChange`'s "cannot
    /// be deleted while referenced") run their check before calling this and
    /// raise `InUse` themselves — this method only performs the write.
    pub fn delete(
        &self,
        tx: &mut crate::version_store::Tx,
        kind: EntityKind,
        id: &str,
        author: &str,
    ) -> bool {
        let key = DocumentKey::new(kind, id, tx.branch().clone());
        tx.delete_document(key, author)
    }
}

fn matches_filters(doc: &Document, filters: &ListFilters) -> bool {
    if let Some(status) = &filters.status {
        if doc.content.get("status").and_then(Json::as_str) != Some(status.as_str()) {
            return false;
        }
    }
    if let Some(type_class) = &filters.type_class {
        if doc.content.get("type_class").and_then(Json::as_str) != Some(type_class.as_str()) {
            return false;
        }
    }
    true
}

/// §4.2 "Name matches `^[A-Za-z][A-Za-z0-9_]*$`".
fn validate_name(name: &str) -> OmsResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(OmsError::ValidationFailed {
            errors: vec![FieldError::new(
                "name",
                "must match ^[A-Za-z][A-Za-z0-9_]*$",
            )],
        })
    }
}

fn validate_size(content: &Json, limits: &Limits) -> OmsResult<()> {
    let size = serde_json::to_vec(content).map(|b| b.len()).unwrap_or(0);
    if size > limits.max_document_bytes {
        return Err(OmsError::ValidationFailed {
            errors: vec![FieldError::new(
                "content",
                format!(
                    "document is {size} bytes, exceeds limit of {}",
                    limits.max_document_bytes
                ),
            )],
        });
    }
    if let Some(props) = content.get("properties").and_then(Json::as_array) {
        if props.len() > limits.max_properties_per_entity {
            return Err(OmsError::ValidationFailed {
                errors: vec![FieldError::new(
                    "properties",
                    format!(
                        "{} properties exceeds limit of {}",
                        props.len(),
                        limits.max_properties_per_entity
                    ),
                )],
            });
        }
    }
    Ok(())
}

/// Overlay `patch`'s top-level keys onto `base`, keeping everything else.
fn merge_sparse(base: &Json, patch: &Json) -> Json {
    match (base, patch) {
        (Json::Object(base_map), Json::Object(patch_map)) => {
            let mut out = base_map.clone();
            for (k, v) in patch_map {
                out.insert(k.clone(), v.clone());
            }
            Json::Object(out)
        }
        _ => patch.clone(),
    }
}

fn changed_top_level_fields(before: &Json, after: &Json) -> Vec<String> {
    let (Json::Object(before), Json::Object(after)) = (before, after) else {
        return vec![];
    };
    after
        .iter()
        .filter(|(k, v)| before.get(*k) != Some(*v))
        .map(|(k, _)| k.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn repo() -> (DocumentRepository, BranchName) {
        let store = VersionStore::in_memory();
        let branch = BranchName::new("main").unwrap();
        store.create_branch(&branch, None).unwrap();
        (DocumentRepository::new(store, Limits::default()), branch)
    }

    #[test]
    fn create_then_get_round_trips() {
        let (repo, branch) = repo();
        let mut tx = repo.begin(branch.clone()).unwrap();
        repo.create(
            &mut tx,
            EntityKind::ObjectType,
            "Asset",
            json!({"name": "Asset", "status": "active"}),
            "alice",
        )
        .unwrap();
        tx.commit("alice", "add Asset").unwrap();

        let doc = repo.get(EntityKind::ObjectType, &branch, "Asset").unwrap();
        assert_eq!(doc.content["name"], "Asset");
    }

    #[test]
    fn duplicate_create_fails() {
        let (repo, branch) = repo();
        let mut tx = repo.begin(branch.clone()).unwrap();
        repo.create(
            &mut tx,
            EntityKind::ObjectType,
            "Asset",
            json!({"name": "Asset"}),
            "alice",
        )
        .unwrap();
        let err = repo
            .create(
                &mut tx,
                EntityKind::ObjectType,
                "Asset",
                json!({"name": "Asset"}),
                "alice",
            )
            .unwrap_err();
        assert!(matches!(err, OmsError::AlreadyExists(_)));
    }

    #[test]
    fn update_is_sparse() {
        let (repo, branch) = repo();
        let mut tx = repo.begin(branch.clone()).unwrap();
        repo.create(
            &mut tx,
            EntityKind::ObjectType,
            "Asset",
            json!({"name": "Asset", "status": "draft", "color": "#ffffff"}),
            "alice",
        )
        .unwrap();
        tx.commit("alice", "add Asset").unwrap();

        let mut tx2 = repo.begin(branch.clone()).unwrap();
        let merged = repo
            .update(
                &mut tx2,
                EntityKind::ObjectType,
                "Asset",
                json!({"status": "active"}),
                "bob",
            )
            .unwrap();
        tx2.commit("bob", "activate Asset").unwrap();

        assert_eq!(merged["status"], "active");
        assert_eq!(merged["color"], "#ffffff");
    }

    #[test]
    fn invalid_name_rejected() {
        let (repo, branch) = repo();
        let mut tx = repo.begin(branch).unwrap();
        let err = repo
            .create(&mut tx, EntityKind::ObjectType, "1bad", json!({}), "alice")
            .unwrap_err();
        assert!(matches!(err, OmsError::ValidationFailed { .. }));
    }

    #[test]
    fn delete_tombstones_and_hides_from_get() {
        let (repo, branch) = repo();
        let mut tx = repo.begin(branch.clone()).unwrap();
        repo.create(
            &mut tx,
            EntityKind::ObjectType,
            "Asset",
            json!({"name": "Asset"}),
            "alice",
        )
        .unwrap();
        tx.commit("alice", "add").unwrap();

        let mut tx2 = repo.begin(branch.clone()).unwrap();
        assert!(repo.delete(&mut tx2, EntityKind::ObjectType, "Asset", "alice"));
        tx2.commit("alice", "remove").unwrap();

        assert!(repo.get(EntityKind::ObjectType, &branch, "Asset").is_none());
    }
}
