//! Schema Service (§4.3): thin orchestration around [`DocumentRepository`]
//! that layers cross-entity invariants on top of its single-document
//! validation, then raises a `schema.changed` outbox event per mutation.

use std::sync::Arc;

use oms_core::{BranchName, ChangeType, Document, EntityKind, OmsError, OmsResult};
use oms_outbox::{OutboxEvent, OutboxStore};
use oms_store::{DocumentRepository, ListFilters, Page, VersionStore};
use serde_json::{json, Value as Json};
use tracing::info;

use crate::hooks::{HookContext, HookPipeline};
use crate::invariants;

/// Validates cross-entity invariants and commits typed schema entities,
/// raising an outbox event per mutation (§4.3).
///
/// Grounded in `original_source/oms-monolith/core/schema/service.py`'s
/// `SchemaService`: its `create_object_type`/`add_property`/... each ran
/// "validate → duplicate check → transaction → event publish"; here that
/// pipeline collapses into one generic `create`/`update`/`delete` dispatched
/// by [`EntityKind`], since `DocumentRepository` already owns the
/// single-document half of validation (name format, size limits,
/// `AlreadyExists`/`NotFound`).
pub struct SchemaService {
    repo: DocumentRepository,
    outbox: Arc<OutboxStore>,
    hooks: HookPipeline,
}

impl SchemaService {
    /// Build a schema service over a shared store and outbox, with no
    /// additional hooks registered beyond the built-in invariant checks.
    pub fn new(store: Arc<VersionStore>, outbox: Arc<OutboxStore>, limits: oms_core::Limits) -> Self {
        SchemaService {
            repo: DocumentRepository::new(store, limits),
            outbox,
            hooks: HookPipeline::new(),
        }
    }

    /// Register an additional pre-commit hook, run after the built-in
    /// invariant checks on every `create`/`update` (§9C).
    pub fn register_hook(&mut self, hook: Box<dyn crate::hooks::ValidationHook>) {
        self.hooks.register(hook);
    }

    /// Read the current version of an entity.
    pub fn get(&self, kind: EntityKind, branch: &BranchName, id: &str) -> Option<Document> {
        self.repo.get(kind, branch, id)
    }

    /// List entities of a kind, paginated (§4.2 `list`).
    pub fn list(
        &self,
        kind: EntityKind,
        branch: &BranchName,
        filters: &ListFilters,
        limit: usize,
        offset: usize,
    ) -> Page<Document> {
        self.repo.list(kind, branch, filters, limit, offset)
    }

    /// Create a new entity, after its cross-entity invariants pass (§4.2, §4.3).
    pub fn create(
        &self,
        kind: EntityKind,
        branch: BranchName,
        id: &str,
        content: Json,
        author: &str,
    ) -> OmsResult<Document> {
        self.check_invariants(kind, &branch, id, &content, None)?;
        self.hooks.run(&HookContext {
            kind,
            branch: &branch,
            id,
            content: Some(&content),
        })?;

        let mut tx = self.repo.begin(branch.clone())?;
        self.repo.create(&mut tx, kind, id, content.clone(), author)?;
        let key = oms_core::DocumentKey::new(kind, id, branch.clone());
        let staged = tx.get_document(&key).expect("just-staged document is readable");
        let event = self.schema_changed_event(kind, &branch, id, &staged.version_hash, &staged.fields_changed, ChangeType::Create, author);
        tx.stage_outbox_event(event);
        tx.commit_with_outbox(author, &format!("Create {kind} {id}"), &self.outbox)?;

        let doc = self
            .repo
            .get(kind, &branch, id)
            .expect("just-committed document is readable");
        Ok(doc)
    }

    /// Sparse-update an existing entity, re-validating the merged content
    /// against cross-entity invariants before committing.
    pub fn update(
        &self,
        kind: EntityKind,
        branch: BranchName,
        id: &str,
        patch: Json,
        author: &str,
    ) -> OmsResult<Document> {
        let current = self
            .repo
            .get(kind, &branch, id)
            .ok_or_else(|| OmsError::NotFound(format!("{kind}/{id}")))?;
        let preview = overlay(&current.content, &patch);
        self.check_invariants(kind, &branch, id, &preview, Some(id))?;
        self.hooks.run(&HookContext {
            kind,
            branch: &branch,
            id,
            content: Some(&preview),
        })?;

        let mut tx = self.repo.begin(branch.clone())?;
        self.repo.update(&mut tx, kind, id, patch, author)?;
        let key = oms_core::DocumentKey::new(kind, id, branch.clone());
        let staged = tx.get_document(&key).expect("just-staged document is readable");
        let event = self.schema_changed_event(kind, &branch, id, &staged.version_hash, &staged.fields_changed, ChangeType::Update, author);
        tx.stage_outbox_event(event);
        tx.commit_with_outbox(author, &format!("Update {kind} {id}"), &self.outbox)?;

        let doc = self
            .repo
            .get(kind, &branch, id)
            .expect("just-committed document is readable");
        Ok(doc)
    }

    /// Scan a branch's graph for dangling references (§9C: graph-health
    /// inspection).
    pub fn check_integrity(&self, branch: &BranchName) -> crate::integrity::IntegrityReport {
        crate::integrity::check_integrity(&self.repo, branch)
    }

    /// Tombstone an entity, after referential-integrity checks pass.
    /// Returns `false` if the entity was already absent.
    pub fn delete(&self, kind: EntityKind, branch: BranchName, id: &str, author: &str) -> OmsResult<bool> {
        self.check_delete_invariants(kind, &branch, id)?;
        self.hooks.run(&HookContext {
            kind,
            branch: &branch,
            id,
            content: None,
        })?;

        let mut tx = self.repo.begin(branch.clone())?;
        let existed = self.repo.delete(&mut tx, kind, id, author);
        if !existed {
            return Ok(false);
        }
        let event = self.schema_changed_event(kind, &branch, id, "", &[], ChangeType::Delete, author);
        tx.stage_outbox_event(event);
        tx.commit_with_outbox(author, &format!("Delete {kind} {id}"), &self.outbox)?;
        Ok(true)
    }

    fn check_invariants(
        &self,
        kind: EntityKind,
        branch: &BranchName,
        id: &str,
        content: &Json,
        exclude_id: Option<&str>,
    ) -> OmsResult<()> {
        match kind {
            EntityKind::ObjectType => invariants::validate_color(content),
            EntityKind::Property => {
                invariants::validate_color(content)?;
                let object_type_id = content
                    .get("object_type_id")
                    .and_then(Json::as_str)
                    .unwrap_or_default();
                let is_primary_key = content.get("is_primary_key").and_then(Json::as_bool).unwrap_or(false);
                invariants::validate_single_primary_key(&self.repo, branch, object_type_id, is_primary_key, exclude_id)
            }
            EntityKind::LinkType => invariants::validate_link_type_endpoints(&self.repo, branch, content),
            EntityKind::Interface => {
                let parents: Vec<String> = content
                    .get("parents")
                    .and_then(Json::as_array)
                    .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                    .unwrap_or_default();
                invariants::validate_interface_parents(&self.repo, branch, id, &parents)
            }
            EntityKind::SharedProperty => Ok(()),
            EntityKind::ActionType => {
                let referenced: Vec<String> = content
                    .get("referenced_actions")
                    .and_then(Json::as_array)
                    .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                    .unwrap_or_default();
                invariants::validate_action_type_references(&self.repo, branch, id, &referenced)
            }
            EntityKind::FunctionType => invariants::validate_function_type(content),
            EntityKind::DataType => Ok(()),
        }
    }

    fn check_delete_invariants(&self, kind: EntityKind, branch: &BranchName, id: &str) -> OmsResult<()> {
        match kind {
            EntityKind::Interface => invariants::validate_interface_not_implemented(&self.repo, branch, id),
            EntityKind::SharedProperty => invariants::validate_shared_property_not_in_use(&self.repo, branch, id),
            _ => Ok(()),
        }
    }

    /// §4.3: "Emits a `schema.changed` outbox event per mutation with
    /// payload `{branch, commit, operation, entity_type, entity_id,
    /// version_hash, changes}`."
    ///
    /// Built and staged onto the same `Tx` as the mutation, *before* that
    /// Tx commits, so it can be inserted in the same commit unit
    /// (`Tx::commit_with_outbox`). The commit hash isn't known yet at this
    /// point, so `commit`/the payload's `"commit"` field are left
    /// placeholder and patched in by the Tx once the commit lands.
    fn schema_changed_event(
        &self,
        kind: EntityKind,
        branch: &BranchName,
        id: &str,
        version_hash: &str,
        fields_changed: &[String],
        change_type: ChangeType,
        author: &str,
    ) -> OutboxEvent {
        let operation = match change_type {
            ChangeType::Create => "create",
            ChangeType::Update => "update",
            ChangeType::Delete => "delete",
        };
        let event_type = format!("com.foundry.oms.{}.{}ed", kind.as_str(), change_past_tense(change_type));
        let payload = json!({
            "branch": branch.as_str(),
            "commit": Json::Null,
            "operation": operation,
            "entity_type": kind.as_str(),
            "entity_id": id,
            "version_hash": version_hash,
            "changes": fields_changed,
            "author": author,
        });
        info!(branch = %branch, entity_type = %kind, entity_id = %id, operation, "schema changed");
        OutboxEvent::new(event_type, branch.clone(), None, payload)
    }
}

fn change_past_tense(change_type: ChangeType) -> &'static str {
    match change_type {
        ChangeType::Create => "creat",
        ChangeType::Update => "updat",
        ChangeType::Delete => "delet",
    }
}

/// Preview a sparse update's merged top-level shape, for pre-commit
/// invariant checks (mirrors `DocumentRepository`'s private `merge_sparse`,
/// which isn't exposed across the crate boundary).
fn overlay(base: &Json, patch: &Json) -> Json {
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
