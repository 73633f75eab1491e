//! Branch Service (§4.6): branch lifecycle, proposals, and the merge driver.
//!
//! Protected-branch write enforcement lives here rather than in
//! `oms-store::VersionStore` — the version store is a generic commit/branch
//! primitive that the merge driver itself must be able to write through
//! (including onto `main`), so the policy check belongs to the layer that
//! exposes `merge`/`create_branch`/`delete_branch` as operator-facing verbs.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use dashmap::DashMap;
use oms_core::{BranchName, CommitHash, Document, DocumentKey, EntityKind, OmsError, OmsResult, ProposalId, Timestamp};
use oms_merge::{three_way_merge, MergeResult};
use oms_store::VersionStore;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value as Json;

use crate::proposal_store::ProposalStore;
use crate::types::{Branch, BranchState, ChangeProposal, MergeOutcome, MergeStrategy, ProposalStatus};

/// Orchestrates branch lifecycle, change proposals, and merges on top of a
/// [`VersionStore`].
pub struct BranchService {
    store: Arc<VersionStore>,
    proposals: ProposalStore,
    states: DashMap<BranchName, BranchState>,
    lifecycle_locks: DashMap<BranchName, Mutex<()>>,
}

impl BranchService {
    /// Wrap a version store with branch lifecycle and proposal tracking.
    pub fn new(store: Arc<VersionStore>) -> Self {
        Self {
            store,
            proposals: ProposalStore::new(),
            states: DashMap::new(),
            lifecycle_locks: DashMap::new(),
        }
    }

    /// Create a branch from `from`'s current HEAD.
    pub fn create_branch(&self, name: &BranchName, from: Option<&BranchName>, user_id: &str) -> OmsResult<Branch> {
        self.store.create_branch(name, from)?;
        self.states.insert(name.clone(), BranchState::Active);
        self.get_branch(name, user_id)
    }

    /// Delete a branch. Protected branches require `force`.
    pub fn delete_branch(&self, name: &BranchName, force: bool) -> OmsResult<()> {
        if name.is_implicitly_protected() && !force {
            return Err(OmsError::ProtectedBranch(name.clone()));
        }
        self.store.delete_branch(name)?;
        self.states.remove(name);
        Ok(())
    }

    /// List every known branch, excluding system branches by default.
    pub fn list_branches(&self, include_system: bool, user_id: &str) -> Vec<Branch> {
        self.store
            .list_branches()
            .into_iter()
            .filter(|name| include_system || !name.is_system())
            .filter_map(|name| self.get_branch(&name, user_id).ok())
            .collect()
    }

    /// Fetch a branch's lifecycle metadata.
    pub fn get_branch(&self, name: &BranchName, user_id: &str) -> OmsResult<Branch> {
        let head = self.store.branch_head(name)?.unwrap_or_else(CommitHash::nil);
        let state = self.states.get(name).map(|s| *s).unwrap_or(BranchState::Active);
        Ok(Branch {
            name: name.clone(),
            parent: None,
            head,
            state,
            is_protected: name.is_implicitly_protected(),
            created_by: user_id.to_string(),
            created_at: Timestamp::now(),
        })
    }

    /// Transition a branch's lifecycle state (e.g. `Active` -> `Archived`).
    pub fn update_state(&self, name: &BranchName, new_state: BranchState) -> OmsResult<()> {
        self.store.branch_head(name)?;
        self.states.insert(name.clone(), new_state);
        Ok(())
    }

    /// Diff two branches' current document sets.
    pub fn get_branch_diff(&self, base: &BranchName, compare: &BranchName) -> OmsResult<oms_store::BranchDiff> {
        self.store.compare_branches(base, compare)
    }

    /// Open a change proposal to merge `source_branch` into `target_branch`.
    pub fn create_proposal(
        &self,
        source_branch: BranchName,
        target_branch: BranchName,
        title: String,
        description: String,
        author: &str,
    ) -> OmsResult<ChangeProposal> {
        let source_hash = self.store.branch_head(&source_branch)?.unwrap_or_else(CommitHash::nil);
        let target_hash = self.store.branch_head(&target_branch)?.unwrap_or_else(CommitHash::nil);

        let proposal = ChangeProposal {
            id: format!("proposal_{}", uuid::Uuid::new_v4()),
            title,
            description,
            source_branch,
            target_branch,
            base_hash: target_hash,
            source_hash,
            target_hash,
            status: ProposalStatus::Draft,
            author: author.to_string(),
            reviewers: Vec::new(),
            approvals: Vec::new(),
            created_at: Timestamp::now(),
            updated_at: Timestamp::now(),
        };
        self.proposals.put(proposal.clone());
        Ok(proposal)
    }

    /// Fetch a proposal by id.
    pub fn get_proposal(&self, id: &str) -> OmsResult<ChangeProposal> {
        self.proposals
            .get(id)
            .ok_or_else(|| OmsError::NotFound(format!("proposal '{id}'")))
    }

    /// List every known proposal, newest first.
    pub fn list_proposals(&self) -> Vec<ChangeProposal> {
        self.proposals.list()
    }

    /// Record a reviewer's approval. Transitions `Draft`/`Open` -> `Approved`.
    pub fn approve_proposal(&self, id: &str, reviewer: &str) -> OmsResult<ChangeProposal> {
        self.transition_proposal(id, |p| {
            if p.status == ProposalStatus::Rejected || p.status == ProposalStatus::Merged {
                return Err(OmsError::invalid_field("status", format!("proposal '{id}' is already {:?}", p.status)));
            }
            if !p.approvals.iter().any(|a| a == reviewer) {
                p.approvals.push(reviewer.to_string());
            }
            p.status = ProposalStatus::Approved;
            Ok(())
        })
    }

    /// Reject a proposal; terminal.
    pub fn reject_proposal(&self, id: &str, _reviewer: &str) -> OmsResult<ChangeProposal> {
        self.transition_proposal(id, |p| {
            if p.status == ProposalStatus::Merged {
                return Err(OmsError::invalid_field("status", format!("proposal '{id}' is already merged")));
            }
            p.status = ProposalStatus::Rejected;
            Ok(())
        })
    }

    fn transition_proposal(
        &self,
        id: &str,
        f: impl FnOnce(&mut ChangeProposal) -> OmsResult<()>,
    ) -> OmsResult<ChangeProposal> {
        let mut proposal = self.get_proposal(id)?;
        f(&mut proposal)?;
        proposal.updated_at = Timestamp::now();
        self.proposals.put(proposal.clone());
        Ok(proposal)
    }

    /// Merge an approved proposal's source branch into its target branch
    /// using `strategy` (§4.6).
    ///
    /// Acquires the two branches' lifecycle locks in name-sorted order to
    /// avoid deadlocking against a concurrent merge touching the same pair
    /// in reverse (grounded in `VersionStore::commit_locks`'s per-branch
    /// lock, generalized to two branches).
    pub fn merge(
        &self,
        proposal_id: &str,
        strategy: MergeStrategy,
        resolutions: Option<&BTreeMap<String, Json>>,
        author: &str,
    ) -> OmsResult<MergeOutcome> {
        let proposal = self.get_proposal(proposal_id)?;
        if proposal.status != ProposalStatus::Approved {
            return Err(OmsError::invalid_field(
                "status",
                format!("proposal '{proposal_id}' must be Approved before merge, is {:?}", proposal.status),
            ));
        }

        let current_source_head = self
            .store
            .branch_head(&proposal.source_branch)?
            .unwrap_or_else(CommitHash::nil);
        if current_source_head != proposal.source_hash {
            return Err(OmsError::Conflict {
                expected: proposal.source_hash,
                actual: current_source_head,
                merge_hints: vec![oms_core::MergeHint {
                    suggestion: format!(
                        "source branch '{}' advanced since the proposal was created; refresh and recreate the proposal",
                        proposal.source_branch
                    ),
                }],
            });
        }

        let (first, second) = if proposal.source_branch <= proposal.target_branch {
            (&proposal.source_branch, &proposal.target_branch)
        } else {
            (&proposal.target_branch, &proposal.source_branch)
        };
        let first_lock = self.lifecycle_locks.entry(first.clone()).or_insert_with(|| Mutex::new(()));
        let _first_guard = first_lock.lock();
        let second_lock = self.lifecycle_locks.entry(second.clone()).or_insert_with(|| Mutex::new(()));
        let _second_guard = second_lock.lock();

        let outcome = match strategy {
            MergeStrategy::Merge => self.merge_three_way(&proposal, resolutions, author)?,
            MergeStrategy::Squash => self.merge_squash(&proposal, author)?,
            MergeStrategy::Rebase => self.merge_rebase(&proposal, author)?,
        };

        self.transition_proposal(proposal_id, |p| {
            p.status = ProposalStatus::Merged;
            Ok(())
        })?;

        Ok(outcome)
    }

    /// Rebuild the three-way merge base: the target branch's own document
    /// content, per resource, as of the proposal's fork point
    /// (`proposal.base_hash`'s commit timestamp). A resource absent from the
    /// base map is treated by `oms_merge::three_way_merge` as newly added on
    /// whichever side has it, not as a conflict against an empty base.
    fn reconstruct_base(
        &self,
        proposal: &ChangeProposal,
        target_index: &BTreeMap<String, (EntityKind, String)>,
        source_index: &BTreeMap<String, (EntityKind, String)>,
    ) -> OmsResult<BTreeMap<String, Json>> {
        let mut base_map = BTreeMap::new();
        if proposal.base_hash.is_nil() {
            return Ok(base_map);
        }
        let fork_time = self.store.get_commit(proposal.base_hash)?.timestamp;

        let mut resource_ids: BTreeSet<&String> = BTreeSet::new();
        resource_ids.extend(target_index.keys());
        resource_ids.extend(source_index.keys());

        for resource_id in resource_ids {
            let Some((kind, id)) = target_index.get(resource_id).or_else(|| source_index.get(resource_id)) else {
                continue;
            };
            let key = DocumentKey::new(*kind, id.clone(), proposal.target_branch.clone());
            if let Some(doc) = self.store.query_at(&key, fork_time) {
                base_map.insert(resource_id.clone(), doc.content);
            }
        }
        Ok(base_map)
    }

    fn merge_three_way(
        &self,
        proposal: &ChangeProposal,
        resolutions: Option<&BTreeMap<String, Json>>,
        author: &str,
    ) -> OmsResult<MergeOutcome> {
        let target_docs = self.store.current_documents(&proposal.target_branch);
        let source_docs = self.store.current_documents(&proposal.source_branch);

        let (target_map, index) = to_merge_input(&target_docs);
        let (source_map, source_index) = to_merge_input(&source_docs);
        let base_map = self.reconstruct_base(proposal, &index, &source_index)?;

        let result: MergeResult = three_way_merge(&base_map, &source_map, &target_map, resolutions);
        if !result.is_clean() {
            return Err(OmsError::invalid_field(
                "conflicts",
                format!("{} unresolved conflict(s); supply resolutions or reject the proposal", result.conflicts.len()),
            ));
        }

        let mut full_index = index;
        full_index.extend(source_index);

        let mut tx = self.store.begin_tx(proposal.target_branch.clone())?;
        let mut changes = 0usize;
        for (resource_id, content) in &result.merged {
            let Some((kind, id)) = full_index.get(resource_id) else {
                continue;
            };
            let key = DocumentKey::new(*kind, id.clone(), proposal.target_branch.clone());
            let unchanged = target_docs
                .iter()
                .find(|(k, _)| k.kind == *kind && k.id == *id)
                .map(|(_, d)| &d.content == content)
                .unwrap_or(false);
            if unchanged {
                continue;
            }
            let change_type = if target_docs.keys().any(|k| k.kind == *kind && k.id == *id) {
                oms_core::ChangeType::Update
            } else {
                oms_core::ChangeType::Create
            };
            tx.insert_document(key, content.clone(), author, change_type, vec![]);
            changes += 1;
        }

        let merge_commit = tx.commit(
            author,
            &format!("merge {} into {}", proposal.source_branch, proposal.target_branch),
        )?;
        tracing::info!(proposal_id = %proposal.id, changes, "three-way merge applied");

        Ok(MergeOutcome {
            merge_commit,
            source_branch: proposal.source_branch.clone(),
            target_branch: proposal.target_branch.clone(),
            strategy: MergeStrategy::Merge,
            conflicts_resolved: resolutions.map(|r| r.len()).unwrap_or(0),
        })
    }

    fn merge_squash(&self, proposal: &ChangeProposal, author: &str) -> OmsResult<MergeOutcome> {
        let diff = self.store.compare_branches(&proposal.target_branch, &proposal.source_branch)?;
        let source_docs = self.store.current_documents(&proposal.source_branch);

        let mut tx = self.store.begin_tx(proposal.target_branch.clone())?;
        let mut changes = 0usize;
        for key in diff.added.iter().chain(diff.modified.iter()) {
            let Some(doc) = source_docs.get(key) else { continue };
            let target_key = DocumentKey::new(key.kind, key.id.clone(), proposal.target_branch.clone());
            tx.insert_document(target_key, doc.content.clone(), author, oms_core::ChangeType::Update, vec![]);
            changes += 1;
        }
        for key in &diff.removed {
            let target_key = DocumentKey::new(key.kind, key.id.clone(), proposal.target_branch.clone());
            tx.delete_document(target_key, author);
            changes += 1;
        }

        let merge_commit = tx.commit(
            author,
            &format!("[SQUASHED] merge {} into {} ({} change(s))", proposal.source_branch, proposal.target_branch, changes),
        )?;

        Ok(MergeOutcome {
            merge_commit,
            source_branch: proposal.source_branch.clone(),
            target_branch: proposal.target_branch.clone(),
            strategy: MergeStrategy::Squash,
            conflicts_resolved: 0,
        })
    }

    fn merge_rebase(&self, proposal: &ChangeProposal, author: &str) -> OmsResult<MergeOutcome> {
        let history = self.store.get_commit_history(&proposal.source_branch, usize::MAX)?;
        let mut commits: Vec<_> = history
            .commits
            .into_iter()
            .take_while(|c| c.hash != proposal.base_hash)
            .collect();
        commits.reverse();

        let mut last_commit = self.store.branch_head(&proposal.target_branch)?.unwrap_or_else(CommitHash::nil);
        for commit in &commits {
            let mut tx = self.store.begin_tx(proposal.target_branch.clone())?;
            for change in &commit.changes {
                let key = DocumentKey::new(change.entity_type, change.entity_id.clone(), proposal.target_branch.clone());
                match change.operation {
                    oms_core::ChangeType::Delete => {
                        tx.delete_document(key, author);
                    }
                    op => {
                        let content = change.new.clone().unwrap_or(serde_json::json!({}));
                        tx.insert_document(key, content, author, op, vec![]);
                    }
                }
            }
            last_commit = tx.commit(author, &format!("[REBASED] {}", commit.message))?;
        }

        Ok(MergeOutcome {
            merge_commit: last_commit,
            source_branch: proposal.source_branch.clone(),
            target_branch: proposal.target_branch.clone(),
            strategy: MergeStrategy::Rebase,
            conflicts_resolved: 0,
        })
    }
}

/// Flatten a branch's documents into `oms-merge`'s `resource_id -> content`
/// shape, plus an index back to the typed key so results can be re-applied.
fn to_merge_input(
    docs: &FxHashMap<DocumentKey, Document>,
) -> (BTreeMap<String, Json>, BTreeMap<String, (EntityKind, String)>) {
    let mut map = BTreeMap::new();
    let mut index = BTreeMap::new();
    for (key, doc) in docs {
        let resource_id = format!("{}/{}", key.kind.as_str(), key.id);
        map.insert(resource_id.clone(), doc.content.clone());
        index.insert(resource_id, (key.kind, key.id.clone()));
    }
    (map, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oms_core::EntityKind;

    fn branch(name: &str) -> BranchName {
        BranchName::new(name).unwrap()
    }

    fn key(id: &str, branch: &BranchName) -> DocumentKey {
        DocumentKey::new(EntityKind::ObjectType, id, branch.clone())
    }

    fn fresh_service() -> (BranchService, BranchName, BranchName) {
        let store = VersionStore::in_memory();
        let main = branch("main");
        store.create_branch(&main, None).unwrap();
        let feature = branch("feature/asset");
        let service = BranchService::new(store);
        service.create_branch(&feature, Some(&main), "alice").unwrap();
        (service, main, feature)
    }

    #[test]
    fn create_branch_then_list_excludes_main_without_include_system() {
        let (service, _main, feature) = fresh_service();
        let branches = service.list_branches(false, "alice");
        assert!(branches.iter().any(|b| b.name == feature));
    }

    #[test]
    fn merge_requires_approval() {
        let (service, main, feature) = fresh_service();
        let proposal = service
            .create_proposal(feature, main, "add asset".into(), "".into(), "alice")
            .unwrap();
        let err = service.merge(&proposal.id, MergeStrategy::Merge, None, "alice").unwrap_err();
        assert!(matches!(err, OmsError::ValidationFailed { .. }));
    }

    #[test]
    fn merge_applies_source_only_changes_cleanly() {
        let (service, main, feature) = fresh_service();

        let store = Arc::clone(&service.store);
        let mut tx = store.begin_tx(feature.clone()).unwrap();
        tx.insert_document(
            key("Asset", &feature),
            serde_json::json!({"name": "Asset"}),
            "alice",
            oms_core::ChangeType::Create,
            vec![],
        );
        tx.commit("alice", "add Asset").unwrap();

        let proposal = service
            .create_proposal(feature.clone(), main.clone(), "add asset".into(), "".into(), "alice")
            .unwrap();
        service.approve_proposal(&proposal.id, "bob").unwrap();

        let outcome = service.merge(&proposal.id, MergeStrategy::Merge, None, "alice").unwrap();
        assert_eq!(outcome.target_branch, main);

        let merged = store.current_documents(&main);
        assert!(merged.keys().any(|k| k.id == "Asset"));
    }

    /// S3: base `Asset{properties:[A,B]}`, source adds `C`, target adds `D`
    /// — a real (non-empty) base must let `properties`' by-name merge
    /// produce a clean `[A,B,C,D]` instead of an AddAdd conflict.
    #[test]
    fn merge_extends_shared_resource_from_both_sides_without_conflict() {
        let (service, main, feature) = fresh_service();
        let store = Arc::clone(&service.store);

        let mut tx = store.begin_tx(main.clone()).unwrap();
        tx.insert_document(
            key("Asset", &main),
            serde_json::json!({"name": "Asset", "properties": [{"name": "A"}, {"name": "B"}]}),
            "alice",
            oms_core::ChangeType::Create,
            vec![],
        );
        tx.commit("alice", "add Asset with A, B").unwrap();

        let mut tx_feature = store.begin_tx(feature.clone()).unwrap();
        tx_feature.insert_document(
            key("Asset", &feature),
            serde_json::json!({"name": "Asset", "properties": [{"name": "A"}, {"name": "B"}, {"name": "C"}]}),
            "bob",
            oms_core::ChangeType::Update,
            vec![],
        );
        tx_feature.commit("bob", "add property C on feature").unwrap();

        let proposal = service
            .create_proposal(feature, main.clone(), "add C and D".into(), "".into(), "bob")
            .unwrap();
        service.approve_proposal(&proposal.id, "alice").unwrap();

        let mut tx_main = store.begin_tx(main.clone()).unwrap();
        tx_main.insert_document(
            key("Asset", &main),
            serde_json::json!({"name": "Asset", "properties": [{"name": "A"}, {"name": "B"}, {"name": "D"}]}),
            "alice",
            oms_core::ChangeType::Update,
            vec![],
        );
        tx_main.commit("alice", "add property D on main").unwrap();

        let outcome = service.merge(&proposal.id, MergeStrategy::Merge, None, "alice").unwrap();
        assert_eq!(outcome.target_branch, main);

        let merged = store.current_documents(&main);
        let (_, asset) = merged.iter().find(|(k, _)| k.id == "Asset").unwrap();
        let names: BTreeSet<String> = asset.content["properties"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, BTreeSet::from(["A".to_string(), "B".to_string(), "C".to_string(), "D".to_string()]));
    }

    #[test]
    fn merge_conflict_without_resolution_fails() {
        let (service, main, feature) = fresh_service();
        let store = Arc::clone(&service.store);

        let mut tx_main = store.begin_tx(main.clone()).unwrap();
        tx_main.insert_document(
            key("Asset", &main),
            serde_json::json!({"name": "Asset", "color": "#000"}),
            "alice",
            oms_core::ChangeType::Create,
            vec![],
        );
        tx_main.commit("alice", "add Asset on main").unwrap();

        let mut tx_feature = store.begin_tx(feature.clone()).unwrap();
        tx_feature.insert_document(
            key("Asset", &feature),
            serde_json::json!({"name": "Asset", "color": "#fff"}),
            "bob",
            oms_core::ChangeType::Create,
            vec![],
        );
        tx_feature.commit("bob", "add Asset on feature").unwrap();

        let proposal = service
            .create_proposal(feature, main, "add asset".into(), "".into(), "bob")
            .unwrap();
        service.approve_proposal(&proposal.id, "alice").unwrap();

        let err = service.merge(&proposal.id, MergeStrategy::Merge, None, "alice").unwrap_err();
        assert!(matches!(err, OmsError::ValidationFailed { .. }));
    }

    #[test]
    fn stale_source_head_is_rejected_before_merge() {
        let (service, main, feature) = fresh_service();
        let store = Arc::clone(&service.store);

        let proposal = service
            .create_proposal(feature.clone(), main, "add asset".into(), "".into(), "alice")
            .unwrap();
        service.approve_proposal(&proposal.id, "bob").unwrap();

        let mut tx = store.begin_tx(feature.clone()).unwrap();
        tx.insert_document(
            key("Asset", &feature),
            serde_json::json!({"name": "Asset"}),
            "alice",
            oms_core::ChangeType::Create,
            vec![],
        );
        tx.commit("alice", "add Asset after proposal created").unwrap();

        let err = service.merge(&proposal.id, MergeStrategy::Merge, None, "alice").unwrap_err();
        assert!(matches!(err, OmsError::Conflict { .. }));
    }
}
