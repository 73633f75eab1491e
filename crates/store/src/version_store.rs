//! Branch refs, the commit DAG, and OCC commit (§4.1).
//!
//! Grounded directly in the teacher's `TransactionManager`
//! (`concurrency/src/manager.rs`): a per-branch `DashMap<_, Mutex<()>>`
//! serializes validate-then-apply within a branch while different branches
//! commit fully in parallel, and a commit is durable only once its record
//! has been fsynced to the commit log — mirroring "WAL before storage".

use crate::commit::Commit;
use crate::error::{branch_not_found, commit_not_found, conflict, duplicate_branch};
use dashmap::DashMap;
use oms_core::{
    BranchName, ChangeRecord, ChangeType, CommitHash, Document, DocumentKey, OmsError, OmsResult,
    Timestamp,
};
use oms_durability::{replay, CommitLogRecord, CommitLogWriter};
use oms_outbox::{OutboxEvent, OutboxStore};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// A page of commits returned by [`VersionStore::get_commit_history`].
#[derive(Debug, Clone)]
pub struct CommitHistory {
    /// Commits, newest first.
    pub commits: Vec<Commit>,
    /// Whether more commits exist past this page.
    pub has_more: bool,
}

/// Result of [`VersionStore::compare_branches`] (§4.1).
#[derive(Debug, Clone, Default)]
pub struct BranchDiff {
    /// Keys present on `compare` but not `base`.
    pub added: Vec<DocumentKey>,
    /// Keys present on `base` but not `compare`.
    pub removed: Vec<DocumentKey>,
    /// Keys present (non-tombstoned) on both, with different content.
    pub modified: Vec<DocumentKey>,
}

/// The append-only commit DAG plus branch refs and per-key document chains.
///
/// This is the single shared store a whole OMS instance runs against; all
/// higher components (`oms-branch`, `oms-schema`, `oms-merge`) go through
/// [`Tx`] rather than touching `documents`/`commits` directly.
pub struct VersionStore {
    commits: DashMap<CommitHash, Commit>,
    branch_heads: DashMap<BranchName, CommitHash>,
    documents: DashMap<DocumentKey, Vec<Document>>,
    commit_locks: DashMap<BranchName, Mutex<()>>,
    log: Option<Mutex<CommitLogWriter>>,
}

impl VersionStore {
    /// An ephemeral, non-durable store (tests, or a cache-only deployment).
    pub fn in_memory() -> Arc<Self> {
        Arc::new(VersionStore {
            commits: DashMap::new(),
            branch_heads: DashMap::new(),
            documents: DashMap::new(),
            commit_locks: DashMap::new(),
            log: None,
        })
    }

    /// Open (or create) a store backed by a commit log at `path`, replaying
    /// it to rebuild the in-memory commit DAG and branch heads.
    pub fn open(path: impl Into<PathBuf>) -> Result<Arc<Self>, OmsError> {
        let path = path.into();
        let recovered = replay(&path).map_err(|e| OmsError::Fatal(e.to_string()))?;

        let commits = DashMap::new();
        let branch_heads = DashMap::new();
        for record in &recovered.commits {
            let commit = Commit {
                hash: record.commit_hash,
                parents: record.parent_hash.into_iter().collect(),
                branch: record.branch.clone(),
                author: record.author.clone(),
                message: record.message.clone(),
                timestamp: record.timestamp,
                changes: record.changes.clone(),
            };
            commits.insert(commit.hash, commit);
        }
        for (branch, head) in recovered.branch_heads {
            branch_heads.insert(branch, head);
        }

        let documents = DashMap::new();
        for record in &recovered.commits {
            apply_changes_to_documents(
                &documents,
                &record.branch,
                record.commit_hash,
                record.timestamp,
                &record.author,
                &record.changes,
            );
        }

        let writer = CommitLogWriter::open(&path).map_err(|e| OmsError::Fatal(e.to_string()))?;
        info!(commits = commits.len(), branches = branch_heads.len(), "store recovered from commit log");

        Ok(Arc::new(VersionStore {
            commits,
            branch_heads,
            documents,
            commit_locks: DashMap::new(),
            log: Some(Mutex::new(writer)),
        }))
    }

    /// Create a new branch pointing at `from`'s current HEAD (or the nil
    /// hash for an empty root branch).
    pub fn create_branch(&self, name: &BranchName, from: Option<&BranchName>) -> OmsResult<()> {
        if self.branch_heads.contains_key(name) {
            return Err(duplicate_branch(name));
        }
        let head = match from {
            Some(source) => self.branch_head(source)?.unwrap_or_else(CommitHash::nil),
            None => CommitHash::nil(),
        };
        self.branch_heads.insert(name.clone(), head);
        Ok(())
    }

    /// Delete a branch ref. Commits it pointed to remain reachable by hash
    /// (§4.1 "Append-only").
    pub fn delete_branch(&self, name: &BranchName) -> OmsResult<()> {
        if name.is_implicitly_protected() {
            return Err(OmsError::ProtectedBranch(name.clone()));
        }
        self.branch_heads
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| branch_not_found(name))
    }

    /// List every known branch name.
    pub fn list_branches(&self) -> Vec<BranchName> {
        self.branch_heads.iter().map(|e| e.key().clone()).collect()
    }

    /// Current HEAD commit hash for a branch. `Ok(None)` means the branch
    /// exists but has no commits yet.
    pub fn branch_head(&self, name: &BranchName) -> OmsResult<Option<CommitHash>> {
        self.branch_heads
            .get(name)
            .map(|h| {
                let h = *h;
                if h.is_nil() {
                    None
                } else {
                    Some(h)
                }
            })
            .ok_or_else(|| branch_not_found(name))
    }

    /// Fetch a commit by hash.
    pub fn get_commit(&self, hash: CommitHash) -> OmsResult<Commit> {
        self.commits
            .get(&hash)
            .map(|c| c.clone())
            .ok_or_else(|| commit_not_found(hash))
    }

    /// Walk a branch's history from HEAD, newest first.
    pub fn get_commit_history(
        &self,
        branch: &BranchName,
        limit: usize,
    ) -> OmsResult<CommitHistory> {
        let mut head = self.branch_head(branch)?;
        let mut commits = Vec::new();
        let mut has_more = false;
        while let Some(hash) = head {
            if commits.len() >= limit {
                has_more = true;
                break;
            }
            let commit = self.get_commit(hash)?;
            head = commit.parents.first().copied();
            commits.push(commit);
        }
        Ok(CommitHistory { commits, has_more })
    }

    /// Whether `ancestor` is `descendant` or one of its transitive parents.
    pub fn is_ancestor(&self, ancestor: CommitHash, descendant: CommitHash) -> OmsResult<bool> {
        if ancestor == descendant {
            return Ok(true);
        }
        let mut frontier = vec![descendant];
        let mut seen = std::collections::HashSet::new();
        while let Some(hash) = frontier.pop() {
            if hash.is_nil() || !seen.insert(hash) {
                continue;
            }
            if hash == ancestor {
                return Ok(true);
            }
            let commit = self.get_commit(hash)?;
            frontier.extend(commit.parents);
        }
        Ok(false)
    }

    /// Move `target`'s ref to `source`'s HEAD without a new commit, only
    /// valid when `target`'s current HEAD is an ancestor of `source`'s HEAD
    /// (§4.6 SQUASH/REBASE's final step).
    pub fn fast_forward(&self, source: &BranchName, target: &BranchName) -> OmsResult<CommitHash> {
        let source_head = self
            .branch_head(source)?
            .ok_or_else(|| OmsError::invalid_field("source", "source branch has no commits"))?;
        let target_head = self.branch_head(target)?.unwrap_or_else(CommitHash::nil);

        if !self.is_ancestor(target_head, source_head)? {
            return Err(conflict(target_head, source_head));
        }

        let branch_lock = self
            .commit_locks
            .entry(target.clone())
            .or_insert_with(|| Mutex::new(()));
        let _guard = branch_lock.lock();
        self.branch_heads.insert(target.clone(), source_head);
        Ok(source_head)
    }

    /// Current (non-tombstoned) document per id on a branch, by entity kind.
    pub fn current_documents(
        &self,
        branch: &BranchName,
    ) -> FxHashMap<DocumentKey, Document> {
        let mut out = FxHashMap::default();
        for entry in self.documents.iter() {
            let key = entry.key();
            if key.branch != *branch {
                continue;
            }
            if let Some(latest) = entry.value().last() {
                if !latest.is_tombstone() {
                    out.insert(key.clone(), latest.clone());
                }
            }
        }
        out
    }

    /// Diff two branches' current document sets (§4.1 `compare_branches`).
    pub fn compare_branches(&self, base: &BranchName, compare: &BranchName) -> OmsResult<BranchDiff> {
        self.branch_head(base)?;
        self.branch_head(compare)?;

        let base_docs = self.current_documents(base);
        let compare_docs = self.current_documents(compare);
        let mut diff = BranchDiff::default();

        for (key, doc) in &compare_docs {
            let unscoped = key_sans_branch(key);
            match base_docs.iter().find(|(k, _)| key_sans_branch(k) == unscoped) {
                None => diff.added.push(key.clone()),
                Some((_, base_doc)) if base_doc.version_hash != doc.version_hash => {
                    diff.modified.push(key.clone())
                }
                Some(_) => {}
            }
        }
        for (key, _) in &base_docs {
            let unscoped = key_sans_branch(key);
            if !compare_docs.keys().any(|k| key_sans_branch(k) == unscoped) {
                diff.removed.push(key.clone());
            }
        }
        Ok(diff)
    }

    /// Return the version chain for a key as of the given time, the newest
    /// entry with `modified_at <= at`, or `None` if that entry is a
    /// tombstone or the key has no such version (§4.1 "Read isolation").
    pub fn query_at(&self, key: &DocumentKey, at: Timestamp) -> Option<Document> {
        let chain = self.documents.get(key)?;
        chain
            .iter()
            .rev()
            .find(|d| d.modified_at <= at)
            .filter(|d| !d.is_tombstone())
            .cloned()
    }

    /// Full version chain for a key, oldest first.
    pub fn all_versions(&self, key: &DocumentKey) -> Vec<Document> {
        self.documents
            .get(key)
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// Every key of `kind` ever written on `branch`, including ones whose
    /// latest version is a tombstone. Used by time-travel queries that scan
    /// "all ids of a type", which must see history `current_documents`
    /// deliberately excludes.
    pub fn all_keys_for_kind(&self, branch: &BranchName, kind: oms_core::EntityKind) -> Vec<DocumentKey> {
        self.documents
            .iter()
            .map(|e| e.key().clone())
            .filter(|k| k.branch == *branch && k.kind == kind)
            .collect()
    }

    /// Begin a transaction against `branch`, expecting its current HEAD to
    /// still equal `expected_parent` at commit time.
    pub fn begin_tx(self: &Arc<Self>, branch: BranchName) -> OmsResult<Tx> {
        let expected_parent = self.branch_head(&branch)?.unwrap_or_else(CommitHash::nil);
        Ok(Tx {
            store: Arc::clone(self),
            branch,
            expected_parent,
            changes: Vec::new(),
            staged: FxHashMap::default(),
            outbox_events: Vec::new(),
        })
    }

}

fn key_sans_branch(key: &DocumentKey) -> (oms_core::EntityKind, &str) {
    (key.kind, key.id.as_str())
}

fn apply_changes_to_documents(
    documents: &DashMap<DocumentKey, Vec<Document>>,
    branch: &BranchName,
    commit_hash: CommitHash,
    timestamp: Timestamp,
    author: &str,
    changes: &[ChangeRecord],
) {
    for change in changes {
        let key = DocumentKey::new(change.entity_type, change.entity_id.clone(), branch.clone());
        let mut chain = documents.entry(key).or_default();
        let version = chain
            .last()
            .map(|d| d.version.next())
            .unwrap_or(oms_core::Version::FIRST);
        let content = change.new.clone().unwrap_or(serde_json::json!({}));
        let version_hash = oms_core::document::content_hash_excluding_audit_fields(&content);
        chain.push(Document {
            commit_hash,
            version,
            modified_at: timestamp,
            modified_by: author.to_string(),
            change_type: change.operation,
            content,
            fields_changed: vec![],
            version_hash,
        });
    }
}

/// A buffered set of document mutations bound to one branch, published as a
/// single commit (§4.1).
///
/// Reads within a Tx observe its own buffered writes before falling back to
/// the store's committed state — `staged` is checked first.
pub struct Tx {
    store: Arc<VersionStore>,
    branch: BranchName,
    expected_parent: CommitHash,
    changes: Vec<ChangeRecord>,
    staged: FxHashMap<DocumentKey, Document>,
    outbox_events: Vec<OutboxEvent>,
}

impl Tx {
    /// Branch this transaction is bound to.
    pub fn branch(&self) -> &BranchName {
        &self.branch
    }

    /// Read a document, observing this Tx's own buffered writes first.
    pub fn get_document(&self, key: &DocumentKey) -> Option<Document> {
        if let Some(doc) = self.staged.get(key) {
            return if doc.is_tombstone() { None } else { Some(doc.clone()) };
        }
        self.store
            .documents
            .get(key)
            .and_then(|c| c.last().cloned())
            .filter(|d| !d.is_tombstone())
    }

    /// Stage a document create/update.
    pub fn insert_document(
        &mut self,
        key: DocumentKey,
        content: serde_json::Value,
        author: &str,
        change_type: ChangeType,
        fields_changed: Vec<String>,
    ) {
        let old = self.get_document(&key).map(|d| d.content);
        let version_hash = oms_core::document::content_hash_excluding_audit_fields(&content);
        let current = self.staged.get(&key).cloned().or_else(|| {
            self.store
                .documents
                .get(&key)
                .and_then(|chain| chain.last().cloned())
        });
        let version = current
            .map(|d| d.version.next())
            .unwrap_or(oms_core::Version::FIRST);

        self.changes.push(ChangeRecord {
            entity_type: key.kind,
            entity_id: key.id.clone(),
            operation: change_type,
            old,
            new: Some(content.clone()),
        });
        self.staged.insert(
            key,
            Document {
                commit_hash: CommitHash::nil(),
                version,
                modified_at: Timestamp::now(),
                modified_by: author.to_string(),
                change_type,
                content,
                fields_changed,
                version_hash,
            },
        );
    }

    /// Stage a document tombstone.
    pub fn delete_document(&mut self, key: DocumentKey, author: &str) -> bool {
        let Some(current) = self.get_document(&key) else {
            return false;
        };
        self.changes.push(ChangeRecord {
            entity_type: key.kind,
            entity_id: key.id.clone(),
            operation: ChangeType::Delete,
            old: Some(current.content),
            new: None,
        });
        let version = self
            .staged
            .get(&key)
            .map(|d| d.version.next())
            .unwrap_or_else(|| current.version.next());
        self.staged.insert(
            key,
            Document {
                commit_hash: CommitHash::nil(),
                version,
                modified_at: Timestamp::now(),
                modified_by: author.to_string(),
                change_type: ChangeType::Delete,
                content: serde_json::json!({}),
                fields_changed: vec![],
                version_hash: String::new(),
            },
        );
        true
    }

    /// Stage an outbox row to be inserted atomically with this Tx's commit,
    /// under the same per-branch commit lock (§3 "OutboxEvent": exactly one
    /// row per commit, inserted atomically with it). The row's `commit`
    /// field is overwritten with this Tx's actual commit hash once known;
    /// whatever is set here is only a placeholder.
    pub fn stage_outbox_event(&mut self, event: OutboxEvent) {
        self.outbox_events.push(event);
    }

    /// Publish all buffered changes as a single commit, failing with
    /// `Conflict` if another Tx advanced the branch HEAD first (§4.1 "the
    /// losing Tx is retried by the caller"). Any events staged via
    /// [`Tx::stage_outbox_event`] are dropped unpublished; callers that
    /// stage events must use [`Tx::commit_with_outbox`] instead.
    pub fn commit(self, author: &str, message: &str) -> OmsResult<CommitHash> {
        self.commit_inner(author, message, None)
    }

    /// Same as [`Tx::commit`], but also flushes every event staged via
    /// [`Tx::stage_outbox_event`] into `outbox` while still holding this
    /// branch's commit lock, so the commit and its outbox row land as one
    /// unit — a crash between "commit landed" and "outbox row written" is
    /// impossible (§3 "OutboxEvent", §8 "Outbox exactly-one-per-commit").
    pub fn commit_with_outbox(self, author: &str, message: &str, outbox: &OutboxStore) -> OmsResult<CommitHash> {
        self.commit_inner(author, message, Some(outbox))
    }

    fn commit_inner(self, author: &str, message: &str, outbox: Option<&OutboxStore>) -> OmsResult<CommitHash> {
        if self.changes.is_empty() {
            return Ok(self.expected_parent);
        }

        let branch_lock = self
            .store
            .commit_locks
            .entry(self.branch.clone())
            .or_insert_with(|| Mutex::new(()));
        let _guard = branch_lock.lock();

        let actual_head = self
            .store
            .branch_head(&self.branch)?
            .unwrap_or_else(CommitHash::nil);
        if actual_head != self.expected_parent {
            return Err(conflict(self.expected_parent, actual_head));
        }

        let timestamp = Timestamp::now();
        let parents = if actual_head.is_nil() {
            vec![]
        } else {
            vec![actual_head]
        };
        let commit = Commit::new(parents, self.branch.clone(), author, message, timestamp, self.changes.clone());

        if let Some(log) = &self.store.log {
            let record = CommitLogRecord {
                commit_hash: commit.hash,
                parent_hash: commit.parents.first().copied(),
                branch: commit.branch.clone(),
                author: commit.author.clone(),
                message: commit.message.clone(),
                timestamp: commit.timestamp,
                changes: commit.changes.clone(),
            };
            log.lock()
                .append(&record)
                .map_err(|e| OmsError::Fatal(e.to_string()))?;
        }

        for (key, mut doc) in self.staged {
            doc.commit_hash = commit.hash;
            self.store.documents.entry(key).or_default().push(doc);
        }
        self.store
            .branch_heads
            .insert(self.branch.clone(), commit.hash);
        self.store.commits.insert(commit.hash, commit.clone());

        // Still inside `_guard`: no other Tx on this branch can commit, and no
        // reader of `outbox` can observe the commit without its row, between
        // here and the lock drop at function return.
        if let Some(outbox) = outbox {
            for mut event in self.outbox_events {
                event.commit = Some(commit.hash);
                if let Some(obj) = event.payload.as_object_mut() {
                    obj.insert("commit".to_string(), serde_json::Value::String(commit.hash.to_string()));
                }
                outbox.insert(event)?;
            }
        }

        Ok(commit.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_key(id: &str, branch: &BranchName) -> DocumentKey {
        DocumentKey::new(oms_core::EntityKind::ObjectType, id, branch.clone())
    }

    #[test]
    fn commit_advances_head_and_is_retrievable() {
        let store = VersionStore::in_memory();
        let main = BranchName::new("main").unwrap();
        store.create_branch(&main, None).unwrap();

        let mut tx = store.begin_tx(main.clone()).unwrap();
        tx.insert_document(
            doc_key("Asset", &main),
            serde_json::json!({"name": "Asset"}),
            "alice",
            ChangeType::Create,
            vec!["name".into()],
        );
        let hash = tx.commit("alice", "add Asset").unwrap();

        assert_eq!(store.branch_head(&main).unwrap(), Some(hash));
        let commit = store.get_commit(hash).unwrap();
        assert_eq!(commit.changes.len(), 1);
    }

    #[test]
    fn concurrent_commit_with_stale_parent_conflicts() {
        let store = VersionStore::in_memory();
        let main = BranchName::new("main").unwrap();
        store.create_branch(&main, None).unwrap();

        let tx1 = store.begin_tx(main.clone()).unwrap();
        let mut tx2 = store.begin_tx(main.clone()).unwrap();

        let mut tx1 = tx1;
        tx1.insert_document(
            doc_key("A", &main),
            serde_json::json!({"name": "A"}),
            "alice",
            ChangeType::Create,
            vec![],
        );
        tx1.commit("alice", "add A").unwrap();

        tx2.insert_document(
            doc_key("B", &main),
            serde_json::json!({"name": "B"}),
            "bob",
            ChangeType::Create,
            vec![],
        );
        let err = tx2.commit("bob", "add B").unwrap_err();
        assert!(matches!(err, OmsError::Conflict { .. }));
    }

    #[test]
    fn tx_reads_observe_own_buffered_writes() {
        let store = VersionStore::in_memory();
        let main = BranchName::new("main").unwrap();
        store.create_branch(&main, None).unwrap();
        let mut tx = store.begin_tx(main.clone()).unwrap();
        let key = doc_key("A", &main);
        assert!(tx.get_document(&key).is_none());
        tx.insert_document(
            key.clone(),
            serde_json::json!({"name": "A"}),
            "alice",
            ChangeType::Create,
            vec![],
        );
        assert!(tx.get_document(&key).is_some());
    }

    #[test]
    fn delete_without_prior_create_returns_false() {
        let store = VersionStore::in_memory();
        let main = BranchName::new("main").unwrap();
        store.create_branch(&main, None).unwrap();
        let mut tx = store.begin_tx(main.clone()).unwrap();
        assert!(!tx.delete_document(doc_key("ghost", &main), "alice"));
    }

    #[test]
    fn fast_forward_moves_ref_when_ancestor() {
        let store = VersionStore::in_memory();
        let main = BranchName::new("main").unwrap();
        let feature = BranchName::new("feature").unwrap();
        store.create_branch(&main, None).unwrap();

        let mut tx = store.begin_tx(main.clone()).unwrap();
        tx.insert_document(
            doc_key("A", &main),
            serde_json::json!({"name": "A"}),
            "alice",
            ChangeType::Create,
            vec![],
        );
        tx.commit("alice", "add A").unwrap();

        store.create_branch(&feature, Some(&main)).unwrap();
        let mut tx2 = store.begin_tx(main.clone()).unwrap();
        tx2.insert_document(
            doc_key("B", &main),
            serde_json::json!({"name": "B"}),
            "alice",
            ChangeType::Create,
            vec![],
        );
        tx2.commit("alice", "add B").unwrap();

        let new_head = store.fast_forward(&main, &feature).unwrap();
        assert_eq!(store.branch_head(&feature).unwrap(), Some(new_head));
    }
}
