//! The content-addressed Commit object (§4.1).

use oms_core::{BranchName, ChangeRecord, CommitHash, Timestamp};
use serde::{Deserialize, Serialize};

/// One immutable commit in the store's DAG.
///
/// `hash` is deterministic over `(sorted changes, parents, author, message,
/// timestamp)` (§4.1 "Content-addressed"). Commits are never mutated or
/// deleted; deleting a branch only removes the ref, not the commits it
/// pointed to (§4.1 "Append-only").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    /// This commit's content hash.
    pub hash: CommitHash,
    /// Parent commits. Empty for a branch's root commit; two entries for a
    /// MERGE-strategy merge commit (§4.6).
    pub parents: Vec<CommitHash>,
    /// Branch this commit was first written to. Branches are movable refs,
    /// so this is provenance, not a structural constraint.
    pub branch: BranchName,
    /// Author identity.
    pub author: String,
    /// Commit message.
    pub message: String,
    /// Creation time.
    pub timestamp: Timestamp,
    /// Entity-level mutations this commit introduced.
    pub changes: Vec<ChangeRecord>,
}

impl Commit {
    /// Compute this commit's content hash the same way for every caller:
    /// changes sorted by `(entity_type, entity_id)` first, so two
    /// semantically identical commits assembled in different orders hash
    /// identically.
    pub fn compute_hash(
        parents: &[CommitHash],
        branch: &BranchName,
        author: &str,
        message: &str,
        timestamp: Timestamp,
        changes: &[ChangeRecord],
    ) -> CommitHash {
        let mut sorted: Vec<&ChangeRecord> = changes.iter().collect();
        sorted.sort_by(|a, b| {
            (a.entity_type, a.entity_id.as_str()).cmp(&(b.entity_type, b.entity_id.as_str()))
        });

        #[derive(Serialize)]
        struct HashInput<'a> {
            parents: &'a [CommitHash],
            branch: &'a str,
            author: &'a str,
            message: &'a str,
            timestamp: String,
            changes: Vec<&'a ChangeRecord>,
        }
        let input = HashInput {
            parents,
            branch: branch.as_str(),
            author,
            message,
            timestamp: timestamp.to_rfc3339(),
            changes: sorted,
        };
        let bytes = serde_json::to_vec(&input).expect("commit hash input is always serializable");
        CommitHash::of(&bytes)
    }

    /// Build and hash a new commit.
    pub fn new(
        parents: Vec<CommitHash>,
        branch: BranchName,
        author: impl Into<String>,
        message: impl Into<String>,
        timestamp: Timestamp,
        changes: Vec<ChangeRecord>,
    ) -> Self {
        let author = author.into();
        let message = message.into();
        let hash = Self::compute_hash(&parents, &branch, &author, &message, timestamp, &changes);
        Commit {
            hash,
            parents,
            branch,
            author,
            message,
            timestamp,
            changes,
        }
    }
}
