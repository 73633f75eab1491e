//! Branch and proposal data model (§4.6).

use oms_core::{BranchName, CommitHash, ProposalId, Timestamp};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchState {
    /// Normal read/write state.
    Active,
    /// A merge is in progress; writes are rejected until it completes.
    LockedForWrite,
    /// A proposal targeting this branch has been approved and is mergeable.
    Ready,
    /// This branch has been merged into its target and should not be
    /// written to again.
    Merged,
    /// Retained for history but no longer listed by default.
    Archived,
    /// A lifecycle operation (merge/rebase) left the branch inconsistent
    /// and it requires operator attention.
    Failed,
}

/// A branch's lifecycle metadata, distinct from the commit DAG state
/// `oms-store::VersionStore` tracks for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    /// Branch name.
    pub name: BranchName,
    /// Parent this branch was created from, if any (`main` has none).
    pub parent: Option<BranchName>,
    /// Current HEAD, mirrored from the version store for convenience.
    pub head: CommitHash,
    /// Lifecycle state.
    pub state: BranchState,
    /// True for `main` and the reserved system branches.
    pub is_protected: bool,
    /// Creator.
    pub created_by: String,
    /// Creation time.
    pub created_at: Timestamp,
}

/// Status of a [`ChangeProposal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalStatus {
    /// Newly created, still being edited.
    Draft,
    /// Submitted for review.
    Open,
    /// Approved and ready to merge.
    Approved,
    /// Rejected by a reviewer; terminal.
    Rejected,
    /// Successfully merged; terminal.
    Merged,
}

/// A request to merge one branch into another, with its review state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeProposal {
    /// Unique proposal id.
    pub id: ProposalId,
    /// Short title.
    pub title: String,
    /// Longer description, if given.
    pub description: String,
    /// Branch being proposed for merge.
    pub source_branch: BranchName,
    /// Branch it would merge into.
    pub target_branch: BranchName,
    /// Common ancestor at proposal-creation time.
    pub base_hash: CommitHash,
    /// `source_branch`'s HEAD at proposal-creation time.
    pub source_hash: CommitHash,
    /// `target_branch`'s HEAD at proposal-creation time.
    pub target_hash: CommitHash,
    /// Current status.
    pub status: ProposalStatus,
    /// Proposal author.
    pub author: String,
    /// Users asked to review.
    pub reviewers: Vec<String>,
    /// Users who have approved.
    pub approvals: Vec<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last status-change time.
    pub updated_at: Timestamp,
}

/// How to apply a proposal's changes onto its target branch (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeStrategy {
    /// Three-way merge; one merge commit with two parents.
    Merge,
    /// Collapse every change on the source branch into a single commit.
    Squash,
    /// Replay each source commit individually on top of the target HEAD.
    Rebase,
}

/// Result of a successful merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeOutcome {
    /// The new HEAD of `target_branch`.
    pub merge_commit: CommitHash,
    /// `ChangeProposal::source_branch`.
    pub source_branch: BranchName,
    /// `ChangeProposal::target_branch`.
    pub target_branch: BranchName,
    /// Strategy used.
    pub strategy: MergeStrategy,
    /// Number of conflicts resolved via caller-supplied resolutions.
    pub conflicts_resolved: usize,
}
