//! Store-local error helpers, converted to [`oms_core::OmsError`] at the crate boundary.

use oms_core::{BranchName, CommitHash, MergeHint, OmsError};

/// Build the `Conflict` error §4.1 returns on an OCC mismatch, with a single
/// rebase hint.
pub fn conflict(expected: CommitHash, actual: CommitHash) -> OmsError {
    OmsError::Conflict {
        expected,
        actual,
        merge_hints: vec![MergeHint {
            suggestion: format!(
                "refetch branch HEAD ({actual}) and retry with parent_commit={actual}"
            ),
        }],
    }
}

/// Build the `NotFound` error for a missing branch.
pub fn branch_not_found(branch: &BranchName) -> OmsError {
    OmsError::NotFound(format!("branch '{branch}'"))
}

/// Build the `NotFound` error for a missing commit.
pub fn commit_not_found(hash: CommitHash) -> OmsError {
    OmsError::NotFound(format!("commit '{hash}'"))
}

/// Build the `AlreadyExists` error for a branch create collision.
pub fn duplicate_branch(branch: &BranchName) -> OmsError {
    OmsError::AlreadyExists(format!("branch '{branch}'"))
}
