//! Unified error type for OMS (§7).
//!
//! `OmsError` is the error type returned at crate boundaries (store, branch
//! service, schema service, validator, outbox, time-travel). Internal layers
//! may use narrower error types and convert upward with `From`/`map_err`, the
//! way the teacher's `strata-durability`/`strata-concurrency` crates keep
//! their own `Error` and convert into `StrataError` at the `strata-engine`
//! boundary.

use crate::contract::{BranchName, CommitHash, EntityRef};
use thiserror::Error;

/// Result alias for OMS operations.
pub type OmsResult<T> = std::result::Result<T, OmsError>;

/// A single field-level validation failure (§7: "carries per-field error list").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted path to the offending field (e.g. `"properties[2].name"`).
    pub field: String,
    /// Human-readable description of what's wrong.
    pub message: String,
}

impl FieldError {
    /// Construct a field error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        FieldError {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A rebase hint attached to a [`OmsError::Conflict`], guiding the caller's retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeHint {
    /// Suggested next step, e.g. `"refetch HEAD and retry with parent=<actual>"`.
    pub suggestion: String,
}

/// The unified OMS error type (§7).
#[derive(Debug, Error)]
pub enum OmsError {
    /// Missing entity, branch, commit, or proposal.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate name or ref.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Rule or schema violation; carries a per-field error list.
    #[error("validation failed: {} error(s)", .errors.len())]
    ValidationFailed {
        /// The individual field failures.
        errors: Vec<FieldError>,
    },

    /// Write or delete attempted against a system/protected branch.
    #[error("branch '{0}' is protected")]
    ProtectedBranch(BranchName),

    /// OCC mismatch, merge conflict, or invalid state-machine transition.
    #[error("conflict: expected {expected}, actual {actual}")]
    Conflict {
        /// HEAD the caller expected.
        expected: CommitHash,
        /// HEAD actually found.
        actual: CommitHash,
        /// Suggested recovery steps.
        merge_hints: Vec<MergeHint>,
    },

    /// Delete blocked by referential integrity (§4.2: e.g. Interface used by ObjectType).
    #[error("in use: {entity_ref} is referenced by {referenced_by}")]
    InUse {
        /// The entity that could not be deleted.
        entity_ref: EntityRef,
        /// What still refers to it.
        referenced_by: String,
    },

    /// Caller lacks the required capability.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Upstream timeout or store contention; safe to retry with backoff.
    #[error("transient error: {0}")]
    Transient(String),

    /// Store corruption or invariant breach; not safe to retry.
    #[error("fatal error: {0}")]
    Fatal(String),

    /// Wrapped serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OmsError {
    /// Build a `NotFound` for an entity reference.
    pub fn not_found(entity_ref: &EntityRef) -> Self {
        OmsError::NotFound(entity_ref.to_string())
    }

    /// Build a `ValidationFailed` from one field error.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        OmsError::ValidationFailed {
            errors: vec![FieldError::new(field, message)],
        }
    }

    /// §7 policy: OCC conflicts are retried locally up to 3 times before
    /// surfacing; transient upstream errors are retried with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OmsError::Conflict { .. } | OmsError::Transient(_))
    }

    /// Whether this error indicates corruption or an invariant breach that
    /// should be logged and alerted rather than silently retried.
    pub fn is_serious(&self) -> bool {
        matches!(self, OmsError::Fatal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_is_retryable() {
        let err = OmsError::Conflict {
            expected: CommitHash::nil(),
            actual: CommitHash::nil(),
            merge_hints: vec![],
        };
        assert!(err.is_retryable());
        assert!(!err.is_serious());
    }

    #[test]
    fn fatal_is_serious_not_retryable() {
        let err = OmsError::Fatal("corruption".into());
        assert!(err.is_serious());
        assert!(!err.is_retryable());
    }
}
