//! Core types shared across the OMS crates.
//!
//! This crate defines the foundational vocabulary used throughout the system:
//! - [`BranchName`]: validated branch identifier (`[a-z][a-z0-9/-]*`)
//! - [`EntityKind`] / [`EntityRef`]: what a schema entity is and how it's addressed
//! - [`CommitHash`]: content address of a commit
//! - [`Timestamp`] / [`Version`]: temporal and ordering primitives
//! - [`Document`] / [`ChangeType`]: the versioned-document data model (§3 of the spec)
//! - [`OmsError`]: the unified error taxonomy (§7 of the spec)

#![warn(missing_docs)]

pub mod config;
pub mod contract;
pub mod document;
pub mod entity;
pub mod error;
pub mod limits;

pub use config::{ConfigError, OmsConfig};
pub use contract::{BranchName, BranchNameError, CommitHash, Timestamp, Version};
pub use document::{ChangeRecord, ChangeType, Document, DocumentKey};
pub use entity::EntityKind;
pub use error::{FieldError, MergeHint, OmsError, OmsResult};
pub use limits::Limits;

/// Identifier for a change proposal — `proposal_<uuid>`.
///
/// Defined here (rather than in `oms-branch`) because both the store and the
/// branch service need to parse/format it.
pub type ProposalId = String;

/// Reference to a schema entity: `(kind, id, branch)`.
pub use contract::EntityRef;
