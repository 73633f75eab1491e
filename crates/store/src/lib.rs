//! The Version Store (§4.1) and Document Repository (§4.2).
//!
//! `VersionStore` owns the commit DAG, branch refs, and per-key document
//! chains; `DocumentRepository` layers typed CRUD and validation on top.
//! Everything above this crate (`oms-branch`, `oms-schema`, `oms-merge`)
//! reads and writes through these two types rather than touching storage
//! directly.

#![warn(missing_docs)]

pub mod commit;
pub mod document_repo;
pub mod error;
pub mod version_store;

pub use commit::Commit;
pub use document_repo::{DocumentRepository, ListFilters, Page};
pub use version_store::{BranchDiff, CommitHistory, Tx, VersionStore};
