//! Branch Service (§4.6): branch lifecycle, change proposals, and the
//! MERGE/SQUASH/REBASE merge drivers built on `oms-store::VersionStore` and
//! `oms-merge::three_way_merge`.

#![warn(missing_docs)]

pub mod proposal_store;
pub mod service;
pub mod types;

pub use proposal_store::ProposalStore;
pub use service::BranchService;
pub use types::{Branch, BranchState, ChangeProposal, MergeOutcome, MergeStrategy, ProposalStatus};
