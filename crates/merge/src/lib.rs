//! Three-Way Merge Engine (§4.4).
//!
//! Diffs a branch against its fork point and the target branch's current
//! state, resolving non-overlapping changes automatically and surfacing the
//! rest as typed conflicts for a caller (the Branch Service, `oms-branch`) to
//! resolve or reject.

#![warn(missing_docs)]

pub mod engine;
pub mod types;

pub use engine::three_way_merge;
pub use types::{Conflict, ConflictKind, FieldConflict, MergeResult, MergeStatistics};
