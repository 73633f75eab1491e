//! Small validated value types shared across the OMS crate family.

mod branch_name;
mod commit_hash;
mod timestamp;
mod version;

pub use branch_name::{BranchName, BranchNameError, MAX_BRANCH_NAME_LENGTH};
pub use commit_hash::CommitHash;
pub use timestamp::{RelativeTimeError, Timestamp};
pub use version::Version;

use crate::entity::EntityKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of a schema entity within a branch: `(kind, id, branch)`.
///
/// This is the unit that [`Document`](crate::Document) versions, breaking-change
/// rules, and merge conflicts all key off of.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// What kind of entity this is (ObjectType, Property, ...).
    pub kind: EntityKind,
    /// The entity's id (its `name`, per §4.2's name validation rule).
    pub id: String,
    /// Branch this reference is scoped to.
    pub branch: BranchName,
}

impl EntityRef {
    /// Build a new entity reference.
    pub fn new(kind: EntityKind, id: impl Into<String>, branch: BranchName) -> Self {
        Self {
            kind,
            id: id.into(),
            branch,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.kind, self.id, self.branch.as_str())
    }
}
