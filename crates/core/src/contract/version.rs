//! Per-document monotonic version counter (§3: "`version` (monotonic int
//! starting 1)").

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonically increasing version number for a document's per-key chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// The first version written for a key (`create`).
    pub const FIRST: Version = Version(1);

    /// Wrap a raw counter value.
    pub fn new(n: u64) -> Self {
        Version(n)
    }

    /// The next version in the chain.
    pub fn next(self) -> Self {
        Version(self.0 + 1)
    }

    /// Raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
