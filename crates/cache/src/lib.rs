//! Cache Layer (C9, §4.9): a two-tier, best-effort cache used by the Schema
//! Service and Time-Travel Engine to avoid re-reading the version store on
//! every lookup. Never consulted for writes, never a source of truth.

#![warn(missing_docs)]

pub mod pattern;
pub mod store;
pub mod types;

pub use pattern::glob_matches;
pub use store::Cache;
pub use types::{CacheConfig, CacheStats};
