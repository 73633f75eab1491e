//! Cache key derivation (§4.8): `temporal:<op>:<type>:<id|all>:<branch>:<hash(params)>`,
//! structurally reused from `cache.py::_generate_cache_key`. The source hashes
//! the sorted param JSON with `md5`; this rewrite has no MD5 dependency in its
//! stack, so it reuses `xxhash-rust` (already pulled in for commit/version
//! hashing) instead — documented substitution, see DESIGN.md.

use oms_core::EntityKind;
use serde_json::Value as Json;
use xxhash_rust::xxh3::xxh3_64;

/// Build a cache key for a temporal query.
pub fn temporal_cache_key(op: &str, kind: EntityKind, id: Option<&str>, branch: &str, params: &Json) -> String {
    let param_bytes = serde_json::to_vec(params).unwrap_or_default();
    let hash = xxh3_64(&param_bytes);
    format!("temporal:{op}:{kind}:{}:{branch}:{hash:016x}", id.unwrap_or("all"))
}
