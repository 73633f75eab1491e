//! Two-tier cache (§4.9): an in-process LRU backed by a `dashmap`-backed
//! stand-in "remote" tier. Grounded in
//! `core/time_travel/cache.py::TemporalQueryCache`, minus its Redis/SmartCache
//! plumbing — there is no separate network KV client in scope here, so the
//! remote tier is an in-process `DashMap` with the same TTL-expiry contract
//! a real remote cache would have (documented substitution, see DESIGN.md).

use std::num::NonZeroUsize;
use std::time::Duration;

use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::pattern::glob_matches;
use crate::types::{CacheConfig, CacheStats, Entry};

/// A two-tier, best-effort cache keyed by opaque strings.
///
/// Lookup hits the LRU tier first, then the remote tier; a miss on both
/// triggers the caller's producer callback and populates both tiers
/// (§4.9: "Lookup hits LRU, then remote; miss triggers producer callback
/// and populates both tiers").
pub struct Cache<V: Clone> {
    local: Mutex<LruCache<String, Entry<V>>>,
    remote: DashMap<String, Entry<V>>,
    ttl: Duration,
}

impl<V: Clone> Cache<V> {
    /// Build a cache with the given tuning.
    pub fn new(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_items.max(1)).expect("max_items.max(1) is nonzero");
        Cache {
            local: Mutex::new(LruCache::new(capacity)),
            remote: DashMap::new(),
            ttl: config.ttl,
        }
    }

    /// Plain lookup, with no producer fallback.
    pub fn get(&self, key: &str) -> Option<V> {
        {
            let mut local = self.local.lock();
            if let Some(entry) = local.get(key) {
                debug!(key, "cache hit (local)");
                return Some(entry.value.clone());
            }
        }
        if let Some(entry) = self.remote.get(key) {
            if !entry.is_expired(self.ttl) {
                debug!(key, "cache hit (remote)");
                let value = entry.value.clone();
                drop(entry);
                self.local.lock().put(key.to_string(), Entry::new(value.clone()));
                return Some(value);
            }
        }
        None
    }

    /// Insert a value into both tiers.
    pub fn put(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        self.local.lock().put(key.clone(), Entry::new(value.clone()));
        self.remote.insert(key, Entry::new(value));
    }

    /// Lookup-or-produce: on a miss in both tiers, calls `producer` and
    /// caches its result.
    pub fn get_or_insert_with(&self, key: &str, producer: impl FnOnce() -> V) -> V {
        if let Some(hit) = self.get(key) {
            return hit;
        }
        let value = producer();
        self.put(key, value.clone());
        value
    }

    /// Evict every key matching a `fnmatch`-style glob from both tiers.
    /// Best-effort (§4.9: "callers must not rely on cache for correctness").
    pub fn invalidate_pattern(&self, pattern: &str) {
        let mut local = self.local.lock();
        let stale: Vec<String> = local
            .iter()
            .map(|(k, _)| k.clone())
            .filter(|k| glob_matches(pattern, k))
            .collect();
        for key in &stale {
            local.pop(key);
        }
        drop(local);
        self.remote.retain(|k, _| !glob_matches(pattern, k));
    }

    /// §4.9: "branch-scoped pattern delete (`*:<branch>:*` and
    /// `temporal:*:*:*:<branch>:*`) on commit."
    pub fn invalidate_branch(&self, branch: &str) {
        self.invalidate_pattern(&format!("*:{branch}:*"));
        self.invalidate_pattern(&format!("temporal:*:*:*:{branch}:*"));
    }

    /// Current occupancy, for diagnostics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            local_len: self.local.lock().len(),
            remote_len: self.remote.len(),
            max_items: self.local.lock().cap().get(),
            ttl_seconds: self.ttl.as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_invokes_producer_and_populates_both_tiers() {
        let cache: Cache<String> = Cache::new(CacheConfig::default());
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let value = cache.get_or_insert_with("schema:main:Asset", || {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            "Asset-content".to_string()
        });
        assert_eq!(value, "Asset-content");
        assert_eq!(cache.get("schema:main:Asset"), Some("Asset-content".to_string()));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        cache.get_or_insert_with("schema:main:Asset", || {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            "should not run".to_string()
        });
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn expired_remote_entry_is_treated_as_miss() {
        let cache: Cache<i32> = Cache::new(CacheConfig {
            max_items: 10,
            ttl: Duration::from_millis(1),
        });
        cache.put("k", 1);
        std::thread::sleep(Duration::from_millis(5));
        // Evict the LRU copy directly so only the (now-expired) remote copy remains.
        cache.local.lock().pop("k");
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn invalidate_branch_clears_matching_keys_only() {
        let cache: Cache<i32> = Cache::new(CacheConfig::default());
        cache.put("temporal:as_of:ObjectType:Asset:feat:aabbccdd", 1);
        cache.put("temporal:as_of:ObjectType:Asset:main:aabbccdd", 2);
        cache.invalidate_branch("feat");
        assert_eq!(cache.get("temporal:as_of:ObjectType:Asset:feat:aabbccdd"), None);
        assert_eq!(cache.get("temporal:as_of:ObjectType:Asset:main:aabbccdd"), Some(2));
    }

    #[test]
    fn lru_evicts_oldest_beyond_capacity() {
        let cache: Cache<i32> = Cache::new(CacheConfig {
            max_items: 2,
            ttl: Duration::from_secs(60),
        });
        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("c", 3);
        assert_eq!(cache.local.lock().len(), 2);
    }
}
