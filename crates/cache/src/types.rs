//! Cache configuration and statistics types (§4.9).

use std::time::{Duration, Instant};

use oms_core::OmsConfig;

/// Tuning knobs for a [`crate::store::Cache`]. In production, built from an
/// [`OmsConfig`] (itself sourced from `CACHE_SIZE`/`CACHE_TTL_SECONDS`, §6)
/// via [`CacheConfig::from`].
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Max entries held in the in-process LRU tier.
    pub max_items: usize,
    /// Age after which a remote-tier entry is treated as absent.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            max_items: 1_000,
            ttl: Duration::from_secs(3_600),
        }
    }
}

impl From<&OmsConfig> for CacheConfig {
    fn from(config: &OmsConfig) -> Self {
        CacheConfig {
            max_items: config.cache_size,
            ttl: config.cache_ttl,
        }
    }
}

/// A cached value plus its insertion time, used to expire the remote tier.
#[derive(Debug, Clone)]
pub(crate) struct Entry<V> {
    pub value: V,
    pub inserted_at: Instant,
}

impl<V> Entry<V> {
    pub fn new(value: V) -> Self {
        Entry {
            value,
            inserted_at: Instant::now(),
        }
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() > ttl
    }
}

/// Point-in-time cache occupancy, mirroring `get_cache_stats()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Entries currently held in the LRU tier.
    pub local_len: usize,
    /// Entries currently held in the remote-tier stand-in.
    pub remote_len: usize,
    /// Configured LRU capacity.
    pub max_items: usize,
    /// Configured TTL, in seconds.
    pub ttl_seconds: u64,
}
