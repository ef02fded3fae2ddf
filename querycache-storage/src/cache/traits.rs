//! Cache store trait and statistics.
//!
//! This module defines the capability set the result cache needs from a
//! key-value store.

use querycache_core::CacheStoreResult;
use std::time::Duration;

/// Key-value cache store.
///
/// This trait abstracts over different stores (e.g., LMDB, Redis,
/// in-memory). Implementations must be thread-safe; they own their eviction
/// policy and are not expected to offer multi-key atomicity.
///
/// # Values
///
/// Values are opaque bytes. The decorators encode their payloads before
/// writing, so a store never needs to understand rows.
///
/// # Expiry
///
/// `ttl = None` means the store's default policy (possibly unbounded). An
/// expired entry must read as absent.
pub trait CacheStore: Send + Sync {
    /// Get a value, or `None` if absent or expired.
    fn get(&self, key: &str) -> CacheStoreResult<Option<Vec<u8>>>;

    /// Store a value, overwriting any previous one (last writer wins).
    fn put(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheStoreResult<()>;

    /// Remove a value. Returns whether anything was removed.
    fn delete(&self, key: &str) -> CacheStoreResult<bool>;

    /// Whether a live value exists for `key`.
    fn contains(&self, key: &str) -> CacheStoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Get cache statistics.
    fn stats(&self) -> CacheStats;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses (absent or expired).
    pub misses: u64,
    /// Number of successful writes.
    pub writes: u64,
    /// Number of entries currently stored, expired ones included until swept.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
