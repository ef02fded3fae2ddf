//! In-process cache store.

use chrono::{DateTime, Utc};
use querycache_core::{CacheStoreError, CacheStoreResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use super::traits::{CacheStats, CacheStore};

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// `HashMap`-backed store with per-entry expiry.
///
/// Expired entries read as absent and are removed lazily on access or by
/// [`purge_expired`](Self::purge_expired).
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<String, Entry>>,
    clock: Clock,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::with_clock(Arc::new(Utc::now))
    }
}

impl fmt::Debug for InMemoryCacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryCacheStore")
            .field("entries", &self.len())
            .finish()
    }
}

impl InMemoryCacheStore {
    /// Create an empty store on the system clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that reads time from `clock`.
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// Number of stored entries, expired ones included until swept.
    ///
    /// `len` and [`keys`](Self::keys) read through a poisoned lock. Every
    /// other method reports [`CacheStoreError::LockPoisoned`].
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored keys, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Drop every entry.
    pub fn clear(&self) -> CacheStoreResult<()> {
        self.entries
            .write()
            .map_err(|_| CacheStoreError::LockPoisoned)?
            .clear();
        Ok(())
    }

    /// Remove expired entries, returning how many were dropped.
    pub fn purge_expired(&self) -> CacheStoreResult<u64> {
        let now = (self.clock)();
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CacheStoreError::LockPoisoned)?;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok((before - entries.len()) as u64)
    }
}

impl CacheStore for InMemoryCacheStore {
    fn get(&self, key: &str) -> CacheStoreResult<Option<Vec<u8>>> {
        let now = (self.clock)();
        let expired = {
            let entries = self
                .entries
                .read()
                .map_err(|_| CacheStoreError::LockPoisoned)?;
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => true,
                None => false,
            }
        };

        if expired {
            let mut entries = self
                .entries
                .write()
                .map_err(|_| CacheStoreError::LockPoisoned)?;
            if entries.get(key).is_some_and(|e| e.is_expired(now)) {
                entries.remove(key);
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    fn put(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheStoreResult<()> {
        let expires_at = match ttl {
            Some(ttl) => {
                let ttl = chrono::Duration::from_std(ttl)
                    .map_err(|e| CacheStoreError::Transaction(e.to_string()))?;
                Some((self.clock)() + ttl)
            }
            None => None,
        };
        self.entries
            .write()
            .map_err(|_| CacheStoreError::LockPoisoned)?
            .insert(
                key.to_string(),
                Entry {
                    value: value.to_vec(),
                    expires_at,
                },
            );
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn delete(&self, key: &str) -> CacheStoreResult<bool> {
        Ok(self
            .entries
            .write()
            .map_err(|_| CacheStoreError::LockPoisoned)?
            .remove(key)
            .is_some())
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            entry_count: self.len() as u64,
        }
    }
}
