//! LMDB-backed cache store.
//!
//! Uses the heed crate (Rust bindings for LMDB) to provide a persistent,
//! memory-mapped key-value store for cached query results.
//!
//! # Value Layout
//!
//! Every stored value is prefixed with its expiry:
//! `[expires_at_millis: i64 LE][payload]`, where 0 means no expiry.
//! Expired values read as absent; [`LmdbCacheStore::purge_expired`] sweeps
//! them.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The store uses:
//! - Read transactions for `get`
//! - Write transactions for `put`, `delete`, and `purge_expired`
//! - Statistics are tracked behind an `RwLock`

use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

use chrono::Utc;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use querycache_core::{CacheStoreError, CacheStoreResult, QueryCacheError};

use super::traits::{CacheStats, CacheStore};

/// Size of the expiry prefix on every stored value.
const EXPIRY_PREFIX_LEN: usize = 8;

/// Error type for opening an LMDB cache store.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for QueryCacheError {
    fn from(e: LmdbCacheError) -> Self {
        QueryCacheError::Store(CacheStoreError::Unavailable(e.to_string()))
    }
}

fn txn_error(e: heed::Error) -> CacheStoreError {
    CacheStoreError::Transaction(e.to_string())
}

/// LMDB-backed cache store.
///
/// # Example
///
/// ```ignore
/// let store = LmdbCacheStore::new("/var/cache/querycache", 256)?;
/// store.put("key", b"payload", Some(Duration::from_secs(60)))?;
/// assert!(store.get("key")?.is_some());
/// ```
pub struct LmdbCacheStore {
    /// The LMDB environment.
    env: Env,
    /// The main database (single unnamed database).
    db: Database<Bytes, Bytes>,
    /// Hit/miss/write counters.
    stats: RwLock<CacheStats>,
}

impl LmdbCacheStore {
    /// Create a new LMDB cache store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per directory by this store
        // and never concurrently re-opened within the process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        Ok(Self {
            env,
            db,
            stats: RwLock::new(CacheStats::default()),
        })
    }

    fn record(&self, f: impl FnOnce(&mut CacheStats)) {
        if let Ok(mut stats) = self.stats.write() {
            f(&mut stats);
        }
    }

    /// Split a stored value into (expires_at_millis, payload).
    fn decode(bytes: &[u8]) -> CacheStoreResult<(i64, &[u8])> {
        if bytes.len() < EXPIRY_PREFIX_LEN {
            return Err(CacheStoreError::Deserialization(
                "value shorter than expiry prefix".into(),
            ));
        }
        let prefix: [u8; EXPIRY_PREFIX_LEN] = bytes[..EXPIRY_PREFIX_LEN]
            .try_into()
            .map_err(|_| CacheStoreError::Deserialization("invalid expiry prefix".into()))?;
        Ok((i64::from_le_bytes(prefix), &bytes[EXPIRY_PREFIX_LEN..]))
    }

    fn is_expired(expires_at_millis: i64, now_millis: i64) -> bool {
        expires_at_millis != 0 && expires_at_millis <= now_millis
    }

    /// Remove every expired value, returning how many were dropped.
    pub fn purge_expired(&self) -> CacheStoreResult<u64> {
        let now = Utc::now().timestamp_millis();

        let expired: Vec<Vec<u8>> = {
            let rtxn = self.env.read_txn().map_err(txn_error)?;
            let mut keys = Vec::new();
            for item in self.db.iter(&rtxn).map_err(txn_error)? {
                let (key, value) = item.map_err(txn_error)?;
                match Self::decode(value) {
                    Ok((expires_at, _)) if Self::is_expired(expires_at, now) => {
                        keys.push(key.to_vec())
                    }
                    Ok(_) => {}
                    // Unreadable values are dropped along with expired ones.
                    Err(_) => keys.push(key.to_vec()),
                }
            }
            keys
        };

        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        let mut deleted = 0u64;
        for key in &expired {
            if self.db.delete(&mut wtxn, key).map_err(txn_error)? {
                deleted += 1;
            }
        }
        wtxn.commit().map_err(txn_error)?;
        Ok(deleted)
    }
}

impl CacheStore for LmdbCacheStore {
    fn get(&self, key: &str) -> CacheStoreResult<Option<Vec<u8>>> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;

        match self.db.get(&rtxn, key.as_bytes()).map_err(txn_error)? {
            Some(bytes) => {
                let (expires_at, payload) = Self::decode(bytes)?;
                if Self::is_expired(expires_at, Utc::now().timestamp_millis()) {
                    self.record(|s| s.misses += 1);
                    return Ok(None);
                }
                self.record(|s| s.hits += 1);
                Ok(Some(payload.to_vec()))
            }
            None => {
                self.record(|s| s.misses += 1);
                Ok(None)
            }
        }
    }

    fn put(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheStoreResult<()> {
        let expires_at = match ttl {
            Some(ttl) => {
                let ttl_millis = i64::try_from(ttl.as_millis())
                    .map_err(|e| CacheStoreError::Serialization(e.to_string()))?;
                Utc::now().timestamp_millis().saturating_add(ttl_millis.max(1))
            }
            None => 0,
        };

        let mut full_bytes = Vec::with_capacity(EXPIRY_PREFIX_LEN + value.len());
        full_bytes.extend_from_slice(&expires_at.to_le_bytes());
        full_bytes.extend_from_slice(value);

        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        self.db
            .put(&mut wtxn, key.as_bytes(), &full_bytes)
            .map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;

        self.record(|s| s.writes += 1);
        Ok(())
    }

    fn delete(&self, key: &str) -> CacheStoreResult<bool> {
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        let deleted = self.db.delete(&mut wtxn, key.as_bytes()).map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;
        Ok(deleted)
    }

    fn stats(&self) -> CacheStats {
        let mut stats = self.stats.read().map(|s| s.clone()).unwrap_or_default();
        if let Ok(rtxn) = self.env.read_txn() {
            stats.entry_count = self.db.len(&rtxn).unwrap_or(0);
        }
        stats
    }
}
