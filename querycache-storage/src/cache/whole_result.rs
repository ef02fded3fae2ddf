//! Whole-result caching.
//!
//! The decorator buffers every row it hands out and, on `close()` after a
//! full drain, merges the buffer into the [`CachedRowSet`] stored under the
//! primary key at the slot named by the identity string. Abandoned, failed
//! or empty executions write nothing.

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use querycache_core::{
    ensure_no_shape_args, project, CacheKeys, CacheStoreResult, ConnectionIdentity, FetchShape,
    ProjectedRow, QueryCacheResult, QueryRequest, Row, Value,
};

use super::key_policy::CacheKeyPolicy;
use super::payload::{decode, encode, CachedRowSet};
use super::traits::CacheStore;
use crate::cursor::{CloseOutcome, LiveCursor, LiveResultCursor, ResultCursor, SkipReason};
use crate::replay::ReplayCursor;

/// Wraps a live cursor and commits its complete result on `close()`.
pub struct WholeResultCacheDecorator<L: LiveCursor> {
    live: L,
    store: Arc<dyn CacheStore>,
    keys: CacheKeys,
    ttl: Option<Duration>,
    buffer: Vec<Row>,
    default_shape: FetchShape,
    exhausted: bool,
    failed: bool,
    closed: bool,
}

impl<L: LiveCursor> WholeResultCacheDecorator<L> {
    pub fn new(
        live: L,
        store: Arc<dyn CacheStore>,
        keys: CacheKeys,
        ttl: Option<Duration>,
    ) -> Self {
        Self {
            live,
            store,
            keys,
            ttl,
            buffer: Vec::new(),
            default_shape: FetchShape::default(),
            exhausted: false,
            failed: false,
            closed: false,
        }
    }

    pub fn keys(&self) -> &CacheKeys {
        &self.keys
    }

    /// Rows buffered so far.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    fn commit(&mut self) -> CloseOutcome {
        let key = self.keys.primary_key.clone();

        if self.failed {
            tracing::debug!(key = %key, "Skipping cache write after live cursor failure");
            return CloseOutcome::Skipped(SkipReason::LiveCursorFailed);
        }
        if !self.exhausted {
            tracing::debug!(
                key = %key,
                buffered = self.buffer.len(),
                "Skipping cache write for abandoned result"
            );
            return CloseOutcome::Skipped(SkipReason::NotExhausted);
        }
        if self.buffer.is_empty() {
            return CloseOutcome::Skipped(SkipReason::EmptyResult);
        }

        // Sibling slots under an explicit key must survive, so an unreadable
        // payload is never replaced by a fresh one.
        let mut payload = match read_row_set(self.store.as_ref(), &key) {
            Ok(existing) => existing.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(
                    key = %key,
                    error = %e,
                    "Cache read before merge failed, skipping write"
                );
                return CloseOutcome::WriteFailed {
                    key,
                    reason: e.to_string(),
                };
            }
        };
        let rows = self.buffer.len();
        payload.merge(self.keys.identity.clone(), mem::take(&mut self.buffer));

        let written = encode(&payload).and_then(|bytes| self.store.put(&key, &bytes, self.ttl));
        match written {
            Ok(()) => {
                tracing::debug!(key = %key, rows, "Committed whole result to cache");
                CloseOutcome::Committed { key, rows }
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache write failed");
                CloseOutcome::WriteFailed {
                    key,
                    reason: e.to_string(),
                }
            }
        }
    }
}

impl<L: LiveCursor + 'static> WholeResultCacheDecorator<L> {
    /// Serve from the cached row set on a hit, otherwise run the query live
    /// behind a fresh decorator. Without a backend the query runs uncached.
    pub fn create_or_serve<F>(
        policy: &CacheKeyPolicy,
        request: &QueryRequest,
        connection: &ConnectionIdentity,
        run_live: F,
    ) -> QueryCacheResult<Box<dyn ResultCursor>>
    where
        F: FnOnce() -> QueryCacheResult<L>,
    {
        let Ok(store) = policy.backend() else {
            return Ok(Box::new(LiveResultCursor::new(run_live()?)));
        };
        let store = Arc::clone(store);
        let keys = policy.derive_keys(request, connection)?;

        let cached = match read_row_set(store.as_ref(), &keys.primary_key) {
            Ok(payload) => payload.and_then(|payload| payload.into_rows(&keys.identity)),
            Err(e) => {
                tracing::warn!(
                    key = %keys.primary_key,
                    error = %e,
                    "Cache read failed, treating as miss"
                );
                None
            }
        };
        if let Some(rows) = cached {
            tracing::debug!(key = %keys.primary_key, rows = rows.len(), "Whole result cache hit");
            return Ok(Box::new(ReplayCursor::new(rows)));
        }

        tracing::debug!(key = %keys.primary_key, "Whole result cache miss");
        let live = run_live()?;
        Ok(Box::new(Self::new(live, store, keys, policy.ttl())))
    }
}

/// Read and decode the row set under `key`. An undecodable payload is
/// logged and reads as absent; store failures are returned.
fn read_row_set(store: &dyn CacheStore, key: &str) -> CacheStoreResult<Option<CachedRowSet>> {
    let Some(bytes) = store.get(key)? else {
        return Ok(None);
    };
    match decode(&bytes) {
        Ok(payload) => Ok(Some(payload)),
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Undecodable cached row set, treating as miss");
            Ok(None)
        }
    }
}

impl<L: LiveCursor> ResultCursor for WholeResultCacheDecorator<L> {
    fn column_count(&self) -> usize {
        self.live.column_count()
    }

    fn row_count(&self) -> usize {
        self.live.row_count()
    }

    fn default_shape(&self) -> FetchShape {
        self.default_shape
    }

    fn set_default_shape(&mut self, shape: FetchShape, args: &[Value]) -> QueryCacheResult<()> {
        ensure_no_shape_args(shape, args)?;
        self.default_shape = shape;
        Ok(())
    }

    fn fetch_next(&mut self, shape: Option<FetchShape>) -> QueryCacheResult<Option<ProjectedRow>> {
        if self.closed || self.exhausted || self.failed {
            return Ok(None);
        }
        match self.live.fetch_row() {
            Ok(Some(row)) => {
                let projected = project(&row, shape.unwrap_or(self.default_shape));
                self.buffer.push(row);
                Ok(Some(projected))
            }
            Ok(None) => {
                self.exhausted = true;
                Ok(None)
            }
            Err(e) => {
                self.failed = true;
                self.buffer.clear();
                Err(e)
            }
        }
    }

    fn close(&mut self) -> QueryCacheResult<CloseOutcome> {
        if self.closed {
            return Ok(CloseOutcome::AlreadyClosed);
        }
        self.closed = true;
        let outcome = self.commit();
        self.buffer.clear();
        self.live.close()?;
        Ok(outcome)
    }
}
