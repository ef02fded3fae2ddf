//! Per-row caching.
//!
//! Each row is written under `primary#rowN` as soon as it is fetched. The
//! ordered [`RowPointerIndex`] goes under the primary key on `close()`, and
//! only after a full drain with every row write succeeding. The index write is
//! always last, so a present index never points at a row from the same
//! execution that was not yet written.

use std::sync::Arc;
use std::time::Duration;

use querycache_core::{
    ensure_no_shape_args, project, ConnectionIdentity, FetchShape, ProjectedRow, QueryCacheResult,
    QueryRequest, Row, Value,
};

use super::key_policy::{CacheKeyPolicy, KeySource};
use super::payload::{decode, encode, row_key, RowPointerIndex};
use super::traits::CacheStore;
use crate::cursor::{CloseOutcome, LiveCursor, LiveResultCursor, ResultCursor, SkipReason};
use crate::replay::ReplayCursor;

/// Wraps a live cursor, writing every returned row through to the store.
pub struct PerRowCacheDecorator<L: LiveCursor> {
    live: L,
    store: Arc<dyn CacheStore>,
    primary_key: String,
    ttl: Option<Duration>,
    row_keys: Vec<String>,
    ordinal: usize,
    default_shape: FetchShape,
    exhausted: bool,
    failed: bool,
    row_write_failed: bool,
    closed: bool,
}

impl<L: LiveCursor> PerRowCacheDecorator<L> {
    pub fn new(
        live: L,
        store: Arc<dyn CacheStore>,
        primary_key: impl Into<String>,
        ttl: Option<Duration>,
    ) -> Self {
        Self {
            live,
            store,
            primary_key: primary_key.into(),
            ttl,
            row_keys: Vec::new(),
            ordinal: 0,
            default_shape: FetchShape::default(),
            exhausted: false,
            failed: false,
            row_write_failed: false,
            closed: false,
        }
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Keys of the rows written so far, in fetch order.
    pub fn row_keys(&self) -> &[String] {
        &self.row_keys
    }

    fn write_row(&mut self, row: &Row) {
        let key = row_key(&self.primary_key, self.ordinal);
        self.ordinal += 1;

        match encode(row).and_then(|bytes| self.store.put(&key, &bytes, self.ttl)) {
            Ok(()) => self.row_keys.push(key),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Row cache write failed");
                self.row_write_failed = true;
            }
        }
    }

    fn commit(&mut self) -> CloseOutcome {
        let key = self.primary_key.clone();

        if self.failed {
            tracing::debug!(key = %key, "Skipping row index after live cursor failure");
            return CloseOutcome::Skipped(SkipReason::LiveCursorFailed);
        }
        if !self.exhausted {
            tracing::debug!(
                key = %key,
                orphan_rows = self.row_keys.len(),
                "Skipping row index for abandoned result"
            );
            return CloseOutcome::Skipped(SkipReason::NotExhausted);
        }
        if self.row_write_failed {
            return CloseOutcome::Skipped(SkipReason::RowWriteFailed);
        }
        if self.row_keys.is_empty() {
            return CloseOutcome::Skipped(SkipReason::EmptyResult);
        }

        let index = RowPointerIndex {
            row_keys: std::mem::take(&mut self.row_keys),
        };
        let rows = index.row_keys.len();
        match encode(&index).and_then(|bytes| self.store.put(&key, &bytes, self.ttl)) {
            Ok(()) => {
                tracing::debug!(key = %key, rows, "Committed row index to cache");
                CloseOutcome::Committed { key, rows }
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Row index write failed");
                CloseOutcome::WriteFailed {
                    key,
                    reason: e.to_string(),
                }
            }
        }
    }
}

impl<L: LiveCursor + 'static> PerRowCacheDecorator<L> {
    /// Serve from the row index when every row it names is still present,
    /// otherwise run the query live behind a fresh decorator. Without a
    /// backend the query runs uncached.
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
        let primary_key = policy.resolve_primary_key(Some(KeySource::new(request, connection)))?;

        if let Some(rows) = load_indexed_rows(store.as_ref(), &primary_key) {
            tracing::debug!(key = %primary_key, rows = rows.len(), "Row index cache hit");
            return Ok(Box::new(ReplayCursor::new(rows)));
        }

        let live = run_live()?;
        Ok(Box::new(Self::new(live, store, primary_key, policy.ttl())))
    }
}

/// Resolve the index under `primary_key` and every row it points at. Any
/// absent or unreadable piece makes the whole lookup a miss.
fn load_indexed_rows(store: &dyn CacheStore, primary_key: &str) -> Option<Vec<Row>> {
    let index: RowPointerIndex = match store.get(primary_key) {
        Ok(Some(bytes)) => match decode(&bytes) {
            Ok(index) => index,
            Err(e) => {
                tracing::warn!(key = %primary_key, error = %e, "Undecodable row index, treating as miss");
                return None;
            }
        },
        Ok(None) => {
            tracing::debug!(key = %primary_key, "Row index cache miss");
            return None;
        }
        Err(e) => {
            tracing::warn!(key = %primary_key, error = %e, "Cache read failed, treating as miss");
            return None;
        }
    };
    if index.row_keys.is_empty() {
        return None;
    }

    let mut rows = Vec::with_capacity(index.row_keys.len());
    for key in &index.row_keys {
        match store.get(key) {
            Ok(Some(bytes)) => match decode::<Row>(&bytes) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Undecodable cached row, treating as miss");
                    return None;
                }
            },
            Ok(None) => {
                tracing::debug!(
                    key = %primary_key,
                    missing = %key,
                    "Indexed row evicted, re-running query"
                );
                return None;
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        }
    }
    Some(rows)
}

impl<L: LiveCursor> ResultCursor for PerRowCacheDecorator<L> {
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
                self.write_row(&row);
                Ok(Some(project(&row, shape.unwrap_or(self.default_shape))))
            }
            Ok(None) => {
                self.exhausted = true;
                Ok(None)
            }
            Err(e) => {
                self.failed = true;
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
        self.live.close()?;
        Ok(outcome)
    }
}
