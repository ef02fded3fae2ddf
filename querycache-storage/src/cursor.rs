//! Cursor contracts.
//!
//! [`LiveCursor`] is what a driver hands us: raw rows, one at a time.
//! [`ResultCursor`] is what callers consume, whether the rows come from the
//! driver, from a caching decorator, or from a [`ReplayCursor`] over cached
//! data.
//!
//! [`ReplayCursor`]: crate::ReplayCursor

use querycache_core::{
    ensure_no_shape_args, project, FetchShape, ProjectedRow, QueryCacheResult, Row, Value,
};

/// A live, driver-backed cursor.
pub trait LiveCursor {
    /// Next row, or `None` once the result is exhausted.
    fn fetch_row(&mut self) -> QueryCacheResult<Option<Row>>;

    fn column_count(&self) -> usize;

    fn row_count(&self) -> usize;

    /// Release driver resources.
    fn close(&mut self) -> QueryCacheResult<()>;
}

impl<L: LiveCursor + ?Sized> LiveCursor for Box<L> {
    fn fetch_row(&mut self) -> QueryCacheResult<Option<Row>> {
        (**self).fetch_row()
    }

    fn column_count(&self) -> usize {
        (**self).column_count()
    }

    fn row_count(&self) -> usize {
        (**self).row_count()
    }

    fn close(&mut self) -> QueryCacheResult<()> {
        (**self).close()
    }
}

/// Why a decorator closed without writing to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The caller closed before draining the cursor.
    NotExhausted,
    /// The cursor was drained but produced no rows.
    EmptyResult,
    /// The live cursor failed during iteration.
    LiveCursorFailed,
    /// At least one per-row write failed, so no index was written.
    RowWriteFailed,
}

/// What `close()` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Resources released; nothing to commit.
    Released,
    /// The result was written to the cache under `key`.
    Committed { key: String, rows: usize },
    /// Nothing was written.
    Skipped(SkipReason),
    /// The commit was attempted and the store rejected it. The query itself
    /// already succeeded.
    WriteFailed { key: String, reason: String },
    /// `close()` had already been called.
    AlreadyClosed,
}

impl CloseOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, CloseOutcome::Committed { .. })
    }
}

/// The uniform read contract shared by live, decorated and replayed results.
pub trait ResultCursor {
    /// Width of the result.
    fn column_count(&self) -> usize;

    /// Number of rows, as reported by the underlying source.
    fn row_count(&self) -> usize;

    /// Shape used when a fetch does not name one.
    fn default_shape(&self) -> FetchShape;

    /// Configure the default shape. Extra fetch-mode arguments are rejected
    /// with `UnsupportedFetchShape`.
    fn set_default_shape(&mut self, shape: FetchShape, args: &[Value]) -> QueryCacheResult<()>;

    /// Next row projected into `shape` (or the default), `None` at the end.
    fn fetch_next(&mut self, shape: Option<FetchShape>) -> QueryCacheResult<Option<ProjectedRow>>;

    /// Drain the remaining rows from the current position.
    fn fetch_all(&mut self, shape: Option<FetchShape>) -> QueryCacheResult<Vec<ProjectedRow>> {
        let mut rows = Vec::new();
        while let Some(row) = self.fetch_next(shape)? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Value at `index` of the next row, `None` if there is no next row or
    /// the index is out of range.
    fn fetch_column(&mut self, index: usize) -> QueryCacheResult<Option<Value>> {
        Ok(self
            .fetch_next(Some(FetchShape::Numeric))?
            .and_then(ProjectedRow::into_numeric)
            .and_then(|mut values| {
                if index < values.len() {
                    Some(values.swap_remove(index))
                } else {
                    None
                }
            }))
    }

    /// Finish with the cursor. Decorators commit to the cache here.
    fn close(&mut self) -> QueryCacheResult<CloseOutcome>;
}

impl<C: ResultCursor + ?Sized> ResultCursor for Box<C> {
    fn column_count(&self) -> usize {
        (**self).column_count()
    }

    fn row_count(&self) -> usize {
        (**self).row_count()
    }

    fn default_shape(&self) -> FetchShape {
        (**self).default_shape()
    }

    fn set_default_shape(&mut self, shape: FetchShape, args: &[Value]) -> QueryCacheResult<()> {
        (**self).set_default_shape(shape, args)
    }

    fn fetch_next(&mut self, shape: Option<FetchShape>) -> QueryCacheResult<Option<ProjectedRow>> {
        (**self).fetch_next(shape)
    }

    fn fetch_all(&mut self, shape: Option<FetchShape>) -> QueryCacheResult<Vec<ProjectedRow>> {
        (**self).fetch_all(shape)
    }

    fn fetch_column(&mut self, index: usize) -> QueryCacheResult<Option<Value>> {
        (**self).fetch_column(index)
    }

    fn close(&mut self) -> QueryCacheResult<CloseOutcome> {
        (**self).close()
    }
}

/// Un-cached pass-through: a live cursor behind the [`ResultCursor`] contract.
#[derive(Debug)]
pub struct LiveResultCursor<L: LiveCursor> {
    live: L,
    default_shape: FetchShape,
    finished: bool,
    closed: bool,
}

impl<L: LiveCursor> LiveResultCursor<L> {
    pub fn new(live: L) -> Self {
        Self {
            live,
            default_shape: FetchShape::default(),
            finished: false,
            closed: false,
        }
    }
}

impl<L: LiveCursor> ResultCursor for LiveResultCursor<L> {
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
        if self.finished || self.closed {
            return Ok(None);
        }
        match self.live.fetch_row()? {
            Some(row) => Ok(Some(project(&row, shape.unwrap_or(self.default_shape)))),
            None => {
                self.finished = true;
                Ok(None)
            }
        }
    }

    fn close(&mut self) -> QueryCacheResult<CloseOutcome> {
        if self.closed {
            return Ok(CloseOutcome::AlreadyClosed);
        }
        self.closed = true;
        self.live.close()?;
        Ok(CloseOutcome::Released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ab_rows, StubLive};
    use std::sync::atomic::Ordering;

    #[test]
    fn test_live_pass_through_projects_rows() {
        let mut cursor = LiveResultCursor::new(StubLive::new(ab_rows()));
        assert_eq!(cursor.column_count(), 2);
        assert_eq!(cursor.row_count(), 2);
        assert_eq!(
            cursor.fetch_next(Some(FetchShape::Numeric)).unwrap(),
            Some(ProjectedRow::Numeric(vec![Value::Int(1), Value::Int(2)]))
        );
        assert_eq!(cursor.fetch_column(1).unwrap(), Some(Value::Int(4)));
        assert_eq!(cursor.fetch_next(None).unwrap(), None);
        assert_eq!(cursor.fetch_next(None).unwrap(), None);
    }

    #[test]
    fn test_live_errors_propagate() {
        let mut cursor = LiveResultCursor::new(StubLive::new(ab_rows()).failing_at(0));
        assert!(cursor.fetch_next(None).is_err());
    }

    #[test]
    fn test_close_releases_live_once() {
        let live = StubLive::new(ab_rows());
        let closed = live.closed_flag();
        let mut cursor: Box<dyn ResultCursor> = Box::new(LiveResultCursor::new(live));

        assert_eq!(cursor.close().unwrap(), CloseOutcome::Released);
        assert!(closed.load(Ordering::SeqCst));
        assert_eq!(cursor.close().unwrap(), CloseOutcome::AlreadyClosed);
        assert!(cursor.fetch_all(None).unwrap().is_empty());
    }

    #[test]
    fn test_set_default_shape_rejects_args() {
        let mut cursor = LiveResultCursor::new(StubLive::new(ab_rows()));
        assert!(cursor
            .set_default_shape(FetchShape::Associative, &[Value::Int(0)])
            .is_err());
        cursor
            .set_default_shape(FetchShape::Associative, &[])
            .unwrap();
        assert_eq!(cursor.default_shape(), FetchShape::Associative);
    }
}
