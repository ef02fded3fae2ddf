//! Replay of a materialized row sequence through the live cursor contract.

use querycache_core::{
    ensure_no_shape_args, project, FetchShape, ProjectedRow, QueryCacheResult, Row, Value,
};

use crate::cursor::{CloseOutcome, ResultCursor};

/// A cursor over rows that were already fetched (typically from the cache).
///
/// Position only moves forward. Reaching the end is terminal and further
/// reads keep returning `None`; `close()` drops the rows so the cursor then
/// behaves as empty and exhausted.
#[derive(Debug, Clone)]
pub struct ReplayCursor {
    rows: Vec<Row>,
    position: usize,
    column_count: usize,
    default_shape: FetchShape,
    closed: bool,
}

impl ReplayCursor {
    pub fn new(rows: Vec<Row>) -> Self {
        // An empty result carries no width information.
        let column_count = rows.first().map(Row::width).unwrap_or(0);
        Self {
            rows,
            position: 0,
            column_count,
            default_shape: FetchShape::default(),
            closed: false,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.rows.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl ResultCursor for ReplayCursor {
    fn column_count(&self) -> usize {
        self.column_count
    }

    fn row_count(&self) -> usize {
        self.rows.len()
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
        let Some(row) = self.rows.get(self.position) else {
            return Ok(None);
        };
        self.position += 1;
        Ok(Some(project(row, shape.unwrap_or(self.default_shape))))
    }

    fn close(&mut self) -> QueryCacheResult<CloseOutcome> {
        if self.closed {
            return Ok(CloseOutcome::AlreadyClosed);
        }
        self.closed = true;
        self.rows = Vec::new();
        self.position = 0;
        self.column_count = 0;
        Ok(CloseOutcome::Released)
    }
}
