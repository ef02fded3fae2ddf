//! Unit-test fixtures local to this crate.

use querycache_core::{CursorError, QueryCacheResult, Row};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cursor::LiveCursor;

/// Live cursor over a fixed row vector, optionally failing at one ordinal.
pub struct StubLive {
    rows: Vec<Row>,
    next: usize,
    fail_at: Option<usize>,
    pub closed: Arc<AtomicBool>,
}

impl StubLive {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            next: 0,
            fail_at: None,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn failing_at(mut self, ordinal: usize) -> Self {
        self.fail_at = Some(ordinal);
        self
    }

    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

impl LiveCursor for StubLive {
    fn fetch_row(&mut self) -> QueryCacheResult<Option<Row>> {
        if self.fail_at == Some(self.next) {
            return Err(CursorError::Driver {
                reason: "connection reset".to_string(),
            }
            .into());
        }
        let row = self.rows.get(self.next).cloned();
        if row.is_some() {
            self.next += 1;
        }
        Ok(row)
    }

    fn column_count(&self) -> usize {
        self.rows.first().map(Row::width).unwrap_or(0)
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn close(&mut self) -> QueryCacheResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub fn ab_rows() -> Vec<Row> {
    vec![
        Row::from_pairs([("a", 1i64), ("b", 2i64)]),
        Row::from_pairs([("a", 3i64), ("b", 4i64)]),
    ]
}
