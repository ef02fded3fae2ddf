//! querycache Test Utilities
//!
//! Shared test infrastructure for the querycache workspace:
//! - Mock live cursors and cache stores with injectable failures
//! - Proptest generators for values, rows and query requests
//! - Test fixtures for common scenarios
//! - Custom assertions for close outcomes and error variants

// Re-export the types tests touch most
pub use querycache_core::{
    CacheConfig, CacheKeyError, CacheStoreError, CacheStrategy, ConfigError, ConnectionIdentity,
    CursorError, FetchError, FetchShape, ParamKey, ParamType, ProjectedRow, QueryCacheError,
    QueryCacheResult, QueryRequest, Row, Value,
};
pub use querycache_storage::{
    CacheKeyPolicy, CacheStats, CacheStore, CloseOutcome, InMemoryCacheStore, LiveCursor,
    QueryResultCache, ReplayCursor, ResultCursor, SkipReason,
};

use querycache_core::CacheStoreResult;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// MOCKS
// ============================================================================

/// Live cursor over an in-memory row vector.
///
/// Can be told to fail at a given row ordinal. Shared counters let a test
/// observe how many times the query ran and whether the cursor was closed
/// after the cursor itself has been moved into a decorator.
#[derive(Debug, Clone)]
pub struct VecLiveCursor {
    rows: Vec<Row>,
    next: usize,
    fail_at: Option<usize>,
    closed: Arc<AtomicBool>,
}

impl VecLiveCursor {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            next: 0,
            fail_at: None,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Fail with a driver error when row `ordinal` is requested.
    pub fn failing_at(mut self, ordinal: usize) -> Self {
        self.fail_at = Some(ordinal);
        self
    }

    /// Handle reporting whether `close()` was called.
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

impl LiveCursor for VecLiveCursor {
    fn fetch_row(&mut self) -> QueryCacheResult<Option<Row>> {
        if self.fail_at == Some(self.next) {
            return Err(CursorError::Driver {
                reason: format!("simulated failure at row {}", self.next),
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

/// Counts live executions for a query runner closure.
#[derive(Debug, Clone, Default)]
pub struct LiveRunCounter {
    runs: Arc<AtomicUsize>,
}

impl LiveRunCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A runner producing `rows`, counting each invocation.
    pub fn runner(&self, rows: Vec<Row>) -> impl FnOnce() -> QueryCacheResult<VecLiveCursor> {
        let runs = Arc::clone(&self.runs);
        move || {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(VecLiveCursor::new(rows))
        }
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

/// In-memory store with switchable read and write failures and a log of
/// successful writes in order.
#[derive(Debug, Default)]
pub struct FaultyCacheStore {
    inner: InMemoryCacheStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_writes_for: Mutex<Option<String>>,
    write_log: Mutex<Vec<String>>,
}

impl FaultyCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Reject writes to exactly `key`.
    pub fn fail_writes_for(&self, key: impl Into<String>) {
        if let Ok(mut target) = self.fail_writes_for.lock() {
            *target = Some(key.into());
        }
    }

    /// Keys of successful writes, oldest first.
    pub fn write_log(&self) -> Vec<String> {
        self.write_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// The wrapped store, bypassing injected failures.
    pub fn inner(&self) -> &InMemoryCacheStore {
        &self.inner
    }

    fn write_rejected(&self, key: &str) -> bool {
        self.fail_writes.load(Ordering::SeqCst)
            || self
                .fail_writes_for
                .lock()
                .map(|target| target.as_deref() == Some(key))
                .unwrap_or(false)
    }
}

impl CacheStore for FaultyCacheStore {
    fn get(&self, key: &str) -> CacheStoreResult<Option<Vec<u8>>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CacheStoreError::Unavailable("simulated read failure".to_string()));
        }
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheStoreResult<()> {
        if self.write_rejected(key) {
            return Err(CacheStoreError::Unavailable("simulated write failure".to_string()));
        }
        self.inner.put(key, value, ttl)?;
        self.write_log
            .lock()
            .map_err(|_| CacheStoreError::LockPoisoned)?
            .push(key.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> CacheStoreResult<bool> {
        self.inner.delete(key)
    }

    fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for querycache types.

    use super::*;
    use proptest::prelude::*;

    /// Any scalar value, every `f64` bit pattern included.
    pub fn arb_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            any::<f64>().prop_map(Value::Float),
            arb_edge_float().prop_map(Value::Float),
            "[ -~]{0,16}".prop_map(Value::Text),
            prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
        ]
    }

    /// Non-finite and boundary floats, drawn more often than `any::<f64>()`
    /// would.
    pub fn arb_edge_float() -> impl Strategy<Value = f64> {
        prop_oneof![
            Just(f64::NAN),
            Just(f64::INFINITY),
            Just(f64::NEG_INFINITY),
            Just(-0.0),
            Just(f64::MIN_POSITIVE),
            Just(1.0715660391465826e-75),
        ]
    }

    pub fn arb_column_name() -> impl Strategy<Value = String> {
        "[a-z_][a-z0-9_]{0,11}"
    }

    /// Column names for a result, unique within the result.
    pub fn arb_columns(max_width: usize) -> impl Strategy<Value = Vec<String>> {
        prop::collection::btree_set(arb_column_name(), 1..=max_width.max(1))
            .prop_map(|names| names.into_iter().collect())
    }

    /// One row with the given columns.
    pub fn arb_row(columns: Vec<String>) -> impl Strategy<Value = Row> {
        prop::collection::vec(arb_value(), columns.len()).prop_map(move |values| {
            Row::from_pairs(columns.clone().into_iter().zip(values))
        })
    }

    /// A result set of up to `max_rows` rows sharing one column list.
    pub fn arb_rows(max_rows: usize) -> impl Strategy<Value = Vec<Row>> {
        arb_columns(4).prop_flat_map(move |columns| {
            prop::collection::vec(arb_row(columns), 0..=max_rows)
        })
    }

    /// A non-empty result set.
    pub fn arb_nonempty_rows(max_rows: usize) -> impl Strategy<Value = Vec<Row>> {
        arb_columns(4).prop_flat_map(move |columns| {
            prop::collection::vec(arb_row(columns), 1..=max_rows.max(1))
        })
    }

    pub fn arb_param_type() -> impl Strategy<Value = ParamType> {
        prop::sample::select(
            querycache_core::PARAM_TYPE_TABLE
                .iter()
                .map(|(t, _, _)| *t)
                .collect::<Vec<_>>(),
        )
    }

    /// A query with positional parameters, each tagged with its inferred
    /// type.
    pub fn arb_query_request() -> impl Strategy<Value = QueryRequest> {
        (
            "SELECT [a-z, ]{1,24} FROM [a-z]{1,8}( WHERE [a-z]{1,6} = \\?)?",
            prop::collection::vec(arb_value(), 0..4),
        )
            .prop_map(|(sql, params)| {
                params
                    .into_iter()
                    .enumerate()
                    .fold(QueryRequest::new(sql), |request, (i, value)| {
                        let param_type = ParamType::infer(&value);
                        request
                            .bind(value)
                            .with_type(ParamKey::Position(i), param_type)
                    })
            })
    }

    pub fn arb_connection() -> impl Strategy<Value = ConnectionIdentity> {
        ("[a-z]{1,10}", any::<u16>(), "[a-z]{1,8}", "[a-z]{1,8}").prop_map(
            |(host, port, dbname, user)| {
                ConnectionIdentity::new()
                    .with_host(host)
                    .with_port(port)
                    .with_database(dbname)
                    .with_user(user)
            },
        )
    }

    pub fn arb_fetch_shape() -> impl Strategy<Value = FetchShape> {
        prop::sample::select(FetchShape::ALL.to_vec())
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built values for common test scenarios.

    use super::*;

    /// `[{"a":1,"b":2},{"a":3,"b":4}]`
    pub fn two_row_result() -> Vec<Row> {
        vec![
            Row::from_pairs([("a", 1i64), ("b", 2i64)]),
            Row::from_pairs([("a", 3i64), ("b", 4i64)]),
        ]
    }

    pub fn users_query() -> QueryRequest {
        QueryRequest::new("SELECT a, b FROM users WHERE active = ?")
            .bind(true)
            .with_type(ParamKey::Position(0), ParamType::Boolean)
    }

    pub fn connection() -> ConnectionIdentity {
        ConnectionIdentity::new()
            .with_host("db.internal")
            .with_port(5432)
            .with_database("app")
            .with_user("reporter")
            .with_password("hunter2")
    }

    /// A cache over an in-memory store.
    pub fn memory_cache(config: CacheConfig) -> (QueryResultCache, Arc<InMemoryCacheStore>) {
        let store = Arc::new(InMemoryCacheStore::new());
        let cache = QueryResultCache::new(
            Some(Arc::clone(&store) as Arc<dyn CacheStore>),
            config,
        )
        .expect("fixture config is valid");
        (cache, store)
    }

    /// A cache over a [`FaultyCacheStore`].
    pub fn faulty_cache(config: CacheConfig) -> (QueryResultCache, Arc<FaultyCacheStore>) {
        let store = Arc::new(FaultyCacheStore::new());
        let cache = QueryResultCache::new(
            Some(Arc::clone(&store) as Arc<dyn CacheStore>),
            config,
        )
        .expect("fixture config is valid");
        (cache, store)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for close outcomes and error variants.

    use super::*;

    /// Assert that `close()` committed `rows` rows.
    #[track_caller]
    pub fn assert_committed(outcome: &CloseOutcome, rows: usize) {
        match outcome {
            CloseOutcome::Committed { rows: r, .. } => {
                assert_eq!(*r, rows, "Wrong committed row count")
            }
            other => panic!("Expected Committed({} rows), got: {:?}", rows, other),
        }
    }

    /// Assert that `close()` skipped the write for `reason`.
    #[track_caller]
    pub fn assert_skipped(outcome: &CloseOutcome, reason: SkipReason) {
        assert_eq!(
            *outcome,
            CloseOutcome::Skipped(reason),
            "Expected Skipped({:?})",
            reason
        );
    }

    /// Assert that a result is an UnsupportedFetchShape error.
    #[track_caller]
    pub fn assert_unsupported_shape<T: std::fmt::Debug>(result: &QueryCacheResult<T>) {
        match result {
            Err(QueryCacheError::Fetch(FetchError::UnsupportedFetchShape { .. })) => {}
            other => panic!("Expected UnsupportedFetchShape, got: {:?}", other),
        }
    }

    /// Assert that a result is a live cursor error.
    #[track_caller]
    pub fn assert_cursor_error<T: std::fmt::Debug>(result: &QueryCacheResult<T>) {
        match result {
            Err(QueryCacheError::Cursor(_)) => {}
            other => panic!("Expected Cursor error, got: {:?}", other),
        }
    }

    /// Assert that a result is a NoCacheKey error.
    #[track_caller]
    pub fn assert_no_cache_key<T: std::fmt::Debug>(result: &QueryCacheResult<T>) {
        match result {
            Err(QueryCacheError::CacheKey(CacheKeyError::NoCacheKey)) => {}
            other => panic!("Expected NoCacheKey, got: {:?}", other),
        }
    }

    /// Assert that a result is a NoCacheBackendConfigured error.
    #[track_caller]
    pub fn assert_no_backend<T: std::fmt::Debug>(result: &QueryCacheResult<T>) {
        match result {
            Err(QueryCacheError::Config(ConfigError::NoCacheBackendConfigured)) => {}
            other => panic!("Expected NoCacheBackendConfigured, got: {:?}", other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_vec_live_cursor_drains_and_closes() {
        let mut live = VecLiveCursor::new(fixtures::two_row_result());
        let closed = live.closed_flag();
        assert_eq!(live.column_count(), 2);
        assert!(live.fetch_row().unwrap().is_some());
        assert!(live.fetch_row().unwrap().is_some());
        assert!(live.fetch_row().unwrap().is_none());
        live.close().unwrap();
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_vec_live_cursor_fails_at_ordinal() {
        let mut live = VecLiveCursor::new(fixtures::two_row_result()).failing_at(1);
        assert!(live.fetch_row().is_ok());
        assertions::assert_cursor_error(&live.fetch_row());
    }

    #[test]
    fn test_faulty_store_switches() {
        let store = FaultyCacheStore::new();
        store.put("k", b"v", None).unwrap();
        store.set_fail_reads(true);
        assert!(store.get("k").is_err());
        store.set_fail_reads(false);
        assert!(store.get("k").unwrap().is_some());

        store.fail_writes_for("blocked");
        assert!(store.put("blocked", b"v", None).is_err());
        assert!(store.put("open", b"v", None).is_ok());
        assert_eq!(store.write_log(), vec!["k", "open"]);
    }

    #[test]
    fn test_run_counter() {
        let counter = LiveRunCounter::new();
        let run = counter.runner(fixtures::two_row_result());
        assert_eq!(counter.runs(), 0);
        run().unwrap();
        assert_eq!(counter.runs(), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_generated_rows_share_columns(rows in generators::arb_rows(8)) {
            if let Some(first) = rows.first() {
                for row in &rows {
                    prop_assert_eq!(row.columns(), first.columns());
                }
            }
        }

        #[test]
        fn prop_generated_requests_tag_every_param(request in generators::arb_query_request()) {
            prop_assert_eq!(request.params.len(), request.types.len());
        }
    }
}
