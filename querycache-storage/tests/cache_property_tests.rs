//! Property-Based Tests for Cache Population
//!
//! Properties:
//! - A whole result abandoned before exhaustion is never written
//! - Replaying a cached result yields exactly what live execution yielded
//! - Float values replay bit for bit, non-finite ones included
//! - A per-row index is the last write and every key it names resolves

use std::sync::Arc;

use proptest::prelude::*;
use querycache_storage::{
    row_key, CacheStore, CloseOutcome, InMemoryCacheStore, ResultCursor, SkipReason,
    WholeResultCacheDecorator,
};
use querycache_test_utils::fixtures::*;
use querycache_test_utils::generators::*;
use querycache_test_utils::{
    CacheConfig, CacheStrategy, ConnectionIdentity, FetchShape, LiveRunCounter, ProjectedRow,
    QueryRequest, Row, Value, VecLiveCursor,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_no_partial_whole_result_write(
        (rows, taken) in arb_nonempty_rows(12).prop_flat_map(|rows| {
            let len = rows.len();
            (Just(rows), 0..len)
        }),
        request in arb_query_request(),
        connection in arb_connection(),
    ) {
        let store = Arc::new(InMemoryCacheStore::new());
        let keys = querycache_core::derive_keys(None, &request, &connection).unwrap();
        let mut cursor = WholeResultCacheDecorator::new(
            VecLiveCursor::new(rows),
            Arc::clone(&store) as Arc<dyn CacheStore>,
            keys,
            None,
        );
        for _ in 0..taken {
            prop_assert!(cursor.fetch_next(None).unwrap().is_some());
        }

        prop_assert_eq!(
            cursor.close().unwrap(),
            CloseOutcome::Skipped(SkipReason::NotExhausted)
        );
        prop_assert!(store.is_empty());
    }

    #[test]
    fn prop_replay_matches_live(
        rows in arb_rows(10),
        shape in arb_fetch_shape(),
        per_row in any::<bool>(),
        request in arb_query_request(),
    ) {
        let strategy = if per_row { CacheStrategy::PerRow } else { CacheStrategy::WholeResult };
        let (cache, _store) = memory_cache(CacheConfig::new().with_strategy(strategy));
        let counter = LiveRunCounter::new();
        let policy = cache.policy();
        let conn = ConnectionIdentity::new().with_database("app");

        let mut results = Vec::new();
        for _ in 0..2 {
            let mut cursor = cache
                .execute(&policy, &request, &conn, counter.runner(rows.clone()))
                .unwrap();
            results.push(cursor.fetch_all(Some(shape)).unwrap());
            cursor.close().unwrap();
        }

        prop_assert_eq!(&results[0], &results[1]);
        // Empty results are never cached, so they always run live.
        prop_assert_eq!(counter.runs(), if rows.is_empty() { 2 } else { 1 });
    }

    #[test]
    fn prop_float_rows_replay_bit_exact(
        floats in prop::collection::vec(prop_oneof![any::<f64>(), arb_edge_float()], 1..6),
        per_row in any::<bool>(),
    ) {
        let strategy = if per_row { CacheStrategy::PerRow } else { CacheStrategy::WholeResult };
        let (cache, _store) = memory_cache(CacheConfig::new().with_strategy(strategy));
        let counter = LiveRunCounter::new();
        let policy = cache.policy();
        let row = Row::from_pairs(floats.iter().enumerate().map(|(i, v)| (format!("f{}", i), *v)));
        let expected = ProjectedRow::Numeric(floats.iter().copied().map(Value::Float).collect());

        for _ in 0..2 {
            let mut cursor = cache
                .execute(
                    &policy,
                    &QueryRequest::new("SELECT * FROM m"),
                    &connection(),
                    counter.runner(vec![row.clone()]),
                )
                .unwrap();
            let rows = cursor.fetch_all(Some(FetchShape::Numeric)).unwrap();
            cursor.close().unwrap();
            prop_assert_eq!(rows, vec![expected.clone()]);
        }
        prop_assert_eq!(counter.runs(), 1);
    }

    #[test]
    fn prop_per_row_index_written_last(rows in arb_nonempty_rows(10)) {
        let (cache, store) = faulty_cache(CacheConfig::new().with_strategy(CacheStrategy::PerRow));
        let counter = LiveRunCounter::new();
        let policy = cache.policy().with_explicit_key("prop");
        let request = QueryRequest::new("SELECT * FROM t");

        let mut cursor = cache
            .execute(&policy, &request, &connection(), counter.runner(rows.clone()))
            .unwrap();
        cursor.fetch_all(None).unwrap();
        prop_assert!(cursor.close().unwrap().is_committed());

        let log = store.write_log();
        prop_assert_eq!(log.len(), rows.len() + 1);
        prop_assert_eq!(log.last().map(String::as_str), Some("prop"));
        for (n, key) in log[..rows.len()].iter().enumerate() {
            prop_assert_eq!(key, &row_key("prop", n));
            prop_assert!(store.inner().contains(key).unwrap());
        }
    }
}
