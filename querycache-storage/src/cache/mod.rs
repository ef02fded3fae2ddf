//! Query result caching with explicit commit semantics.
//!
//! Two population strategies share one cursor contract:
//!
//! - [`WholeResultCacheDecorator`] buffers a result and writes it as one
//!   [`CachedRowSet`] under the primary key, nested at the identity string so
//!   queries sharing an explicit key never clobber each other.
//! - [`PerRowCacheDecorator`] writes each row as it is fetched and, last of
//!   all, a [`RowPointerIndex`] naming them.
//!
//! Neither writes anything for an abandoned, failed or empty execution. The
//! commit happens in `close()`, whose [`CloseOutcome`](crate::CloseOutcome)
//! reports exactly what was written.
//!
//! # Failure Policy
//!
//! Caching never turns a successful query into a failed one: store read
//! failures degrade to a miss and store write failures are logged and
//! reported in the close outcome, not returned as errors.
//!
//! # Example
//!
//! ```ignore
//! let cache = QueryResultCache::new(Some(store), CacheConfig::default())?;
//! let policy = cache.policy().with_explicit_key("report:daily");
//! let mut cursor = cache.execute(&policy, &request, &connection, run_live)?;
//! while let Some(row) = cursor.fetch_next(Some(FetchShape::Associative))? {
//!     render(row);
//! }
//! if let CloseOutcome::WriteFailed { key, reason } = cursor.close()? {
//!     eprintln!("result for {key} not cached: {reason}");
//! }
//! ```

pub mod key_policy;
pub mod lmdb_backend;
pub mod memory_backend;
pub mod payload;
pub mod per_row;
pub mod read_through;
pub mod traits;
pub mod whole_result;

pub use key_policy::{CacheKeyPolicy, KeySource};
pub use lmdb_backend::{LmdbCacheError, LmdbCacheStore};
pub use memory_backend::InMemoryCacheStore;
pub use payload::{row_key, CachedRowSet, RowPointerIndex};
pub use per_row::PerRowCacheDecorator;
pub use read_through::QueryResultCache;
pub use traits::{CacheStats, CacheStore};
pub use whole_result::WholeResultCacheDecorator;
