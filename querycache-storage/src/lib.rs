//! querycache Storage - Cursors, Cache Stores and Caching Decorators
//!
//! Defines the cursor contracts a SQL execution layer consumes, the replay
//! cursor used for cache hits, the cache store abstraction with in-memory and
//! LMDB implementations, and the decorators that populate the cache.

pub mod cache;
pub mod cursor;
pub mod replay;

#[cfg(test)]
mod testing;

pub use cursor::{CloseOutcome, LiveCursor, LiveResultCursor, ResultCursor, SkipReason};
pub use replay::ReplayCursor;

// Re-export cache types for the execution layer
pub use cache::{
    row_key, CacheKeyPolicy, CacheStats, CacheStore, CachedRowSet, InMemoryCacheStore,
    KeySource, LmdbCacheError, LmdbCacheStore, PerRowCacheDecorator, QueryResultCache,
    RowPointerIndex, WholeResultCacheDecorator,
};
