//! Read-through query result cache.
//!
//! [`QueryResultCache`] is the entry point for a SQL execution layer: it owns
//! the (optional) store and the configuration, hands out base policies, and
//! routes each execution to a replay, a caching decorator, or an uncached
//! live cursor.

use std::fmt;
use std::sync::Arc;

use querycache_core::{
    CacheConfig, CacheStrategy, ConnectionIdentity, QueryCacheResult, QueryRequest,
};

use super::key_policy::CacheKeyPolicy;
use super::per_row::PerRowCacheDecorator;
use super::traits::{CacheStats, CacheStore};
use super::whole_result::WholeResultCacheDecorator;
use crate::cursor::{LiveCursor, LiveResultCursor, ResultCursor};

/// Read-through cache in front of live query execution.
///
/// # Example
///
/// ```ignore
/// let cache = QueryResultCache::new(Some(store), CacheConfig::from_env()?)?;
/// let policy = cache.policy().with_lifetime(300);
/// let mut cursor = cache.execute(&policy, &request, &connection, || driver.run(&request))?;
/// let rows = cursor.fetch_all(None)?;
/// cursor.close()?;
/// ```
#[derive(Clone)]
pub struct QueryResultCache {
    store: Option<Arc<dyn CacheStore>>,
    config: CacheConfig,
}

impl QueryResultCache {
    /// Create a cache over `store`. `None` means every execution runs live.
    pub fn new(store: Option<Arc<dyn CacheStore>>, config: CacheConfig) -> QueryCacheResult<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> Option<&Arc<dyn CacheStore>> {
        self.store.as_ref()
    }

    /// Store statistics, if a store is configured.
    pub fn stats(&self) -> Option<CacheStats> {
        self.store.as_ref().map(|store| store.stats())
    }

    /// Base policy: the configured store and default lifetime.
    pub fn policy(&self) -> CacheKeyPolicy {
        let policy = CacheKeyPolicy::new().with_lifetime(self.config.default_lifetime_secs);
        match &self.store {
            Some(store) => policy.with_backend(Arc::clone(store)),
            None => policy,
        }
    }

    /// Execute `request` through the cache.
    ///
    /// `run_live` is only invoked on a miss (or when caching is off). Live
    /// errors propagate unchanged; cache store failures never do.
    pub fn execute<L, F>(
        &self,
        policy: &CacheKeyPolicy,
        request: &QueryRequest,
        connection: &ConnectionIdentity,
        run_live: F,
    ) -> QueryCacheResult<Box<dyn ResultCursor>>
    where
        L: LiveCursor + 'static,
        F: FnOnce() -> QueryCacheResult<L>,
    {
        if !self.config.enabled || !policy.has_backend() {
            tracing::debug!(
                enabled = self.config.enabled,
                backend = policy.has_backend(),
                "Result cache bypassed"
            );
            return Ok(Box::new(LiveResultCursor::new(run_live()?)));
        }

        match self.config.strategy {
            CacheStrategy::WholeResult => {
                WholeResultCacheDecorator::create_or_serve(policy, request, connection, run_live)
            }
            CacheStrategy::PerRow => {
                PerRowCacheDecorator::create_or_serve(policy, request, connection, run_live)
            }
        }
    }
}

impl fmt::Debug for QueryResultCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryResultCache")
            .field("store", &self.store.as_ref().map(|_| "configured"))
            .field("config", &self.config)
            .finish()
    }
}
