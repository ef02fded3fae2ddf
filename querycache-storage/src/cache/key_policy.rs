//! Per-query cache key policy.
//!
//! A `CacheKeyPolicy` is an immutable value: every `with_*` call returns a new
//! policy and leaves the original untouched.

use querycache_core::{
    derive_keys, CacheKeyError, CacheKeys, ConfigError, ConnectionIdentity, QueryCacheResult,
    QueryRequest,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::traits::CacheStore;

/// Inputs from which a primary key can be derived.
#[derive(Debug, Clone, Copy)]
pub struct KeySource<'a> {
    pub request: &'a QueryRequest,
    pub connection: &'a ConnectionIdentity,
}

impl<'a> KeySource<'a> {
    pub fn new(request: &'a QueryRequest, connection: &'a ConnectionIdentity) -> Self {
        Self {
            request,
            connection,
        }
    }
}

/// How one query execution is cached: lifetime, optional explicit key and
/// the store to write to.
#[derive(Clone, Default)]
pub struct CacheKeyPolicy {
    lifetime: u64,
    explicit_key: Option<String>,
    backend: Option<Arc<dyn CacheStore>>,
}

impl CacheKeyPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lifetime in seconds; 0 defers to the store's default.
    pub fn lifetime(&self) -> u64 {
        self.lifetime
    }

    /// Lifetime as a store TTL, `None` when 0.
    pub fn ttl(&self) -> Option<Duration> {
        (self.lifetime > 0).then(|| Duration::from_secs(self.lifetime))
    }

    pub fn explicit_key(&self) -> Option<&str> {
        self.explicit_key.as_deref()
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// The configured store, or `NoCacheBackendConfigured`.
    pub fn backend(&self) -> QueryCacheResult<&Arc<dyn CacheStore>> {
        self.backend
            .as_ref()
            .ok_or_else(|| ConfigError::NoCacheBackendConfigured.into())
    }

    pub fn with_lifetime(&self, seconds: u64) -> Self {
        Self {
            lifetime: seconds,
            ..self.clone()
        }
    }

    /// Use `key` verbatim as the primary key. The caller is responsible for
    /// namespacing it.
    pub fn with_explicit_key(&self, key: impl Into<String>) -> Self {
        Self {
            explicit_key: Some(key.into()),
            ..self.clone()
        }
    }

    pub fn with_backend(&self, backend: Arc<dyn CacheStore>) -> Self {
        Self {
            backend: Some(backend),
            ..self.clone()
        }
    }

    /// Resolve the primary key: the explicit key if set, otherwise derived
    /// from `source`. Fails with `NoCacheKey` when neither is available.
    pub fn resolve_primary_key(&self, source: Option<KeySource<'_>>) -> QueryCacheResult<String> {
        match (&self.explicit_key, source) {
            (Some(key), _) if key.is_empty() => Err(CacheKeyError::EmptyExplicitKey.into()),
            (Some(key), _) => Ok(key.clone()),
            (None, Some(source)) => Ok(self.derive_keys(source.request, source.connection)?.primary_key),
            (None, None) => Err(CacheKeyError::NoCacheKey.into()),
        }
    }

    /// Derive `(primary key, identity string)` for a query.
    pub fn derive_keys(
        &self,
        request: &QueryRequest,
        connection: &ConnectionIdentity,
    ) -> QueryCacheResult<CacheKeys> {
        if self.explicit_key.as_deref() == Some("") {
            return Err(CacheKeyError::EmptyExplicitKey.into());
        }
        derive_keys(self.explicit_key.as_deref(), request, connection)
    }
}

impl fmt::Debug for CacheKeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheKeyPolicy")
            .field("lifetime", &self.lifetime)
            .field("explicit_key", &self.explicit_key)
            .field("backend", &self.backend.as_ref().map(|_| "configured"))
            .finish()
    }
}
