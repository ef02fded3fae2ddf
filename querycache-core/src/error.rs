//! Error types for query cache operations

use thiserror::Error;

/// Cache key resolution errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheKeyError {
    #[error("No cache key: neither an explicit key nor derivation inputs were supplied")]
    NoCacheKey,

    #[error("Explicit cache key must not be empty")]
    EmptyExplicitKey,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No cache backend configured")]
    NoCacheBackendConfigured,

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Row projection errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Unsupported fetch shape {shape}: {reason}")]
    UnsupportedFetchShape { shape: String, reason: String },
}

/// Cache store errors.
///
/// These never reach the end caller of a query: reads degrade to a miss and
/// writes are best effort. They are still typed so stores and tests can
/// report them precisely.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheStoreError {
    #[error("Cache store transaction failed: {0}")]
    Transaction(String),

    #[error("Cache payload serialization failed: {0}")]
    Serialization(String),

    #[error("Cache payload deserialization failed: {0}")]
    Deserialization(String),

    #[error("Cache store lock poisoned")]
    LockPoisoned,

    #[error("Cache store unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by the live cursor (driver) underneath a decorator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("Driver error: {reason}")]
    Driver { reason: String },

    #[error("Query execution failed: {reason}")]
    ExecutionFailed { reason: String },

    #[error("Cursor timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
}

/// Validation errors for row and request construction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Column mismatch: {columns} column names for {values} values")]
    ColumnMismatch { columns: usize, values: usize },

    #[error("Unknown parameter type code: {code}")]
    UnknownParamType { code: i32 },
}

/// Master error type for all query cache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryCacheError {
    #[error("Cache key error: {0}")]
    CacheKey(#[from] CacheKeyError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Cache store error: {0}")]
    Store(#[from] CacheStoreError),

    #[error("Cursor error: {0}")]
    Cursor(#[from] CursorError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Result type alias for query cache operations.
pub type QueryCacheResult<T> = Result<T, QueryCacheError>;

/// Result type alias for cache store operations.
pub type CacheStoreResult<T> = Result<T, CacheStoreError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_cache_key_display() {
        let msg = format!("{}", CacheKeyError::NoCacheKey);
        assert!(msg.contains("No cache key"));
    }

    #[test]
    fn test_unsupported_shape_display() {
        let err = FetchError::UnsupportedFetchShape {
            shape: "object".to_string(),
            reason: "not implemented by the cache".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("object"));
        assert!(msg.contains("not implemented"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "QUERYCACHE_STRATEGY".to_string(),
            value: "sometimes".to_string(),
            reason: "expected whole or per-row".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("QUERYCACHE_STRATEGY"));
        assert!(msg.contains("sometimes"));
    }

    #[test]
    fn test_master_error_from_variants() {
        let key = QueryCacheError::from(CacheKeyError::NoCacheKey);
        assert!(matches!(key, QueryCacheError::CacheKey(_)));

        let config = QueryCacheError::from(ConfigError::NoCacheBackendConfigured);
        assert!(matches!(config, QueryCacheError::Config(_)));

        let store = QueryCacheError::from(CacheStoreError::LockPoisoned);
        assert!(matches!(store, QueryCacheError::Store(_)));

        let cursor = QueryCacheError::from(CursorError::Timeout { elapsed_ms: 30 });
        assert!(matches!(cursor, QueryCacheError::Cursor(_)));

        let validation = QueryCacheError::from(ValidationError::ColumnMismatch {
            columns: 2,
            values: 3,
        });
        assert!(matches!(validation, QueryCacheError::Validation(_)));
    }
}
