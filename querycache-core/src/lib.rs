//! querycache Core - Data Types
//!
//! Pure data structures shared by the cache stores, the caching decorators and
//! the replay cursor. No I/O lives here: values and rows, row shapes with the
//! projection function, query requests, connection identity with key
//! derivation, configuration, and the error hierarchy.

pub mod config;
pub mod error;
pub mod identity;
pub mod query;
pub mod shape;
pub mod value;

pub use config::{CacheConfig, CacheStrategy, MAX_LIFETIME_SECS};
pub use error::{
    CacheKeyError, CacheStoreError, CacheStoreResult, ConfigError, CursorError, FetchError,
    QueryCacheError, QueryCacheResult, ValidationError,
};
pub use identity::{derive_keys, digest_identity, identity_string, CacheKeys, ConnectionIdentity};
pub use query::{ParamKey, ParamType, QueryRequest, PARAM_TYPE_TABLE};
pub use shape::{ensure_no_shape_args, project, ColumnKey, FetchShape, ProjectedRow};
pub use value::{Row, Value};
