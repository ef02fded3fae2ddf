//! Cached value shapes and their encoding.
//!
//! These are an internal contract between the decorators that write them and
//! the lookup paths that read them back.

use querycache_core::{CacheStoreError, CacheStoreResult, Row};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whole-result payload: identity string to rows, stored under a primary key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachedRowSet {
    pub results: BTreeMap<String, Vec<Row>>,
}

impl CachedRowSet {
    pub fn get(&self, identity: &str) -> Option<&Vec<Row>> {
        self.results.get(identity)
    }

    /// Replace the slot for `identity`, leaving sibling slots untouched.
    pub fn merge(&mut self, identity: impl Into<String>, rows: Vec<Row>) {
        self.results.insert(identity.into(), rows);
    }

    pub fn into_rows(mut self, identity: &str) -> Option<Vec<Row>> {
        self.results.remove(identity)
    }
}

/// Per-row index payload: the ordered row keys of one execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowPointerIndex {
    pub row_keys: Vec<String>,
}

/// Key under which row `ordinal` of `primary_key` is stored.
pub fn row_key(primary_key: &str, ordinal: usize) -> String {
    format!("{}#row{}", primary_key, ordinal)
}

pub fn encode<T: Serialize>(value: &T) -> CacheStoreResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| CacheStoreError::Serialization(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CacheStoreResult<T> {
    serde_json::from_slice(bytes).map_err(|e| CacheStoreError::Deserialization(e.to_string()))
}
