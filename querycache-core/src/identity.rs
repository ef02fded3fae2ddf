//! Connection identity and deterministic cache key derivation.
//!
//! The identity string is the human-legible composition of everything that
//! determines a query's result: SQL text, bound parameters, their type tags
//! and the (digested) connection identity. The primary key is a digest of
//! that string unless the caller supplies an explicit key.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{CacheStoreError, QueryCacheResult};
use crate::query::{ParamKey, QueryRequest};

/// Length in bytes of a derived primary key digest (160 bits).
pub const PRIMARY_KEY_DIGEST_LEN: usize = 20;

/// Attributes that identify the connection a query runs on.
///
/// Attributes are kept sorted so serialization is canonical regardless of
/// insertion order. Values (credentials included) are never rendered: the
/// `Debug` impl redacts them and key derivation only sees their digest.
#[derive(Clone, PartialEq, Eq, Default, Serialize)]
pub struct ConnectionIdentity {
    attributes: BTreeMap<String, String>,
}

impl ConnectionIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_host(self, host: impl Into<String>) -> Self {
        self.with_attribute("host", host)
    }

    pub fn with_port(self, port: u16) -> Self {
        self.with_attribute("port", port.to_string())
    }

    pub fn with_database(self, dbname: impl Into<String>) -> Self {
        self.with_attribute("dbname", dbname)
    }

    pub fn with_user(self, user: impl Into<String>) -> Self {
        self.with_attribute("user", user)
    }

    pub fn with_password(self, password: impl Into<String>) -> Self {
        self.with_attribute("password", password)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// SHA-256 hex digest of the canonical serialization.
    pub fn digest(&self) -> QueryCacheResult<String> {
        let canonical = serde_json::to_vec(&self.attributes)
            .map_err(|e| CacheStoreError::Serialization(e.to_string()))?;
        Ok(hex::encode(Sha256::digest(&canonical)))
    }
}

impl fmt::Debug for ConnectionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionIdentity")
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A derived `(primary key, identity string)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKeys {
    pub primary_key: String,
    pub identity: String,
}

/// Build the identity string for a query on a connection.
///
/// Each component is labeled and rendered as JSON, so SQL text containing
/// the separator sequence can never be confused with a following field.
pub fn identity_string(
    request: &QueryRequest,
    connection: &ConnectionIdentity,
) -> QueryCacheResult<String> {
    let type_codes: Vec<(&ParamKey, i32)> = request
        .types
        .iter()
        .map(|(key, t)| (key, t.code()))
        .collect();

    Ok(format!(
        "sql={}&params={}&types={}&connection={}",
        canonical(&request.sql)?,
        canonical(&request.params)?,
        canonical(&type_codes)?,
        connection.digest()?,
    ))
}

/// 160-bit BLAKE3 digest of an identity string, hex encoded.
pub fn digest_identity(identity: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(identity.as_bytes());
    let mut out = [0u8; PRIMARY_KEY_DIGEST_LEN];
    hasher.finalize_xof().fill(&mut out);
    hex::encode(out)
}

/// Derive the cache keys for a query.
///
/// With an explicit key the primary key is that key verbatim; the identity
/// string is still computed so reused explicit keys stay distinguishable.
pub fn derive_keys(
    explicit_key: Option<&str>,
    request: &QueryRequest,
    connection: &ConnectionIdentity,
) -> QueryCacheResult<CacheKeys> {
    let identity = identity_string(request, connection)?;
    let primary_key = match explicit_key {
        Some(key) => key.to_string(),
        None => digest_identity(&identity),
    };
    Ok(CacheKeys {
        primary_key,
        identity,
    })
}

fn canonical<T: Serialize + ?Sized>(value: &T) -> QueryCacheResult<String> {
    serde_json::to_string(value).map_err(|e| CacheStoreError::Serialization(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ParamType;
    use crate::value::Value;
    use proptest::prelude::*;

    fn connection() -> ConnectionIdentity {
        ConnectionIdentity::new()
            .with_host("db.internal")
            .with_port(5432)
            .with_database("app")
            .with_user("reporter")
            .with_password("s3cret")
    }

    #[test]
    fn test_identity_does_not_embed_credentials() {
        let request = QueryRequest::new("SELECT 1");
        let identity = identity_string(&request, &connection()).unwrap();
        assert!(!identity.contains("s3cret"));
        assert!(!identity.contains("db.internal"));
        assert!(identity.starts_with("sql=\"SELECT 1\"&params="));
    }

    #[test]
    fn test_debug_redacts_values() {
        let rendered = format!("{:?}", connection());
        assert!(rendered.contains("password"));
        assert!(!rendered.contains("s3cret"));
    }

    #[test]
    fn test_primary_key_is_160_bit_hex() {
        let keys = derive_keys(None, &QueryRequest::new("SELECT 1"), &connection()).unwrap();
        assert_eq!(keys.primary_key.len(), PRIMARY_KEY_DIGEST_LEN * 2);
        assert!(keys.primary_key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_explicit_key_used_verbatim() {
        let request = QueryRequest::new("SELECT 1");
        let keys = derive_keys(Some("report:daily"), &request, &connection()).unwrap();
        assert_eq!(keys.primary_key, "report:daily");
        assert_eq!(keys.identity, identity_string(&request, &connection()).unwrap());
    }

    #[test]
    fn test_parameter_types_change_identity() {
        let base = QueryRequest::new("SELECT ?").bind(1i64);
        let typed = base
            .clone()
            .with_type(ParamKey::Position(0), ParamType::String);
        let a = derive_keys(None, &base, &connection()).unwrap();
        let b = derive_keys(None, &typed, &connection()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_value_type_changes_identity() {
        let int = QueryRequest::new("SELECT ?").bind(1i64);
        let text = QueryRequest::new("SELECT ?").bind("1");
        assert_ne!(
            derive_keys(None, &int, &connection()).unwrap().primary_key,
            derive_keys(None, &text, &connection()).unwrap().primary_key
        );
    }

    #[test]
    fn test_connection_changes_identity() {
        let request = QueryRequest::new("SELECT 1");
        let other = connection().with_database("other");
        assert_ne!(
            derive_keys(None, &request, &connection()).unwrap(),
            derive_keys(None, &request, &other).unwrap()
        );
    }

    #[test]
    fn test_sql_with_separator_is_unambiguous() {
        let tricky = QueryRequest::new("SELECT '&params=[]'");
        let plain = QueryRequest::new("SELECT ''");
        assert_ne!(
            identity_string(&tricky, &connection()).unwrap(),
            identity_string(&plain, &connection()).unwrap()
        );
    }

    #[test]
    fn test_digest_is_truncated_blake3() {
        let identity = "sql=\"SELECT 1\"";
        assert_eq!(digest_identity(identity), digest_identity(identity));
        assert_eq!(
            &hex::encode(blake3::hash(identity.as_bytes()).as_bytes())[..40],
            digest_identity(identity)
        );
    }

    #[test]
    fn test_non_finite_float_params_are_distinct() {
        let sql = "SELECT label FROM bounds WHERE x < ?";
        let keys: Vec<CacheKeys> = [f64::INFINITY, f64::NEG_INFINITY, f64::NAN, f64::MAX]
            .into_iter()
            .map(|v| derive_keys(None, &QueryRequest::new(sql).bind(v), &connection()).unwrap())
            .collect();
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(a.primary_key, b.primary_key);
                assert_ne!(a.identity, b.identity);
            }
        }
    }

    #[test]
    fn test_nan_param_is_deterministic() {
        let request = QueryRequest::new("SELECT ?").bind(f64::NAN);
        assert_eq!(
            derive_keys(None, &request, &connection()).unwrap(),
            derive_keys(None, &request, &connection()).unwrap()
        );
    }

    fn arb_param() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            any::<f64>().prop_map(Value::Float),
            prop_oneof![
                Just(f64::NAN),
                Just(f64::INFINITY),
                Just(f64::NEG_INFINITY),
                Just(-0.0),
                Just(0.0),
            ]
            .prop_map(Value::Float),
            "[ -~]{0,8}".prop_map(Value::Text),
            prop::collection::vec(any::<u8>(), 0..8).prop_map(Value::Bytes),
        ]
    }

    proptest! {
        #[test]
        fn prop_unequal_params_give_unequal_identities(a in arb_param(), b in arb_param()) {
            let one = QueryRequest::new("SELECT ?").bind(a.clone());
            let two = QueryRequest::new("SELECT ?").bind(b.clone());
            let first = identity_string(&one, &connection()).unwrap();
            let second = identity_string(&two, &connection()).unwrap();
            prop_assert_eq!(a == b, first == second);
        }

        #[test]
        fn prop_float_params_are_deterministic(v in any::<f64>()) {
            let request = QueryRequest::new("SELECT ?").bind(v);
            prop_assert_eq!(
                derive_keys(None, &request, &connection()).unwrap(),
                derive_keys(None, &request.clone(), &connection()).unwrap()
            );
        }

        #[test]
        fn prop_derivation_is_deterministic(
            sql in ".{0,64}",
            ints in prop::collection::vec(any::<i64>(), 0..6),
            host in "[a-z]{1,12}",
        ) {
            let mut request = QueryRequest::new(sql);
            for v in &ints {
                request = request.bind(*v);
            }
            let conn = ConnectionIdentity::new().with_host(host);
            let first = derive_keys(None, &request, &conn).unwrap();
            let second = derive_keys(None, &request.clone(), &conn.clone()).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_attribute_order_irrelevant(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
            let one = ConnectionIdentity::new().with_host(a.clone()).with_user(b.clone());
            let two = ConnectionIdentity::new().with_user(b).with_host(a);
            prop_assert_eq!(one.digest().unwrap(), two.digest().unwrap());
        }
    }
}
