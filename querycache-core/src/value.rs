//! Scalar values and result rows.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{QueryCacheResult, ValidationError};

/// A single scalar (or opaque binary) column value.
///
/// Serialization is externally tagged, so values of different types never
/// share a canonical form (`Int(1)` and `Text("1")` differ). Equality is
/// exact: two floats are equal only when their bit patterns are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    /// Serialized as its IEEE 754 bit pattern. Every `f64` (NaN, infinities
    /// and signed zero included) survives encoding and keeps its own form.
    Float(#[serde(with = "float_bits")] f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

mod float_bits {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.to_bits())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        u64::deserialize(deserializer).map(f64::from_bits)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One result row: ordered column names with their values.
///
/// Rows keep the column list alongside the values so that any fetch shape
/// can be produced from a cached row without consulting the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Build a row from parallel column and value lists.
    pub fn try_new(columns: Vec<String>, values: Vec<Value>) -> QueryCacheResult<Self> {
        if columns.len() != values.len() {
            return Err(ValidationError::ColumnMismatch {
                columns: columns.len(),
                values: values.len(),
            }
            .into());
        }
        Ok(Self { columns, values })
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let (columns, values) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of columns in this row.
    pub fn width(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of the named column. With duplicate names the last one wins,
    /// matching the associative projection.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .rposition(|c| c == column)
            .map(|i| &self.values[i])
    }

    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_new_rejects_mismatch() {
        let result = Row::try_new(vec!["a".into()], vec![Value::Int(1), Value::Int(2)]);
        assert!(matches!(
            result,
            Err(crate::QueryCacheError::Validation(
                ValidationError::ColumnMismatch { columns: 1, values: 2 }
            ))
        ));
    }

    #[test]
    fn test_from_pairs_preserves_order() {
        let row = Row::from_pairs([("b", 2i64), ("a", 1i64)]);
        assert_eq!(row.columns(), &["b".to_string(), "a".to_string()]);
        assert_eq!(row.values(), &[Value::Int(2), Value::Int(1)]);
        assert_eq!(row.width(), 2);
    }

    #[test]
    fn test_get_duplicate_column_last_wins() {
        let row = Row::from_pairs([("id", 1i64), ("id", 2i64)]);
        assert_eq!(row.get("id"), Some(&Value::Int(2)));
        assert_eq!(row.get_index(0), Some(&Value::Int(1)));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn test_value_serialization_is_type_preserving() {
        let int = serde_json::to_string(&Value::Int(1)).unwrap();
        let text = serde_json::to_string(&Value::Text("1".into())).unwrap();
        assert_ne!(int, text);
    }

    #[test]
    fn test_float_equality_is_bitwise() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
        assert_ne!(Value::Float(f64::INFINITY), Value::Float(f64::NEG_INFINITY));
        assert_ne!(Value::Float(1.0), Value::Int(1));
    }

    #[test]
    fn test_float_json_encoding_is_exact() {
        for v in [
            1.0715660391465826e-75,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NAN,
            -0.0,
            f64::MIN_POSITIVE,
            f64::MAX,
        ] {
            let row = Row::from_pairs([("x", v)]);
            let json = serde_json::to_string(&row).unwrap();
            let back: Row = serde_json::from_str(&json).unwrap();
            assert_eq!(back, row, "{} via {}", v, json);
        }
    }

    #[test]
    fn test_non_finite_floats_encode_distinctly() {
        let encoded: Vec<String> = [f64::INFINITY, f64::NEG_INFINITY, f64::NAN]
            .into_iter()
            .map(|v| serde_json::to_string(&Value::Float(v)).unwrap())
            .collect();
        assert!(encoded.iter().all(|e| !e.contains("null")));
        assert_ne!(encoded[0], encoded[1]);
        assert_ne!(encoded[1], encoded[2]);
        assert_ne!(encoded[0], encoded[2]);
    }

    #[test]
    fn test_option_into_value() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".into()));
    }
}
