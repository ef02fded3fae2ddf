//! Query requests and bound parameter type tags.

use serde::{Deserialize, Serialize};

use crate::error::{QueryCacheResult, ValidationError};
use crate::value::Value;

/// Type tag of a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamType {
    Null,
    Boolean,
    Integer,
    Float,
    String,
    Binary,
    LargeObject,
    Date,
    DateTime,
    Json,
}

/// Process-wide tag table: `(tag, stable code, name)`.
///
/// Codes are part of the canonical key serialization and must never be
/// renumbered.
pub const PARAM_TYPE_TABLE: &[(ParamType, i32, &str)] = &[
    (ParamType::Null, 0, "null"),
    (ParamType::Integer, 1, "integer"),
    (ParamType::String, 2, "string"),
    (ParamType::LargeObject, 3, "lob"),
    (ParamType::Boolean, 5, "boolean"),
    (ParamType::Binary, 16, "binary"),
    (ParamType::Float, 17, "float"),
    (ParamType::Date, 20, "date"),
    (ParamType::DateTime, 21, "datetime"),
    (ParamType::Json, 30, "json"),
];

impl ParamType {
    pub fn code(&self) -> i32 {
        PARAM_TYPE_TABLE
            .iter()
            .find(|(t, _, _)| t == self)
            .map(|(_, code, _)| *code)
            .unwrap_or_default()
    }

    pub fn name(&self) -> &'static str {
        PARAM_TYPE_TABLE
            .iter()
            .find(|(t, _, _)| t == self)
            .map(|(_, _, name)| *name)
            .unwrap_or("null")
    }

    pub fn from_code(code: i32) -> QueryCacheResult<Self> {
        PARAM_TYPE_TABLE
            .iter()
            .find(|(_, c, _)| *c == code)
            .map(|(t, _, _)| *t)
            .ok_or_else(|| ValidationError::UnknownParamType { code }.into())
    }

    /// Natural tag for a value when the caller gave none.
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Null => ParamType::Null,
            Value::Bool(_) => ParamType::Boolean,
            Value::Int(_) => ParamType::Integer,
            Value::Float(_) => ParamType::Float,
            Value::Text(_) => ParamType::String,
            Value::Bytes(_) => ParamType::Binary,
        }
    }
}

/// Binding slot of a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamKey {
    Position(usize),
    Named(String),
}

/// SQL text plus its bound parameters and type tags, in binding order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    pub sql: String,
    pub params: Vec<(ParamKey, Value)>,
    pub types: Vec<(ParamKey, ParamType)>,
}

impl QueryRequest {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            types: Vec::new(),
        }
    }

    /// Bind the next positional parameter.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        let position = self
            .params
            .iter()
            .filter(|(k, _)| matches!(k, ParamKey::Position(_)))
            .count();
        self.params.push((ParamKey::Position(position), value.into()));
        self
    }

    /// Bind a named parameter.
    pub fn bind_named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.push((ParamKey::Named(name.into()), value.into()));
        self
    }

    /// Attach an explicit type tag to a binding slot.
    pub fn with_type(mut self, key: ParamKey, param_type: ParamType) -> Self {
        self.types.push((key, param_type));
        self
    }
}
