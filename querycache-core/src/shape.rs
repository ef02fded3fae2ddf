//! Row shapes and the single projection function shared by live and cached
//! cursors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{FetchError, QueryCacheError};
use crate::value::{Row, Value};

/// How a fetched row is materialized for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FetchShape {
    /// Column name to value mapping.
    Associative,
    /// Values only, in column order.
    Numeric,
    /// Associative entries followed by numeric entries over the same values.
    #[default]
    Mixed,
    /// First value only.
    Column,
}

impl FetchShape {
    /// All shapes the cache can replay.
    pub const ALL: [FetchShape; 4] = [
        FetchShape::Associative,
        FetchShape::Numeric,
        FetchShape::Mixed,
        FetchShape::Column,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FetchShape::Associative => "associative",
            FetchShape::Numeric => "numeric",
            FetchShape::Mixed => "mixed",
            FetchShape::Column => "column",
        }
    }

    /// Legacy numeric fetch-mode code for this shape.
    pub fn code(&self) -> i64 {
        match self {
            FetchShape::Associative => 2,
            FetchShape::Numeric => 3,
            FetchShape::Mixed => 4,
            FetchShape::Column => 7,
        }
    }

    /// Resolve a legacy numeric fetch-mode code.
    pub fn from_code(code: i64) -> Result<Self, QueryCacheError> {
        match code {
            2 => Ok(FetchShape::Associative),
            3 => Ok(FetchShape::Numeric),
            4 => Ok(FetchShape::Mixed),
            7 => Ok(FetchShape::Column),
            other => Err(unsupported(other.to_string(), "unknown fetch mode code")),
        }
    }
}

impl fmt::Display for FetchShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FetchShape {
    type Err = QueryCacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "associative" | "assoc" => Ok(FetchShape::Associative),
            "numeric" | "num" => Ok(FetchShape::Numeric),
            "mixed" | "both" => Ok(FetchShape::Mixed),
            "column" => Ok(FetchShape::Column),
            _ => Err(unsupported(s.to_string(), "not a cacheable fetch shape")),
        }
    }
}

fn unsupported(shape: String, reason: &str) -> QueryCacheError {
    FetchError::UnsupportedFetchShape {
        shape,
        reason: reason.to_string(),
    }
    .into()
}

/// Reject extra fetch-mode arguments, which no cacheable shape accepts.
pub fn ensure_no_shape_args(shape: FetchShape, args: &[Value]) -> Result<(), QueryCacheError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(unsupported(
            shape.to_string(),
            "caching does not support 2nd/3rd fetch mode arguments",
        ))
    }
}

/// Key of an entry in a [`ProjectedRow::Mixed`] row.
///
/// Names and positions live in separate namespaces, so a column literally
/// named `"0"` never shadows position 0.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKey {
    Name(String),
    Index(usize),
}

/// A row materialized in a particular [`FetchShape`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectedRow {
    Associative(Vec<(String, Value)>),
    Numeric(Vec<Value>),
    Mixed(Vec<(ColumnKey, Value)>),
    Column(Value),
}

impl ProjectedRow {
    pub fn shape(&self) -> FetchShape {
        match self {
            ProjectedRow::Associative(_) => FetchShape::Associative,
            ProjectedRow::Numeric(_) => FetchShape::Numeric,
            ProjectedRow::Mixed(_) => FetchShape::Mixed,
            ProjectedRow::Column(_) => FetchShape::Column,
        }
    }

    /// Look up a value by column name. Numeric and column rows carry no names.
    pub fn by_name(&self, name: &str) -> Option<&Value> {
        match self {
            ProjectedRow::Associative(entries) => {
                entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
            }
            ProjectedRow::Mixed(entries) => entries
                .iter()
                .find(|(k, _)| matches!(k, ColumnKey::Name(n) if n == name))
                .map(|(_, v)| v),
            ProjectedRow::Numeric(_) | ProjectedRow::Column(_) => None,
        }
    }

    /// Look up a value by position.
    pub fn by_index(&self, index: usize) -> Option<&Value> {
        match self {
            ProjectedRow::Numeric(values) => values.get(index),
            ProjectedRow::Mixed(entries) => entries
                .iter()
                .find(|(k, _)| matches!(k, ColumnKey::Index(i) if *i == index))
                .map(|(_, v)| v),
            ProjectedRow::Column(value) if index == 0 => Some(value),
            ProjectedRow::Associative(_) | ProjectedRow::Column(_) => None,
        }
    }

    /// Number of entries (a mixed row counts both views).
    pub fn len(&self) -> usize {
        match self {
            ProjectedRow::Associative(entries) => entries.len(),
            ProjectedRow::Numeric(values) => values.len(),
            ProjectedRow::Mixed(entries) => entries.len(),
            ProjectedRow::Column(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume a numeric row into its values.
    pub fn into_numeric(self) -> Option<Vec<Value>> {
        match self {
            ProjectedRow::Numeric(values) => Some(values),
            _ => None,
        }
    }
}

/// Project a row into the requested shape.
///
/// Associative projection collapses duplicate column names, keeping the
/// first position and the last value. A column projection of a zero-width
/// row yields `Value::Null`.
pub fn project(row: &Row, shape: FetchShape) -> ProjectedRow {
    match shape {
        FetchShape::Associative => ProjectedRow::Associative(associative(row)),
        FetchShape::Numeric => ProjectedRow::Numeric(row.values().to_vec()),
        FetchShape::Mixed => {
            let mut entries: Vec<(ColumnKey, Value)> = associative(row)
                .into_iter()
                .map(|(name, value)| (ColumnKey::Name(name), value))
                .collect();
            entries.extend(
                row.values()
                    .iter()
                    .enumerate()
                    .map(|(i, value)| (ColumnKey::Index(i), value.clone())),
            );
            ProjectedRow::Mixed(entries)
        }
        FetchShape::Column => {
            ProjectedRow::Column(row.get_index(0).cloned().unwrap_or(Value::Null))
        }
    }
}

fn associative(row: &Row) -> Vec<(String, Value)> {
    let mut entries: Vec<(String, Value)> = Vec::with_capacity(row.width());
    for (name, value) in row.iter() {
        match entries.iter_mut().find(|(k, _)| k == name) {
            Some(existing) => existing.1 = value.clone(),
            None => entries.push((name.to_string(), value.clone())),
        }
    }
    entries
}
