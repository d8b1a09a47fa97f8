//! Stored rows/documents

use crate::error::SchemaError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Primary key of a stored record
///
/// Relational backends use integers, document backends use text keys.
/// Integers order before text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    /// Integer key
    Int(i64),
    /// Text key
    Text(String),
}

impl RecordId {
    /// Read id from a JSON value
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .ok_or_else(|| SchemaError::InvalidId(n.to_string())),
            Value::String(s) => Ok(Self::Text(s.clone())),
            other => Err(SchemaError::InvalidId(other.to_string())),
        }
    }

    /// Convert into a JSON value
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(i) => Value::from(*i),
            Self::Text(s) => Value::String(s.clone()),
        }
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl From<i32> for RecordId {
    fn from(id: i32) -> Self {
        Self::Int(i64::from(id))
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A stored row/document: its identity plus every other column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Primary key
    pub id: RecordId,
    /// Remaining columns
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

impl Record {
    /// Create record without values
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            values: Map::new(),
        }
    }

    /// Split a flat JSON object into id and values
    pub fn from_object(mut object: Map<String, Value>) -> Result<Self, SchemaError> {
        let id = object.remove("id").ok_or(SchemaError::MissingId)?;
        Ok(Self {
            id: RecordId::from_value(&id)?,
            values: object,
        })
    }

    /// Flatten back into a single JSON object
    #[must_use]
    pub fn into_object(self) -> Map<String, Value> {
        let mut object = Map::with_capacity(self.values.len() + 1);
        object.insert("id".to_string(), self.id.to_value());
        object.extend(self.values);
        object
    }

    /// With column value
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: Value) -> Self {
        self.values.insert(column.into(), value);
        self
    }

    /// Get column value
    #[inline]
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Set column value
    pub fn insert(&mut self, column: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(column.into(), value)
    }

    /// Remove column value
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.values.remove(column)
    }

    /// Copy the listed columns, missing ones as null
    #[must_use]
    pub fn pick(&self, columns: &[String]) -> Map<String, Value> {
        columns
            .iter()
            .map(|c| (c.clone(), self.values.get(c).cloned().unwrap_or(Value::Null)))
            .collect()
    }

    /// Decode a column stored as JSON text in place
    ///
    /// Values that are not strings are left untouched.
    pub fn decode_column(&mut self, column: &str) -> Result<(), SchemaError> {
        if let Some(Value::String(raw)) = self.values.get(column) {
            let decoded = serde_json::from_str(raw)
                .map_err(|e| SchemaError::malformed_value(column, e))?;
            self.values.insert(column.to_string(), decoded);
        }
        Ok(())
    }
}
