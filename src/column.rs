//! Column values and the JSON column codec
//!
//! Rows exchanged with the host persistence layer are maps of column name to
//! [`SqlValue`]. Mapping-valued columns (`raw_object`, `meta`, `raw_diff`)
//! go through [`encode_json_column`] / [`decode_json_column`]:
//!
//! - an absent mapping encodes to SQL `NULL`, a present one (even empty) to a
//!   JSON object string;
//! - `NULL` decodes to an absent mapping, text and bytes are parsed as JSON.

use crate::error::{ChangeLogError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Field name → value mapping stored in JSON columns
pub type JsonMap = serde_json::Map<String, Value>;

/// A persisted row: column name → value
pub type Row = BTreeMap<String, SqlValue>;

/// A single column value as the host persistence layer stores it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "value")]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    /// A value the backend keeps as structured JSON
    Json(Value),
}

impl SqlValue {
    /// Whether this is SQL `NULL`
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Text payload, if this is a text column
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert back into a JSON value (timestamps become RFC 3339 strings)
    pub fn to_json(&self) -> Value {
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(i) => Value::from(*i),
            SqlValue::Real(f) => Value::from(*f),
            SqlValue::Bool(b) => Value::Bool(*b),
            SqlValue::Text(s) => Value::String(s.clone()),
            SqlValue::Bytes(b) => Value::from(b.clone()),
            SqlValue::Timestamp(t) => Value::String(t.to_rfc3339()),
            SqlValue::Json(v) => v.clone(),
        }
    }
}

impl From<Value> for SqlValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Integer(i),
                None => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Json(Value::Number(n))),
            },
            Value::String(s) => SqlValue::Text(s),
            other => SqlValue::Json(other),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(value)
    }
}

/// Encode an optional mapping for a JSON column
pub fn encode_json_column(map: Option<&JsonMap>) -> Result<SqlValue> {
    match map {
        None => Ok(SqlValue::Null),
        Some(m) => Ok(SqlValue::Text(serde_json::to_string(m)?)),
    }
}

/// Decode a JSON column back into an optional mapping
///
/// `column` is only used for error messages.
pub fn decode_json_column(column: &str, value: &SqlValue) -> Result<Option<JsonMap>> {
    let parsed: Option<JsonMap> = match value {
        SqlValue::Null => return Ok(None),
        SqlValue::Text(s) => serde_json::from_str(s),
        SqlValue::Bytes(b) => serde_json::from_slice(b),
        // Anything else is re-encoded and parsed like a stored payload
        other => serde_json::from_value(other.to_json()),
    }
    .map_err(|e| ChangeLogError::Decode {
        column: column.to_string(),
        reason: e.to_string(),
    })?;
    Ok(parsed)
}
