//! # Dynamic Values
//!
//! Column values and records, the schema-agnostic currency between entities
//! and the store.
//!
//! ## Type Mapping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   ColumnType      Value variant        SQLite storage                  │
//! │   ───────────     ─────────────        ──────────────                  │
//! │   Integer         Value::Integer       INTEGER                         │
//! │   Real            Value::Real          REAL                            │
//! │   Text            Value::Text          TEXT / VARCHAR(n)               │
//! │   Boolean         Value::Boolean       BOOLEAN (0 / 1)                 │
//! │   Timestamp       Value::Timestamp     TIMESTAMP (RFC 3339 text)       │
//! │   Blob            Value::Blob          BLOB                            │
//! │   (any, nullable) Value::Null          NULL                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::error::{EntityError, EntityResult};

// =============================================================================
// Column Type
// =============================================================================

/// The declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Boolean,
    Timestamp,
    Blob,
}

impl ColumnType {
    /// Returns the SQL type used in `CREATE TABLE`.
    ///
    /// `max_length` only affects text columns (`VARCHAR(n)`).
    pub fn sql_type(&self, max_length: Option<usize>) -> String {
        match (self, max_length) {
            (ColumnType::Integer, _) => "INTEGER".to_string(),
            (ColumnType::Real, _) => "REAL".to_string(),
            (ColumnType::Text, Some(len)) => format!("VARCHAR({len})"),
            (ColumnType::Text, None) => "TEXT".to_string(),
            (ColumnType::Boolean, _) => "BOOLEAN".to_string(),
            (ColumnType::Timestamp, _) => "TIMESTAMP".to_string(),
            (ColumnType::Blob, _) => "BLOB".to_string(),
        }
    }

    /// Human-readable name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Real => "real",
            ColumnType::Text => "text",
            ColumnType::Boolean => "boolean",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Blob => "blob",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Value
// =============================================================================

/// A single column value.
///
/// Serializes untagged, so a record renders as a plain JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Timestamp(DateTime<Utc>),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// Returns true for [`Value::Null`].
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The column type this value naturally belongs to (`None` for null).
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(ColumnType::Boolean),
            Value::Integer(_) => Some(ColumnType::Integer),
            Value::Real(_) => Some(ColumnType::Real),
            Value::Timestamp(_) => Some(ColumnType::Timestamp),
            Value::Text(_) => Some(ColumnType::Text),
            Value::Blob(_) => Some(ColumnType::Blob),
        }
    }

    /// Name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        self.column_type().map(|t| t.name()).unwrap_or("null")
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(r) => Some(*r),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Converts this value so it fits `target`, or returns `None`.
    ///
    /// ## Accepted Conversions
    /// - Null fits every type (nullability is checked elsewhere)
    /// - Integer → Real
    /// - Integer 0 / 1 → Boolean
    /// - RFC 3339 Text → Timestamp
    ///
    /// Anything else must already match.
    pub fn coerce_to(&self, target: ColumnType) -> Option<Value> {
        match (self, target) {
            (Value::Null, _) => Some(Value::Null),
            (Value::Integer(i), ColumnType::Real) => Some(Value::Real(*i as f64)),
            (Value::Integer(0), ColumnType::Boolean) => Some(Value::Boolean(false)),
            (Value::Integer(1), ColumnType::Boolean) => Some(Value::Boolean(true)),
            (Value::Text(s), ColumnType::Timestamp) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|ts| Value::Timestamp(ts.with_timezone(&Utc))),
            (value, target) if value.column_type() == Some(target) => Some(value.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Value::Text(s) => f.write_str(s),
            Value::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Text(value.clone())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Blob(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Text(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

// =============================================================================
// Record
// =============================================================================

/// A row: column name → value.
///
/// Ordered by column name so that debug output and serialized JSON are
/// stable.
///
/// ## Reading Columns In `from_record`
/// ```rust
/// use quarry_core::{Record, Value};
///
/// let record = Record::new()
///     .with("first_name", "Ada")
///     .with("email", Value::Null);
///
/// assert_eq!(record.get_text("first_name").unwrap(), "Ada");
/// assert_eq!(record.get_opt_text("email").unwrap(), None);
/// assert!(record.get_text("last_name").is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Record(BTreeMap::new())
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(column.into(), value.into());
        self
    }

    /// Inserts a value, returning the previous one.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(column.into(), value.into())
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.0.remove(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Copies every column of `other` into `self`, overwriting.
    pub fn merge(&mut self, other: Record) {
        self.0.extend(other.0);
    }

    /// True when the column is absent or null.
    pub fn is_missing(&self, column: &str) -> bool {
        self.get(column).map(Value::is_null).unwrap_or(true)
    }

    fn require(&self, column: &str) -> EntityResult<&Value> {
        self.get(column).ok_or_else(|| EntityError::MissingColumn {
            column: column.to_string(),
        })
    }

    fn wrong_type(column: &str, expected: &str, found: &Value) -> EntityError {
        EntityError::WrongType {
            column: column.to_string(),
            expected: expected.to_string(),
            found: found.type_name().to_string(),
        }
    }

    /// Reads a non-null text column.
    pub fn get_text(&self, column: &str) -> EntityResult<String> {
        match self.require(column)? {
            Value::Text(s) => Ok(s.clone()),
            other => Err(Self::wrong_type(column, "text", other)),
        }
    }

    /// Reads a nullable text column. A missing column reads as `None`.
    pub fn get_opt_text(&self, column: &str) -> EntityResult<Option<String>> {
        match self.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Text(s)) => Ok(Some(s.clone())),
            Some(other) => Err(Self::wrong_type(column, "text", other)),
        }
    }

    /// Reads a non-null integer column.
    pub fn get_i64(&self, column: &str) -> EntityResult<i64> {
        match self.require(column)? {
            Value::Integer(i) => Ok(*i),
            other => Err(Self::wrong_type(column, "integer", other)),
        }
    }

    /// Reads a nullable integer column.
    pub fn get_opt_i64(&self, column: &str) -> EntityResult<Option<i64>> {
        match self.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Integer(i)) => Ok(Some(*i)),
            Some(other) => Err(Self::wrong_type(column, "integer", other)),
        }
    }

    /// Reads a non-null real column (integers are widened).
    pub fn get_f64(&self, column: &str) -> EntityResult<f64> {
        let value = self.require(column)?;
        value
            .as_f64()
            .ok_or_else(|| Self::wrong_type(column, "real", value))
    }

    /// Reads a non-null boolean column.
    pub fn get_bool(&self, column: &str) -> EntityResult<bool> {
        match self.require(column)? {
            Value::Boolean(b) => Ok(*b),
            Value::Integer(0) => Ok(false),
            Value::Integer(1) => Ok(true),
            other => Err(Self::wrong_type(column, "boolean", other)),
        }
    }

    /// Reads a non-null timestamp column.
    pub fn get_timestamp(&self, column: &str) -> EntityResult<DateTime<Utc>> {
        let value = self.require(column)?;
        value
            .coerce_to(ColumnType::Timestamp)
            .and_then(|v| v.as_timestamp())
            .ok_or_else(|| Self::wrong_type(column, "timestamp", value))
    }

    /// Reads a nullable timestamp column.
    pub fn get_opt_timestamp(&self, column: &str) -> EntityResult<Option<DateTime<Utc>>> {
        if self.is_missing(column) {
            return Ok(None);
        }
        self.get_timestamp(column).map(Some)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
