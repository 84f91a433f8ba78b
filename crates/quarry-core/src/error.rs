//! # Error Types
//!
//! Error types for quarry-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  quarry-core errors (this file)                                        │
//! │  ├── ConfigError      - Bad connection settings (fatal at startup)     │
//! │  ├── ValidationError  - Values or definitions rejected by a schema     │
//! │  └── EntityError      - Record ↔ entity conversion failures            │
//! │                                                                         │
//! │  quarry-db errors (separate crate)                                     │
//! │  ├── ConnectionError  - Unreachable store, pool timeout, closed handle │
//! │  ├── SchemaError      - Table creation failures                        │
//! │  └── DataError        - Per-operation failures                         │
//! │                                                                         │
//! │  Flow: ValidationError / EntityError → DataError → caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (table, column, value)
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Config Error
// =============================================================================

/// Connection configuration errors.
///
/// Raised by [`DbSettings::validate`](crate::config::DbSettings::validate)
/// and the settings loaders. None of these are retryable: a process that
/// hits one should refuse to start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The connection string is empty or malformed.
    ///
    /// ## When This Occurs
    /// - Empty or blank uri
    /// - No `scheme:` prefix
    /// - Scheme other than `sqlite` / `sqlite+<driver>`
    /// - No database part after the scheme
    #[error("Invalid connection uri '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    /// A numeric pool bound is negative or otherwise unusable.
    #[error("Invalid pool parameter {field} = {value}: {reason}")]
    InvalidPoolParams {
        field: String,
        value: i64,
        reason: String,
    },

    /// An environment variable could not be parsed.
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    /// A settings document (TOML / JSON) could not be parsed.
    #[error("Failed to parse settings: {0}")]
    Parse(String),
}

impl ConfigError {
    pub(crate) fn invalid_uri(uri: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidUri {
            uri: crate::config::redact_uri(uri),
            reason: reason.into(),
        }
    }

    pub(crate) fn pool_param(field: &str, value: i64, reason: impl Into<String>) -> Self {
        ConfigError::InvalidPoolParams {
            field: field.to_string(),
            value,
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Schema validation errors.
///
/// These errors occur when a record or a table definition doesn't fit a
/// [`TableSchema`](crate::schema::TableSchema). They are raised before any
/// SQL is issued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A NOT NULL column is missing or null.
    #[error("{field} is required")]
    Required { field: String },

    /// Text value is longer than the column allows.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (e.g., identifier with illegal characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., a column declared twice).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// Column does not belong to the table.
    #[error("Column '{column}' does not exist on table '{table}'")]
    UnknownColumn { table: String, column: String },

    /// Value type does not fit the column type.
    #[error("Column '{column}' expects {expected}, got {found}")]
    TypeMismatch {
        column: String,
        expected: String,
        found: String,
    },

    /// Column is managed by the data layer and cannot be set directly.
    #[error("Column '{column}' cannot be modified")]
    Immutable { column: String },

    /// Table definition has no primary key column.
    #[error("Table '{table}' has no primary key")]
    MissingPrimaryKey { table: String },
}

// =============================================================================
// Entity Error
// =============================================================================

/// Record ↔ entity conversion errors.
///
/// Returned from [`Entity::from_record`](crate::entity::Entity::from_record)
/// implementations when a stored row doesn't have the shape the entity
/// expects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityError {
    /// A required column is absent from the record.
    #[error("Record is missing column '{column}'")]
    MissingColumn { column: String },

    /// A column holds a value of the wrong type.
    #[error("Column '{column}' holds {found}, expected {expected}")]
    WrongType {
        column: String,
        expected: String,
        found: String,
    },

    /// Anything else an implementation wants to reject.
    #[error("Invalid entity: {0}")]
    Invalid(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Convenience type alias for Results with ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Convenience type alias for Results with EntityError.
pub type EntityResult<T> = Result<T, EntityError>;

// =============================================================================
// Unit Tests
// =============================================================================
