//! # Data Layer Error Types
//!
//! Error types for connection, schema and data operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)       ValidationError / EntityError (core) │
//! │       │                                     │                           │
//! │       ▼                                     ▼                           │
//! │  ConnectionError ── pool timeout, closed handle, unreachable store     │
//! │  SchemaError ────── table creation (fatal)                             │
//! │  DataError ──────── per-operation (recoverable)                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Caller decides: retry with backoff, report, or give up                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The data layer never retries on its own.

use quarry_core::{EntityError, ValidationError};
use sqlx::error::ErrorKind;
use thiserror::Error;

// =============================================================================
// Connection Error
// =============================================================================

/// Failures reaching the store or checking out a connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The store could not be opened.
    ///
    /// ## When This Occurs
    /// - Database file can't be created or opened
    /// - File permissions issue
    /// - Disk full
    #[error("Store unreachable: {0}")]
    Unreachable(String),

    /// No connection became free within `pool_timeout_seconds`.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The handle was closed with `Database::close()`.
    #[error("Database handle is closed")]
    Closed,
}

impl ConnectionError {
    /// True if the caller may retry with backoff.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ConnectionError::Closed)
    }
}

impl From<sqlx::Error> for ConnectionError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => {
                ConnectionError::Timeout("waiting for a pooled connection".to_string())
            }
            sqlx::Error::PoolClosed => ConnectionError::Closed,
            other => ConnectionError::Unreachable(other.to_string()),
        }
    }
}

// =============================================================================
// Schema Error
// =============================================================================

/// Failures creating or dropping tables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The definition was rejected before any DDL ran.
    ///
    /// ## When This Occurs
    /// - Invalid table or column name
    /// - Duplicate column
    /// - Missing primary key
    /// - Foreign key to a table that isn't part of the schema
    #[error("Invalid definition for table '{table}': {reason}")]
    InvalidDefinition { table: String, reason: String },

    /// The store refused the DDL.
    #[error("Failed to create table '{table}': {message}")]
    CreationFailed { table: String, message: String },

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl SchemaError {
    pub(crate) fn invalid(table: &str, reason: impl ToString) -> Self {
        SchemaError::InvalidDefinition {
            table: table.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn creation_failed(table: &str, err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                SchemaError::Connection(err.into())
            }
            other => SchemaError::CreationFailed {
                table: table.to_string(),
                message: other.to_string(),
            },
        }
    }
}

// =============================================================================
// Data Error
// =============================================================================

/// Per-operation failures. All are recoverable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    /// No row with the given id.
    ///
    /// ## When This Occurs
    /// - `update_one` / `delete_one` on a missing id
    /// - Introspection of a table that was never registered
    #[error("{table} not found: {id}")]
    NotFound { table: String, id: String },

    /// A UNIQUE or PRIMARY KEY constraint was violated.
    ///
    /// `index` and `pkid` name the offending entity of a bulk insert when it
    /// could be determined.
    #[error("Conflict on {table}: {constraint}{}", describe_position(.index, .pkid))]
    Conflict {
        table: String,
        constraint: String,
        index: Option<usize>,
        pkid: Option<String>,
    },

    /// A FOREIGN KEY, NOT NULL or CHECK constraint was violated.
    #[error("Integrity violation on {table}: {message}")]
    Integrity { table: String, message: String },

    /// The request itself is unusable: unknown column, type mismatch,
    /// immutable column, zero limit.
    #[error("Invalid request: {0}")]
    Invalid(String),

    /// `OnMultiple::Fail` and more than one row matched.
    #[error("Multiple {table} rows matched a query expecting one")]
    MultipleResults { table: String },

    /// `read_query` asked for more rows than `max_page_size`.
    #[error("Page size {requested} exceeds the maximum of {max}")]
    LimitExceeded { requested: u64, max: u64 },

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Any other store failure.
    #[error("Query failed: {0}")]
    Query(String),
}

fn describe_position(index: &Option<usize>, pkid: &Option<String>) -> String {
    match (index, pkid) {
        (Some(i), Some(p)) => format!(" (batch index {i}, pkid {p})"),
        (Some(i), None) => format!(" (batch index {i})"),
        (None, Some(p)) => format!(" (pkid {p})"),
        (None, None) => String::new(),
    }
}

impl DataError {
    /// Creates a NotFound error for a table and id.
    pub fn not_found(table: impl Into<String>, id: impl ToString) -> Self {
        DataError::NotFound {
            table: table.into(),
            id: id.to_string(),
        }
    }

    /// Creates an Invalid error.
    pub fn invalid(reason: impl Into<String>) -> Self {
        DataError::Invalid(reason.into())
    }

    /// True for failures the caller can expect to clear on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DataError::Connection(e) if e.is_retryable())
    }

    /// Attaches the position of the offending entity to a `Conflict`.
    pub(crate) fn at_position(self, at: usize, key: Option<String>) -> Self {
        match self {
            DataError::Conflict {
                table, constraint, ..
            } => DataError::Conflict {
                table,
                constraint,
                index: Some(at),
                pkid: key,
            },
            other => other,
        }
    }

    /// Converts a sqlx error raised while working on `table`.
    ///
    /// ## Error Mapping
    /// ```text
    /// PoolTimedOut                      → Connection(Timeout)
    /// PoolClosed                        → Connection(Closed)
    /// Io / Tls / Configuration          → Connection(Unreachable)
    /// UNIQUE / PRIMARY KEY constraint   → Conflict
    /// FOREIGN KEY / NOT NULL / CHECK    → Integrity
    /// datatype mismatch                 → Invalid
    /// Other                             → Query
    /// ```
    pub fn from_sqlx(table: &str, err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Configuration(_)
            | sqlx::Error::WorkerCrashed => DataError::Connection(err.into()),

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                match db_err.kind() {
                    ErrorKind::UniqueViolation => DataError::Conflict {
                        table: table.to_string(),
                        constraint: msg.to_string(),
                        index: None,
                        pkid: None,
                    },
                    ErrorKind::ForeignKeyViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::CheckViolation => DataError::Integrity {
                        table: table.to_string(),
                        message: msg.to_string(),
                    },
                    _ if msg.contains("datatype mismatch") => DataError::Invalid(msg.to_string()),
                    _ => DataError::Query(msg.to_string()),
                }
            }

            other => DataError::Query(other.to_string()),
        }
    }
}

impl From<ValidationError> for DataError {
    fn from(err: ValidationError) -> Self {
        DataError::Invalid(err.to_string())
    }
}

impl From<EntityError> for DataError {
    fn from(err: EntityError) -> Self {
        DataError::Invalid(err.to_string())
    }
}

/// Result type for connection operations.
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for data operations.
pub type DataResult<T> = Result<T, DataError>;

// =============================================================================
// Unit Tests
// =============================================================================
