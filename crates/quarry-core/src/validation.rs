//! # Validation Module
//!
//! Checks records and identifiers against a [`TableSchema`] before any SQL
//! is generated.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller                                                       │
//! │  └── Request parsing, email syntax, business rules                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (before SQL)                                     │
//! │  ├── Identifiers are plain names (no quoting tricks)                   │
//! │  ├── Every column belongs to the table                                 │
//! │  ├── Value types fit the column types                                  │
//! │  └── NOT NULL and max length                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE constraints                                                │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use quarry_core::schema::{ColumnDef, TableSchema};
//! use quarry_core::validation::validate_update;
//! use quarry_core::{ColumnType, Record};
//!
//! let schema = TableSchema::new("users")
//!     .column(ColumnDef::new("first_name", ColumnType::Text).max_length(5));
//!
//! assert!(validate_update(&schema, Record::new().with("first_name", "Ada")).is_ok());
//! assert!(validate_update(&schema, Record::new().with("first_name", "Adelaide")).is_err());
//! assert!(validate_update(&schema, Record::new().with("nickname", "A")).is_err());
//! ```

use crate::error::ValidationError;
use crate::schema::{
    ColumnDef, KeyStrategy, TableSchema, DATE_CREATED_COLUMN, PRIMARY_KEY_COLUMN,
};
use crate::value::{Record, Value};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest identifier accepted for tables and columns.
pub const MAX_IDENTIFIER_LEN: usize = 63;

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates a table or column name.
///
/// ## Rules
/// - Must not be empty
/// - At most 63 characters
/// - ASCII letters, digits and underscores; must not start with a digit
///
/// ## Example
/// ```rust
/// use quarry_core::validation::validate_identifier;
///
/// assert!(validate_identifier("column", "first_name").is_ok());
/// assert!(validate_identifier("column", "1st").is_err());
/// assert!(validate_identifier("column", "a\"b").is_err());
/// ```
pub fn validate_identifier(field: &str, name: &str) -> ValidationResult<()> {
    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_IDENTIFIER_LEN,
        });
    }

    let mut chars = name.chars();
    let first_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if !first_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: format!(
                "'{name}' must contain only letters, numbers and underscores, and not start with a number"
            ),
        });
    }

    Ok(())
}

// =============================================================================
// Record Validators
// =============================================================================

/// Looks up a column, rejecting names that aren't on the table.
pub fn require_column<'a>(schema: &'a TableSchema, column: &str) -> ValidationResult<&'a ColumnDef> {
    schema
        .column_def(column)
        .ok_or_else(|| ValidationError::UnknownColumn {
            table: schema.name().to_string(),
            column: column.to_string(),
        })
}

/// Checks a single value against its column and returns the coerced value.
pub fn validate_value(column: &ColumnDef, value: &Value) -> ValidationResult<Value> {
    if value.is_null() && !column.nullable {
        return Err(ValidationError::Required {
            field: column.name.clone(),
        });
    }

    let coerced = value
        .coerce_to(column.column_type)
        .ok_or_else(|| ValidationError::TypeMismatch {
            column: column.name.clone(),
            expected: column.column_type.name().to_string(),
            found: value.type_name().to_string(),
        })?;

    if let (Some(max), Value::Text(text)) = (column.max_length, &coerced) {
        if text.chars().count() > max {
            return Err(ValidationError::TooLong {
                field: column.name.clone(),
                max,
            });
        }
    }

    Ok(coerced)
}

/// Validates a full record for insert.
///
/// ## Rules
/// - Every column in the record belongs to the table
/// - Every value fits its column
/// - Every NOT NULL column is present (the store-assigned key of an
///   `AutoIncrement` table is exempt)
///
/// Call after [`prepare_insert`](crate::entity::prepare_insert) so the key
/// and timestamps are already filled in.
pub fn validate_insert(schema: &TableSchema, record: Record) -> ValidationResult<Record> {
    let mut validated = Record::new();
    for (name, value) in record {
        let column = require_column(schema, &name)?;
        let value = validate_value(column, &value)?;
        validated.insert(name, value);
    }

    for column in schema.columns() {
        if column.nullable || validated.contains(&column.name) {
            continue;
        }
        let store_assigned =
            column.primary_key && schema.strategy() == KeyStrategy::AutoIncrement;
        if !store_assigned {
            return Err(ValidationError::Required {
                field: column.name.clone(),
            });
        }
    }

    Ok(validated)
}

/// Validates a partial update.
///
/// ## Rules
/// - Every column belongs to the table
/// - `pkid` and `date_created` cannot be changed
/// - Every value fits its column
pub fn validate_update(schema: &TableSchema, values: Record) -> ValidationResult<Record> {
    let mut validated = Record::new();
    for (name, value) in values {
        let column = require_column(schema, &name)?;
        if column.primary_key || name == DATE_CREATED_COLUMN {
            return Err(ValidationError::Immutable { column: name });
        }
        let value = validate_value(column, &value)?;
        validated.insert(name, value);
    }
    Ok(validated)
}

/// Validates a record id against the primary key column type.
pub fn validate_key(schema: &TableSchema, key: &Value) -> ValidationResult<Value> {
    let column = schema
        .column_def(PRIMARY_KEY_COLUMN)
        .ok_or_else(|| ValidationError::MissingPrimaryKey {
            table: schema.name().to_string(),
        })?;
    validate_value(column, key)
}

// =============================================================================
// Unit Tests
// =============================================================================
