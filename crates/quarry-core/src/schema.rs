//! # Table Schema
//!
//! Static table identity for entities: name, columns, primary key.
//!
//! ## Base Columns
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every TableSchema starts with the three base columns:                  │
//! │                                                                         │
//! │   pkid          TEXT (UUID v4, client-side)    PRIMARY KEY              │
//! │                 or INTEGER (store rowid)       with KeyStrategy         │
//! │   date_created  TIMESTAMP NOT NULL             indexed                  │
//! │   date_updated  TIMESTAMP NOT NULL             indexed, refreshed on    │
//! │                                                every update             │
//! │                                                                         │
//! │  Entity-specific columns follow, in declaration order.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```rust
//! use quarry_core::schema::{ColumnDef, TableSchema};
//! use quarry_core::ColumnType;
//!
//! let users = TableSchema::new("users")
//!     .comment("User table storing user details")
//!     .column(ColumnDef::new("first_name", ColumnType::Text).max_length(50).indexed())
//!     .column(ColumnDef::new("email", ColumnType::Text).max_length(200).unique());
//!
//! assert_eq!(users.primary_keys(), vec!["pkid"]);
//! assert!(users.validate_definition().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::ValidationError;
use crate::validation::validate_identifier;
use crate::value::ColumnType;

/// Primary key column shared by every table.
pub const PRIMARY_KEY_COLUMN: &str = "pkid";

/// Creation timestamp column shared by every table.
pub const DATE_CREATED_COLUMN: &str = "date_created";

/// Update timestamp column shared by every table.
pub const DATE_UPDATED_COLUMN: &str = "date_updated";

// =============================================================================
// Key Strategy
// =============================================================================

/// Who assigns primary keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    /// UUID v4 text generated client-side before insert.
    #[default]
    Uuid,
    /// Integer rowid assigned by the store.
    AutoIncrement,
}

// =============================================================================
// Column Definition
// =============================================================================

/// A foreign key target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
}

/// A single column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub unique: bool,
    pub indexed: bool,
    pub primary_key: bool,
    pub max_length: Option<usize>,
    pub references: Option<ForeignKey>,
    pub comment: Option<String>,
}

impl ColumnDef {
    /// Creates a nullable, non-unique column.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        ColumnDef {
            name: name.into(),
            column_type,
            nullable: true,
            unique: false,
            indexed: false,
            primary_key: false,
            max_length: None,
            references: None,
            comment: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Maximum text length; enforced before insert/update.
    pub fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.references = Some(ForeignKey {
            table: table.into(),
            column: column.into(),
        });
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    fn primary(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// True for pkid, date_created and date_updated.
    pub fn is_base_column(&self) -> bool {
        matches!(
            self.name.as_str(),
            PRIMARY_KEY_COLUMN | DATE_CREATED_COLUMN | DATE_UPDATED_COLUMN
        )
    }
}

// =============================================================================
// Column Metadata (introspection output)
// =============================================================================

/// Column details as reported by introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    /// SQL type as declared, e.g. `VARCHAR(50)`.
    pub sql_type: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub indexed: bool,
    pub max_length: Option<usize>,
    /// `table.column` of the referenced key, if any.
    pub foreign_key: Option<String>,
    pub comment: Option<String>,
}

impl From<&ColumnDef> for ColumnMeta {
    fn from(col: &ColumnDef) -> Self {
        ColumnMeta {
            name: col.name.clone(),
            sql_type: col.column_type.sql_type(col.max_length),
            column_type: col.column_type,
            nullable: col.nullable,
            primary_key: col.primary_key,
            unique: col.unique,
            indexed: col.indexed,
            max_length: col.max_length,
            foreign_key: col
                .references
                .as_ref()
                .map(|fk| format!("{}.{}", fk.table, fk.column)),
            comment: col.comment.clone(),
        }
    }
}

// =============================================================================
// Table Schema
// =============================================================================

/// The stable identity of an entity's table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    name: String,
    comment: Option<String>,
    key_strategy: KeyStrategy,
    columns: Vec<ColumnDef>,
}

impl TableSchema {
    /// Creates a schema with the base columns and a UUID primary key.
    pub fn new(name: impl Into<String>) -> Self {
        TableSchema {
            name: name.into(),
            comment: None,
            key_strategy: KeyStrategy::Uuid,
            columns: vec![
                ColumnDef::new(PRIMARY_KEY_COLUMN, ColumnType::Text)
                    .max_length(36)
                    .primary(),
                ColumnDef::new(DATE_CREATED_COLUMN, ColumnType::Timestamp)
                    .not_null()
                    .indexed(),
                ColumnDef::new(DATE_UPDATED_COLUMN, ColumnType::Timestamp)
                    .not_null()
                    .indexed(),
            ],
        }
    }

    /// Switches the primary key between UUID text and store-assigned integer.
    pub fn key_strategy(mut self, strategy: KeyStrategy) -> Self {
        self.key_strategy = strategy;
        if let Some(pk) = self
            .columns
            .iter_mut()
            .find(|c| c.name == PRIMARY_KEY_COLUMN)
        {
            match strategy {
                KeyStrategy::Uuid => {
                    pk.column_type = ColumnType::Text;
                    pk.max_length = Some(36);
                }
                KeyStrategy::AutoIncrement => {
                    pk.column_type = ColumnType::Integer;
                    pk.max_length = None;
                }
            }
        }
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Appends a column.
    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn strategy(&self) -> KeyStrategy {
        self.key_strategy
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column_def(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_def(name).is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Names of the primary key columns, in declaration order.
    pub fn primary_keys(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// The single primary key column used for record ids.
    pub fn primary_key(&self) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.primary_key)
    }

    /// True if `column` identifies at most one row.
    pub fn is_unique_column(&self, column: &str) -> bool {
        self.column_def(column)
            .map(|c| c.primary_key || c.unique)
            .unwrap_or(false)
    }

    /// Introspection view of every column.
    pub fn column_details(&self) -> Vec<ColumnMeta> {
        self.columns.iter().map(ColumnMeta::from).collect()
    }

    /// Checks the definition before any DDL is generated.
    ///
    /// ## Rules
    /// - Table and column names are plain identifiers
    /// - Exactly one primary key column, named `pkid`
    /// - No column declared twice
    /// - Foreign key targets are plain identifiers
    pub fn validate_definition(&self) -> Result<(), ValidationError> {
        validate_identifier("table name", &self.name)?;

        let mut seen = HashSet::new();
        for col in &self.columns {
            validate_identifier("column name", &col.name)?;
            if !seen.insert(col.name.as_str()) {
                return Err(ValidationError::Duplicate {
                    field: format!("column on table '{}'", self.name),
                    value: col.name.clone(),
                });
            }
            if let Some(fk) = &col.references {
                validate_identifier("referenced table", &fk.table)?;
                validate_identifier("referenced column", &fk.column)?;
            }
        }

        match self.primary_keys().as_slice() {
            [PRIMARY_KEY_COLUMN] => Ok(()),
            _ => Err(ValidationError::MissingPrimaryKey {
                table: self.name.clone(),
            }),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
