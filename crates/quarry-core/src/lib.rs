//! # quarry-core: Pure Building Blocks for Quarry
//!
//! This crate holds everything about Quarry that can be expressed without
//! touching a database: configuration, the entity contract, table schemas,
//! dynamic values, queries and validation.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Quarry Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Application (request handlers, scripts)            │   │
//! │  │      defines entities ──► calls create/read/update/delete       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ quarry-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  config   │  │  entity   │  │   value   │  │   query   │  │   │
//! │  │   │ DbSettings│  │  Entity   │  │   Value   │  │   Query   │  │   │
//! │  │   │ DbConfig  │  │TableSchema│  │  Record   │  │  Filter   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 quarry-db (Data Access Layer)                   │   │
//! │  │        pool, sessions, schema creation, generic CRUD            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Connection settings and their validation
//! - [`entity`] - The `Entity` trait and base columns
//! - [`schema`] - Table and column definitions
//! - [`value`] - Dynamic `Value` and `Record`
//! - [`query`] - Filters and ordering for reads
//! - [`validation`] - Checks records against a schema
//! - [`error`] - Error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: nothing here performs I/O
//! 2. **Schema-Agnostic**: operations work on any entity through `Record`
//! 3. **Validated Early**: identifiers and values are checked before SQL exists
//! 4. **Explicit Errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod entity;
pub mod error;
pub mod query;
pub mod schema;
pub mod validation;
pub mod value;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use config::{DbConfig, DbSettings};
pub use entity::{Entity, EntityBase};
pub use error::{ConfigError, EntityError, ValidationError};
pub use query::{Comparison, Direction, Filter, OnMultiple, OrderBy, Query};
pub use schema::{
    ColumnDef, ColumnMeta, KeyStrategy, TableSchema, DATE_CREATED_COLUMN, DATE_UPDATED_COLUMN,
    PRIMARY_KEY_COLUMN,
};
pub use value::{ColumnType, Record, Value};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// SQLite's limit on bound parameters in a single statement.
///
/// Bulk writes size their chunks so that `rows * columns` never exceeds it.
pub const MAX_BIND_PARAMETERS: usize = 32_766;
