//! # quarry-db: Async Data Access Layer for Quarry
//!
//! Connection pooling, sessions, table creation and generic CRUD over any
//! [`Entity`](quarry_core::Entity), backed by SQLite through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Quarry Data Flow                                 │
//! │                                                                         │
//! │  Request handler (create user, list addresses, ...)                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     quarry-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  operations   │    │    schema    │  │   │
//! │  │   │   (pool.rs)   │    │               │    │              │  │   │
//! │  │   │               │    │ create_one    │    │ create_schema│  │   │
//! │  │   │ SqlitePool    │◄───│ read_query    │    │ drop_schema  │  │   │
//! │  │   │ Session       │    │ update_one    │    │ introspection│  │   │
//! │  │   │ close()       │    │ delete_many   │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - The `Database` handle: open, sessions, close
//! - [`session`] - Transactions and their lifecycle
//! - [`schema`] - Table creation, teardown and introspection
//! - [`operations`] - Generic create/read/update/delete
//! - [`health`] - Status and uptime reporting
//! - [`error`] - Connection, schema and data error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use quarry_core::{DbSettings, Query, Direction, OnMultiple};
//! use quarry_db::Database;
//!
//! let config = DbSettings::from_env()?.validate()?;
//! let db = Database::open(config).await?;
//! db.create_schema(&[User::schema()]).await?;
//!
//! let ada = db.create_one(User::new("Ada", "ada@example.com")).await?;
//! let page = db
//!     .read_query(&Query::<User>::new().order_by("email", Direction::Asc), 0, 50)
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod health;
pub mod operations;
pub mod pool;
pub mod schema;
pub mod session;
mod sql;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{ConnectionError, DataError, SchemaError};
pub use health::{HealthMonitor, HealthReport, ServingStatus};
pub use pool::Database;
pub use session::{Session, SessionState};

// =============================================================================
// Logging
// =============================================================================

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,quarry=debug,sqlx=warn";

/// Installs a `tracing` subscriber for binaries.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=quarry_db=trace` - Show every statement and session transition
/// - Default: [`DEFAULT_LOG_FILTER`]
///
/// Calling it twice is harmless.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
