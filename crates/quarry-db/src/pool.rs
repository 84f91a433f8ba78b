//! # Database Handle and Pool Management
//!
//! Connection pool creation, session checkout and shutdown.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  Process Startup                                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbSettings::validate() → DbConfig                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::open(config).await ← Create pool, prove reachability        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │  pool_size +              │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  max_overflow             │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       │ acquire_session(): wait at most pool_timeout_seconds           │
//! │       ▼                                                                 │
//! │  Request 1 ──► Session(Conn1) ──► commit / rollback ──► returned       │
//! │  Request 2 ──► Session(Conn2) ──► commit / rollback ──► returned       │
//! │  Request 3 ──► waits for a free connection                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! SQLite WAL (Write-Ahead Logging) mode is enabled so readers don't block
//! the writer and the writer doesn't block readers.

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{ConnectOptions, SqlitePool};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, info};

use quarry_core::{DbConfig, TableSchema};

use crate::error::{ConnectionError, ConnectionResult};
use crate::session::Session;

/// Idle time before a pooled file connection is closed.
const IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Tables created through this handle, by name.
pub(crate) type Registry = BTreeMap<String, TableSchema>;

// =============================================================================
// Database
// =============================================================================

/// The process-wide handle to the backing store.
///
/// Cloning is cheap: every clone shares the same pool, registry and closed
/// flag. Opening a second handle from the same configuration is legal and
/// gives an independent pool.
///
/// ## Usage
/// ```rust,ignore
/// let config = DbSettings::new("sqlite://app.db").validate()?;
/// let db = Database::open(config).await?;
///
/// db.create_schema(&[User::schema(), Address::schema()]).await?;
/// let user = db.create_one(User::new("Ada", "ada@example.com")).await?;
///
/// db.close().await;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    pool: SqlitePool,
    config: DbConfig,
    registry: RwLock<Registry>,
    closed: AtomicBool,
}

impl Database {
    /// Opens the store and builds the connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite:
    ///    - WAL mode for concurrent reads
    ///    - NORMAL synchronous (balance of safety/speed)
    ///    - Foreign keys enabled
    ///    - Busy timeout equal to the pool timeout
    /// 3. Creates the pool and opens one connection to prove the store is
    ///    reachable
    ///
    /// ## Errors
    /// * `ConnectionError::Timeout` - opening took longer than `pool_timeout_seconds`
    /// * `ConnectionError::Unreachable` - the file can't be opened or created
    pub async fn open(config: DbConfig) -> ConnectionResult<Self> {
        info!(uri = %config.redacted_uri(), "Opening database");

        let mut connect_options = SqliteConnectOptions::from_str(config.uri())
            .map_err(|e| ConnectionError::Unreachable(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(config.pool_timeout())
            .create_if_missing(true);
        if !config.echo() {
            connect_options = connect_options.disable_statement_logging();
        }

        debug!("Connection options configured");

        // An in-memory database lives only as long as one of its
        // connections, so keep one open for the lifetime of the pool.
        // Shared-cache connections lock whole tables, so use just that one.
        let (max_connections, idle_timeout, max_lifetime) = if config.is_memory() {
            (1, None, None)
        } else {
            let recycle = config.pool_recycle();
            (
                config.max_connections(),
                Some(IDLE_TIMEOUT),
                (!recycle.is_zero()).then_some(recycle),
            )
        };

        let pool_options = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .acquire_timeout(config.pool_timeout())
            .idle_timeout(idle_timeout)
            .max_lifetime(max_lifetime)
            .test_before_acquire(config.pool_pre_ping());

        let pool = tokio::time::timeout(
            config.pool_timeout(),
            pool_options.connect_with(connect_options),
        )
        .await
        .map_err(|_| {
            ConnectionError::Timeout(format!(
                "opening the store took longer than {}s",
                config.pool_timeout().as_secs()
            ))
        })?
        .map_err(ConnectionError::from)?;

        info!(
            max_connections,
            timeout_secs = config.pool_timeout().as_secs(),
            "Database pool created"
        );

        Ok(Database {
            inner: Arc::new(Inner {
                pool,
                config,
                registry: RwLock::new(Registry::new()),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Checks out a connection and begins a transaction on it.
    ///
    /// Waits at most `pool_timeout_seconds` for a free connection.
    ///
    /// ## Errors
    /// * `ConnectionError::Closed` - `close()` was called
    /// * `ConnectionError::Timeout` - no connection became free in time
    pub async fn acquire_session(&self) -> ConnectionResult<Session> {
        self.ensure_open()?;
        let tx = self.inner.pool.begin().await?;
        Ok(Session::new(tx, self.inner.config.echo()))
    }

    /// Returns a reference to the connection pool.
    ///
    /// ## Usage
    /// For statements the generic operations don't cover. Prefer the
    /// operations on `Database` when they fit.
    pub fn pool(&self) -> &SqlitePool {
        &self.inner.pool
    }

    pub fn config(&self) -> &DbConfig {
        &self.inner.config
    }

    /// Closes the pool.
    ///
    /// Waits for checked-out connections to be returned. Every later
    /// operation on this handle or its clones fails with
    /// `ConnectionError::Closed`.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            debug!("Database already closed");
            return;
        }
        info!("Closing database connection pool");
        self.inner.pool.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst) || self.inner.pool.is_closed()
    }

    /// Runs `SELECT 1` against the pool.
    pub async fn ping(&self) -> ConnectionResult<()> {
        self.ensure_open()?;
        sqlx::query("SELECT 1").execute(&self.inner.pool).await?;
        Ok(())
    }

    pub(crate) fn ensure_open(&self) -> ConnectionResult<()> {
        if self.is_closed() {
            Err(ConnectionError::Closed)
        } else {
            Ok(())
        }
    }

    pub(crate) fn registry(&self) -> RwLockReadGuard<'_, Registry> {
        self.inner
            .registry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn registry_mut(&self) -> RwLockWriteGuard<'_, Registry> {
        self.inner
            .registry
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
