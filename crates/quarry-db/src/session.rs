//! # Sessions
//!
//! A session is one pooled connection with an open transaction, exclusively
//! owned by the operation that checked it out.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Idle ──acquire_session()──► SessionAcquired ──statement──► Executing  │
//! │                                                      │          │       │
//! │                                           commit()   │          │ error │
//! │                                                      ▼          ▼       │
//! │                                               Committed    RolledBack   │
//! │                                                      │          │       │
//! │                                                      └────┬─────┘       │
//! │                                                           ▼             │
//! │                                                       Released          │
//! │                                                                         │
//! │  Dropping a session that was never committed (including a cancelled   │
//! │  operation future) rolls back and returns the connection to the pool. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{Sqlite, SqliteConnection, Transaction};
use std::fmt;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::error::{DataError, DataResult};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    SessionAcquired,
    Executing,
    Committed,
    RolledBack,
    Released,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::SessionAcquired => "session_acquired",
            SessionState::Executing => "executing",
            SessionState::Committed => "committed",
            SessionState::RolledBack => "rolled_back",
            SessionState::Released => "released",
        };
        f.write_str(name)
    }
}

/// A pooled connection with an open transaction.
///
/// `commit` and `rollback` consume the session, so a finished session can't
/// be used again.
pub struct Session {
    id: Uuid,
    tx: Option<Transaction<'static, Sqlite>>,
    state: SessionState,
    echo: bool,
}

impl Session {
    pub(crate) fn new(tx: Transaction<'static, Sqlite>, echo: bool) -> Self {
        let mut session = Session {
            id: Uuid::new_v4(),
            tx: Some(tx),
            state: SessionState::Idle,
            echo,
        };
        session.transition(SessionState::SessionAcquired);
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs caller-owned SQL inside this session's transaction.
    ///
    /// Returns the number of rows affected.
    pub async fn execute_raw(&mut self, sql: &str) -> DataResult<u64> {
        let conn = self.executing(sql)?;
        let result = sqlx::query(sql)
            .execute(conn)
            .await
            .map_err(|e| DataError::from_sqlx("raw", e))?;
        Ok(result.rows_affected())
    }

    /// Commits the transaction and returns the connection to the pool.
    pub async fn commit(mut self) -> DataResult<()> {
        let Some(tx) = self.tx.take() else {
            return Ok(());
        };
        let result = tx.commit().await;
        match result {
            Ok(()) => {
                self.transition(SessionState::Committed);
                Ok(())
            }
            Err(e) => {
                // sqlx rolls back a transaction whose commit failed.
                self.transition(SessionState::RolledBack);
                Err(DataError::from_sqlx("commit", e))
            }
        }
    }

    /// Rolls the transaction back and returns the connection to the pool.
    pub async fn rollback(mut self) -> DataResult<()> {
        let Some(tx) = self.tx.take() else {
            return Ok(());
        };
        self.transition(SessionState::RolledBack);
        tx.rollback()
            .await
            .map_err(|e| DataError::from_sqlx("rollback", e))
    }

    /// Commits on success, rolls back on failure, and hands `result` back.
    pub(crate) async fn finish<T>(self, result: DataResult<T>) -> DataResult<T> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                self.abort(&err).await;
                Err(err)
            }
        }
    }

    /// Rolls back after `cause` failed the operation. A failed rollback is
    /// logged; the connection is discarded by the pool either way.
    pub(crate) async fn abort(self, cause: &impl fmt::Display) {
        warn!(session = %self.id, error = %cause, "Operation failed, rolling back");
        if let Err(rollback_err) = self.rollback().await {
            warn!(error = %rollback_err, "Rollback failed");
        }
    }

    /// The connection to run the next statement on.
    ///
    /// Logs the statement at `info` when `echo` is on, `trace` otherwise.
    pub(crate) fn executing(&mut self, sql: &str) -> DataResult<&mut SqliteConnection> {
        if self.echo {
            info!(session = %self.id, sql = %sql, "Executing");
        } else {
            trace!(session = %self.id, sql = %sql, "Executing");
        }
        if self.state != SessionState::Executing {
            self.transition(SessionState::Executing);
        }
        self.tx
            .as_deref_mut()
            .ok_or_else(|| DataError::Query("session already finished".to_string()))
    }

    fn transition(&mut self, next: SessionState) {
        trace!(session = %self.id, from = %self.state, to = %next, "Session state");
        self.state = next;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.tx.is_some() {
            // The transaction's own Drop queues the rollback.
            debug!(session = %self.id, state = %self.state, "Session dropped unfinished, rolling back");
            self.transition(SessionState::RolledBack);
        }
        self.transition(SessionState::Released);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Database;
    use quarry_core::DbSettings;

    async fn memory_db() -> Database {
        Database::open(DbSettings::in_memory().validate().unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_commit_persists() {
        let db = memory_db().await;

        let mut session = db.acquire_session().await.unwrap();
        assert_eq!(session.state(), SessionState::SessionAcquired);
        session
            .execute_raw("CREATE TABLE t (x INTEGER)")
            .await
            .unwrap();
        session.execute_raw("INSERT INTO t VALUES (1)").await.unwrap();
        assert_eq!(session.state(), SessionState::Executing);
        session.commit().await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM t")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_rollback_and_drop_discard() {
        let db = memory_db().await;
        sqlx::query("CREATE TABLE t (x INTEGER)")
            .execute(db.pool())
            .await
            .unwrap();

        let mut session = db.acquire_session().await.unwrap();
        session.execute_raw("INSERT INTO t VALUES (1)").await.unwrap();
        session.rollback().await.unwrap();

        let mut session = db.acquire_session().await.unwrap();
        session.execute_raw("INSERT INTO t VALUES (2)").await.unwrap();
        drop(session);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM t")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
