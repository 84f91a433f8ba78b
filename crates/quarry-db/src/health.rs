//! # Health Monitor
//!
//! Read-only status of a [`Database`] handle: is the store answering, how
//! long has the monitor been up, which tables are registered.
//!
//! ## Watch Stream
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  monitor.watch(interval)                                               │
//! │       │                                                                 │
//! │       ├── spawns a task ──► tick ──► check() ──► mpsc::Sender          │
//! │       │                      ▲                        │                 │
//! │       │                      └──────── loop ──────────┘                 │
//! │       ▼                                                                 │
//! │  ReceiverStream<HealthReport>                                          │
//! │                                                                         │
//! │  Dropping the stream closes the channel and ends the task.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info};

use crate::pool::Database;

/// Reports buffered per watch stream.
const WATCH_BUFFER: usize = 16;

/// Shortest interval between two watch reports.
pub const MIN_WATCH_PERIOD: Duration = Duration::from_millis(1);

/// Whether the store is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServingStatus {
    Serving,
    NotServing,
}

/// One health check result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: ServingStatus,
    pub message: String,
    pub uptime_seconds: u64,
    pub table_names: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

/// Health checks over a database handle.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    db: Database,
    started: Instant,
}

impl HealthMonitor {
    /// Starts the uptime clock.
    pub fn new(db: Database) -> Self {
        HealthMonitor {
            db,
            started: Instant::now(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Pings the store and reports the result.
    pub async fn check(&self) -> HealthReport {
        let (status, message) = match self.db.ping().await {
            Ok(()) => (ServingStatus::Serving, "Database connected".to_string()),
            Err(e) => {
                error!(error = %e, "Database health check failed");
                (ServingStatus::NotServing, format!("Database error: {e}"))
            }
        };

        HealthReport {
            status,
            message,
            uptime_seconds: self.uptime().as_secs(),
            table_names: self.db.get_table_names().unwrap_or_default(),
            checked_at: Utc::now(),
        }
    }

    /// Streams a report every `period`, starting immediately.
    ///
    /// Periods shorter than [`MIN_WATCH_PERIOD`] (including zero) are
    /// raised to it. Must be called inside a Tokio runtime.
    pub fn watch(&self, period: Duration) -> ReceiverStream<HealthReport> {
        let period = period.max(MIN_WATCH_PERIOD);
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        let monitor = self.clone();

        info!(period_ms = period.as_millis() as u64, "Starting health watch stream");

        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                let report = monitor.check().await;
                if tx.send(report).await.is_err() {
                    break;
                }
            }
            info!("Health watch stream ended");
        });

        ReceiverStream::new(rx)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::DbSettings;
    use tokio_stream::StreamExt;

    async fn memory_db() -> Database {
        Database::open(DbSettings::in_memory().validate().unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_check_serving() {
        let monitor = HealthMonitor::new(memory_db().await);
        let report = monitor.check().await;
        assert_eq!(report.status, ServingStatus::Serving);
        assert!(report.table_names.is_empty());
    }

    #[tokio::test]
    async fn test_check_after_close() {
        let db = memory_db().await;
        let monitor = HealthMonitor::new(db.clone());
        db.close().await;

        let report = monitor.check().await;
        assert_eq!(report.status, ServingStatus::NotServing);
        assert!(report.message.contains("closed"));
    }

    #[tokio::test]
    async fn test_watch_streams_reports() {
        let monitor = HealthMonitor::new(memory_db().await);
        let mut stream = monitor.watch(Duration::from_millis(10));

        for _ in 0..3 {
            let report = stream.next().await.unwrap();
            assert_eq!(report.status, ServingStatus::Serving);
        }
    }

    #[tokio::test]
    async fn test_watch_with_zero_period_still_reports() {
        let monitor = HealthMonitor::new(memory_db().await);
        let mut stream = monitor.watch(Duration::ZERO);

        for _ in 0..2 {
            let report = stream.next().await.expect("stream ended early");
            assert_eq!(report.status, ServingStatus::Serving);
        }
    }
}
