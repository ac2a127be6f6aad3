//! Error types for the scheduler.

use thiserror::Error;

use crate::ScheduleStatus;

/// Errors raised by a schedule store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite error.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A JSON column could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored value does not parse back into its type.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// A thread panicked while holding the connection.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Errors that can occur in scheduler operations.
///
/// Publish failures never show up here; they become schedule state.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Schedule not found.
    #[error("schedule not found: {0}")]
    NotFound(String),

    /// The requested action is not allowed from the schedule's current status.
    #[error("cannot {action} schedule {id} while it is {from}")]
    InvalidTransition {
        id: String,
        from: ScheduleStatus,
        action: &'static str,
    },
}
