//! Campaign store error types
//!
//! Defines all errors that can occur while reading or writing the
//! campaign store, whichever backend is in use.

use thiserror::Error;

/// Errors that can occur in a campaign store backend
#[derive(Error, Debug)]
pub enum StoreError {
    /// Embedded database failure
    #[error("Database error: {0}")]
    Database(String),

    /// Hosted backend could not be reached or answered with a failure
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Hosted backend answered with a non-success status
    #[error("Upstream returned {status}: {message}")]
    UpstreamStatus { status: u16, message: String },

    /// Referenced row does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Row violates a uniqueness or reference constraint
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Stored row could not be decoded
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, msg)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Conflict(msg.clone().unwrap_or_else(|| err.to_string()))
            }
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(err.to_string()),
            _ => StoreError::Database(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::Upstream("request timed out".to_string())
        } else if err.is_connect() {
            StoreError::Upstream("backend unavailable".to_string())
        } else {
            StoreError::Upstream(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
