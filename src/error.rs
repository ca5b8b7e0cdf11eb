//! Error types for feedwatch.

use thiserror::Error;

/// Common error type for feedwatch.
#[derive(Error, Debug)]
pub enum FeedwatchError {
    /// Database error.
    ///
    /// This is a generic database error that wraps errors from the storage
    /// backend. Database errors from sqlx are automatically converted.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network fetch error (timeout, non-success status, empty body).
    ///
    /// Transient by taxonomy: retried via the backoff scheduler, never fatal.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Feed markup could not be parsed.
    ///
    /// Recoverable: the offending source yields no items this run.
    #[error("parse error: {0}")]
    Parse(String),

    /// Timeline API error.
    #[error("timeline error: {0}")]
    Timeline(String),

    /// Push delivery error.
    #[error("push error: {0}")]
    Push(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error for caller input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),
}

// Conversion from sqlx errors
impl From<sqlx::Error> for FeedwatchError {
    fn from(e: sqlx::Error) -> Self {
        FeedwatchError::Database(e.to_string())
    }
}

/// Result type alias for feedwatch operations.
pub type Result<T> = std::result::Result<T, FeedwatchError>;

impl FeedwatchError {
    /// Whether this error counts as a fetch failure for scheduler purposes.
    ///
    /// Only transient network/timeline failures trip the backoff chain;
    /// malformed input and per-item problems are skipped where they occur.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, FeedwatchError::Fetch(_) | FeedwatchError::Timeline(_))
    }
}
