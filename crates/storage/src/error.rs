//! Storage error types.

use thiserror::Error;

/// Table store operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("request throttled: {0}")]
    Throttled(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid item {key}: {reason}")]
    InvalidItem { key: String, reason: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Throttled(_) | Self::Unavailable(_) | Self::Timeout(_) => true,
            Self::Database(err) => matches!(
                err,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ) || is_sqlite_busy(err),
            _ => false,
        }
    }
}

/// SQLite reports lock contention as SQLITE_BUSY (5) or SQLITE_LOCKED (6),
/// possibly as an extended code carrying the primary code in its low byte.
fn is_sqlite_busy(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .is_some_and(|code| matches!(code & 0xff, 5 | 6)),
        _ => false,
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(StorageError::Throttled("slow down".to_string()).is_retryable());
        assert!(StorageError::Unavailable("down".to_string()).is_retryable());
        assert!(StorageError::Timeout("get".to_string()).is_retryable());
        assert!(StorageError::Database(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!StorageError::InvalidRequest("too many".to_string()).is_retryable());
        assert!(!StorageError::Config("bad".to_string()).is_retryable());
    }
}
