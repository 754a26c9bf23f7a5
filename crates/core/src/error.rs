//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid resource id: {0}")]
    InvalidResourceId(String),

    #[error("invalid version id: {0}")]
    InvalidVersionId(String),

    #[error("invalid chunk key: {0}")]
    InvalidChunkKey(String),

    #[error("invalid chunk size: {size} (must be between {min} and {max})")]
    InvalidChunkSize { size: u64, min: u64, max: u64 },

    #[error("invalid update time: {0}")]
    InvalidUpdateTime(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("decoding error: {0}")]
    Decoding(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
