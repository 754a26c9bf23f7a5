//! Engine error types.

use tessera_core::{Manifest, ResourceId};
use tessera_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by chunked reads and writes.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid input or a payload the codec could not handle.
    #[error(transparent)]
    Core(#[from] tessera_core::Error),

    /// A non-retryable store failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// No manifest exists for the resource.
    #[error("resource not found: {0}")]
    NotFound(ResourceId),

    /// The manifest commit lost to an equal or newer write.
    #[error("manifest commit for {resource_id} rejected by a newer write")]
    ConditionFailed {
        resource_id: ResourceId,
        current: Option<Box<Manifest>>,
    },

    /// Retryable failures persisted past the retry budget.
    #[error("store unavailable: {operation} failed after {attempts} attempts: {last_error}")]
    StoreUnavailable {
        operation: &'static str,
        attempts: u32,
        last_error: String,
    },

    /// The chunks took so long to write that the sweeper could reclaim them
    /// before the manifest commit finished. Nothing was committed; retrying
    /// writes a fresh version.
    #[error("write of {resource_id} abandoned: chunks written {elapsed_ms}ms ago, past the commit deadline")]
    CommitDeadlineExceeded { resource_id: ResourceId, elapsed_ms: u64 },

    /// Fewer chunks came back than the manifest names.
    #[error("incomplete read of {resource_id}: retrieved {retrieved} of {expected} chunks")]
    Incomplete {
        resource_id: ResourceId,
        expected: u32,
        retrieved: u32,
    },

    /// A stored record is missing attributes or contradicts its key.
    #[error("corrupt record {key}: {reason}")]
    CorruptRecord { key: String, reason: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether repeating the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. } | Self::CommitDeadlineExceeded { .. }
        )
    }

    pub(crate) fn corrupt(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptRecord {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
