//! Storage trait definitions.

use crate::condition::Condition;
use crate::error::StorageResult;
use crate::item::{Item, Table};
use async_trait::async_trait;

/// Maximum items per batch write (matches common managed key-value stores).
pub const DEFAULT_MAX_BATCH_PUT: usize = 25;

/// Maximum keys per batch read.
pub const DEFAULT_MAX_BATCH_GET: usize = 100;

/// Maximum keys per batch delete.
pub const DEFAULT_MAX_BATCH_DELETE: usize = 25;

/// Per-call size limits of a backend. Batch calls above these are rejected
/// with [`crate::StorageError::InvalidRequest`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_put_items: usize,
    pub max_get_keys: usize,
    pub max_delete_keys: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_put_items: DEFAULT_MAX_BATCH_PUT,
            max_get_keys: DEFAULT_MAX_BATCH_GET,
            max_delete_keys: DEFAULT_MAX_BATCH_DELETE,
        }
    }
}

/// Result of a conditional put.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PutOutcome {
    /// The item was written.
    Written,
    /// The condition did not hold; nothing was written.
    ConditionFailed {
        /// The item that is stored instead, if any.
        current: Option<Item>,
    },
}

/// Result of a batch write.
#[derive(Clone, Debug, Default)]
pub struct BatchPutOutput {
    /// Number of items durably written.
    pub written: usize,
    /// Items the store did not get to; the caller should retry them.
    pub unprocessed: Vec<Item>,
}

/// Result of a batch read.
///
/// Keys that appear in neither `items` nor `unprocessed_keys` do not exist.
#[derive(Clone, Debug, Default)]
pub struct BatchGetOutput {
    /// Items found, in no particular order.
    pub items: Vec<Item>,
    /// Keys the store did not get to; the caller should retry them.
    pub unprocessed_keys: Vec<String>,
}

/// Result of a batch delete.
#[derive(Clone, Debug, Default)]
pub struct BatchDeleteOutput {
    /// Number of keys processed (deleting a missing key counts).
    pub deleted: usize,
    /// Keys the store did not get to; the caller should retry them.
    pub unprocessed_keys: Vec<String>,
}

/// A request for one page of keys, in ascending key order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanRequest {
    /// Only return keys strictly greater than this one.
    pub after: Option<String>,
    /// Maximum number of keys to return.
    pub limit: usize,
}

impl ScanRequest {
    /// First page of a scan.
    pub fn first(limit: usize) -> Self {
        Self { after: None, limit }
    }
}

/// One page of a key scan.
#[derive(Clone, Debug, Default)]
pub struct ScanPage {
    /// Keys in ascending order.
    pub keys: Vec<String>,
    /// Where to resume; `None` on the last page.
    pub next: Option<String>,
}

/// Key-value table abstraction consumed by the chunk/manifest protocol.
///
/// Point operations are all-or-nothing. Batch operations may process only
/// part of their input and report the rest as unprocessed.
#[async_trait]
pub trait TableStore: Send + Sync + 'static {
    /// Get an item by key.
    async fn get_item(&self, table: Table, key: &str) -> StorageResult<Option<Item>>;

    /// Put an item, optionally only if `condition` holds for the stored item.
    ///
    /// Evaluating the condition and writing must be atomic.
    async fn put_item(
        &self,
        table: Table,
        item: Item,
        condition: Option<Condition>,
    ) -> StorageResult<PutOutcome>;

    /// Put several items unconditionally.
    async fn batch_put_items(&self, table: Table, items: Vec<Item>)
    -> StorageResult<BatchPutOutput>;

    /// Get several items by key.
    async fn batch_get_items(&self, table: Table, keys: Vec<String>)
    -> StorageResult<BatchGetOutput>;

    /// Delete several items by key.
    async fn batch_delete_items(
        &self,
        table: Table,
        keys: Vec<String>,
    ) -> StorageResult<BatchDeleteOutput>;

    /// List one page of keys in ascending order.
    async fn scan_keys(&self, table: Table, request: ScanRequest) -> StorageResult<ScanPage>;

    /// Per-call batch limits.
    fn limits(&self) -> BatchLimits {
        BatchLimits::default()
    }

    /// Get the name of this storage backend.
    ///
    /// Returns a static string identifier for the backend type (e.g., "memory", "sqlite").
    /// Used for logging.
    fn backend_name(&self) -> &'static str;

    /// Verify storage backend connectivity.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}
