//! Key-value table abstraction and backends for Tessera.
//!
//! This crate provides:
//! - The `TableStore` trait: point reads, conditional writes, partial-batch
//!   reads/writes/deletes and key scans over two logical tables
//! - The item/attribute model and condition expressions
//! - Backends: in-memory and SQLite

pub mod backends;
pub mod condition;
pub mod error;
pub mod item;
pub mod traits;

pub use backends::{memory::MemoryStore, sqlite::SqliteStore};
pub use condition::{CompareOp, Condition};
pub use error::{StorageError, StorageResult};
pub use item::{AttributeValue, Item, Table};
pub use traits::{
    BatchDeleteOutput, BatchGetOutput, BatchLimits, BatchPutOutput, PutOutcome, ScanPage,
    ScanRequest, TableStore,
};

use std::sync::Arc;
use std::time::Duration;
use tessera_core::config::StoreConfig;

/// Create a table store from configuration.
pub async fn from_config(config: &StoreConfig) -> StorageResult<Arc<dyn TableStore>> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        StoreConfig::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreConfig::Sqlite {
            path,
            busy_timeout_ms,
        } => {
            let store = SqliteStore::new(path, Duration::from_millis(*busy_timeout_ms)).await?;
            Ok(Arc::new(store))
        }
    }
}
