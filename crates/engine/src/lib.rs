//! Chunk/manifest protocol for Tessera.
//!
//! Objects of any size are encoded, split into fixed-size chunks and written
//! as independent rows; a small manifest row names the current version. The
//! manifest is committed with a conditional write so concurrent writers
//! converge on one winner (newest `UpdateTime`, ties broken by the larger
//! `VersionId`) without locking.
//!
//! - [`ChunkedStore`]: upsert/get facade
//! - [`ManifestManager`]: conditional commits and lookups
//! - [`Reassembler`]: ordered, gap-checked chunk reads
//! - [`Batcher`] and [`RetryPolicy`]: store-sized batches, backoff, timeouts
//! - [`OrphanSweeper`]: reclaims chunks no manifest references

pub mod batch;
pub mod error;
pub mod manifest;
pub mod reassembler;
pub mod records;
pub mod retry;
pub mod store;
pub mod sweep;

pub use batch::{Batcher, KeyPages};
pub use error::{Error, Result};
pub use manifest::{CommitOutcome, ManifestManager};
pub use reassembler::Reassembler;
pub use retry::RetryPolicy;
pub use store::{ChunkedStore, UpsertOutcome, WriteOptions};
pub use sweep::{OrphanSweeper, SweepStats};

use tessera_core::config::AppConfig;

/// Open the configured store and build the engine over it.
pub async fn from_config(config: &AppConfig) -> Result<ChunkedStore> {
    config.validate().map_err(Error::Config)?;
    let store = tessera_storage::from_config(&config.store).await?;
    store.health_check().await?;

    tracing::debug!(backend = store.backend_name(), "table store ready");
    ChunkedStore::new(store, config)
}
