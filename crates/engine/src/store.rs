//! The upsert/get facade.

use crate::batch::Batcher;
use crate::error::{Error, Result};
use crate::manifest::{CommitOutcome, ManifestManager};
use crate::reassembler::Reassembler;
use crate::records;
use crate::retry::{RetryPolicy, check_cancelled};
use crate::sweep::OrphanSweeper;
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tessera_core::config::{AppConfig, SweepConfig};
use tessera_core::{Chunker, Codec, Manifest, ResourceId, UpdateTime, VersionId};
use tessera_storage::{Item, Table, TableStore};
use tokio_util::sync::CancellationToken;

/// Per-write options.
#[derive(Clone, Debug, Default)]
pub struct WriteOptions {
    /// Timestamp for the manifest; the wall clock when unset.
    pub update_time: Option<UpdateTime>,
    /// Aborts the write. Chunks already written stay behind as orphans;
    /// the manifest commit is never issued after cancellation.
    pub cancel: Option<CancellationToken>,
}

impl WriteOptions {
    pub fn with_update_time(mut self, update_time: UpdateTime) -> Self {
        self.update_time = Some(update_time);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Result of an upsert.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The written version is now current.
    Committed(Manifest),
    /// An equal-or-newer write won. The attempted version's chunks are
    /// orphans.
    Rejected {
        attempted: Manifest,
        current: Option<Manifest>,
    },
}

impl UpsertOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }

    /// The manifest this upsert tried to commit.
    pub fn attempted(&self) -> &Manifest {
        match self {
            Self::Committed(manifest) => manifest,
            Self::Rejected { attempted, .. } => attempted,
        }
    }

    /// Treat a lost race as [`Error::ConditionFailed`].
    pub fn into_result(self) -> Result<Manifest> {
        match self {
            Self::Committed(manifest) => Ok(manifest),
            Self::Rejected { attempted, current } => Err(Error::ConditionFailed {
                resource_id: attempted.resource_id,
                current: current.map(Box::new),
            }),
        }
    }
}

/// Stores serializable objects of any size as chunk sets behind a manifest.
///
/// Write path: encode, split, batch-write chunks, then commit the manifest.
/// Read path: fetch the manifest, batch-read and reassemble, decode.
pub struct ChunkedStore {
    store: Arc<dyn TableStore>,
    chunker: Chunker,
    codec: Codec,
    manifests: ManifestManager,
    batcher: Batcher,
    reassembler: Reassembler,
    sweep: SweepConfig,
    commit_deadline: Duration,
}

impl ChunkedStore {
    /// Build the engine over an existing store.
    pub fn new(store: Arc<dyn TableStore>, config: &AppConfig) -> Result<Self> {
        config.validate().map_err(Error::Config)?;

        let policy = RetryPolicy::new(&config.retry, &config.timeouts);
        let chunker = Chunker::new(config.chunking.max_chunk_size)?;
        let manifests = ManifestManager::new(store.clone(), policy.clone());
        let batcher = Batcher::new(store.clone(), policy, &config.batch);
        let reassembler = Reassembler::new(manifests.clone(), batcher.clone());

        Ok(Self {
            store,
            chunker,
            codec: Codec::new(config.chunking.compression),
            manifests,
            batcher,
            reassembler,
            sweep: config.sweep.clone(),
            commit_deadline: config.commit_deadline(),
        })
    }

    pub fn store(&self) -> &Arc<dyn TableStore> {
        &self.store
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn manifests(&self) -> &ManifestManager {
        &self.manifests
    }

    pub fn reassembler(&self) -> &Reassembler {
        &self.reassembler
    }

    /// An orphan sweeper over the same store and settings.
    pub fn sweeper(&self) -> OrphanSweeper {
        OrphanSweeper::new(
            self.store.clone(),
            self.manifests.clone(),
            self.batcher.clone(),
            &self.sweep,
        )
    }

    /// Encode and store `value` as the new version of `resource_id`.
    pub async fn upsert<T: Serialize + ?Sized>(
        &self,
        resource_id: &ResourceId,
        value: &T,
    ) -> Result<UpsertOutcome> {
        self.upsert_with(resource_id, value, WriteOptions::default())
            .await
    }

    pub async fn upsert_with<T: Serialize + ?Sized>(
        &self,
        resource_id: &ResourceId,
        value: &T,
        options: WriteOptions,
    ) -> Result<UpsertOutcome> {
        let payload = self.codec.encode(value).await?;
        self.put_payload(resource_id, payload, options).await
    }

    /// Store a payload already encoded with this store's codec as the new
    /// version of `resource_id`.
    ///
    /// Fails with [`Error::CommitDeadlineExceeded`] when writing the chunks
    /// used up the time the grace period leaves for the commit.
    pub async fn put_payload(
        &self,
        resource_id: &ResourceId,
        payload: Bytes,
        options: WriteOptions,
    ) -> Result<UpsertOutcome> {
        let cancel = options.cancel.as_ref();
        check_cancelled(cancel)?;

        let version_id = VersionId::new();
        let update_time = options.update_time.unwrap_or_else(UpdateTime::now);
        let chunks = self.chunker.split(&payload, resource_id, &version_id);
        let chunk_count = u32::try_from(chunks.len()).map_err(|_| {
            Error::Config(format!(
                "payload of {} bytes needs more than {} chunks",
                payload.len(),
                u32::MAX
            ))
        })?;

        tracing::debug!(
            resource_id = %resource_id,
            version_id = %version_id,
            chunk_count,
            size = payload.len(),
            "writing chunks"
        );

        let written_at = UpdateTime::now();
        let items: Vec<Item> = chunks
            .iter()
            .map(|chunk| records::chunk_to_item(chunk, written_at))
            .collect();
        self.batcher.put_all(Table::Chunk, items, cancel).await?;

        // Past the deadline the commit could land after the sweeper has
        // judged these chunks orphaned and deleted them.
        let elapsed = UpdateTime::now().as_nanos().saturating_sub(written_at.as_nanos());
        let elapsed = Duration::from_nanos(u64::try_from(elapsed).unwrap_or(0));
        if elapsed >= self.commit_deadline {
            tracing::warn!(
                resource_id = %resource_id,
                version_id = %version_id,
                elapsed_ms = elapsed.as_millis() as u64,
                deadline_ms = self.commit_deadline.as_millis() as u64,
                "chunk writes overran the commit deadline, not committing"
            );
            return Err(Error::CommitDeadlineExceeded {
                resource_id: resource_id.clone(),
                elapsed_ms: elapsed.as_millis() as u64,
            });
        }

        // Every chunk is durable before the manifest can point at them.
        let manifest = Manifest::new(resource_id.clone(), version_id, chunk_count, update_time)
            .with_compression(self.codec.compression());
        match self.manifests.commit_with(&manifest, cancel).await? {
            CommitOutcome::Committed => Ok(UpsertOutcome::Committed(manifest)),
            CommitOutcome::Rejected { current } => Ok(UpsertOutcome::Rejected {
                attempted: manifest,
                current,
            }),
        }
    }

    /// Read and decode the current version of `resource_id`, using the
    /// compression recorded in its manifest.
    pub async fn get<T: DeserializeOwned>(&self, resource_id: &ResourceId) -> Result<T> {
        let manifest = self.manifests.fetch(resource_id).await?;
        let payload = self.reassembler.read_manifest(&manifest).await?;
        Ok(Codec::new(manifest.compression).decode(&payload).await?)
    }

    /// Read the current encoded payload of `resource_id`.
    pub async fn get_payload(&self, resource_id: &ResourceId) -> Result<Bytes> {
        self.reassembler.read(resource_id).await
    }

    /// The current manifest of `resource_id`.
    pub async fn manifest(&self, resource_id: &ResourceId) -> Result<Manifest> {
        self.manifests.fetch(resource_id).await
    }
}
