//! Deleting chunks no manifest points at.

use crate::batch::Batcher;
use crate::error::Result;
use crate::manifest::ManifestManager;
use crate::records;
use futures::TryStreamExt;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tessera_core::config::SweepConfig;
use tessera_core::{ResourceId, UpdateTime, VersionId, parse_chunk_key};
use tessera_storage::{Table, TableStore};

/// Counters from one sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    pub chunks_scanned: u64,
    pub chunks_deleted: u64,
    pub bytes_reclaimed: u64,
    pub errors: u64,
}

/// Reclaims chunks left behind by lost races, superseded versions and
/// crashed or cancelled writers.
///
/// A chunk is deleted when its version is not the one its resource's
/// manifest names (or the resource has no manifest, or the key does not
/// parse) and it was written longer than the grace period ago. The grace
/// period keeps chunks of writes that have not committed yet.
pub struct OrphanSweeper {
    store: Arc<dyn TableStore>,
    manifests: ManifestManager,
    batcher: Batcher,
    grace_period: Duration,
    page_size: usize,
}

impl OrphanSweeper {
    pub fn new(
        store: Arc<dyn TableStore>,
        manifests: ManifestManager,
        batcher: Batcher,
        config: &SweepConfig,
    ) -> Self {
        Self {
            store,
            manifests,
            batcher,
            grace_period: config.grace_period(),
            page_size: config.page_size.max(1),
        }
    }

    /// Sweep the whole chunk table once.
    pub async fn sweep(&self) -> Result<SweepStats> {
        self.sweep_at(UpdateTime::now()).await
    }

    /// Sweep, judging chunk age against `now`.
    ///
    /// `now` stands in for the wall clock. A writer may commit chunks up to
    /// the grace period after writing them, so judging with a later time than
    /// the real one can delete chunks a manifest is about to name.
    ///
    /// Scan failures abort the sweep. Failures for individual resources or
    /// batches are logged, counted in `errors`, and skipped.
    pub async fn sweep_at(&self, now: UpdateTime) -> Result<SweepStats> {
        let mut stats = SweepStats::default();
        let mut live: HashMap<ResourceId, Option<VersionId>> = HashMap::new();

        tracing::info!(
            backend = self.store.backend_name(),
            grace_period_secs = self.grace_period.as_secs(),
            "orphan sweep started"
        );

        let mut pages = self.batcher.scan_pages(Table::Chunk, self.page_size);
        while let Some(keys) = pages.try_next().await? {
            stats.chunks_scanned += keys.len() as u64;

            let candidates = self.candidates(keys, &mut live, &mut stats).await;
            if !candidates.is_empty() {
                self.reclaim(candidates, now, &mut stats).await;
            }
        }

        tracing::info!(
            chunks_scanned = stats.chunks_scanned,
            chunks_deleted = stats.chunks_deleted,
            bytes_reclaimed = stats.bytes_reclaimed,
            errors = stats.errors,
            "orphan sweep completed"
        );
        Ok(stats)
    }

    /// Keys on this page that no manifest references.
    async fn candidates(
        &self,
        keys: Vec<String>,
        live: &mut HashMap<ResourceId, Option<VersionId>>,
        stats: &mut SweepStats,
    ) -> Vec<String> {
        let mut candidates = Vec::new();

        for key in keys {
            let (resource_id, version_id, _) = match parse_chunk_key(&key) {
                Ok(parts) => parts,
                Err(err) => {
                    tracing::debug!(key = %key, error = %err, "unparseable chunk key");
                    candidates.push(key);
                    continue;
                }
            };

            let current = match live.get(&resource_id) {
                Some(current) => *current,
                None => match self.manifests.try_fetch(&resource_id).await {
                    Ok(manifest) => {
                        let current = manifest.map(|m| m.version_id);
                        live.insert(resource_id, current);
                        current
                    }
                    Err(err) => {
                        tracing::warn!(
                            resource_id = %resource_id,
                            key = %key,
                            error = %err,
                            "failed to read manifest during sweep"
                        );
                        stats.errors += 1;
                        continue;
                    }
                },
            };

            if current != Some(version_id) {
                candidates.push(key);
            }
        }

        candidates
    }

    /// Delete the candidates that are past the grace period.
    async fn reclaim(&self, candidates: Vec<String>, now: UpdateTime, stats: &mut SweepStats) {
        let count = candidates.len() as u64;
        let items = match self.batcher.get_all(Table::Chunk, candidates).await {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!(candidates = count, error = %err, "failed to read orphan candidates");
                stats.errors += count;
                return;
            }
        };

        let grace = i64::try_from(self.grace_period.as_nanos()).unwrap_or(i64::MAX);
        let mut doomed = Vec::new();
        let mut bytes = 0u64;
        for item in items {
            // Rows without a write time predate it and are always old enough.
            let expired = records::written_at(&item)
                .is_none_or(|at| now.as_nanos().saturating_sub(at.as_nanos()) >= grace);
            if expired {
                bytes += item.size() as u64;
                doomed.push(item.key);
            }
        }
        if doomed.is_empty() {
            return;
        }

        let doomed_count = doomed.len() as u64;
        match self.batcher.delete_all(Table::Chunk, doomed).await {
            Ok(deleted) => {
                tracing::debug!(deleted, bytes, "orphan chunks deleted");
                stats.chunks_deleted += deleted as u64;
                stats.bytes_reclaimed += bytes;
            }
            Err(err) => {
                tracing::warn!(chunks = doomed_count, error = %err, "failed to delete orphan chunks");
                stats.errors += doomed_count;
            }
        }
    }
}
