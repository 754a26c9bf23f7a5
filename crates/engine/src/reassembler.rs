//! Rebuilding payloads from their chunks.

use crate::batch::Batcher;
use crate::error::{Error, Result};
use crate::manifest::ManifestManager;
use crate::records;
use bytes::{Bytes, BytesMut};
use tessera_core::{Chunk, Manifest, ResourceId};
use tessera_storage::Table;

/// Fetches, orders and concatenates the chunks a manifest names.
#[derive(Clone)]
pub struct Reassembler {
    manifests: ManifestManager,
    batcher: Batcher,
}

impl Reassembler {
    pub fn new(manifests: ManifestManager, batcher: Batcher) -> Self {
        Self { manifests, batcher }
    }

    /// Read the current payload of a resource.
    pub async fn read(&self, resource_id: &ResourceId) -> Result<Bytes> {
        let manifest = self.manifests.fetch(resource_id).await?;
        self.read_manifest(&manifest).await
    }

    /// Read the payload a specific manifest describes.
    ///
    /// Store result order is never trusted: chunks are sorted by index and
    /// checked for gaps. Fewer chunks than `chunk_count` is
    /// [`Error::Incomplete`], never a truncated payload.
    pub async fn read_manifest(&self, manifest: &Manifest) -> Result<Bytes> {
        if manifest.chunk_count == 0 {
            return Ok(Bytes::new());
        }

        let items = self
            .batcher
            .get_all(Table::Chunk, manifest.chunk_keys())
            .await?;

        let mut chunks = items
            .into_iter()
            .map(|item| {
                records::chunk_from_item(item, &manifest.resource_id, &manifest.version_id)
            })
            .collect::<Result<Vec<Chunk>>>()?;
        chunks.sort_unstable_by_key(|chunk| chunk.index);
        chunks.dedup_by_key(|chunk| chunk.index);

        let contiguous = chunks
            .iter()
            .zip(1..=manifest.chunk_count)
            .all(|(chunk, index)| chunk.index == index);
        if chunks.len() != manifest.chunk_count as usize || !contiguous {
            tracing::warn!(
                resource_id = %manifest.resource_id,
                version_id = %manifest.version_id,
                expected = manifest.chunk_count,
                retrieved = chunks.len(),
                "chunk set incomplete"
            );
            return Err(Error::Incomplete {
                resource_id: manifest.resource_id.clone(),
                expected: manifest.chunk_count,
                retrieved: chunks.len() as u32,
            });
        }

        let size = chunks.iter().map(|chunk| chunk.body.len()).sum();
        let mut payload = BytesMut::with_capacity(size);
        for chunk in &chunks {
            payload.extend_from_slice(&chunk.body);
        }

        tracing::debug!(
            resource_id = %manifest.resource_id,
            version_id = %manifest.version_id,
            chunk_count = manifest.chunk_count,
            size,
            "payload reassembled"
        );
        Ok(payload.freeze())
    }
}
