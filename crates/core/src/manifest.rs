//! Manifest records naming the current version of a resource.

use crate::chunk::chunk_key;
use crate::config::CompressionConfig;
use crate::resource::ResourceId;
use crate::version::{UpdateTime, VersionId};
use serde::{Deserialize, Serialize};

/// The record naming the visible version of a resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// The resource this manifest describes.
    pub resource_id: ResourceId,
    /// The currently visible version.
    pub version_id: VersionId,
    /// Number of chunks written for `version_id`.
    pub chunk_count: u32,
    /// When the version was written; the newest write wins.
    pub update_time: UpdateTime,
    /// Compression the payload was encoded with. Readers decode with this,
    /// not with their own configuration.
    pub compression: CompressionConfig,
}

impl Manifest {
    /// Create a new manifest for an uncompressed payload.
    pub fn new(
        resource_id: ResourceId,
        version_id: VersionId,
        chunk_count: u32,
        update_time: UpdateTime,
    ) -> Self {
        Self {
            resource_id,
            version_id,
            chunk_count,
            update_time,
            compression: CompressionConfig::None,
        }
    }

    /// Record the compression the payload was encoded with.
    pub fn with_compression(mut self, compression: CompressionConfig) -> Self {
        self.compression = compression;
        self
    }

    /// Keys of every chunk of this version, in index order.
    pub fn chunk_keys(&self) -> Vec<String> {
        (1..=self.chunk_count)
            .map(|index| chunk_key(&self.resource_id, &self.version_id, index))
            .collect()
    }

    /// Whether this manifest may replace `stored`.
    ///
    /// A strictly newer write wins. Writes with the same timestamp are
    /// ordered by version id, so the outcome does not depend on arrival
    /// order. Re-committing the stored manifest is accepted. Compression
    /// plays no part in ordering.
    pub fn supersedes(&self, stored: &Manifest) -> bool {
        (self.update_time, self.version_id) >= (stored.update_time, stored.version_id)
    }
}
