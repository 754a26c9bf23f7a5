//! Chunk addressing and fixed-size splitting.

use crate::resource::{KEY_SEPARATOR, ResourceId};
use crate::version::VersionId;
use bytes::Bytes;
use std::fmt;

/// Compute the key of a chunk.
///
/// The encoding is `resource•version•index`. It is a pure function of its
/// inputs, so readers can derive every key of a version from its manifest.
pub fn chunk_key(resource: &ResourceId, version: &VersionId, index: u32) -> String {
    format!("{resource}{KEY_SEPARATOR}{version}{KEY_SEPARATOR}{index}")
}

/// Split a chunk key back into its components.
pub fn parse_chunk_key(key: &str) -> crate::Result<(ResourceId, VersionId, u32)> {
    let mut parts = key.split(KEY_SEPARATOR);
    let (Some(resource), Some(version), Some(index), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(crate::Error::InvalidChunkKey(format!(
            "expected 3 components: {key}"
        )));
    };

    let index: u32 = index
        .parse()
        .map_err(|e| crate::Error::InvalidChunkKey(format!("bad index in {key}: {e}")))?;
    if index == 0 {
        return Err(crate::Error::InvalidChunkKey(format!(
            "chunk indices start at 1: {key}"
        )));
    }

    Ok((ResourceId::new(resource)?, VersionId::parse(version)?, index))
}

/// One slice of an encoded payload.
#[derive(Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Deterministic key, see [`chunk_key`].
    pub key: String,
    /// 1-based position within the payload.
    pub index: u32,
    /// The chunk data.
    pub body: Bytes,
}

impl Chunk {
    /// Create a chunk, deriving its key.
    pub fn new(resource: &ResourceId, version: &VersionId, index: u32, body: Bytes) -> Self {
        Self {
            key: chunk_key(resource, version, index),
            index,
            body,
        }
    }

    /// Get the chunk size.
    pub fn size(&self) -> u64 {
        self.body.len() as u64
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("key", &self.key)
            .field("index", &self.index)
            .field("size", &self.body.len())
            .finish()
    }
}

/// Splits payloads into fixed-size chunks.
///
/// Every chunk except the last is exactly `max_chunk_size` bytes.
/// An empty payload produces zero chunks.
#[derive(Clone, Copy, Debug)]
pub struct Chunker {
    max_chunk_size: usize,
}

impl Chunker {
    /// Create a chunker, validating the chunk size.
    pub fn new(max_chunk_size: u64) -> crate::Result<Self> {
        if !(crate::MIN_CHUNK_SIZE..=crate::MAX_CHUNK_SIZE).contains(&max_chunk_size) {
            return Err(crate::Error::InvalidChunkSize {
                size: max_chunk_size,
                min: crate::MIN_CHUNK_SIZE,
                max: crate::MAX_CHUNK_SIZE,
            });
        }
        Ok(Self {
            max_chunk_size: max_chunk_size as usize,
        })
    }

    /// The configured maximum chunk size.
    pub fn max_chunk_size(&self) -> u64 {
        self.max_chunk_size as u64
    }

    /// Number of chunks a payload of `len` bytes splits into.
    pub fn chunk_count(&self, len: usize) -> u32 {
        len.div_ceil(self.max_chunk_size) as u32
    }

    /// Split a payload into ordered chunks for one version of a resource.
    ///
    /// Chunk bodies share the payload's buffer.
    pub fn split(&self, payload: &Bytes, resource: &ResourceId, version: &VersionId) -> Vec<Chunk> {
        let mut chunks = Vec::with_capacity(self.chunk_count(payload.len()) as usize);
        let mut start = 0;
        let mut index = 0u32;

        while start < payload.len() {
            let end = (start + self.max_chunk_size).min(payload.len());
            index += 1;
            chunks.push(Chunk::new(
                resource,
                version,
                index,
                payload.slice(start..end),
            ));
            start = end;
        }

        chunks
    }
}
