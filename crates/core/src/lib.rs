//! Core domain types and shared logic for Tessera.
//!
//! Tessera stores arbitrarily large serializable objects in key-value tables
//! whose items are size-bounded. This crate defines the canonical data model:
//! - Resource and version identifiers, write timestamps
//! - Chunk addressing and fixed-size splitting
//! - Manifest records and the last-writer-wins rule
//! - The payload codec (JSON plus compression)
//! - Configuration shared by the store, engine and CLI

pub mod chunk;
pub mod codec;
pub mod config;
pub mod error;
pub mod manifest;
pub mod resource;
pub mod version;

pub use chunk::{Chunk, Chunker, chunk_key, parse_chunk_key};
pub use codec::Codec;
pub use error::{Error, Result};
pub use manifest::Manifest;
pub use resource::{KEY_SEPARATOR, ResourceId};
pub use version::{UpdateTime, VersionId};

/// Default chunk size: 350 KiB, leaving headroom under a 400 KB item limit.
pub const DEFAULT_CHUNK_SIZE: u64 = 350 * 1024;

/// Maximum chunk size: 400 KiB.
pub const MAX_CHUNK_SIZE: u64 = 400 * 1024;

/// Minimum chunk size: 1 byte.
pub const MIN_CHUNK_SIZE: u64 = 1;
