//! Mapping between domain records and table items.

use crate::error::{Error, Result};
use tessera_core::config::CompressionConfig;
use tessera_core::{Chunk, Manifest, ResourceId, UpdateTime, VersionId, parse_chunk_key};
use tessera_storage::{AttributeValue, CompareOp, Condition, Item};

pub const RESOURCE_ID: &str = "ResourceID";
pub const VERSION_ID: &str = "VersionID";
pub const CHUNK_COUNT: &str = "ChunkCount";
pub const UPDATE_TIME: &str = "UpdateTime";
pub const COMPRESSION: &str = "Compression";
pub const BODY: &str = "Body";
pub const INDEX: &str = "Index";
pub const WRITTEN_AT: &str = "WrittenAt";

/// Manifest row, keyed by the resource key.
pub fn manifest_to_item(manifest: &Manifest) -> Item {
    let resource = match &manifest.resource_id {
        ResourceId::Numeric(n) => AttributeValue::N(*n),
        ResourceId::Text(s) => AttributeValue::S(s.clone()),
    };

    Item::new(manifest.resource_id.to_key())
        .with(RESOURCE_ID, resource)
        .with(VERSION_ID, AttributeValue::S(manifest.version_id.to_string()))
        .with(CHUNK_COUNT, AttributeValue::N(i64::from(manifest.chunk_count)))
        .with(UPDATE_TIME, AttributeValue::N(manifest.update_time.as_nanos()))
        .with(
            COMPRESSION,
            AttributeValue::S(manifest.compression.as_str().to_string()),
        )
}

pub fn manifest_from_item(item: &Item) -> Result<Manifest> {
    let resource_id = match item.get(RESOURCE_ID) {
        Some(AttributeValue::N(n)) => ResourceId::from(*n),
        Some(AttributeValue::S(s)) => ResourceId::new(s.as_str())?,
        _ => return Err(Error::corrupt(&item.key, "missing ResourceID")),
    };
    if resource_id.to_key() != item.key {
        return Err(Error::corrupt(
            &item.key,
            format!("ResourceID {resource_id} does not match the key"),
        ));
    }

    let version_id = item
        .get(VERSION_ID)
        .and_then(AttributeValue::as_s)
        .ok_or_else(|| Error::corrupt(&item.key, "missing VersionID"))
        .and_then(|s| Ok(VersionId::parse(s)?))?;

    let chunk_count = item
        .get(CHUNK_COUNT)
        .and_then(AttributeValue::as_n)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| Error::corrupt(&item.key, "missing or invalid ChunkCount"))?;

    let update_time = item
        .get(UPDATE_TIME)
        .and_then(AttributeValue::as_n)
        .map(UpdateTime::from_nanos)
        .ok_or_else(|| Error::corrupt(&item.key, "missing UpdateTime"))?;

    let compression = item
        .get(COMPRESSION)
        .and_then(AttributeValue::as_s)
        .ok_or_else(|| Error::corrupt(&item.key, "missing Compression"))?
        .parse::<CompressionConfig>()
        .map_err(|reason| Error::corrupt(&item.key, reason))?;

    let manifest = Manifest::new(resource_id, version_id, chunk_count, update_time);
    Ok(manifest.with_compression(compression))
}

/// Condition under which `manifest` may replace the stored row: none is
/// stored, the stored one is older, or it has the same time and a version
/// id that does not sort after the incoming one.
pub fn commit_condition(manifest: &Manifest) -> Condition {
    let time = AttributeValue::N(manifest.update_time.as_nanos());
    let version = AttributeValue::S(manifest.version_id.to_string());

    let older = Condition::compare(UPDATE_TIME, CompareOp::Lt, time.clone());
    let tied = Condition::compare(UPDATE_TIME, CompareOp::Eq, time)
        .and(Condition::compare(VERSION_ID, CompareOp::Le, version));

    Condition::NotExists.or(older).or(tied)
}

/// Chunk row. `written_at` lets the sweeper spare chunks of in-flight writes.
pub fn chunk_to_item(chunk: &Chunk, written_at: UpdateTime) -> Item {
    Item::new(chunk.key.clone())
        .with(BODY, AttributeValue::B(chunk.body.clone()))
        .with(INDEX, AttributeValue::N(i64::from(chunk.index)))
        .with(WRITTEN_AT, AttributeValue::N(written_at.as_nanos()))
}

/// Rebuild a chunk, checking that its key belongs to `resource`/`version`
/// and agrees with the stored index.
pub fn chunk_from_item(item: Item, resource: &ResourceId, version: &VersionId) -> Result<Chunk> {
    let (key_resource, key_version, key_index) = parse_chunk_key(&item.key)?;
    if &key_resource != resource || &key_version != version {
        return Err(Error::corrupt(
            &item.key,
            format!("chunk does not belong to {resource} version {version}"),
        ));
    }

    let index = item
        .get(INDEX)
        .and_then(AttributeValue::as_n)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| Error::corrupt(&item.key, "missing or invalid Index"))?;
    if index != key_index {
        return Err(Error::corrupt(
            &item.key,
            format!("Index {index} disagrees with key index {key_index}"),
        ));
    }

    let body = item
        .get(BODY)
        .and_then(AttributeValue::as_b)
        .cloned()
        .ok_or_else(|| Error::corrupt(&item.key, "missing Body"))?;

    Ok(Chunk {
        key: item.key,
        index,
        body,
    })
}

/// When a chunk row was written, if recorded.
pub fn written_at(item: &Item) -> Option<UpdateTime> {
    item.get(WRITTEN_AT)
        .and_then(AttributeValue::as_n)
        .map(UpdateTime::from_nanos)
}
