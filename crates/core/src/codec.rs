//! Payload codec: JSON serialization plus optional compression.

use crate::config::CompressionConfig;
use async_compression::tokio::bufread::{GzipDecoder, ZstdDecoder};
use async_compression::tokio::write::{GzipEncoder, ZstdEncoder};
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Turns domain objects into stored payloads and back.
#[derive(Clone, Copy, Debug, Default)]
pub struct Codec {
    compression: CompressionConfig,
}

impl Codec {
    /// Create a codec using the given compression.
    pub fn new(compression: CompressionConfig) -> Self {
        Self { compression }
    }

    /// The configured compression.
    pub fn compression(&self) -> CompressionConfig {
        self.compression
    }

    /// Serialize and compress a value.
    pub async fn encode<T: Serialize + ?Sized>(&self, value: &T) -> crate::Result<Bytes> {
        let json = serde_json::to_vec(value).map_err(|e| crate::Error::Encoding(e.to_string()))?;
        let compressed = match self.compression {
            CompressionConfig::None => Ok(json),
            CompressionConfig::Gzip => compress_gzip(&json).await,
            CompressionConfig::Zstd => compress_zstd(&json).await,
        }
        .map_err(|e| crate::Error::Encoding(e.to_string()))?;
        Ok(Bytes::from(compressed))
    }

    /// Decompress and deserialize a value.
    pub async fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> crate::Result<T> {
        let json = match self.compression {
            CompressionConfig::None => Ok(data.to_vec()),
            CompressionConfig::Gzip => decompress_gzip(data).await,
            CompressionConfig::Zstd => decompress_zstd(data).await,
        }
        .map_err(|e| crate::Error::Decoding(e.to_string()))?;
        serde_json::from_slice(&json).map_err(|e| crate::Error::Decoding(e.to_string()))
    }
}

async fn compress_gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut output = Vec::new();
    let mut encoder = GzipEncoder::with_quality(&mut output, async_compression::Level::Default);
    encoder.write_all(data).await?;
    encoder.shutdown().await?;
    Ok(output)
}

async fn compress_zstd(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut output = Vec::new();
    let mut encoder = ZstdEncoder::with_quality(&mut output, async_compression::Level::Default);
    encoder.write_all(data).await?;
    encoder.shutdown().await?;
    Ok(output)
}

async fn decompress_gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut output = Vec::new();
    GzipDecoder::new(data).read_to_end(&mut output).await?;
    Ok(output)
}

async fn decompress_zstd(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut output = Vec::new();
    ZstdDecoder::new(data).read_to_end(&mut output).await?;
    Ok(output)
}
