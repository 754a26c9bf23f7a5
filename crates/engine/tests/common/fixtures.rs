use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Generate deterministic test data using a seeded pseudo-random generator.
/// Same seed produces same output (reproducible tests).
#[allow(dead_code)]
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    // Simple LCG (Linear Congruential Generator)
    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

/// A document with enough structure to exercise the codec.
#[allow(dead_code)]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: u64,
    pub title: String,
    pub tags: Vec<String>,
    pub body: Vec<u8>,
}

#[allow(dead_code)]
impl Document {
    pub fn sample(id: u64, body_len: usize) -> Self {
        Self {
            id,
            title: format!("document {id}"),
            tags: vec!["alpha".to_string(), "beta".to_string()],
            body: seeded_bytes(id, body_len).to_vec(),
        }
    }
}
