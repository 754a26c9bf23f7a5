use bytes::Bytes;
use tessera_storage::{AttributeValue, Item};

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

/// An item shaped like a stored manifest row.
#[allow(dead_code)]
pub fn versioned_item(key: &str, update_time: i64, version: &str) -> Item {
    Item::new(key)
        .with("UpdateTime", AttributeValue::N(update_time))
        .with("VersionID", AttributeValue::S(version.to_string()))
}

/// An item carrying a binary body.
#[allow(dead_code)]
pub fn body_item(key: &str, seed: u64, len: usize) -> Item {
    Item::new(key).with("Body", AttributeValue::B(seeded_bytes(seed, len)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_bytes_deterministic() {
        assert_eq!(seeded_bytes(42, 1000), seeded_bytes(42, 1000));
        assert_ne!(seeded_bytes(42, 1000), seeded_bytes(43, 1000));
    }
}
