//! Items, attributes and the logical tables they live in.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The two logical tables of the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    /// One row per resource, naming its current version.
    Manifest,
    /// One row per chunk of every written version.
    Chunk,
}

impl Table {
    /// All tables.
    pub const ALL: [Table; 2] = [Table::Manifest, Table::Chunk];

    /// Stable table name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manifest => "manifests",
            Self::Chunk => "chunks",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed attribute value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum AttributeValue {
    /// Integer.
    N(i64),
    /// UTF-8 string.
    S(String),
    /// Binary.
    B(#[serde(with = "base64_bytes")] Bytes),
}

impl AttributeValue {
    /// Get the integer value, if this is one.
    pub fn as_n(&self) -> Option<i64> {
        match self {
            Self::N(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the string value, if this is one.
    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    /// Get the binary value, if this is one.
    pub fn as_b(&self) -> Option<&Bytes> {
        match self {
            Self::B(b) => Some(b),
            _ => None,
        }
    }

    /// Approximate stored size in bytes.
    pub fn size(&self) -> usize {
        match self {
            Self::N(_) => 8,
            Self::S(s) => s.len(),
            Self::B(b) => b.len(),
        }
    }
}

impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::N(n) => write!(f, "N({n})"),
            Self::S(s) => write!(f, "S({s:?})"),
            Self::B(b) => write!(f, "B(<{} bytes>)", b.len()),
        }
    }
}

/// A keyed row with named attributes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Item {
    /// Primary key.
    pub key: String,
    /// Attributes other than the key.
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Item {
    /// Create an item with no attributes.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Get an attribute.
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Approximate stored size: key plus attribute names and values.
    pub fn size(&self) -> usize {
        self.key.len()
            + self
                .attributes
                .iter()
                .map(|(name, value)| name.len() + value.size())
                .sum::<usize>()
    }

    /// Serialize the attributes for backends that store them as a document.
    pub fn attributes_to_json(&self) -> crate::StorageResult<String> {
        serde_json::to_string(&self.attributes).map_err(|e| crate::StorageError::InvalidItem {
            key: self.key.clone(),
            reason: e.to_string(),
        })
    }

    /// Rebuild an item from its key and serialized attributes.
    pub fn from_json(key: String, json: &str) -> crate::StorageResult<Self> {
        let attributes =
            serde_json::from_str(json).map_err(|e| crate::StorageError::InvalidItem {
                key: key.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { key, attributes })
    }
}

mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        general_purpose::STANDARD
            .decode(encoded)
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes_json_roundtrip() {
        let item = Item::new("k")
            .with("Count", AttributeValue::N(3))
            .with("Version", AttributeValue::S("v1".to_string()))
            .with("Body", AttributeValue::B(Bytes::from_static(b"\x00\x01\xff")));

        let json = item.attributes_to_json().unwrap();
        let back = Item::from_json("k".to_string(), &json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let err = Item::from_json("k".to_string(), "not json").unwrap_err();
        assert!(matches!(err, crate::StorageError::InvalidItem { .. }));
    }

    #[test]
    fn test_binary_attribute_is_base64() {
        let value: AttributeValue = serde_json::from_str(r#"{"t":"B","v":"AAH/"}"#).unwrap();
        assert_eq!(value.as_b().map(|b| b.as_ref()), Some(&b"\x00\x01\xff"[..]));

        assert!(serde_json::from_str::<AttributeValue>(r#"{"t":"B"}"#).is_err());
        assert!(serde_json::from_str::<AttributeValue>(r#"{"t":"B","v":"not base64!"}"#).is_err());
    }

    #[test]
    fn test_size_counts_key_and_attributes() {
        let item = Item::new("abc").with("Body", AttributeValue::B(Bytes::from(vec![0u8; 10])));
        assert_eq!(item.size(), 3 + 4 + 10);
    }
}
