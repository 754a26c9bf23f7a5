//! Resource identifiers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Separator between the components of a chunk key.
///
/// Never valid inside a [`ResourceId`]; a version id is hyphenated hex and
/// an index is decimal, so neither can contain it either.
pub const KEY_SEPARATOR: char = '•';

/// Maximum length of a textual resource id, in bytes.
pub const MAX_RESOURCE_ID_LEN: usize = 1024;

/// Caller-chosen identifier of a logical object.
///
/// Numeric and textual ids share one key space: text that is the canonical
/// decimal rendering of an `i64` is always stored as [`ResourceId::Numeric`],
/// so two distinct ids never render to the same key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceId {
    Numeric(i64),
    Text(String),
}

impl ResourceId {
    /// Create a resource id from a string, canonicalizing numeric text.
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if let Ok(n) = id.parse::<i64>()
            && n.to_string() == id
        {
            return Ok(Self::Numeric(n));
        }

        if id.is_empty() {
            return Err(crate::Error::InvalidResourceId(
                "resource id cannot be empty".to_string(),
            ));
        }
        if id.len() > MAX_RESOURCE_ID_LEN {
            return Err(crate::Error::InvalidResourceId(format!(
                "resource id is {} bytes (max: {MAX_RESOURCE_ID_LEN})",
                id.len()
            )));
        }
        for c in id.chars() {
            if c == KEY_SEPARATOR {
                return Err(crate::Error::InvalidResourceId(format!(
                    "resource id must not contain '{KEY_SEPARATOR}'"
                )));
            }
            if c.is_control() {
                return Err(crate::Error::InvalidResourceId(
                    "resource id must not contain control characters".to_string(),
                ));
            }
        }

        Ok(Self::Text(id))
    }

    /// The canonical key of this resource in the manifest table.
    pub fn to_key(&self) -> String {
        self.to_string()
    }

    /// Get the numeric id, if this is one.
    pub fn as_numeric(&self) -> Option<i64> {
        match self {
            Self::Numeric(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl From<i64> for ResourceId {
    fn from(id: i64) -> Self {
        Self::Numeric(id)
    }
}

impl FromStr for ResourceId {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<&str> for ResourceId {
    type Error = crate::Error;

    fn try_from(s: &str) -> crate::Result<Self> {
        Self::new(s)
    }
}

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId({self})")
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Numeric(n) => serializer.serialize_i64(*n),
            Self::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Numeric(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Numeric(n) => Ok(Self::Numeric(n)),
            Raw::Text(s) => Self::new(s).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_text_is_canonicalized() {
        let id = ResourceId::new("123").unwrap();
        assert_eq!(id, ResourceId::Numeric(123));
        assert_eq!(id, ResourceId::from(123));
        assert_eq!(id.to_key(), "123");
    }

    #[test]
    fn test_non_canonical_numbers_stay_text() {
        // Leading zeros and a plus sign do not round-trip through i64.
        assert_eq!(
            ResourceId::new("0123").unwrap(),
            ResourceId::Text("0123".to_string())
        );
        assert_eq!(
            ResourceId::new("+5").unwrap(),
            ResourceId::Text("+5".to_string())
        );
        assert_eq!(ResourceId::new("-7").unwrap(), ResourceId::Numeric(-7));
    }

    #[test]
    fn test_rejects_separator_and_empty() {
        assert!(ResourceId::new("").is_err());
        assert!(ResourceId::new("a•b").is_err());
        assert!(ResourceId::new("tab\there").is_err());
        assert!(ResourceId::new("x".repeat(MAX_RESOURCE_ID_LEN + 1)).is_err());
        assert!(ResourceId::new("orders/2024").is_ok());
    }

    #[test]
    fn test_serde_roundtrip_keeps_variant() {
        let numeric = serde_json::to_string(&ResourceId::from(42)).unwrap();
        assert_eq!(numeric, "42");
        let text = serde_json::to_string(&ResourceId::new("doc").unwrap()).unwrap();
        assert_eq!(text, "\"doc\"");

        let parsed: ResourceId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(parsed, ResourceId::Numeric(42));
        assert!(serde_json::from_str::<ResourceId>("\"a•b\"").is_err());
    }
}
