//! SHA-256 checksums and canonical serialization for cache fingerprints.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Errors raised while producing a canonical encoding.
#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    /// The value could not be converted into its canonical JSON form.
    #[error("failed to encode value for checksum: {reason}")]
    Encoding {
        /// Description of the encoding failure.
        reason: String,
    },
}

/// A 256-bit SHA-256 digest.
///
/// Used both for cache-key fingerprints and for artifact payload integrity.
/// Serializes as a lowercase hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Checksum([u8; 32]);

impl Checksum {
    /// Computes the SHA-256 digest of a byte slice.
    pub fn from_bytes(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Parses a 64-character lowercase or uppercase hex string.
    pub fn from_hex(text: &str) -> Option<Self> {
        let bytes = hex::decode(text).ok()?;
        let array: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(array))
    }

    /// Returns the lowercase hex form of the digest.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

impl Serialize for Checksum {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Checksum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Checksum::from_hex(&text)
            .ok_or_else(|| de::Error::custom(format!("invalid sha256 hex digest `{text}`")))
    }
}

/// Serializes a value as pretty JSON with every object's keys sorted.
///
/// Two values with the same logical content always produce byte-identical
/// output, regardless of the in-memory ordering of their maps.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ChecksumError> {
    let tree = serde_json::to_value(value).map_err(|e| ChecksumError::Encoding {
        reason: e.to_string(),
    })?;
    serde_json::to_string_pretty(&sort_keys(tree)).map_err(|e| ChecksumError::Encoding {
        reason: e.to_string(),
    })
}

/// Returns the lowercase hex SHA-256 digest of a value's canonical encoding.
pub fn calculate_checksum<T: Serialize + ?Sized>(value: &T) -> Result<String, ChecksumError> {
    let encoded = canonical_json(value)?;
    Ok(Checksum::from_bytes(encoded.as_bytes()).to_hex())
}

// Rebuilds objects in key order so the output does not depend on whether
// serde_json was compiled with `preserve_order`.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::with_capacity(entries.len());
            for (key, inner) in entries {
                sorted.insert(key, sort_keys(inner));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}
