//! Binary artifact framing.
//!
//! Every stored artifact is a 4-byte little-endian header length, a bincode
//! [`ArtifactHeader`], and the raw payload. The header ties the payload to
//! the cache key it was stored under and carries a payload checksum, so a
//! truncated or tampered file is never mistaken for a valid entry.

use std::ffi::OsStr;
use std::path::Path;

use kiln_common::Checksum;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::key::CACHE_FORMAT_VERSION;

/// Magic bytes identifying a Kiln cache artifact.
const ARTIFACT_MAGIC: [u8; 4] = *b"KILN";

/// Header prepended to every cached artifact for validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    /// Magic bytes: must be `b"KILN"`.
    pub magic: [u8; 4],

    /// Cache format version the artifact was written with.
    pub format_version: u32,

    /// Checksum of the cache key the artifact was stored under.
    pub key_checksum: String,

    /// File name of the artifact as produced by the builder.
    pub file_name: String,

    /// SHA-256 of the payload.
    pub payload_checksum: Checksum,
}

impl ArtifactHeader {
    /// Creates a header for `payload` stored under `key_checksum`.
    pub fn new(key_checksum: &str, file_name: &str, payload: &[u8]) -> Self {
        Self {
            magic: ARTIFACT_MAGIC,
            format_version: CACHE_FORMAT_VERSION,
            key_checksum: key_checksum.to_string(),
            file_name: file_name.to_string(),
            payload_checksum: Checksum::from_bytes(payload),
        }
    }
}

/// Frames a payload with its header.
pub fn encode(header: &ArtifactHeader, payload: &[u8]) -> Result<Vec<u8>, CacheError> {
    let header_bytes = bincode::serde::encode_to_vec(header, bincode::config::standard())
        .map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;

    let header_len = header_bytes.len() as u32;
    let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
    output.extend_from_slice(&header_len.to_le_bytes());
    output.extend_from_slice(&header_bytes);
    output.extend_from_slice(payload);
    Ok(output)
}

/// Splits and validates a framed artifact read from `path`.
///
/// Checks the magic bytes, the file name (a single path component), the
/// format version, the key checksum and the payload checksum. Returns the
/// header and a slice of the payload.
pub fn decode<'a>(
    path: &Path,
    raw: &'a [u8],
    expected_key: &str,
) -> Result<(ArtifactHeader, &'a [u8]), CacheError> {
    let invalid = |reason: &str| CacheError::InvalidHeader {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    if raw.len() < 4 {
        return Err(invalid("file shorter than header length prefix"));
    }
    let mut prefix = [0u8; 4];
    prefix.copy_from_slice(&raw[..4]);
    let header_len = u32::from_le_bytes(prefix) as usize;
    if raw.len() - 4 < header_len {
        return Err(invalid("truncated header"));
    }

    let (header, _): (ArtifactHeader, usize) =
        bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard())
            .map_err(|e| invalid(&e.to_string()))?;

    if header.magic != ARTIFACT_MAGIC {
        return Err(invalid("missing magic bytes"));
    }
    if Path::new(&header.file_name).file_name() != Some(OsStr::new(&header.file_name)) {
        return Err(invalid("artifact file name is not a plain file name"));
    }
    if header.format_version != CACHE_FORMAT_VERSION {
        return Err(CacheError::VersionMismatch {
            path: path.to_path_buf(),
            expected: CACHE_FORMAT_VERSION,
            actual: header.format_version,
        });
    }
    if header.key_checksum != expected_key {
        return Err(CacheError::KeyMismatch {
            path: path.to_path_buf(),
            expected: expected_key.to_string(),
            actual: header.key_checksum.clone(),
        });
    }

    let payload = &raw[4 + header_len..];
    let actual = Checksum::from_bytes(payload);
    if actual != header.payload_checksum {
        return Err(CacheError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: header.payload_checksum.to_hex(),
            actual: actual.to_hex(),
        });
    }

    Ok((header, payload))
}
