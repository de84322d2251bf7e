//! Error types for cache operations.

use std::path::PathBuf;

use kiln_common::ChecksumError;

/// Errors that can occur during cache operations.
///
/// Existence checks are fail-safe: a corrupt or mismatched artifact is a
/// cache miss rather than an error. Fetching or storing an artifact surfaces
/// these errors to the caller.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An artifact file has an invalid or missing header.
    #[error("invalid artifact header in {path}: {reason}")]
    InvalidHeader {
        /// The artifact file path.
        path: PathBuf,
        /// Description of the header problem.
        reason: String,
    },

    /// The stored checksum does not match the computed checksum of the payload.
    #[error("checksum mismatch in {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The artifact file path.
        path: PathBuf,
        /// The expected checksum from the header.
        expected: String,
        /// The actual checksum computed from the payload.
        actual: String,
    },

    /// The artifact format version does not match the current version.
    #[error("version mismatch in {path}: expected {expected}, got {actual}")]
    VersionMismatch {
        /// The artifact file path.
        path: PathBuf,
        /// The expected format version.
        expected: u32,
        /// The actual format version found in the file.
        actual: u32,
    },

    /// A stored entry was written for a different cache key.
    #[error("key mismatch in {path}: expected {expected}, got {actual}")]
    KeyMismatch {
        /// The entry path.
        path: PathBuf,
        /// The key checksum that was requested.
        expected: String,
        /// The key checksum recorded in the entry.
        actual: String,
    },

    /// No entry exists for the requested key.
    #[error("no cached artifact for {name}")]
    MissingArtifact {
        /// Artifact file name or origin hash that was looked up.
        name: String,
    },

    /// An origin hash contained characters that cannot name a cache entry.
    #[error("invalid origin hash `{0}`")]
    InvalidOriginHash(String),

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// A cache key could not be encoded for checksumming.
    #[error(transparent)]
    Checksum(#[from] ChecksumError),

    /// A backend-specific failure (network, permissions, remote service).
    #[error("cache backend error: {reason}")]
    Backend {
        /// Description of the backend failure.
        reason: String,
    },
}
