//! Lock-file snapshots and their origin hash.

use std::path::Path;

use kiln_cache::CACHE_FORMAT_VERSION;
use kiln_common::calculate_checksum;
use serde::{Deserialize, Serialize};

use crate::error::PackageError;

/// Where a pinned dependency is checked out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinState {
    /// Exact source-control revision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// Resolved version, when pinned by version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Branch, when pinned by branch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// One pinned dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pin {
    /// Package identity.
    pub identity: String,
    /// Origin kind (`remoteSourceControl`, `localSourceControl`, `registry`).
    pub kind: String,
    /// URL or path the package was fetched from.
    pub location: String,
    /// Checked-out state.
    pub state: PinState,
}

/// A `Package.resolved` lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageResolved {
    /// Hash of the manifests the lock was produced from, if recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_hash: Option<String>,
    /// Pinned dependencies.
    #[serde(default)]
    pub pins: Vec<Pin>,
    /// Lock file schema version.
    pub version: u32,
}

#[derive(Serialize)]
struct Fingerprint<'a> {
    cache_format_version: u32,
    lock_version: u32,
    manifest_hash: Option<&'a str>,
    pins: Vec<&'a Pin>,
}

impl PackageResolved {
    /// Reads a lock file from disk.
    pub fn load(path: &Path) -> Result<Self, PackageError> {
        let content = std::fs::read_to_string(path).map_err(|e| PackageError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content).map_err(|reason| PackageError::Parse {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Parses lock file text.
    pub fn parse(content: &str) -> Result<Self, String> {
        serde_json::from_str(content).map_err(|e| e.to_string())
    }

    /// Fingerprint of the whole lock state, keying the resolution cache.
    ///
    /// Pins are sorted by identity first, so reordering the file does not
    /// change the hash.
    pub fn origin_hash(&self) -> Result<String, PackageError> {
        let mut pins: Vec<&Pin> = self.pins.iter().collect();
        pins.sort_by(|a, b| {
            a.identity
                .to_ascii_lowercase()
                .cmp(&b.identity.to_ascii_lowercase())
        });
        let fingerprint = Fingerprint {
            cache_format_version: CACHE_FORMAT_VERSION,
            lock_version: self.version,
            manifest_hash: self.origin_hash.as_deref(),
            pins,
        };
        Ok(calculate_checksum(&fingerprint)?)
    }
}
