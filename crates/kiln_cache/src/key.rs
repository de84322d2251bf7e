//! Cache keys: the canonical description of everything that affects a
//! target's build output.

use std::collections::{BTreeMap, HashMap};

use kiln_common::{calculate_checksum, canonical_json, ChecksumError};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Version of the cache key schema and artifact naming scheme.
///
/// Bump whenever [`CacheKey`] fields or [`artifact_file_name`] change, so old
/// entries stop matching.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// File extension of stored artifacts.
pub const ARTIFACT_EXT: &str = "artifact";

/// Serializable fingerprint of a build target.
///
/// The checksum is SHA-256 over the canonical JSON encoding (sorted keys,
/// pretty printed), so two keys with equal fields always hash identically
/// whatever order their maps were filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheKey {
    /// Stable identity of the target.
    pub name: String,

    /// Kind of module the target produces (`source`, `binary`, `foreign`, ...).
    pub kind: String,

    /// Cache schema version the key was produced under.
    pub format_version: u32,

    /// Content hashes of input files, keyed by package-relative path.
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,

    /// Checksums of the target's dependencies, keyed by their identity.
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,

    /// Free-form build metadata (platform, configuration, toolchain, settings).
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl CacheKey {
    /// Creates a key with no inputs, dependencies, or attributes.
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            format_version: CACHE_FORMAT_VERSION,
            inputs: BTreeMap::new(),
            dependencies: BTreeMap::new(),
            attributes: HashMap::new(),
        }
    }

    /// Adds an input file hash.
    pub fn with_input(mut self, path: impl Into<String>, hash: impl Into<String>) -> Self {
        self.inputs.insert(path.into(), hash.into());
        self
    }

    /// Adds a dependency checksum.
    pub fn with_dependency(mut self, name: impl Into<String>, checksum: impl Into<String>) -> Self {
        self.dependencies.insert(name.into(), checksum.into());
        self
    }

    /// Adds a metadata attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// The canonical encoding the checksum is computed over.
    pub fn canonical(&self) -> Result<String, ChecksumError> {
        canonical_json(self)
    }

    /// Lowercase hex SHA-256 of the canonical encoding.
    pub fn checksum(&self) -> Result<String, ChecksumError> {
        calculate_checksum(self)
    }

    /// File name the artifact for this key is stored under.
    pub fn artifact_name(&self) -> Result<String, ChecksumError> {
        Ok(artifact_file_name(&self.name, &self.checksum()?))
    }
}

/// Builds the store name `<name>-<checksum>.artifact`.
///
/// Characters outside `[A-Za-z0-9._-]` in the name become `_`.
pub fn artifact_file_name(name: &str, checksum: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{stem}-{checksum}.{ARTIFACT_EXT}")
}

/// A value that can describe itself as a [`CacheKey`].
///
/// `dependencies` maps the identity of every direct dependency to its key
/// checksum, so a change anywhere below a target changes the target's key.
pub trait Keyed {
    /// Stable identity string, unique within one build graph.
    fn identity(&self) -> String;

    /// Derives the cache key for this value.
    fn cache_key(&self, dependencies: &BTreeMap<String, String>) -> Result<CacheKey, CacheError>;
}
