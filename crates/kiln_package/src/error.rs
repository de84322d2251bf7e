//! Error types for package loading and target flattening.

use std::path::PathBuf;

use kiln_cache::CacheError;
use kiln_common::ChecksumError;

/// Errors that can occur while loading packages or wiring their targets.
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    /// A package description or lock file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A package description or lock file is not valid JSON for its schema.
    #[error("failed to parse {path}: {reason}")]
    Parse {
        /// The file that failed to parse.
        path: PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// A target depends on a target its own package does not declare.
    #[error("target `{target}` depends on unknown target `{dependency}`")]
    UnknownTarget {
        /// The depending target.
        target: String,
        /// The missing target name.
        dependency: String,
    },

    /// A product dependency names a package that was not resolved.
    #[error("target `{target}` depends on unknown package `{package}`")]
    UnknownPackage {
        /// The depending target.
        target: String,
        /// The missing package identity.
        package: String,
    },

    /// A product dependency names a product its package does not vend.
    #[error("target `{target}` depends on unknown product `{product}` of package `{package}`")]
    UnknownProduct {
        /// The depending target.
        target: String,
        /// The package that was searched.
        package: String,
        /// The missing product name.
        product: String,
    },

    /// Two resolved packages share an identity.
    #[error("package identity `{identity}` is used by both {first} and {second}")]
    DuplicatePackage {
        /// The shared identity.
        identity: String,
        /// Location of the first package.
        first: String,
        /// Location of the second package.
        second: String,
    },

    /// A platform name is not recognized.
    #[error("unknown platform `{0}`")]
    UnknownPlatform(String),

    /// The lock state could not be fingerprinted.
    #[error(transparent)]
    Checksum(#[from] ChecksumError),

    /// The resolved-dependency cache failed.
    #[error(transparent)]
    Cache(#[from] CacheError),
}
