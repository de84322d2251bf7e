//! Content-derived cache keys and pluggable artifact stores.
//!
//! A [`CacheKey`] names a build target together with everything that affects
//! its output; its checksum addresses the artifact in an [`ArtifactStore`].
//! A second, coarser [`ResolvedDependencyStore`] caches dependency
//! resolution results keyed by a lock-file origin hash. [`LocalStore`] is the
//! file-system backend for both.

#![warn(missing_docs)]

pub mod artifact;
pub mod error;
pub mod hasher;
pub mod key;
pub mod local;
pub mod store;

pub use artifact::ArtifactHeader;
pub use error::CacheError;
pub use hasher::SourceHasher;
pub use key::{artifact_file_name, CacheKey, Keyed, ARTIFACT_EXT, CACHE_FORMAT_VERSION};
pub use local::LocalStore;
pub use store::{ArtifactStore, KeyClaim, Parallelism, ResolvedDependencyStore};
