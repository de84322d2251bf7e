//! Abstract store contracts implemented by every cache backend.

use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::error::CacheError;
use crate::key::CacheKey;

/// How many fetch, store, or build operations a backend accepts at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parallelism {
    /// At most this many concurrent operations.
    Bounded(NonZeroUsize),
    /// No backend-imposed limit.
    #[default]
    Unbounded,
}

impl Parallelism {
    /// A bound of `limit` operations; `0` means unbounded.
    pub fn bounded(limit: usize) -> Self {
        NonZeroUsize::new(limit).map_or(Self::Unbounded, Self::Bounded)
    }

    /// The bound, if any.
    pub fn limit(self) -> Option<usize> {
        match self {
            Self::Bounded(limit) => Some(limit.get()),
            Self::Unbounded => None,
        }
    }
}

/// Exclusive right to build one cache key, released on drop.
///
/// A claim is `contended` when its holder had to wait for another holder,
/// which usually means the key was just built and stored by someone else.
#[must_use = "the claim is released as soon as it is dropped"]
pub struct KeyClaim {
    contended: bool,
    held: Option<Box<dyn Send>>,
}

impl KeyClaim {
    /// A claim that holds nothing, for stores without cross-process locking.
    pub fn unguarded() -> Self {
        Self {
            contended: false,
            held: None,
        }
    }

    /// A claim kept alive by `guard`.
    pub fn guarded(guard: impl Send + 'static, contended: bool) -> Self {
        Self {
            contended,
            held: Some(Box::new(guard)),
        }
    }

    /// Whether acquiring the claim waited on another holder.
    pub fn contended(&self) -> bool {
        self.contended
    }
}

impl fmt::Debug for KeyClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyClaim")
            .field("contended", &self.contended)
            .field("guarded", &self.held.is_some())
            .finish()
    }
}

/// Storage for built artifacts, addressed by [`CacheKey`].
///
/// Implementations must be safe to call concurrently for different keys.
/// Concurrent writes for the same key may resolve last-writer-wins, but a
/// partially written artifact must never be reported as existing.
pub trait ArtifactStore: Send + Sync {
    /// Concurrency hint the orchestrator must respect.
    fn max_parallelism(&self) -> Parallelism {
        Parallelism::Unbounded
    }

    /// Returns `true` if a complete, valid artifact is stored for `key`.
    fn exists_valid_cache(&self, key: &CacheKey) -> Result<bool, CacheError>;

    /// Materializes the artifact for `key` inside `destination` and returns
    /// the path it was written to.
    fn fetch(&self, key: &CacheKey, destination: &Path) -> Result<PathBuf, CacheError>;

    /// Stores the file at `artifact` under `key`.
    fn store(&self, artifact: &Path, key: &CacheKey) -> Result<(), CacheError>;

    /// Blocks until the caller holds the build claim for `key` among every
    /// user of this store, including other processes.
    ///
    /// Callers re-check [`exists_valid_cache`](Self::exists_valid_cache)
    /// after a contended claim. The default claim guards nothing.
    fn claim(&self, _key: &CacheKey) -> Result<KeyClaim, CacheError> {
        Ok(KeyClaim::unguarded())
    }
}

/// Storage for dependency-resolution results, addressed by an origin hash
/// (a fingerprint of the whole lock-file state).
pub trait ResolvedDependencyStore<P>: Send + Sync {
    /// Returns `true` if a resolution is stored for `origin_hash`.
    fn exists_resolved(&self, origin_hash: &str) -> Result<bool, CacheError>;

    /// Loads the resolved packages stored for `origin_hash`.
    fn fetch_resolved(&self, origin_hash: &str) -> Result<Vec<P>, CacheError>;

    /// Stores resolved packages under `origin_hash`.
    fn store_resolved(&self, origin_hash: &str, packages: &[P]) -> Result<(), CacheError>;
}
