//! Reusing dependency resolution across invocations.

use kiln_cache::ResolvedDependencyStore;
use tracing::{debug, warn};

use crate::error::PackageError;
use crate::model::ResolvedPackage;
use crate::pins::PackageResolved;

/// Where a resolution came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// Loaded from the resolved-dependency store.
    Cache,
    /// Produced by the resolver and stored for next time.
    Fresh,
}

/// Returns the packages for `lock`, resolving only when the store has none.
///
/// An error while checking the store counts as a miss. Once the store claims
/// a hit, failing to load it is an error, and so is failing to store a fresh
/// resolution.
pub fn resolve_with_cache<S, F>(
    store: &S,
    lock: &PackageResolved,
    resolve: F,
) -> Result<(Vec<ResolvedPackage>, ResolutionSource), PackageError>
where
    S: ResolvedDependencyStore<ResolvedPackage> + ?Sized,
    F: FnOnce() -> Result<Vec<ResolvedPackage>, PackageError>,
{
    let origin_hash = lock.origin_hash()?;

    let cached = match store.exists_resolved(&origin_hash) {
        Ok(found) => found,
        Err(e) => {
            warn!(origin_hash = %origin_hash, error = %e, "resolution cache lookup failed; resolving");
            false
        }
    };

    if cached {
        let packages = store.fetch_resolved(&origin_hash)?;
        debug!(origin_hash = %origin_hash, packages = packages.len(), "reusing cached resolution");
        return Ok((packages, ResolutionSource::Cache));
    }

    let packages = resolve()?;
    store.store_resolved(&origin_hash, &packages)?;
    debug!(origin_hash = %origin_hash, packages = packages.len(), "stored fresh resolution");
    Ok((packages, ResolutionSource::Fresh))
}
