//! File-system cache backend.
//!
//! Layout under the cache root:
//!
//! ```text
//! artifacts/<name>-<checksum>.artifact   framed build artifacts
//! locks/<checksum>.lock                  per-key build claims
//! resolved/<origin-hash>.json            dependency resolution results
//! ```
//!
//! Every write lands in a temporary file inside the target directory and is
//! renamed into place, so readers only ever see complete entries.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::artifact::{self, ArtifactHeader};
use crate::error::CacheError;
use crate::key::{CacheKey, ARTIFACT_EXT, CACHE_FORMAT_VERSION};
use crate::store::{ArtifactStore, KeyClaim, Parallelism, ResolvedDependencyStore};

/// Subdirectory for framed build artifacts.
const ARTIFACTS_SUBDIR: &str = "artifacts";

/// Subdirectory for per-key build claim files.
const LOCKS_SUBDIR: &str = "locks";

/// Subdirectory for cached dependency resolutions.
const RESOLVED_SUBDIR: &str = "resolved";

#[derive(Serialize)]
struct ResolvedRecordRef<'a, P> {
    format_version: u32,
    origin_hash: &'a str,
    packages: &'a [P],
}

#[derive(Deserialize)]
struct ResolvedRecord<P> {
    format_version: u32,
    origin_hash: String,
    packages: Vec<P>,
}

/// Cache store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    parallelism: Parallelism,
}

impl LocalStore {
    /// Creates a store rooted at `root`. Directories are created lazily.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            parallelism: Parallelism::Unbounded,
        }
    }

    /// Sets the concurrency hint reported to the orchestrator.
    pub fn with_max_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the artifact stored for `key`.
    pub fn artifact_path(&self, key: &CacheKey) -> Result<PathBuf, CacheError> {
        Ok(self.root.join(ARTIFACTS_SUBDIR).join(key.artifact_name()?))
    }

    /// Path of the resolution stored for `origin_hash`.
    pub fn resolved_path(&self, origin_hash: &str) -> Result<PathBuf, CacheError> {
        if origin_hash.is_empty() || !origin_hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CacheError::InvalidOriginHash(origin_hash.to_string()));
        }
        Ok(self
            .root
            .join(RESOLVED_SUBDIR)
            .join(format!("{origin_hash}.json")))
    }

    /// Removes artifacts whose key checksum is not in `live_checksums`.
    ///
    /// Returns the number of files removed.
    pub fn gc(&self, live_checksums: &[&str]) -> Result<usize, CacheError> {
        self.remove_stale_locks(live_checksums)?;
        let dir = self.root.join(ARTIFACTS_SUBDIR);
        if !dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        let entries = std::fs::read_dir(&dir).map_err(|e| CacheError::Io {
            path: dir.clone(),
            source: e,
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| CacheError::Io {
                path: dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ARTIFACT_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let checksum = stem.rsplit_once('-').map_or(stem, |(_, checksum)| checksum);
            if !live_checksums.contains(&checksum) {
                std::fs::remove_file(&path).map_err(|e| CacheError::Io {
                    path: path.clone(),
                    source: e,
                })?;
                removed += 1;
            }
        }

        debug!(removed, dir = %dir.display(), "cache gc");
        Ok(removed)
    }

    /// Path of the claim file for `checksum`.
    fn lock_path(&self, checksum: &str) -> PathBuf {
        self.root.join(LOCKS_SUBDIR).join(format!("{checksum}.lock"))
    }

    fn open_lock(path: &Path) -> Result<File, CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| CacheError::Io {
                path: path.to_path_buf(),
                source: e,
            })
    }

    /// Deletes claim files of dead keys that nobody currently holds.
    fn remove_stale_locks(&self, live_checksums: &[&str]) -> Result<(), CacheError> {
        let dir = self.root.join(LOCKS_SUBDIR);
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Ok(());
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(checksum) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if live_checksums.contains(&checksum) {
                continue;
            }
            let file = Self::open_lock(&path)?;
            if file.try_lock_exclusive().is_ok() {
                std::fs::remove_file(&path).map_err(|e| CacheError::Io {
                    path: path.clone(),
                    source: e,
                })?;
            }
        }
        Ok(())
    }

    fn read_entry(path: &Path, name: &str) -> Result<Option<Vec<u8>>, CacheError> {
        match std::fs::read(path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(%name, "cache entry absent");
                Ok(None)
            }
            Err(e) => Err(CacheError::Io {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

/// Writes `bytes` to `dest` through a temporary file in the same directory.
fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| CacheError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let io_err = |e: std::io::Error| CacheError::Io {
        path: dest.to_path_buf(),
        source: e,
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(dest).map_err(|e| io_err(e.error))?;
    Ok(())
}

impl ArtifactStore for LocalStore {
    fn max_parallelism(&self) -> Parallelism {
        self.parallelism
    }

    fn exists_valid_cache(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let checksum = key.checksum()?;
        let path = self.artifact_path(key)?;
        let Some(raw) = Self::read_entry(&path, &key.name)? else {
            return Ok(false);
        };
        match artifact::decode(&path, &raw, &checksum) {
            Ok(_) => Ok(true),
            Err(e) => {
                debug!(name = %key.name, error = %e, "ignoring invalid cache entry");
                Ok(false)
            }
        }
    }

    fn fetch(&self, key: &CacheKey, destination: &Path) -> Result<PathBuf, CacheError> {
        let checksum = key.checksum()?;
        let path = self.artifact_path(key)?;
        let raw = Self::read_entry(&path, &key.name)?.ok_or_else(|| CacheError::MissingArtifact {
            name: key.artifact_name().unwrap_or_else(|_| key.name.clone()),
        })?;
        let (header, payload) = artifact::decode(&path, &raw, &checksum)?;

        let output = destination.join(&header.file_name);
        write_atomic(&output, payload)?;
        debug!(name = %key.name, %checksum, output = %output.display(), "fetched artifact");
        Ok(output)
    }

    fn claim(&self, key: &CacheKey) -> Result<KeyClaim, CacheError> {
        let path = self.lock_path(&key.checksum()?);
        let file = Self::open_lock(&path)?;
        let lock_err = |e: std::io::Error| CacheError::Io {
            path: path.clone(),
            source: e,
        };
        let contended = match file.try_lock_exclusive() {
            Ok(()) => false,
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                debug!(name = %key.name, "waiting for build claim");
                file.lock_exclusive().map_err(lock_err)?;
                true
            }
            Err(e) => return Err(lock_err(e)),
        };
        Ok(KeyClaim::guarded(file, contended))
    }

    fn store(&self, artifact_path: &Path, key: &CacheKey) -> Result<(), CacheError> {
        let checksum = key.checksum()?;
        let payload = std::fs::read(artifact_path).map_err(|e| CacheError::Io {
            path: artifact_path.to_path_buf(),
            source: e,
        })?;
        let file_name = artifact_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| CacheError::InvalidHeader {
                path: artifact_path.to_path_buf(),
                reason: "artifact path has no UTF-8 file name".to_string(),
            })?;

        let header = ArtifactHeader::new(&checksum, file_name, &payload);
        let framed = artifact::encode(&header, &payload)?;
        let dest = self.artifact_path(key)?;
        write_atomic(&dest, &framed)?;
        debug!(name = %key.name, %checksum, bytes = payload.len(), "stored artifact");
        Ok(())
    }
}

impl<P> ResolvedDependencyStore<P> for LocalStore
where
    P: Serialize + DeserializeOwned,
{
    fn exists_resolved(&self, origin_hash: &str) -> Result<bool, CacheError> {
        let path = self.resolved_path(origin_hash)?;
        let Some(raw) = Self::read_entry(&path, origin_hash)? else {
            return Ok(false);
        };
        let valid = serde_json::from_slice::<ResolvedRecord<IgnoredAny>>(&raw)
            .map(|record| {
                record.format_version == CACHE_FORMAT_VERSION && record.origin_hash == origin_hash
            })
            .unwrap_or(false);
        Ok(valid)
    }

    fn fetch_resolved(&self, origin_hash: &str) -> Result<Vec<P>, CacheError> {
        let path = self.resolved_path(origin_hash)?;
        let raw = Self::read_entry(&path, origin_hash)?.ok_or_else(|| {
            CacheError::MissingArtifact {
                name: origin_hash.to_string(),
            }
        })?;
        let record: ResolvedRecord<P> =
            serde_json::from_slice(&raw).map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;

        if record.format_version != CACHE_FORMAT_VERSION {
            return Err(CacheError::VersionMismatch {
                path,
                expected: CACHE_FORMAT_VERSION,
                actual: record.format_version,
            });
        }
        if record.origin_hash != origin_hash {
            return Err(CacheError::KeyMismatch {
                path,
                expected: origin_hash.to_string(),
                actual: record.origin_hash,
            });
        }
        Ok(record.packages)
    }

    fn store_resolved(&self, origin_hash: &str, packages: &[P]) -> Result<(), CacheError> {
        let path = self.resolved_path(origin_hash)?;
        let record = ResolvedRecordRef {
            format_version: CACHE_FORMAT_VERSION,
            origin_hash,
            packages,
        };
        let json =
            serde_json::to_vec_pretty(&record).map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;
        write_atomic(&path, &json)?;
        debug!(%origin_hash, count = packages.len(), "stored resolved dependencies");
        Ok(())
    }
}
