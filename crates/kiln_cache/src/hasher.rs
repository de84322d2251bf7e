//! Content hashing of target input files.
//!
//! Produces the `inputs` map of a [`CacheKey`](crate::CacheKey): one SHA-256
//! per file, keyed by a `/`-separated path relative to the package root so
//! keys do not depend on where the package was checked out.

use std::collections::BTreeMap;
use std::path::{Component, Path};

use kiln_common::Checksum;

use crate::error::CacheError;

/// Utility for computing content hashes of source files.
pub struct SourceHasher;

impl SourceHasher {
    /// Computes the content hash of a single file.
    pub fn hash_file(path: &Path) -> Result<Checksum, CacheError> {
        let content = std::fs::read(path).map_err(|e| CacheError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Checksum::from_bytes(&content))
    }

    /// Hashes every file under the given package-relative paths.
    ///
    /// Directories are walked recursively. Unlike change detection, a missing
    /// input is an error: a key built from partial inputs would be wrong.
    pub fn hash_inputs(
        root: &Path,
        relative_paths: &[impl AsRef<Path>],
    ) -> Result<BTreeMap<String, String>, CacheError> {
        let mut hashes = BTreeMap::new();
        for relative in relative_paths {
            Self::hash_into(root, relative.as_ref(), &mut hashes)?;
        }
        Ok(hashes)
    }

    fn hash_into(
        root: &Path,
        relative: &Path,
        hashes: &mut BTreeMap<String, String>,
    ) -> Result<(), CacheError> {
        let full = root.join(relative);
        let metadata = std::fs::metadata(&full).map_err(|e| CacheError::Io {
            path: full.clone(),
            source: e,
        })?;

        if metadata.is_dir() {
            let entries = std::fs::read_dir(&full).map_err(|e| CacheError::Io {
                path: full.clone(),
                source: e,
            })?;
            for entry in entries {
                let entry = entry.map_err(|e| CacheError::Io {
                    path: full.clone(),
                    source: e,
                })?;
                Self::hash_into(root, &relative.join(entry.file_name()), hashes)?;
            }
        } else {
            let hash = Self::hash_file(&full)?;
            hashes.insert(normalize(relative), hash.to_hex());
        }
        Ok(())
    }
}

fn normalize(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_file_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Deque.swift");
        std::fs::write(&path, "struct Deque {}").unwrap();

        let h1 = SourceHasher::hash_file(&path).unwrap();
        let h2 = SourceHasher::hash_file(&path).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn hash_file_different_content() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.swift");
        let b = dir.path().join("b.swift");
        std::fs::write(&a, "let a = 1").unwrap();
        std::fs::write(&b, "let b = 2").unwrap();
        assert_ne!(
            SourceHasher::hash_file(&a).unwrap(),
            SourceHasher::hash_file(&b).unwrap()
        );
    }

    #[test]
    fn hash_file_nonexistent_errors() {
        let result = SourceHasher::hash_file(Path::new("/nonexistent/file.swift"));
        assert!(matches!(result, Err(CacheError::Io { .. })));
    }

    #[test]
    fn hash_inputs_walks_directories() {
        let dir = tempfile::tempdir().unwrap();
        let sources = dir.path().join("Sources").join("Core");
        std::fs::create_dir_all(sources.join("Nested")).unwrap();
        std::fs::write(sources.join("Core.swift"), "public struct Core {}").unwrap();
        std::fs::write(sources.join("Nested").join("Util.swift"), "enum Util {}").unwrap();

        let hashes = SourceHasher::hash_inputs(dir.path(), &["Sources/Core"]).unwrap();
        let keys: Vec<&str> = hashes.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["Sources/Core/Core.swift", "Sources/Core/Nested/Util.swift"]
        );
    }

    #[test]
    fn hash_inputs_independent_of_checkout_location() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        for root in [first.path(), second.path()] {
            std::fs::write(root.join("main.c"), "int main(void) { return 0; }").unwrap();
        }
        assert_eq!(
            SourceHasher::hash_inputs(first.path(), &["main.c"]).unwrap(),
            SourceHasher::hash_inputs(second.path(), &["main.c"]).unwrap()
        );
    }

    #[test]
    fn hash_inputs_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let result = SourceHasher::hash_inputs(dir.path(), &["Sources/Missing.swift"]);
        assert!(result.is_err());
    }
}
