//! Cache key derivation over a whole graph without building anything.

use std::collections::BTreeMap;

use kiln_cache::{CacheError, CacheKey, Keyed};
use kiln_graph::{Graph, NodeIndex};

use crate::error::OrchestratorError;

/// Derives every node's cache key, dependencies first.
pub fn derive_keys<T: Keyed>(
    graph: &Graph<T>,
) -> Result<BTreeMap<NodeIndex, CacheKey>, OrchestratorError> {
    let mut keys: BTreeMap<NodeIndex, CacheKey> = BTreeMap::new();
    let mut checksums: BTreeMap<NodeIndex, String> = BTreeMap::new();

    for layer in graph.layers()? {
        for index in layer {
            let Some(value) = graph.value(index) else {
                continue;
            };
            let dependencies = dependency_checksums(graph, index, |child| {
                checksums.get(&child).map(String::as_str)
            });
            let key_error = |source: CacheError| OrchestratorError::KeyDerivation {
                target: value.identity(),
                source,
            };
            let key = value.cache_key(&dependencies).map_err(key_error)?;
            let checksum = key.checksum().map_err(|e| key_error(e.into()))?;
            checksums.insert(index, checksum);
            keys.insert(index, key);
        }
    }
    Ok(keys)
}

/// Maps each child's identity to its key checksum.
///
/// Children without a checksum yet are left out.
pub(crate) fn dependency_checksums<'a, T: Keyed>(
    graph: &Graph<T>,
    index: NodeIndex,
    checksum_of: impl Fn(NodeIndex) -> Option<&'a str>,
) -> BTreeMap<String, String> {
    graph
        .children(index)
        .iter()
        .filter_map(|child| {
            let value = graph.value(*child)?;
            let checksum = checksum_of(*child)?;
            Some((value.identity(), checksum.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Unit {
        name: &'static str,
        version: u32,
        deps: Vec<&'static str>,
    }

    impl Keyed for Unit {
        fn identity(&self) -> String {
            self.name.to_string()
        }

        fn cache_key(
            &self,
            dependencies: &BTreeMap<String, String>,
        ) -> Result<CacheKey, CacheError> {
            if self.version == 0 {
                return Err(CacheError::Backend {
                    reason: "unreadable sources".to_string(),
                });
            }
            let mut key = CacheKey::new(self.name, "source")
                .with_attribute("version", self.version.to_string());
            key.dependencies = dependencies.clone();
            Ok(key)
        }
    }

    fn graph(base_version: u32) -> Graph<Unit> {
        let units = vec![
            Unit { name: "Base", version: base_version, deps: vec![] },
            Unit { name: "Mid", version: 1, deps: vec!["Base"] },
            Unit { name: "Top", version: 1, deps: vec!["Mid"] },
        ];
        Graph::resolve(units, |u| u.name, |u| u.deps.clone()).unwrap()
    }

    #[test]
    fn dependency_checksums_fold_into_keys() {
        let g = graph(1);
        let keys = derive_keys(&g).unwrap();
        let base = &keys[&NodeIndex::new(0)];
        let mid = &keys[&NodeIndex::new(1)];
        assert!(base.dependencies.is_empty());
        assert_eq!(mid.dependencies["Base"], base.checksum().unwrap());
    }

    #[test]
    fn change_at_bottom_reaches_top() {
        let before = derive_keys(&graph(1)).unwrap();
        let after = derive_keys(&graph(2)).unwrap();
        let top = NodeIndex::new(2);
        assert_ne!(
            before[&top].checksum().unwrap(),
            after[&top].checksum().unwrap()
        );
    }

    #[test]
    fn key_failure_names_target() {
        let err = derive_keys(&graph(0)).unwrap_err();
        assert!(matches!(err, OrchestratorError::KeyDerivation { target, .. } if target == "Base"));
    }
}
