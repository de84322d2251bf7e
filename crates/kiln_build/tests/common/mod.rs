//! Mock stores and builders shared by the orchestrator tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use kiln_build::{BuildError, Builder};
use kiln_cache::{ArtifactStore, CacheError, CacheKey, Keyed, Parallelism};
use kiln_graph::Graph;

/// A graph value with a name and the names it depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub name: &'static str,
    pub deps: Vec<&'static str>,
}

impl Keyed for Unit {
    fn identity(&self) -> String {
        self.name.to_string()
    }

    fn cache_key(&self, dependencies: &BTreeMap<String, String>) -> Result<CacheKey, CacheError> {
        let mut key = CacheKey::new(self.name, "source").with_attribute("platform", "linux");
        key.dependencies = dependencies.clone();
        Ok(key)
    }
}

pub fn graph(units: &[(&'static str, &[&'static str])]) -> Graph<Unit> {
    let values = units.iter().map(|(name, deps)| Unit {
        name: *name,
        deps: deps.to_vec(),
    });
    Graph::resolve(values, |u| u.name, |u| u.deps.clone()).unwrap()
}

/// `Top -> Mid -> Base`.
pub fn base_mid_top() -> Graph<Unit> {
    graph(&[("Base", &[]), ("Mid", &["Base"]), ("Top", &["Mid"])])
}

/// `App -> {Net, Log}`, `Net -> Core`, `Log -> Core`.
pub fn diamond() -> Graph<Unit> {
    graph(&[
        ("Core", &[]),
        ("Net", &["Core"]),
        ("Log", &["Core"]),
        ("App", &["Net", "Log"]),
    ])
}

/// An in-memory store with switchable failures and call counters.
#[derive(Default)]
pub struct MockStore {
    /// Checksums with a stored artifact.
    pub entries: Mutex<HashSet<String>>,
    /// Names the store claims to hold whatever their key.
    pub preloaded: HashSet<&'static str>,
    /// Names whose fetch fails.
    pub broken_fetch: HashSet<&'static str>,
    pub limit: usize,
    pub lookups: AtomicUsize,
    pub fetches: Mutex<Vec<String>>,
    pub stores: Mutex<Vec<String>>,
}

impl MockStore {
    pub fn with_hits(names: &[&'static str]) -> Self {
        Self {
            preloaded: names.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn stored(&self) -> Vec<String> {
        self.stores.lock().unwrap().clone()
    }
}

impl ArtifactStore for MockStore {
    fn max_parallelism(&self) -> Parallelism {
        Parallelism::bounded(self.limit)
    }

    fn exists_valid_cache(&self, key: &CacheKey) -> Result<bool, CacheError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.preloaded.contains(key.name.as_str())
            || self.entries.lock().unwrap().contains(&key.checksum()?))
    }

    fn fetch(&self, key: &CacheKey, destination: &Path) -> Result<PathBuf, CacheError> {
        if self.broken_fetch.contains(key.name.as_str()) {
            return Err(CacheError::MissingArtifact {
                name: key.name.clone(),
            });
        }
        self.fetches.lock().unwrap().push(key.name.clone());
        Ok(destination.join(&key.name))
    }

    fn store(&self, _artifact: &Path, key: &CacheKey) -> Result<(), CacheError> {
        self.entries.lock().unwrap().insert(key.checksum()?);
        self.stores.lock().unwrap().push(key.name.clone());
        Ok(())
    }
}

/// A builder recording call order, per-name counts, and peak concurrency.
#[derive(Default)]
pub struct MockBuilder {
    pub failing: HashSet<&'static str>,
    pub delay: Duration,
    pub order: Mutex<Vec<String>>,
    pub counts: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    pub peak: AtomicUsize,
}

impl MockBuilder {
    pub fn failing(names: &[&'static str]) -> Self {
        Self {
            failing: names.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn built(&self) -> Vec<String> {
        self.order.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.counts.lock().unwrap().get(name).copied().unwrap_or(0)
    }
}

impl Builder<Unit> for MockBuilder {
    fn build(&self, value: &Unit) -> Result<PathBuf, BuildError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.order.lock().unwrap().push(value.name.to_string());
        *self
            .counts
            .lock()
            .unwrap()
            .entry(value.name.to_string())
            .or_default() += 1;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(value.name) {
            return Err(BuildError::new(value.name, "compiler exited with status 1"));
        }
        Ok(PathBuf::from("/build").join(value.name))
    }
}
