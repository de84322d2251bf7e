//! Layered, cache-aware traversal of a build graph.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use kiln_cache::{ArtifactStore, CacheKey, Keyed};
use kiln_graph::{Graph, NodeIndex};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::builder::Builder;
use crate::coordination::{lock, StoreCoordinator};
use crate::error::OrchestratorError;
use crate::keys::dependency_checksums;
use crate::state::{BuildReport, FailureReason, MissReason, NodeState, Origin};

/// Drives cache lookups and builds for every node of a graph.
///
/// Every run of every orchestrator over the same store shares one worker
/// pool, so the store's parallelism bound holds across all of them, and one
/// per-key lock, so each cache key is built at most once while any of them
/// is alive. Other processes are kept out by the store's key claims.
pub struct Orchestrator<T> {
    // Declared before `store` so it is released first.
    coordinator: Arc<StoreCoordinator>,
    store: Arc<dyn ArtifactStore>,
    builder: Arc<dyn Builder<T>>,
    output_dir: PathBuf,
}

/// Shared state of one run.
struct Run<'g, T> {
    graph: &'g Graph<T>,
    states: Mutex<BTreeMap<NodeIndex, NodeState>>,
    first_error: Mutex<Option<OrchestratorError>>,
    cancelled: AtomicBool,
}

enum Decision {
    Hit,
    Miss(MissReason),
}

impl<T: Keyed + Send + Sync> Orchestrator<T> {
    /// Creates an orchestrator fetching into and building for `output_dir`.
    ///
    /// The worker pool has as many threads as the store's parallelism hint
    /// allows, or rayon's default when unbounded. Orchestrators over the
    /// same store share it.
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        builder: Arc<dyn Builder<T>>,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self, OrchestratorError> {
        Ok(Self {
            coordinator: StoreCoordinator::for_store(&store)?,
            store,
            builder,
            output_dir: output_dir.into(),
        })
    }

    /// Directory artifacts are fetched into.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Number of worker threads.
    pub fn parallelism(&self) -> usize {
        self.coordinator.pool().current_num_threads()
    }

    /// Builds or fetches every node of `graph`, dependencies first.
    ///
    /// The run stops dispatching after the first fatal error; nodes already
    /// running finish, the failed node's dependents are marked failed, and
    /// everything else stays pending.
    pub fn run(&self, graph: &Graph<T>) -> BuildReport {
        let run = Run {
            graph,
            states: Mutex::new(
                graph
                    .iter()
                    .map(|(index, _)| (index, NodeState::Pending))
                    .collect(),
            ),
            first_error: Mutex::new(None),
            cancelled: AtomicBool::new(false),
        };

        match graph.layers() {
            Ok(layers) => {
                for layer in layers {
                    if run.cancelled.load(Ordering::SeqCst) {
                        break;
                    }
                    debug!(nodes = layer.len(), "dispatching layer");
                    self.coordinator
                        .pool()
                        .install(|| layer.par_iter().for_each(|index| self.visit(&run, *index)));
                }
            }
            Err(e) => run.record_error(e.into()),
        }

        let report = BuildReport {
            states: run
                .states
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner),
            first_error: run
                .first_error
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner),
        };
        info!(
            built = report.built().len(),
            cached = report.cached().len(),
            failed = report.failed().len(),
            pending = report.pending().len(),
            "build finished"
        );
        report
    }

    fn visit(&self, run: &Run<'_, T>, index: NodeIndex) {
        if run.cancelled.load(Ordering::SeqCst) {
            return;
        }
        let Some(value) = run.graph.value(index) else {
            return;
        };
        let identity = value.identity();

        let (dependencies, dependency_rebuilt) = {
            let states = lock(&run.states);
            if !matches!(states.get(&index), Some(NodeState::Pending)) {
                return;
            }
            let children = run.graph.children(index);
            if !children
                .iter()
                .all(|child| states.get(child).is_some_and(NodeState::is_done))
            {
                return;
            }
            let rebuilt = children.iter().any(|child| {
                matches!(
                    states.get(child),
                    Some(NodeState::Done {
                        origin: Origin::Built(_),
                        ..
                    })
                )
            });
            let dependencies = dependency_checksums(run.graph, index, |child| {
                states.get(&child).and_then(NodeState::checksum)
            });
            (dependencies, rebuilt)
        };

        let key = match value.cache_key(&dependencies) {
            Ok(key) => key,
            Err(source) => {
                return run.fail(
                    index,
                    FailureReason::KeyDerivation,
                    OrchestratorError::KeyDerivation {
                        target: identity,
                        source,
                    },
                );
            }
        };
        let checksum = match key.checksum() {
            Ok(checksum) => checksum,
            Err(e) => {
                return run.fail(
                    index,
                    FailureReason::KeyDerivation,
                    OrchestratorError::KeyDerivation {
                        target: identity,
                        source: e.into(),
                    },
                );
            }
        };

        let key_lock = self.coordinator.key_lock(&checksum);
        let _guard = lock(&key_lock);
        let claim = match self.store.claim(&key) {
            Ok(claim) => claim,
            Err(source) => {
                return run.fail(
                    index,
                    FailureReason::CacheBackend,
                    OrchestratorError::CacheBackend {
                        target: identity,
                        source,
                    },
                );
            }
        };

        // Waiting on another holder's claim means it may have just stored
        // this key, so the store is asked even after a dependency rebuild.
        let force_miss = dependency_rebuilt && !claim.contended();
        match self.decide(&identity, &key, &checksum, force_miss) {
            Decision::Hit => match self.store.fetch(&key, &self.output_dir) {
                Ok(artifact) => {
                    debug!(target_id = %identity, %checksum, "cache hit");
                    run.finish(index, Origin::Cached, checksum, artifact);
                }
                Err(source) => run.fail(
                    index,
                    FailureReason::CacheBackend,
                    OrchestratorError::CacheBackend {
                        target: identity,
                        source,
                    },
                ),
            },
            Decision::Miss(reason) => {
                debug!(target_id = %identity, %checksum, ?reason, "cache miss; building");
                let artifact = match self.builder.build(value) {
                    Ok(artifact) => artifact,
                    Err(e) => return run.fail(index, FailureReason::Build, e.into()),
                };
                if let Err(source) = self.store.store(&artifact, &key) {
                    return run.fail(
                        index,
                        FailureReason::CacheBackend,
                        OrchestratorError::CacheBackend {
                            target: identity,
                            source,
                        },
                    );
                }
                self.coordinator.mark_built(checksum.clone());
                run.finish(index, Origin::Built(reason), checksum, artifact);
            }
        }
    }

    fn decide(
        &self,
        identity: &str,
        key: &CacheKey,
        checksum: &str,
        force_miss: bool,
    ) -> Decision {
        if self.coordinator.is_built(checksum) {
            return Decision::Hit;
        }
        if force_miss {
            return Decision::Miss(MissReason::DependencyRebuilt);
        }
        match self.store.exists_valid_cache(key) {
            Ok(true) => Decision::Hit,
            Ok(false) => Decision::Miss(MissReason::NotCached),
            Err(e) => {
                warn!(target_id = %identity, error = %e, "cache lookup failed; rebuilding");
                Decision::Miss(MissReason::LookupFailed)
            }
        }
    }

}

impl<T> Run<'_, T> {
    fn finish(&self, index: NodeIndex, origin: Origin, checksum: String, artifact: PathBuf) {
        lock(&self.states).insert(
            index,
            NodeState::Done {
                origin,
                checksum,
                artifact,
            },
        );
    }

    fn fail(&self, index: NodeIndex, reason: FailureReason, error: OrchestratorError) {
        warn!(node = %index, %error, "node failed; stopping dispatch");
        self.cancelled.store(true, Ordering::SeqCst);
        {
            let mut states = lock(&self.states);
            states.insert(index, NodeState::Failed(reason));
            for ancestor in self.graph.ancestors(index) {
                if let Some(state) = states.get_mut(&ancestor) {
                    if matches!(state, NodeState::Pending) {
                        *state = NodeState::Failed(FailureReason::DependencyFailed(index));
                    }
                }
            }
        }
        self.record_error(error);
    }

    fn record_error(&self, error: OrchestratorError) {
        self.cancelled.store(true, Ordering::SeqCst);
        lock(&self.first_error).get_or_insert(error);
    }
}
