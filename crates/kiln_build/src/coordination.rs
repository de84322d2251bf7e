//! State shared by every orchestrator built over the same store.
//!
//! The worker pool, the per-key build locks and the set of keys built so
//! far belong to the store, not to one orchestrator, so the store's
//! parallelism bound and the one-build-per-key rule hold across all of them.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use kiln_cache::ArtifactStore;

use crate::error::OrchestratorError;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Live coordinators by store address.
static COORDINATORS: Mutex<BTreeMap<usize, Weak<StoreCoordinator>>> = Mutex::new(BTreeMap::new());

pub(crate) struct StoreCoordinator {
    pool: rayon::ThreadPool,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    built_keys: Mutex<HashSet<String>>,
}

impl StoreCoordinator {
    /// Returns the coordinator of `store`, creating it on first use.
    ///
    /// A coordinator lives as long as some orchestrator holds it, and every
    /// such orchestrator also holds `store`, so a live entry's address
    /// always names the same store.
    pub(crate) fn for_store(store: &Arc<dyn ArtifactStore>) -> Result<Arc<Self>, OrchestratorError> {
        let address = Arc::as_ptr(store) as *const () as usize;
        let mut coordinators = lock(&COORDINATORS);
        coordinators.retain(|_, coordinator| coordinator.strong_count() > 0);
        if let Some(existing) = coordinators.get(&address).and_then(Weak::upgrade) {
            return Ok(existing);
        }

        let mut pool = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("kiln-worker-{i}"));
        if let Some(limit) = store.max_parallelism().limit() {
            pool = pool.num_threads(limit);
        }
        let pool = pool
            .build()
            .map_err(|e| OrchestratorError::WorkerPool(e.to_string()))?;

        let coordinator = Arc::new(Self {
            pool,
            key_locks: Mutex::new(HashMap::new()),
            built_keys: Mutex::new(HashSet::new()),
        });
        coordinators.insert(address, Arc::downgrade(&coordinator));
        Ok(coordinator)
    }

    pub(crate) fn pool(&self) -> &rayon::ThreadPool {
        &self.pool
    }

    /// The in-process build lock for `checksum`.
    pub(crate) fn key_lock(&self, checksum: &str) -> Arc<Mutex<()>> {
        Arc::clone(
            lock(&self.key_locks)
                .entry(checksum.to_string())
                .or_default(),
        )
    }

    pub(crate) fn is_built(&self, checksum: &str) -> bool {
        lock(&self.built_keys).contains(checksum)
    }

    pub(crate) fn mark_built(&self, checksum: String) {
        lock(&self.built_keys).insert(checksum);
    }
}
