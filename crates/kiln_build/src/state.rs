//! Per-node outcomes and the run report.

use std::collections::BTreeMap;
use std::path::PathBuf;

use kiln_graph::NodeIndex;

use crate::error::OrchestratorError;

/// Why a node missed the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    /// The store holds no valid artifact for the key.
    NotCached,
    /// A dependency was rebuilt during this run.
    DependencyRebuilt,
    /// The store could not be queried; treated as a miss.
    LookupFailed,
}

/// How a finished node got its artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Fetched from the artifact store.
    Cached,
    /// Produced by the builder.
    Built(MissReason),
}

/// Why a node failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The builder failed.
    Build,
    /// A fetch or store failed.
    CacheBackend,
    /// The cache key could not be derived.
    KeyDerivation,
    /// The given dependency failed, so this node was never attempted.
    DependencyFailed(NodeIndex),
}

/// State of one node at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeState {
    /// Never dispatched.
    Pending,
    /// Artifact is available.
    Done {
        /// Where the artifact came from.
        origin: Origin,
        /// Checksum of the node's cache key.
        checksum: String,
        /// Path of the artifact.
        artifact: PathBuf,
    },
    /// The node, or one of its dependencies, failed.
    Failed(FailureReason),
}

impl NodeState {
    /// Returns `true` for [`NodeState::Done`].
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }

    /// Key checksum of a finished node.
    pub fn checksum(&self) -> Option<&str> {
        match self {
            Self::Done { checksum, .. } => Some(checksum),
            _ => None,
        }
    }
}

/// Outcome of one orchestrator run.
#[derive(Debug)]
pub struct BuildReport {
    pub(crate) states: BTreeMap<NodeIndex, NodeState>,
    pub(crate) first_error: Option<OrchestratorError>,
}

impl BuildReport {
    /// State of `index`, if it was part of the graph.
    pub fn state(&self, index: NodeIndex) -> Option<&NodeState> {
        self.states.get(&index)
    }

    /// Every node's state in index order.
    pub fn states(&self) -> impl Iterator<Item = (NodeIndex, &NodeState)> + '_ {
        self.states.iter().map(|(index, state)| (*index, state))
    }

    /// The first fatal error, if any.
    pub fn first_error(&self) -> Option<&OrchestratorError> {
        self.first_error.as_ref()
    }

    /// Consumes the report, returning the first fatal error.
    pub fn into_error(self) -> Option<OrchestratorError> {
        self.first_error
    }

    /// `true` if every node finished.
    pub fn is_success(&self) -> bool {
        self.first_error.is_none() && self.states.values().all(NodeState::is_done)
    }

    /// Nodes that were never dispatched.
    pub fn pending(&self) -> Vec<NodeIndex> {
        self.matching(|state| matches!(state, NodeState::Pending))
    }

    /// Nodes that failed, directly or through a dependency.
    pub fn failed(&self) -> Vec<NodeIndex> {
        self.matching(|state| matches!(state, NodeState::Failed(_)))
    }

    /// Nodes fetched from the cache.
    pub fn cached(&self) -> Vec<NodeIndex> {
        self.matching(|state| {
            matches!(
                state,
                NodeState::Done {
                    origin: Origin::Cached,
                    ..
                }
            )
        })
    }

    /// Nodes produced by the builder.
    pub fn built(&self) -> Vec<NodeIndex> {
        self.matching(|state| {
            matches!(
                state,
                NodeState::Done {
                    origin: Origin::Built(_),
                    ..
                }
            )
        })
    }

    fn matching(&self, predicate: impl Fn(&NodeState) -> bool) -> Vec<NodeIndex> {
        self.states
            .iter()
            .filter(|(_, state)| predicate(state))
            .map(|(index, _)| *index)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BuildError;

    fn done(origin: Origin) -> NodeState {
        NodeState::Done {
            origin,
            checksum: "ab".to_string(),
            artifact: PathBuf::from("/out/a"),
        }
    }

    fn report(states: Vec<NodeState>, first_error: Option<OrchestratorError>) -> BuildReport {
        BuildReport {
            states: states
                .into_iter()
                .enumerate()
                .map(|(i, s)| (NodeIndex::new(i), s))
                .collect(),
            first_error,
        }
    }

    #[test]
    fn all_done_is_success() {
        let report = report(
            vec![done(Origin::Cached), done(Origin::Built(MissReason::NotCached))],
            None,
        );
        assert!(report.is_success());
        assert_eq!(report.cached(), vec![NodeIndex::new(0)]);
        assert_eq!(report.built(), vec![NodeIndex::new(1)]);
    }

    #[test]
    fn pending_and_failed_are_listed() {
        let report = report(
            vec![
                NodeState::Failed(FailureReason::Build),
                NodeState::Failed(FailureReason::DependencyFailed(NodeIndex::new(0))),
                NodeState::Pending,
            ],
            Some(BuildError::new("a", "boom").into()),
        );
        assert!(!report.is_success());
        assert_eq!(report.failed(), vec![NodeIndex::new(0), NodeIndex::new(1)]);
        assert_eq!(report.pending(), vec![NodeIndex::new(2)]);
        assert!(report.first_error().is_some());
    }

    #[test]
    fn checksum_only_for_done() {
        assert_eq!(done(Origin::Cached).checksum(), Some("ab"));
        assert_eq!(NodeState::Pending.checksum(), None);
    }
}
