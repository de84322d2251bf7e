//! Incremental build orchestration over a target graph.
//!
//! The [`Orchestrator`] walks a [`kiln_graph::Graph`] bottom-up one layer at
//! a time. Every node's cache key folds in the checksums of its dependencies;
//! a hit in the [`kiln_cache::ArtifactStore`] is fetched, a miss is handed to
//! the external [`Builder`] and the result stored back. Within a layer nodes
//! run on a worker pool sized by the store's parallelism hint and shared by
//! every orchestrator over that store.

#![warn(missing_docs)]

pub mod builder;
mod coordination;
pub mod error;
pub mod keys;
pub mod orchestrator;
pub mod state;

pub use builder::{BuildError, Builder};
pub use error::OrchestratorError;
pub use keys::derive_keys;
pub use orchestrator::Orchestrator;
pub use state::{BuildReport, FailureReason, MissReason, NodeState, Origin};
