//! Fatal errors surfaced by an orchestrator run.

use kiln_cache::CacheError;
use kiln_graph::GraphError;

use crate::builder::BuildError;

/// The first fatal error of a run.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// A cache key could not be derived for a target.
    #[error("failed to derive cache key for `{target}`: {source}")]
    KeyDerivation {
        /// Identity of the target.
        target: String,
        /// The underlying failure.
        source: CacheError,
    },

    /// A fetch after a declared hit, or a store after a build, failed.
    #[error("cache backend failed for `{target}`: {source}")]
    CacheBackend {
        /// Identity of the target.
        target: String,
        /// The underlying failure.
        source: CacheError,
    },

    /// The external builder failed.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// The graph could not be ordered.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// The worker pool could not be created.
    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_error_is_transparent() {
        let err = OrchestratorError::from(BuildError::new("app/Core", "boom"));
        assert_eq!(err.to_string(), "failed to build `app/Core`: boom");
    }

    #[test]
    fn backend_error_names_target() {
        let err = OrchestratorError::CacheBackend {
            target: "app/Core".to_string(),
            source: CacheError::MissingArtifact {
                name: "Core-ab.artifact".to_string(),
            },
        };
        assert!(err.to_string().starts_with("cache backend failed for `app/Core`"));
    }
}
