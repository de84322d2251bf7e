//! The external builder contract.

use std::path::PathBuf;

/// A failed build of one target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to build `{target}`: {message}")]
pub struct BuildError {
    /// Identity of the target that failed.
    pub target: String,
    /// What went wrong.
    pub message: String,
}

impl BuildError {
    /// Creates a build error for `target`.
    pub fn new(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            message: message.into(),
        }
    }
}

/// Produces the artifact for one value on a cache miss.
///
/// Called at most once per cache key by an orchestrator and never retried.
/// The returned path is stored into the artifact cache as-is.
pub trait Builder<T>: Send + Sync {
    /// Builds `value` and returns the path of the produced artifact.
    fn build(&self, value: &T) -> Result<PathBuf, BuildError>;
}

impl<T, F> Builder<T> for F
where
    F: Fn(&T) -> Result<PathBuf, BuildError> + Send + Sync,
{
    fn build(&self, value: &T) -> Result<PathBuf, BuildError> {
        self(value)
    }
}
