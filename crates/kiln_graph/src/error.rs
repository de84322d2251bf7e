//! Error types for graph construction and traversal.

use crate::node::NodeIndex;

/// Errors that can occur while building or ordering a [`Graph`](crate::Graph).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// A value declared a child identity that no value in the set derives.
    #[error("unresolved child reference `{0}`")]
    UnresolvedChildReference(String),

    /// Two values derived the same identity.
    #[error("duplicate node identity `{0}`")]
    DuplicateIdentity(String),

    /// Some nodes can never become ready because they depend on each other.
    #[error("dependency cycle involving {} node(s)", nodes.len())]
    Cycle {
        /// Nodes that were left unordered.
        nodes: Vec<NodeIndex>,
    },
}
