//! Arena nodes and their stable indices.

use std::collections::BTreeSet;
use std::fmt;

/// Stable identity of a node within one graph instance.
///
/// Assigned in value order at construction time. Indices of removed nodes
/// are never handed out again by the same graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(usize);

impl NodeIndex {
    /// Creates an index from its raw position in the arena.
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw arena position.
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A graph node: one domain value plus its edges.
///
/// `children` is the authoritative edge set. `parents` is derived from the
/// children of every other node and rebuilt after each structural edit.
#[derive(Debug, Clone)]
pub struct Node<T> {
    pub(crate) value: T,
    pub(crate) children: BTreeSet<NodeIndex>,
    pub(crate) parents: BTreeSet<NodeIndex>,
}

impl<T> Node<T> {
    /// The wrapped value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Nodes this node depends on.
    pub fn children(&self) -> &BTreeSet<NodeIndex> {
        &self.children
    }

    /// Nodes that depend on this node.
    pub fn parents(&self) -> &BTreeSet<NodeIndex> {
        &self.parents
    }

    /// Returns `true` if the node has no dependencies.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns `true` if nothing depends on the node.
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }
}
