//! Value-keyed dependency graphs with structure-preserving edits.
//!
//! A [`Graph`] is built from a flat set of values plus caller-supplied
//! identity and child-identity extractors. Nodes live in an arena indexed by
//! [`NodeIndex`]; both edge directions are index sets, so removing a node
//! never leaves a dangling reference behind.
//!
//! Removal rewires every parent of a removed node directly to that node's
//! children, which keeps transitive reachability intact while pruning
//! targets out of a build.

#![warn(missing_docs)]

pub mod error;
pub mod graph;
pub mod node;

pub use error::GraphError;
pub use graph::Graph;
pub use node::{Node, NodeIndex};
