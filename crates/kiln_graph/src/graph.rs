//! Graph construction, structural edits, and bottom-up ordering.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::hash::Hash;

use crate::error::GraphError;
use crate::node::{Node, NodeIndex};

static NO_EDGES: BTreeSet<NodeIndex> = BTreeSet::new();

/// A dependency graph over domain values.
///
/// Edges point from a node to the nodes it depends on (its children).
/// Roots are nodes nothing depends on; leafs are nodes with no
/// dependencies. The root set is recomputed after every structural edit.
#[derive(Debug, Clone)]
pub struct Graph<T> {
    slots: Vec<Option<Node<T>>>,
    roots: BTreeSet<NodeIndex>,
}

impl<T> Graph<T> {
    /// Builds a graph from a flat set of values.
    ///
    /// `identity_of` derives each value's identity and `children_of` lists the
    /// identities it depends on. Fails if two values share an identity or if a
    /// child identity matches no value.
    pub fn resolve<K, I, FId, FCh>(
        values: impl IntoIterator<Item = T>,
        identity_of: FId,
        children_of: FCh,
    ) -> Result<Self, GraphError>
    where
        K: Eq + Hash + fmt::Display,
        I: IntoIterator<Item = K>,
        FId: Fn(&T) -> K,
        FCh: Fn(&T) -> I,
    {
        let values: Vec<T> = values.into_iter().collect();

        let mut by_identity = HashMap::with_capacity(values.len());
        for (position, value) in values.iter().enumerate() {
            let identity = identity_of(value);
            if by_identity.contains_key(&identity) {
                return Err(GraphError::DuplicateIdentity(identity.to_string()));
            }
            by_identity.insert(identity, NodeIndex::new(position));
        }

        let mut child_sets = Vec::with_capacity(values.len());
        for value in &values {
            let mut children = BTreeSet::new();
            for child in children_of(value) {
                let index = by_identity
                    .get(&child)
                    .ok_or_else(|| GraphError::UnresolvedChildReference(child.to_string()))?;
                children.insert(*index);
            }
            child_sets.push(children);
        }

        let slots = values
            .into_iter()
            .zip(child_sets)
            .map(|(value, children)| {
                Some(Node {
                    value,
                    children,
                    parents: BTreeSet::new(),
                })
            })
            .collect();

        let mut graph = Self {
            slots,
            roots: BTreeSet::new(),
        };
        graph.relink();
        Ok(graph)
    }

    /// Produces an isomorphic graph over transformed values.
    ///
    /// Node indices, edges, and roots are carried over unchanged.
    pub fn map<U, F>(&self, mut transform: F) -> Graph<U>
    where
        F: FnMut(&T) -> U,
    {
        let mut slots = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let mapped = match slot {
                Some(node) => Some(Node {
                    value: transform(&node.value),
                    children: node.children.clone(),
                    parents: node.parents.clone(),
                }),
                None => None,
            };
            slots.push(mapped);
        }
        Graph {
            slots,
            roots: self.roots.clone(),
        }
    }

    /// Removes every node whose value fails the predicate, rewiring edges
    /// around it as [`remove`](Self::remove) does.
    pub fn filter<P>(mut self, mut predicate: P) -> Self
    where
        P: FnMut(&T) -> bool,
    {
        let mut doomed = Vec::new();
        for (index, value) in self.iter() {
            if !predicate(value) {
                doomed.push(index);
            }
        }
        self.remove(doomed);
        self
    }

    /// Removes the given nodes, connecting each surviving parent directly to
    /// the children of the removed nodes it depended on.
    ///
    /// Chains of removed nodes are collapsed in one pass: every rewiring is
    /// computed against the edge set as it was before any removal. Unknown or
    /// already-removed indices are ignored.
    pub fn remove(&mut self, indices: impl IntoIterator<Item = NodeIndex>) {
        let removed: BTreeSet<NodeIndex> = indices
            .into_iter()
            .filter(|index| self.contains(*index))
            .collect();
        if removed.is_empty() {
            return;
        }

        let snapshot: BTreeMap<NodeIndex, BTreeSet<NodeIndex>> = self
            .nodes()
            .map(|(index, node)| (index, node.children.clone()))
            .collect();

        let mut rewired = Vec::new();
        for (index, children) in &snapshot {
            if removed.contains(index) || children.is_disjoint(&removed) {
                continue;
            }
            let mut expanded = surviving_descendants(children, &removed, &snapshot);
            // A cycle through removed nodes must not turn into a self-edge.
            expanded.remove(index);
            rewired.push((*index, expanded));
        }

        for index in &removed {
            self.slots[index.as_usize()] = None;
        }
        for (index, children) in rewired {
            if let Some(node) = self.slots[index.as_usize()].as_mut() {
                node.children = children;
            }
        }
        self.relink();
    }

    /// Nodes with no dependencies, in index order.
    pub fn leafs(&self) -> Vec<NodeIndex> {
        self.nodes()
            .filter(|(_, node)| node.is_leaf())
            .map(|(index, _)| index)
            .collect()
    }

    /// Nodes nothing depends on.
    pub fn roots(&self) -> &BTreeSet<NodeIndex> {
        &self.roots
    }

    /// Returns `true` if the index names a live node.
    pub fn contains(&self, index: NodeIndex) -> bool {
        self.node(index).is_some()
    }

    /// Looks up a live node.
    pub fn node(&self, index: NodeIndex) -> Option<&Node<T>> {
        self.slots.get(index.as_usize()).and_then(Option::as_ref)
    }

    /// Looks up a live node's value.
    pub fn value(&self, index: NodeIndex) -> Option<&T> {
        self.node(index).map(Node::value)
    }

    /// Dependencies of a node. Empty for unknown indices.
    pub fn children(&self, index: NodeIndex) -> &BTreeSet<NodeIndex> {
        self.node(index).map_or(&NO_EDGES, Node::children)
    }

    /// Dependents of a node. Empty for unknown indices.
    pub fn parents(&self, index: NodeIndex) -> &BTreeSet<NodeIndex> {
        self.node(index).map_or(&NO_EDGES, Node::parents)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Returns `true` if the graph has no live nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live nodes and their values, in index order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &T)> + '_ {
        self.nodes().map(|(index, node)| (index, &node.value))
    }

    /// Live nodes in index order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &Node<T>)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(position, slot)| slot.as_ref().map(|node| (NodeIndex::new(position), node)))
    }

    /// Every `(parent, child)` edge, sorted.
    pub fn edges(&self) -> Vec<(NodeIndex, NodeIndex)> {
        let mut edges = Vec::new();
        for (index, node) in self.nodes() {
            for child in &node.children {
                edges.push((index, *child));
            }
        }
        edges
    }

    /// Every node that transitively depends on `index`, excluding `index`.
    pub fn ancestors(&self, index: NodeIndex) -> BTreeSet<NodeIndex> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<NodeIndex> = self.parents(index).iter().copied().collect();
        while let Some(next) = stack.pop() {
            if next != index && seen.insert(next) {
                stack.extend(self.parents(next).iter().copied());
            }
        }
        seen
    }

    /// Groups nodes into bottom-up layers.
    ///
    /// The first layer holds the leafs; every later layer holds the nodes
    /// whose children all appear in earlier layers. Fails with
    /// [`GraphError::Cycle`] if some nodes can never be scheduled.
    pub fn layers(&self) -> Result<Vec<Vec<NodeIndex>>, GraphError> {
        let mut waiting: BTreeMap<NodeIndex, usize> = self
            .nodes()
            .map(|(index, node)| (index, node.children.len()))
            .collect();

        let mut current: Vec<NodeIndex> = waiting
            .iter()
            .filter(|(_, pending)| **pending == 0)
            .map(|(index, _)| *index)
            .collect();

        let mut layers = Vec::new();
        while !current.is_empty() {
            for index in &current {
                waiting.remove(index);
            }
            let mut ready = BTreeSet::new();
            for index in &current {
                for parent in self.parents(*index) {
                    if let Some(pending) = waiting.get_mut(parent) {
                        *pending -= 1;
                        if *pending == 0 {
                            ready.insert(*parent);
                        }
                    }
                }
            }
            layers.push(current);
            current = ready.into_iter().collect();
        }

        if !waiting.is_empty() {
            return Err(GraphError::Cycle {
                nodes: waiting.into_keys().collect(),
            });
        }
        Ok(layers)
    }

    fn relink(&mut self) {
        let edges = self.edges();
        for node in self.slots.iter_mut().flatten() {
            node.parents.clear();
        }
        for (parent, child) in edges {
            if let Some(node) = self.slots[child.as_usize()].as_mut() {
                node.parents.insert(parent);
            }
        }
        self.roots = self
            .nodes()
            .filter(|(_, node)| node.is_root())
            .map(|(index, _)| index)
            .collect();
    }
}

impl<T: PartialEq> Graph<T> {
    /// Index of the first live node holding `value`.
    pub fn find(&self, value: &T) -> Option<NodeIndex> {
        self.iter()
            .find(|(_, candidate)| *candidate == value)
            .map(|(index, _)| index)
    }

    /// Removes every node holding one of `values`.
    pub fn remove_values(&mut self, values: &[T]) {
        let doomed: Vec<NodeIndex> = self
            .iter()
            .filter(|(_, value)| values.contains(value))
            .map(|(index, _)| index)
            .collect();
        self.remove(doomed);
    }
}

// Follows edges through removed nodes until reaching survivors.
fn surviving_descendants(
    children: &BTreeSet<NodeIndex>,
    removed: &BTreeSet<NodeIndex>,
    snapshot: &BTreeMap<NodeIndex, BTreeSet<NodeIndex>>,
) -> BTreeSet<NodeIndex> {
    let mut survivors = BTreeSet::new();
    let mut visited = BTreeSet::new();
    let mut stack: Vec<NodeIndex> = children.iter().copied().collect();
    while let Some(next) = stack.pop() {
        if !removed.contains(&next) {
            survivors.insert(next);
        } else if visited.insert(next) {
            if let Some(grandchildren) = snapshot.get(&next) {
                stack.extend(grandchildren.iter().copied());
            }
        }
    }
    survivors
}
