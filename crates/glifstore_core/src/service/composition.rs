//! Font-scoped composition graph.
//!
//! # Responsibility
//! - Hold component edges of one font keyed by `(kind, name)`.
//! - Detect reference cycles and unresolved references.
//!
//! # Invariants
//! - Edges are stored by identifier only; nodes never own each other.
//! - Every declared reference is an edge, including ones the edge rules
//!   reject, so a forbidden back-reference still reports as a cycle.

use crate::model::glif::ComponentRef;
use crate::repo::glif_repo::GraphNode;
use std::collections::{BTreeMap, HashSet};

/// Adjacency map of one font.
#[derive(Debug, Clone, Default)]
pub struct CompositionGraph {
    edges: BTreeMap<ComponentRef, Vec<ComponentRef>>,
}

impl CompositionGraph {
    pub fn from_nodes(nodes: Vec<GraphNode>) -> Self {
        let edges = nodes
            .into_iter()
            .map(|node| (node.node, node.targets))
            .collect();
        Self { edges }
    }

    pub fn contains(&self, node: &ComponentRef) -> bool {
        self.edges.contains_key(node)
    }

    pub fn targets(&self, node: &ComponentRef) -> &[ComponentRef] {
        self.edges.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replaces one node (possibly renamed) and its outgoing edges.
    pub fn replace_node(
        &mut self,
        old: Option<&ComponentRef>,
        node: ComponentRef,
        targets: Vec<ComponentRef>,
    ) {
        if let Some(old) = old {
            self.edges.remove(old);
        }
        self.edges.insert(node, targets);
    }

    /// Finds a path `start -> ... -> start`, if one exists.
    ///
    /// Iterative depth-first search; each node is expanded at most once.
    pub fn cycle_through(&self, start: &ComponentRef) -> Option<Vec<ComponentRef>> {
        let mut visited: HashSet<&ComponentRef> = HashSet::new();
        let mut path: Vec<&ComponentRef> = vec![start];
        let mut stack: Vec<(&ComponentRef, usize)> = vec![(start, 0)];
        visited.insert(start);

        while let Some((node, next_index)) = stack.last_mut() {
            let targets = self.targets(node);
            let Some(target) = targets.get(*next_index) else {
                stack.pop();
                path.pop();
                continue;
            };
            *next_index += 1;

            if target == start {
                let mut cycle = path.iter().map(|step| (*step).clone()).collect::<Vec<_>>();
                cycle.push(start.clone());
                return Some(cycle);
            }
            if visited.insert(target) {
                path.push(target);
                stack.push((target, 0));
            }
        }
        None
    }

    /// References of `node` that do not resolve to an active glif of a kind
    /// the edge rules allow.
    pub fn dangling_from(&self, node: &ComponentRef) -> Vec<ComponentRef> {
        self.targets(node)
            .iter()
            .filter(|target| !node.kind.may_reference(target.kind) || !self.contains(target))
            .cloned()
            .collect()
    }

    /// Nodes with an edge to `target`, sorted.
    pub fn dependents_of(&self, target: &ComponentRef) -> Vec<ComponentRef> {
        self.edges
            .iter()
            .filter(|(_, targets)| targets.contains(target))
            .map(|(node, _)| node.clone())
            .collect()
    }
}
