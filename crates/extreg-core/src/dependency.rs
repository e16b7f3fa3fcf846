//! Dependency graph and topological ordering for a batch of manifests.
//!
//! Registration requires every non-optional dependency to be present first,
//! so a host loading many extensions at once must register them
//! dependency-first. [`DependencyGraph::from_manifests`] builds the graph for
//! the batch and [`DependencyGraph::topological_sort`] produces that order.
//!
//! # Example
//!
//! ```
//! use extreg_core::dependency::DependencyGraph;
//!
//! let mut graph = DependencyGraph::new();
//! graph.add_node("core-utils");
//! graph.add_node("http-client");
//! graph.add_edge("http-client", "core-utils");
//!
//! let order = graph.topological_sort().unwrap();
//! assert_eq!(order, vec!["core-utils", "http-client"]);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use crate::error::GraphError;
use crate::manifest::ExtensionManifest;

/// Directed graph of dependencies between extensions.
///
/// Edges point from dependent to dependency: if A depends on B, the edge is
/// `A -> B`. Topological sort returns ids in dependency-first order (B before
/// A).
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Adjacency list: key depends on each value. Every node has an entry.
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Create an empty dependency graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Adding an existing node keeps its edges.
    pub fn add_node(&mut self, id: impl Into<String>) {
        self.edges.entry(id.into()).or_default();
    }

    /// Declare that `from` depends on `to`.
    ///
    /// Only edges between nodes present at sort time take part in ordering;
    /// edges to unknown ids are kept but ignored.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.edges
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
    }

    /// Whether `id` is a node.
    pub fn contains(&self, id: &str) -> bool {
        self.edges.contains_key(id)
    }

    /// Return the number of nodes.
    pub fn node_count(&self) -> usize {
        self.edges.len()
    }

    /// Return the number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(|deps| deps.len()).sum()
    }

    /// Get the direct dependencies of a node, sorted.
    pub fn dependencies_of(&self, id: &str) -> Vec<&str> {
        self.edges
            .get(id)
            .map(|deps| deps.iter().map(|s| s.as_str()).collect())
            .unwrap_or_default()
    }

    /// Perform a topological sort using Kahn's algorithm.
    ///
    /// Returns ids in dependency-first order. Among nodes that are ready at
    /// the same time, the alphabetically smallest comes first, so the result
    /// is deterministic.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Cycle`] naming the nodes that lie on a cycle.
    /// Nodes that merely depend on a cycle are not named; they become
    /// orderable once the cycle's members are removed.
    pub fn topological_sort(&self) -> Result<Vec<String>, GraphError> {
        // Remaining unmet dependencies per node, counting only known nodes.
        let mut pending: BTreeMap<&str, usize> = self
            .edges
            .iter()
            .map(|(id, deps)| {
                let known = deps.iter().filter(|d| self.edges.contains_key(*d)).count();
                (id.as_str(), known)
            })
            .collect();

        // Reverse adjacency: dependency -> dependents.
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (from, deps) in &self.edges {
            for to in deps {
                if self.edges.contains_key(to) {
                    dependents.entry(to.as_str()).or_default().push(from.as_str());
                }
            }
        }

        let mut ready: BTreeSet<&str> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut result = Vec::with_capacity(self.edges.len());

        while let Some(current) = ready.pop_first() {
            result.push(current.to_string());
            for dependent in dependents.get(current).into_iter().flatten() {
                if let Some(count) = pending.get_mut(dependent) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(*dependent);
                    }
                }
            }
        }

        if result.len() != self.edges.len() {
            let unordered: BTreeSet<&str> = pending
                .into_iter()
                .filter(|(_, count)| *count > 0)
                .map(|(id, _)| id)
                .collect();
            let participants = unordered
                .iter()
                .filter(|id| self.reaches_itself(id, &unordered))
                .map(|id| id.to_string())
                .collect();
            return Err(GraphError::Cycle { participants });
        }

        Ok(result)
    }

    /// Whether `start` can be reached again by following edges inside `within`.
    fn reaches_itself(&self, start: &str, within: &BTreeSet<&str>) -> bool {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut stack: Vec<&str> = self.dependencies_of(start);
        while let Some(node) = stack.pop() {
            if node == start {
                return true;
            }
            if !within.contains(node) || !seen.insert(node) {
                continue;
            }
            stack.extend(self.dependencies_of(node));
        }
        false
    }

    /// Build a dependency graph from a batch of manifests.
    ///
    /// Optional dependencies are included: when both ends are in the batch,
    /// registering the optional dependency first lets its version constraint
    /// be checked.
    pub fn from_manifests<'a>(manifests: impl IntoIterator<Item = &'a ExtensionManifest>) -> Self {
        let mut graph = Self::new();
        for manifest in manifests {
            graph.add_node(manifest.id.as_str());
            for dep in &manifest.dependencies {
                graph.add_edge(&manifest.id, &dep.id);
            }
        }
        graph
    }
}
