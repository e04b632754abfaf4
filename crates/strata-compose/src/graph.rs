//! Dependency graph management using `petgraph`.
//!
//! Builds a directed graph of units whose edges point from the producer
//! of a handle to its consumer, labelled with the handle that induced
//! them, and resolves a topological ordering for instantiation.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::NodeIndex;
use strata_common::error::{Result, StrataError};
use strata_common::types::HandleKey;

/// A dependency graph of units.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Internal petgraph representation.
    graph: petgraph::Graph<String, HandleKey>,
    nodes: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a unit node to the graph, returning the existing node if the
    /// unit is already present.
    pub fn add_unit(&mut self, name: impl Into<String>) -> NodeIndex {
        let name = name.into();
        if let Some(&idx) = self.nodes.get(&name) {
            return idx;
        }
        let idx = self.graph.add_node(name.clone());
        let _ = self.nodes.insert(name, idx);
        idx
    }

    /// Adds a dependency edge: `dependent` consumes `via`, produced by `dependency`.
    ///
    /// The graph edge points from `dependency` to `dependent`
    /// so that topological sort yields producers first.
    pub fn add_dependency(&mut self, dependent: NodeIndex, dependency: NodeIndex, via: HandleKey) {
        let _ = self.graph.add_edge(dependency, dependent, via);
    }

    /// Number of units in the graph.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns an instantiation ordering of units.
    ///
    /// Producers appear before every unit that consumes one of their handles.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::CyclicDependency`] naming the units along a
    /// cycle if one exists.
    pub fn resolve_order(&self) -> Result<Vec<String>> {
        match petgraph::algo::toposort(&self.graph, None) {
            Ok(indices) => Ok(indices
                .iter()
                .filter_map(|&idx| self.graph.node_weight(idx).cloned())
                .collect()),
            Err(cycle) => Err(StrataError::CyclicDependency {
                cycle: self.trace_cycle(cycle.node_id()),
            }),
        }
    }

    /// Walks the strongly connected component containing `start` and
    /// returns one closed path through it, `start` first and last.
    fn trace_cycle(&self, start: NodeIndex) -> Vec<String> {
        let members: HashSet<NodeIndex> = petgraph::algo::tarjan_scc(&self.graph)
            .into_iter()
            .find(|component| component.contains(&start))
            .unwrap_or_default()
            .into_iter()
            .collect();

        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            for next in self.graph.neighbors(node) {
                if next == start {
                    let mut path = vec![node];
                    let mut cursor = node;
                    while let Some(&prev) = parent.get(&cursor) {
                        path.push(prev);
                        cursor = prev;
                    }
                    path.reverse();
                    path.push(start);
                    return path.iter().map(|&idx| self.graph[idx].clone()).collect();
                }
                if members.contains(&next) && !parent.contains_key(&next) {
                    let _ = parent.insert(next, node);
                    queue.push_back(next);
                }
            }
        }
        vec![self.graph[start].clone()]
    }

    /// Renders the graph in Graphviz DOT format, edges labelled by handle.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let dot = petgraph::dot::Dot::with_attr_getters(
            &self.graph,
            &[petgraph::dot::Config::EdgeNoLabel, petgraph::dot::Config::NodeNoLabel],
            &|_, edge| format!("label = \"{}\"", edge.weight()),
            &|_, (_, name)| format!("label = \"{name}\""),
        );
        format!("{dot:?}")
    }
}
