//! # Undirected Graphs over Variables
//!
//! The primal-graph representation driving the elimination-order heuristics.
//! Adjacency is kept symmetric and self-loop free; iteration over vertices
//! and neighbourhoods is key-sorted, which makes every heuristic that breaks
//! ties by iteration order reproducible.

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use thiserror::Error;

use crate::types::Var;

/// Error for fill-in queries on an empty graph
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
#[error("graph has no vertex")]
pub struct EmptyGraphError;

/// An undirected graph over variables
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Graph {
    adjacency: BTreeMap<Var, BTreeSet<Var>>,
}

impl Graph {
    /// Creates a graph with the given vertices and no edges
    pub fn new<VI: IntoIterator<Item = Var>>(vertices: VI) -> Self {
        Self {
            adjacency: vertices
                .into_iter()
                .map(|v| (v, BTreeSet::new()))
                .collect(),
        }
    }

    /// Gets the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Checks if the graph has no vertices
    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Iterates over the vertices in ascending order
    pub fn vertices(&self) -> impl Iterator<Item = Var> + '_ {
        self.adjacency.keys().copied()
    }

    /// Gets the neighbourhood of a vertex. Panics if the vertex is not in the
    /// graph.
    pub fn neighbors(&self, v: Var) -> &BTreeSet<Var> {
        &self.adjacency[&v]
    }

    /// Adds an edge in both directions. Self-loops are ignored. Panics if
    /// either endpoint is not in the graph.
    pub fn add_edge(&mut self, v1: Var, v2: Var) {
        if v1 == v2 {
            return;
        }
        assert!(self.adjacency.contains_key(&v2), "unknown vertex {}", v2);
        self.adjacency
            .get_mut(&v1)
            .unwrap_or_else(|| panic!("unknown vertex {}", v1))
            .insert(v2);
        self.adjacency.get_mut(&v2).unwrap().insert(v1);
    }

    /// Checks whether two vertices are adjacent
    pub fn is_neighbor(&self, v1: Var, v2: Var) -> bool {
        self.adjacency[&v1].contains(&v2)
    }

    /// Checks whether a path between two vertices exists. A vertex is always
    /// reachable from itself.
    pub fn has_path(&self, from: Var, to: Var) -> bool {
        let mut visited = BTreeSet::new();
        self.has_path_visited(from, to, &mut visited)
    }

    fn has_path_visited(&self, from: Var, to: Var, visited: &mut BTreeSet<Var>) -> bool {
        if from == to {
            return true;
        }
        visited.insert(from);
        for &v in &self.adjacency[&from] {
            if !visited.contains(&v) && self.has_path_visited(v, to, visited) {
                return true;
            }
        }
        false
    }

    /// Removes a vertex together with all its edges
    pub fn remove_vertex(&mut self, v: Var) {
        self.adjacency.remove(&v);
        for neighbors in self.adjacency.values_mut() {
            neighbors.remove(&v);
        }
    }

    /// Makes the neighbourhood of a vertex a clique
    pub fn fill_in_edges(&mut self, v: Var) {
        let neighbors: Vec<Var> = self.adjacency[&v].iter().copied().collect();
        for (n1, n2) in neighbors.iter().tuple_combinations() {
            self.add_edge(*n1, *n2);
        }
    }

    /// Counts the edges [`Graph::fill_in_edges`] would add, without modifying
    /// the graph
    pub fn count_fill_in_edges(&self, v: Var) -> usize {
        self.adjacency[&v]
            .iter()
            .tuple_combinations()
            .filter(|(n1, n2)| !self.is_neighbor(**n1, **n2))
            .count()
    }

    /// Gets the vertex whose elimination adds the fewest fill-in edges. Ties
    /// are broken towards the smallest vertex by the sorted iteration order.
    pub fn minfill_vertex(&self) -> Result<Var, EmptyGraphError> {
        let mut best: Option<(Var, usize)> = None;
        for v in self.vertices() {
            let count = self.count_fill_in_edges(v);
            match best {
                Some((_, best_count)) if best_count <= count => (),
                _ => best = Some((v, count)),
            }
        }
        best.map(|(v, _)| v).ok_or(EmptyGraphError)
    }
}
