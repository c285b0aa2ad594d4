// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Wait-for graph and cycle detection.
//!
//! Vertices are read-write transaction ids stored in an arena keyed by id;
//! edges are id sets, never back-references. Detection runs Kahn's
//! topological sort over a snapshot of the in-degrees: every vertex left
//! with a positive in-degree after the zero-in-degree queue drains is part
//! of a cycle or downstream of one.
//!
//! Edges record *access order*, not actual lock contention: the
//! coordinator links every earlier accessor of a variable to the next
//! read-write transaction touching it. Two transactions that merely share
//! a variable become linked even if they never blocked each other. That
//! over-approximation is the documented protocol and is preserved as-is.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::txn::TxnId;

#[derive(Debug, Default)]
struct Vertex {
    children: HashSet<TxnId>,
    in_degree: usize,
}

/// Directed wait-for graph over active read-write transactions.
#[derive(Debug, Default)]
pub struct WaitForGraph {
    vertices: HashMap<TxnId, Vertex>,
}

impl WaitForGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a vertex for `id`. No-op if already present.
    pub fn add_vertex(&mut self, id: TxnId) {
        self.vertices.entry(id).or_default();
    }

    /// Returns true if `id` has a vertex.
    pub fn contains(&self, id: TxnId) -> bool {
        self.vertices.contains_key(&id)
    }

    /// Returns the number of vertices.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Returns true if the graph has no vertices.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Adds the edge `from -> to` if absent, bumping `to`'s in-degree.
    /// Self-loops and edges touching unregistered ids are ignored.
    pub fn add_edge(&mut self, from: TxnId, to: TxnId) {
        if from == to || !self.vertices.contains_key(&to) {
            return;
        }
        let Some(vertex) = self.vertices.get_mut(&from) else {
            return;
        };
        if vertex.children.insert(to) {
            if let Some(child) = self.vertices.get_mut(&to) {
                child.in_degree += 1;
            }
        }
    }

    /// Removes `id` and every edge incident to it.
    pub fn remove_vertex(&mut self, id: TxnId) {
        let Some(vertex) = self.vertices.remove(&id) else {
            return;
        };
        for child in vertex.children {
            if let Some(c) = self.vertices.get_mut(&child) {
                c.in_degree -= 1;
            }
        }
        for v in self.vertices.values_mut() {
            v.children.remove(&id);
        }
    }

    /// Detects deadlock with Kahn's algorithm.
    ///
    /// Returns the ids whose in-degree never reached zero — the members of
    /// every cycle plus any vertex downstream of one — sorted by id for
    /// determinism. An empty result means no deadlock.
    pub fn detect(&self) -> Vec<TxnId> {
        let mut in_degrees: HashMap<TxnId, usize> = self
            .vertices
            .iter()
            .map(|(id, v)| (*id, v.in_degree))
            .collect();

        let mut queue: VecDeque<TxnId> = in_degrees
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| *id)
            .collect();

        while let Some(id) = queue.pop_front() {
            let Some(vertex) = self.vertices.get(&id) else {
                continue;
            };
            for child in &vertex.children {
                if let Some(d) = in_degrees.get_mut(child) {
                    *d -= 1;
                    if *d == 0 {
                        queue.push_back(*child);
                    }
                }
            }
        }

        let mut deadlocked: Vec<TxnId> = in_degrees
            .into_iter()
            .filter(|(_, d)| *d > 0)
            .map(|(id, _)| id)
            .collect();
        deadlocked.sort();
        deadlocked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(vertices: &[u32], edges: &[(u32, u32)]) -> WaitForGraph {
        let mut g = WaitForGraph::new();
        for v in vertices {
            g.add_vertex(TxnId(*v));
        }
        for (from, to) in edges {
            g.add_edge(TxnId(*from), TxnId(*to));
        }
        g
    }

    #[test]
    fn test_acyclic_graph_has_no_deadlock() {
        let g = graph(&[1, 2, 3], &[(1, 2), (2, 3), (1, 3)]);
        assert!(g.detect().is_empty());
    }

    #[test]
    fn test_three_cycle_detected_exactly() {
        let g = graph(&[1, 2, 3, 4], &[(1, 2), (2, 3), (3, 1), (4, 1)]);
        assert_eq!(g.detect(), vec![TxnId(1), TxnId(2), TxnId(3)]);
    }

    #[test]
    fn test_vertex_downstream_of_cycle_is_reported() {
        let g = graph(&[1, 2, 5], &[(1, 2), (2, 1), (2, 5)]);
        assert_eq!(g.detect(), vec![TxnId(1), TxnId(2), TxnId(5)]);
    }

    #[test]
    fn test_self_loop_ignored() {
        let mut g = graph(&[1], &[]);
        g.add_edge(TxnId(1), TxnId(1));
        assert!(g.detect().is_empty());
    }

    #[test]
    fn test_duplicate_edge_counted_once() {
        let mut g = graph(&[1, 2], &[(1, 2), (1, 2)]);
        assert!(g.detect().is_empty());
        g.remove_vertex(TxnId(1));
        // In-degree of 2 must be back to zero after a single decrement.
        assert_eq!(g.detect(), Vec::<TxnId>::new());
        assert!(g.contains(TxnId(2)));
    }

    #[test]
    fn test_edge_to_unregistered_vertex_ignored() {
        let mut g = graph(&[1], &[]);
        g.add_edge(TxnId(1), TxnId(9));
        g.add_edge(TxnId(9), TxnId(1));
        assert_eq!(g.len(), 1);
        assert!(g.detect().is_empty());
    }

    #[test]
    fn test_remove_vertex_breaks_cycle() {
        let mut g = graph(&[1, 2, 3], &[(1, 2), (2, 3), (3, 1)]);
        assert_eq!(g.detect().len(), 3);
        g.remove_vertex(TxnId(2));
        assert!(g.detect().is_empty());
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn test_two_disjoint_cycles() {
        let g = graph(&[1, 2, 3, 4], &[(1, 2), (2, 1), (3, 4), (4, 3)]);
        assert_eq!(g.detect(), vec![TxnId(1), TxnId(2), TxnId(3), TxnId(4)]);
    }
}
