//! Undirected simple projection of a [`DependencyGraph`].
//!
//! Community detection, clustering and degree centrality treat the graph as
//! undirected: an edge in either direction connects two packages and
//! reciprocal edges collapse into one. Self-loops stay out of the adjacency
//! sets and are flagged per position instead.
//!
//! Positions in the projection follow package name order, so results do not
//! depend on the order nodes were inserted into the graph.

use std::collections::BTreeSet;

use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;

use crate::graph::DependencyGraph;

/// Adjacency sets over name-ordered positions.
#[derive(Debug, Clone, Default)]
pub struct Projection {
    /// Graph node index for each position.
    nodes: Vec<NodeIndex>,
    adjacency: Vec<BTreeSet<usize>>,
    self_loops: Vec<bool>,
    edge_count: usize,
}

impl Projection {
    #[must_use]
    pub fn new(graph: &DependencyGraph) -> Self {
        let g = &graph.graph;

        let mut nodes: Vec<NodeIndex> = g.node_indices().collect();
        nodes.sort_by(|a, b| g[*a].name.cmp(&g[*b].name));

        let mut positions = vec![0; g.node_count()];
        for (pos, idx) in nodes.iter().enumerate() {
            positions[idx.index()] = pos;
        }

        let mut adjacency = vec![BTreeSet::new(); nodes.len()];
        let mut self_loops = vec![false; nodes.len()];
        let mut edge_count = 0;
        for edge in g.edge_references() {
            let (u, v) = (positions[edge.source().index()], positions[edge.target().index()]);
            if u == v {
                self_loops[u] = true;
                continue;
            }
            if adjacency[u].insert(v) {
                adjacency[v].insert(u);
                edge_count += 1;
            }
        }

        Self {
            nodes,
            adjacency,
            self_loops,
            edge_count,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of distinct undirected, non-loop edges.
    #[must_use]
    pub const fn edge_count(&self) -> usize {
        self.edge_count
    }

    #[must_use]
    pub fn neighbors(&self, pos: usize) -> &BTreeSet<usize> {
        &self.adjacency[pos]
    }

    /// Number of distinct other packages adjacent to `pos`.
    #[must_use]
    pub fn degree(&self, pos: usize) -> usize {
        self.adjacency[pos].len()
    }

    /// Whether the package at `pos` depends on itself.
    #[must_use]
    pub fn has_self_loop(&self, pos: usize) -> bool {
        self.self_loops[pos]
    }

    #[must_use]
    pub fn has_edge(&self, u: usize, v: usize) -> bool {
        self.adjacency[u].contains(&v)
    }

    /// Graph node index at `pos`.
    #[must_use]
    pub fn node_at(&self, pos: usize) -> NodeIndex {
        self.nodes[pos]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DependencyEdge, PackageNode};

    #[test]
    fn collapses_reciprocal_edges_and_flags_loops() {
        let mut g = DependencyGraph::new();
        let b = g.upsert_node(PackageNode::unknown("b", true));
        let a = g.upsert_node(PackageNode::unknown("a", true));
        let c = g.upsert_node(PackageNode::unknown("c", true));
        g.upsert_edge(a, b, DependencyEdge::runtime());
        g.upsert_edge(b, a, DependencyEdge::runtime());
        g.upsert_edge(c, c, DependencyEdge::runtime());

        let p = Projection::new(&g);
        assert_eq!(p.len(), 3);
        assert_eq!(p.edge_count(), 1);

        // Positions are name-ordered: a=0, b=1, c=2.
        assert_eq!(p.node_at(0), a);
        assert_eq!(p.node_at(1), b);
        assert!(p.has_edge(0, 1));
        assert!(p.has_edge(1, 0));
        assert_eq!(p.degree(2), 0);
        assert!(!p.has_edge(2, 2));
        assert!(p.has_self_loop(2));
        assert!(!p.has_self_loop(0));
    }
}
