//! Summary statistics for a dependency graph.
//!
//! # Statistics Provided
//!
//! - **node_count** / **edge_count**: packages and dependency edges.
//! - **core_count**: nodes flagged `core`; **num_core_packages** is the
//!   graph-level count recorded at build or merge time.
//! - **copycat_count**, **missing_metadata_count**, **recent_count**: node
//!   flag tallies.
//! - **density**: `edge_count / (node_count * (node_count - 1))`, 0.0 for
//!   graphs with fewer than two nodes. Self-loops count as edges.
//! - **weakly_connected_component_count**: number of disjoint subgraphs.
//! - **isolated_node_count**: nodes with no edges at all. A node whose only
//!   edge is a self-loop is not isolated.
//! - **self_loop_count**: packages declaring a dependency on themselves.
//! - **optional_edge_count**: edges with `optional = true`.
//! - **max_in_degree** / **max_out_degree**: most dependents / most
//!   dependencies on a single node.

use petgraph::Direction;
use petgraph::algo::connected_components;
use petgraph::visit::{EdgeRef, IntoNodeIdentifiers};
use serde::Serialize;

use super::DependencyGraph;

/// Summary statistics for a [`DependencyGraph`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphSummary {
    pub node_count: usize,
    pub edge_count: usize,
    pub core_count: usize,
    pub num_core_packages: usize,
    pub copycat_count: usize,
    pub missing_metadata_count: usize,
    pub recent_count: usize,
    pub density: f64,
    pub weakly_connected_component_count: usize,
    pub isolated_node_count: usize,
    pub self_loop_count: usize,
    pub optional_edge_count: usize,
    pub max_in_degree: usize,
    pub max_out_degree: usize,
    pub content_hash: String,
}

impl GraphSummary {
    #[must_use]
    pub fn from_graph(graph: &DependencyGraph) -> Self {
        let g = &graph.graph;
        let node_count = g.node_count();
        let edge_count = g.edge_count();

        let count_nodes = |pred: fn(&super::PackageNode) -> bool| graph.nodes().filter(|n| pred(n)).count();

        let degree = |idx, dir| g.edges_directed(idx, dir).count();
        let isolated_node_count = g
            .node_identifiers()
            .filter(|&idx| degree(idx, Direction::Incoming) == 0 && degree(idx, Direction::Outgoing) == 0)
            .count();
        let max_in_degree = g
            .node_identifiers()
            .map(|idx| degree(idx, Direction::Incoming))
            .max()
            .unwrap_or(0);
        let max_out_degree = g
            .node_identifiers()
            .map(|idx| degree(idx, Direction::Outgoing))
            .max()
            .unwrap_or(0);

        Self {
            node_count,
            edge_count,
            core_count: count_nodes(|n| n.core),
            num_core_packages: graph.num_core_packages,
            copycat_count: count_nodes(|n| n.is_copycat),
            missing_metadata_count: count_nodes(|n| n.missing_metadata),
            recent_count: count_nodes(|n| n.is_recent == Some(true)),
            density: compute_density(node_count, edge_count),
            weakly_connected_component_count: connected_components(g),
            isolated_node_count,
            self_loop_count: g.edge_references().filter(|e| e.source() == e.target()).count(),
            optional_edge_count: g.edge_weights().filter(|e| e.optional).count(),
            max_in_degree,
            max_out_degree,
            content_hash: graph.content_hash(),
        }
    }

    /// Return `true` if the graph has no dependency edges.
    #[must_use]
    pub const fn is_flat(&self) -> bool {
        self.edge_count == 0
    }
}

#[allow(clippy::cast_precision_loss)]
fn compute_density(node_count: usize, edge_count: usize) -> f64 {
    if node_count < 2 {
        return 0.0_f64;
    }
    edge_count as f64 / (node_count * (node_count - 1)) as f64
}
