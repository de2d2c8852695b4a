//! Merging two independently built graphs.
//!
//! [`merge`] combines, for example, a graph of the most popular packages
//! with one built from recently uploaded packages. The result is a union of
//! both with these precedence rules:
//!
//! - Node attributes come from `primary` when a node exists in both.
//! - `core` is the logical OR of both graphs.
//! - `is_recent` is `true` for every node present in `secondary`, `false`
//!   for nodes only in `primary`.
//! - Edges already in `primary` keep their attributes; `secondary` only
//!   contributes edges whose `(source, target)` pair is new.
//!
//! The operation is intentionally not symmetric.

use tracing::{info, instrument};

use super::DependencyGraph;

/// Merge `secondary` into a copy of `primary`.
#[must_use]
#[instrument(skip_all, fields(primary = primary.node_count(), secondary = secondary.node_count()))]
pub fn merge(primary: &DependencyGraph, secondary: &DependencyGraph) -> DependencyGraph {
    let mut merged = primary.clone();
    for node in merged.graph.node_weights_mut() {
        node.is_recent = Some(false);
    }

    let mut shared = 0usize;
    for node in secondary.nodes() {
        if let Some(existing) = merged.node_mut(&node.name) {
            existing.core |= node.core;
            existing.is_recent = Some(true);
            shared += 1;
        } else {
            let mut added = node.clone();
            added.is_recent = Some(true);
            merged.upsert_node(added);
        }
    }

    let mut added_edges = 0usize;
    for (source, target, edge) in secondary.edges() {
        if merged.contains_edge(source, target) {
            continue;
        }
        // Both endpoints were inserted above.
        if let (Some(s), Some(t)) = (merged.node_index(source), merged.node_index(target)) {
            merged.upsert_edge(s, t, edge.clone());
            added_edges += 1;
        }
    }

    merged.num_core_packages = merged.core_node_count();

    info!(
        nodes = merged.node_count(),
        edges = merged.edge_count(),
        shared,
        added_edges,
        core = merged.num_core_packages,
        "graphs merged"
    );
    merged
}
