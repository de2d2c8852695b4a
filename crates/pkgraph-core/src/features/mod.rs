//! Structural features computed over a [`DependencyGraph`].
//!
//! # Overview
//!
//! | key                       | measure                                     | view       |
//! |---------------------------|---------------------------------------------|------------|
//! | `community`               | greedy-modularity community id              | undirected |
//! | `inter_intra_ratio`       | inter- / intra-community neighbor ratio     | undirected |
//! | `clustering`              | local clustering coefficient                | undirected |
//! | `degree_centrality`       | degree / (n − 1)                            | undirected |
//! | `betweenness_centrality`  | normalized Brandes betweenness              | directed   |
//! | `closeness_centrality`    | closeness over reachable nodes              | directed   |
//!
//! The undirected view collapses reciprocal edges. A self-loop adds 2 to a
//! node's degree and makes the node its own intra-community neighbor, but it
//! plays no part in clustering or community detection; see
//! [`undirected::Projection`].
//!
//! # Usage
//!
//! [`compute`] reads the graph and returns a [`FeatureTable`]; nothing is
//! written until [`FeatureTable::apply`], so either every configured feature
//! appears on the graph or none does. [`add_features`] does both.
//!
//! ```rust,ignore
//! let table = features::compute(&graph, &FeatureConfig::default());
//! table.apply(&mut graph);
//! ```

pub mod centrality;
pub mod clustering;
pub mod community;
pub mod undirected;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::graph::{AttrValue, DependencyGraph};
use undirected::Projection;

pub const COMMUNITY: &str = "community";
pub const INTER_INTRA_RATIO: &str = "inter_intra_ratio";
pub const CLUSTERING: &str = "clustering";
pub const DEGREE_CENTRALITY: &str = "degree_centrality";
pub const BETWEENNESS_CENTRALITY: &str = "betweenness_centrality";
pub const CLOSENESS_CENTRALITY: &str = "closeness_centrality";

/// Every feature key this module can write.
pub const ALL_FEATURES: [&str; 6] = [
    COMMUNITY,
    INTER_INTRA_RATIO,
    CLUSTERING,
    DEGREE_CENTRALITY,
    BETWEENNESS_CENTRALITY,
    CLOSENESS_CENTRALITY,
];

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Which feature passes to run. Everything is on by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct FeatureConfig {
    /// Community ids and the inter/intra ratio.
    #[serde(default = "default_true")]
    pub communities: bool,
    #[serde(default = "default_true")]
    pub clustering: bool,
    #[serde(default = "default_true")]
    pub degree_centrality: bool,
    #[serde(default = "default_true")]
    pub betweenness_centrality: bool,
    #[serde(default = "default_true")]
    pub closeness_centrality: bool,
    /// Scale closeness by the reachable fraction of the graph.
    #[serde(default = "default_true")]
    pub closeness_wf_improved: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            communities: true,
            clustering: true,
            degree_centrality: true,
            betweenness_centrality: true,
            closeness_centrality: true,
            closeness_wf_improved: true,
        }
    }
}

const fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// FeatureTable
// ---------------------------------------------------------------------------

/// Computed feature columns, one value per graph node (by `NodeIndex`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    columns: BTreeMap<&'static str, Vec<AttrValue>>,
    community_count: usize,
}

impl FeatureTable {
    /// Keys present in the table, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.keys().copied()
    }

    #[must_use]
    pub fn column(&self, key: &str) -> Option<&[AttrValue]> {
        self.columns.get(key).map(Vec::as_slice)
    }

    /// Number of communities found, 0 if communities were not computed.
    #[must_use]
    pub const fn community_count(&self) -> usize {
        self.community_count
    }

    /// Write every column onto the graph's nodes.
    ///
    /// Existing features with other keys are left alone.
    pub fn apply(self, graph: &mut DependencyGraph) {
        for (key, values) in self.columns {
            for (node, value) in graph.graph.node_weights_mut().zip(values) {
                node.features.insert(key.to_string(), value);
            }
        }
    }

    fn insert_positional(&mut self, key: &'static str, view: &Projection, values: Vec<AttrValue>) {
        let mut by_index = vec![AttrValue::Null; view.len()];
        for (pos, value) in values.into_iter().enumerate() {
            by_index[view.node_at(pos).index()] = value;
        }
        self.columns.insert(key, by_index);
    }

    fn insert_floats(&mut self, key: &'static str, values: Vec<f64>) {
        self.columns
            .insert(key, values.into_iter().map(AttrValue::Float).collect());
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Compute the configured features without touching the graph.
#[must_use]
#[instrument(skip_all, fields(nodes = graph.node_count(), edges = graph.edge_count()))]
pub fn compute(graph: &DependencyGraph, config: &FeatureConfig) -> FeatureTable {
    let view = Projection::new(graph);
    let mut table = FeatureTable::default();

    if config.communities {
        let communities = community::greedy_modularity(&view);
        let assignment = community::assignment(view.len(), &communities);
        table.community_count = communities.len();

        let ids = assignment
            .iter()
            .map(|id| {
                id.and_then(|id| i64::try_from(id).ok())
                    .map_or(AttrValue::Null, AttrValue::Int)
            })
            .collect();
        table.insert_positional(COMMUNITY, &view, ids);
        let ratio = community::inter_intra_ratio(&view, &assignment);
        table.insert_positional(INTER_INTRA_RATIO, &view, ratio);
    }

    if config.clustering {
        let values = clustering::clustering(&view).into_iter().map(AttrValue::Float).collect();
        table.insert_positional(CLUSTERING, &view, values);
    }

    if config.degree_centrality {
        let values = centrality::degree_centrality(&view)
            .into_iter()
            .map(AttrValue::Float)
            .collect();
        table.insert_positional(DEGREE_CENTRALITY, &view, values);
    }

    if config.betweenness_centrality {
        table.insert_floats(BETWEENNESS_CENTRALITY, centrality::betweenness_centrality(&graph.graph));
    }

    if config.closeness_centrality {
        table.insert_floats(
            CLOSENESS_CENTRALITY,
            centrality::closeness_centrality(&graph.graph, config.closeness_wf_improved),
        );
    }

    table
}

/// Compute the configured features and write them onto the graph.
///
/// Edges and node membership are never changed.
#[instrument(skip_all)]
pub fn add_features(graph: &mut DependencyGraph, config: &FeatureConfig) -> usize {
    let table = compute(graph, config);
    let communities = table.community_count();
    let keys: Vec<&str> = table.keys().collect();
    info!(features = ?keys, communities, "node features computed");
    table.apply(graph);
    communities
}
