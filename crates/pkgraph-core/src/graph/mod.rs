//! Package dependency graph.
//!
//! # Overview
//!
//! [`DependencyGraph`] wraps a petgraph [`DiGraph`] whose nodes are packages
//! and whose edges are declared dependencies. An edge `A → B` means "A
//! declares a dependency on B". Node names are unique: inserting a package
//! that already exists merges into the existing node instead of adding a
//! second one, and at most one edge exists per `(source, target)` pair.
//!
//! ## Pipeline
//!
//! ```text
//! BTreeMap<String, PackageRecord>
//!        ↓  build::GraphBuilder::build()
//! DependencyGraph
//!        ↓  merge::merge()               (optional)
//!        ↓  crate::features::add_features()
//!        ↓  persist::save_binary() / persist::save_edge_list()
//! ```
//!
//! Self-dependencies are kept as self-loop edges.

pub mod build;
pub mod merge;
pub mod persist;
pub mod stats;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use petgraph::Direction;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::model::{PackageRecord, UNKNOWN};

pub use build::GraphBuilder;
pub use merge::merge;
pub use stats::GraphSummary;

// ---------------------------------------------------------------------------
// Attribute values
// ---------------------------------------------------------------------------

/// Value stored in a node's feature map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    /// The attribute was computed but has no value for this node.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl AttrValue {
    /// Numeric view of the value, if it has one.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// Attributes attached to a package node.
///
/// Quality fields are defaulted (counts to 0, strings to `"Unknown"`); the
/// `missing_metadata` flag records whether the defaults stand in for values
/// the registry never reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageNode {
    pub name: String,
    pub rank: i64,
    pub stars: u64,
    pub forks: u64,
    pub license: String,
    pub latest_release: Option<DateTime<Utc>>,
    pub repository_url: String,
    pub has_funding: bool,
    pub keyword_count: u64,
    pub missing_metadata: bool,
    /// Part of the requested package set, not only reached as a dependency.
    pub core: bool,
    /// Shares its repository URL with more than one core package.
    pub is_copycat: bool,
    /// Set by [`merge::merge`]: `Some(true)` when the node came from the
    /// secondary graph.
    pub is_recent: Option<bool>,
    /// Attributes added by later pipeline stages.
    pub features: BTreeMap<String, AttrValue>,
}

impl PackageNode {
    /// Build node attributes from a record, defaulting missing values.
    #[must_use]
    pub fn from_record(name: &str, record: &PackageRecord, core: bool) -> Self {
        Self {
            name: name.to_string(),
            rank: record.rank.unwrap_or(0),
            stars: record.stars.unwrap_or(0),
            forks: record.forks.unwrap_or(0),
            license: record
                .licenses
                .clone()
                .unwrap_or_else(|| UNKNOWN.to_string()),
            latest_release: record.latest_release_published_at,
            repository_url: record
                .repository_url
                .as_deref()
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .unwrap_or(UNKNOWN)
                .to_string(),
            has_funding: record.has_funding.unwrap_or(false),
            keyword_count: record.keyword_count.unwrap_or(0),
            missing_metadata: record.has_missing_metadata(),
            core,
            is_copycat: false,
            is_recent: None,
            features: BTreeMap::new(),
        }
    }

    /// Node for a package nothing is known about.
    #[must_use]
    pub fn unknown(name: &str, core: bool) -> Self {
        Self::from_record(name, &PackageRecord::empty(name), core)
    }

    /// True when the repository URL carries real information.
    #[must_use]
    pub fn has_known_repository(&self) -> bool {
        self.repository_url != UNKNOWN
    }

    /// Overwrite this node's attributes with `incoming`.
    ///
    /// Feature attributes and the recency marker already present survive
    /// unless `incoming` sets them too.
    pub fn absorb(&mut self, incoming: Self) {
        let previous_features = std::mem::take(&mut self.features);
        let previous_recent = self.is_recent;
        *self = incoming;
        for (key, value) in previous_features {
            self.features.entry(key).or_insert(value);
        }
        self.is_recent = self.is_recent.or(previous_recent);
    }
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

/// Why a dependency was declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DependencyKind {
    /// Unconditionally required at run time.
    Runtime,
    /// Pulled in through the named extra (`"unspecified"` when unknown).
    Extra(String),
}

impl DependencyKind {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Runtime => "runtime",
            Self::Extra(extra) => extra,
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attributes attached to a dependency edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub kind: DependencyKind,
    pub optional: bool,
}

impl DependencyEdge {
    #[must_use]
    pub const fn runtime() -> Self {
        Self {
            kind: DependencyKind::Runtime,
            optional: false,
        }
    }

    #[must_use]
    pub fn extra(name: &str) -> Self {
        Self {
            kind: DependencyKind::Extra(name.to_string()),
            optional: true,
        }
    }
}

// ---------------------------------------------------------------------------
// DependencyGraph
// ---------------------------------------------------------------------------

/// Directed, attributed package dependency graph.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Directed graph: nodes = packages, edges = declared dependencies.
    pub graph: DiGraph<PackageNode, DependencyEdge>,
    /// Mapping from canonical package name to petgraph `NodeIndex`.
    pub node_map: HashMap<String, NodeIndex>,
    /// Number of core packages in the set that seeded this graph.
    pub num_core_packages: usize,
}

impl DependencyGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, or merge into the existing node with the same name.
    pub fn upsert_node(&mut self, node: PackageNode) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(&node.name) {
            self.graph[idx].absorb(node);
            return idx;
        }
        let name = node.name.clone();
        let idx = self.graph.add_node(node);
        self.node_map.insert(name, idx);
        idx
    }

    /// Insert an edge, or replace the attributes of the existing one.
    pub fn upsert_edge(
        &mut self,
        source: NodeIndex,
        target: NodeIndex,
        edge: DependencyEdge,
    ) -> EdgeIndex {
        self.graph.update_edge(source, target, edge)
    }

    /// Return the number of nodes (packages) in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Return the number of dependency edges in the graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Look up the `NodeIndex` for a package name.
    #[must_use]
    pub fn node_index(&self, name: &str) -> Option<NodeIndex> {
        self.node_map.get(name).copied()
    }

    #[must_use]
    pub fn node(&self, name: &str) -> Option<&PackageNode> {
        self.node_index(name).map(|idx| &self.graph[idx])
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut PackageNode> {
        let idx = self.node_index(name)?;
        self.graph.node_weight_mut(idx)
    }

    /// Attributes of the edge `source → target`, if present.
    #[must_use]
    pub fn edge(&self, source: &str, target: &str) -> Option<&DependencyEdge> {
        let s = self.node_index(source)?;
        let t = self.node_index(target)?;
        let idx = self.graph.find_edge(s, t)?;
        self.graph.edge_weight(idx)
    }

    #[must_use]
    pub fn contains_edge(&self, source: &str, target: &str) -> bool {
        self.edge(source, target).is_some()
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &PackageNode> {
        self.graph.node_weights()
    }

    /// `(source name, target name, attributes)` for every edge.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, &DependencyEdge)> {
        self.graph.edge_references().map(|e| {
            (
                self.graph[e.source()].name.as_str(),
                self.graph[e.target()].name.as_str(),
                e.weight(),
            )
        })
    }

    /// Names of the packages `name` depends on, sorted.
    #[must_use]
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        self.neighbor_names(name, Direction::Outgoing)
    }

    /// Names of the packages that depend on `name`, sorted.
    #[must_use]
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.neighbor_names(name, Direction::Incoming)
    }

    fn neighbor_names(&self, name: &str, dir: Direction) -> Vec<&str> {
        let Some(idx) = self.node_index(name) else {
            return Vec::new();
        };
        let mut names: Vec<&str> = self
            .graph
            .neighbors_directed(idx, dir)
            .map(|n| self.graph[n].name.as_str())
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Number of nodes flagged `core`.
    #[must_use]
    pub fn core_node_count(&self) -> usize {
        self.nodes().filter(|n| n.core).count()
    }

    /// BLAKE3 hash of the sorted node names and edge set.
    ///
    /// Independent of insertion order, so two builds from the same records
    /// hash identically. Node attributes other than the name are not hashed.
    #[must_use]
    pub fn content_hash(&self) -> String {
        let mut names: Vec<&str> = self.nodes().map(|n| n.name.as_str()).collect();
        names.sort_unstable();

        let mut edges: Vec<(&str, &str, &str, bool)> = self
            .edges()
            .map(|(s, t, e)| (s, t, e.kind.as_str(), e.optional))
            .collect();
        edges.sort_unstable();

        let mut hasher = blake3::Hasher::new();
        for name in names {
            hasher.update(name.as_bytes());
            hasher.update(b"\x00");
        }
        hasher.update(b"\x01");
        for (source, target, kind, optional) in edges {
            hasher.update(source.as_bytes());
            hasher.update(b"\x00");
            hasher.update(target.as_bytes());
            hasher.update(b"\x00");
            hasher.update(kind.as_bytes());
            hasher.update(if optional { b"\x01" } else { b"\x00" });
        }
        format!("blake3:{}", hasher.finalize())
    }
}

/// Structural equality: same nodes with the same attributes, same edges with
/// the same attributes, and the same core count. Node index order is ignored.
impl PartialEq for DependencyGraph {
    fn eq(&self, other: &Self) -> bool {
        if self.num_core_packages != other.num_core_packages
            || self.node_count() != other.node_count()
            || self.edge_count() != other.edge_count()
        {
            return false;
        }

        let nodes_match = self
            .nodes()
            .all(|node| other.node(&node.name).is_some_and(|theirs| theirs == node));

        nodes_match
            && self
                .edges()
                .all(|(s, t, edge)| other.edge(s, t).is_some_and(|theirs| theirs == edge))
    }
}
