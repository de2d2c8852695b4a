//! Persisted graph formats.
//!
//! # Binary form
//!
//! ```text
//! offset  size  field
//! 0       4     magic  "PKGR"
//! 4       1     format version
//! 5       ..    bincode-encoded GraphSnapshot
//! ```
//!
//! A [`GraphSnapshot`] stores nodes in index order, edges as
//! `(source index, target index, attributes)`, and the core package count.
//! Decoding rebuilds the name map and rejects snapshots whose edges point at
//! missing nodes or whose node names repeat, so a loaded graph is always
//! well-formed.
//!
//! # Tabular forms
//!
//! - Edge list: `source,target,kind,optional`.
//! - Node table: one row per node with every attribute, followed by one
//!   column per feature key present on any node (sorted).

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{DependencyEdge, DependencyGraph, PackageNode};

// ---------------------------------------------------------------------------
// Format constants
// ---------------------------------------------------------------------------

/// The four magic bytes at the start of every binary graph file.
pub const GRAPH_MAGIC: [u8; 4] = *b"PKGR";

/// The current format version written to new graph files.
pub const GRAPH_FORMAT_VERSION: u8 = 1;

const HEADER_LEN: usize = 5;

/// Fixed leading columns of the node table.
pub const NODE_TABLE_COLUMNS: [&str; 14] = [
    "name",
    "core",
    "is_copycat",
    "is_recent",
    "missing_metadata",
    "rank",
    "stars",
    "forks",
    "keyword_count",
    "license",
    "repository_url",
    "has_funding",
    "latest_release",
    "feature_count",
];

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors returned by graph encoding, decoding and export.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("invalid magic bytes: expected PKGR, got {0:?}")]
    InvalidMagic([u8; 4]),

    #[error("unsupported graph format version {0}: maximum supported is {GRAPH_FORMAT_VERSION}")]
    UnsupportedVersion(u8),

    #[error("graph data is truncated")]
    UnexpectedEof,

    #[error("graph snapshot encode/decode error: {0}")]
    Codec(#[from] bincode::Error),

    /// An edge refers to a node index outside the snapshot.
    #[error("edge {source_idx} -> {target_idx} references a missing node ({node_count} nodes)")]
    DanglingEdge {
        source_idx: u32,
        target_idx: u32,
        node_count: usize,
    },

    #[error("duplicate node name in snapshot: {0}")]
    DuplicateNode(String),

    #[error("csv export error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Serializable image of a [`DependencyGraph`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<PackageNode>,
    pub edges: Vec<(u32, u32, DependencyEdge)>,
    pub num_core_packages: u64,
}

impl GraphSnapshot {
    #[must_use]
    pub fn from_graph(graph: &DependencyGraph) -> Self {
        let nodes = graph.graph.node_weights().cloned().collect();
        let edges = graph
            .graph
            .edge_references()
            .map(|e| {
                (
                    index_to_u32(e.source()),
                    index_to_u32(e.target()),
                    e.weight().clone(),
                )
            })
            .collect();
        Self {
            nodes,
            edges,
            num_core_packages: graph.num_core_packages as u64,
        }
    }

    /// Rebuild the graph, checking that it is well-formed.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::DanglingEdge`] or
    /// [`PersistError::DuplicateNode`] for inconsistent snapshots.
    pub fn into_graph(self) -> Result<DependencyGraph, PersistError> {
        let mut graph = DependencyGraph::new();
        for node in self.nodes {
            if graph.node_map.contains_key(&node.name) {
                return Err(PersistError::DuplicateNode(node.name));
            }
            graph.upsert_node(node);
        }

        let node_count = graph.node_count();
        for (source_idx, target_idx, edge) in self.edges {
            let in_range = |i: u32| usize::try_from(i).is_ok_and(|i| i < node_count);
            if !in_range(source_idx) || !in_range(target_idx) {
                return Err(PersistError::DanglingEdge {
                    source_idx,
                    target_idx,
                    node_count,
                });
            }
            graph.upsert_edge(
                NodeIndex::new(source_idx as usize),
                NodeIndex::new(target_idx as usize),
                edge,
            );
        }

        graph.num_core_packages = usize::try_from(self.num_core_packages).unwrap_or(usize::MAX);
        Ok(graph)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn index_to_u32(idx: NodeIndex) -> u32 {
    // petgraph's default index type is u32.
    idx.index() as u32
}

// ---------------------------------------------------------------------------
// Binary encode / decode
// ---------------------------------------------------------------------------

/// Encode a graph into the binary form.
///
/// # Errors
///
/// Returns [`PersistError::Codec`] if bincode serialization fails.
pub fn encode(graph: &DependencyGraph) -> Result<Vec<u8>, PersistError> {
    let body = bincode::serialize(&GraphSnapshot::from_graph(graph))?;
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&GRAPH_MAGIC);
    out.push(GRAPH_FORMAT_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode a graph from the binary form.
///
/// # Errors
///
/// Returns [`PersistError`] if the header is wrong, the body does not decode,
/// or the snapshot is inconsistent.
pub fn decode(bytes: &[u8]) -> Result<DependencyGraph, PersistError> {
    if bytes.len() < HEADER_LEN {
        return Err(PersistError::UnexpectedEof);
    }
    let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
    if magic != GRAPH_MAGIC {
        return Err(PersistError::InvalidMagic(magic));
    }
    let version = bytes[4];
    if version > GRAPH_FORMAT_VERSION {
        return Err(PersistError::UnsupportedVersion(version));
    }
    let snapshot: GraphSnapshot = bincode::deserialize(&bytes[HEADER_LEN..])?;
    snapshot.into_graph()
}

/// Write the binary form to `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`PersistError`] on encode or I/O failure.
#[instrument(skip(graph), fields(path = %path.display()))]
pub fn save_binary(graph: &DependencyGraph, path: &Path) -> Result<(), PersistError> {
    let bytes = encode(graph)?;
    ensure_parent(path)?;
    fs::write(path, &bytes).map_err(|source| io_error(path, source))?;
    debug!(bytes = bytes.len(), "graph written");
    Ok(())
}

/// Read a graph previously written by [`save_binary`].
///
/// # Errors
///
/// Returns [`PersistError`] on I/O or decode failure.
#[instrument(fields(path = %path.display()))]
pub fn load_binary(path: &Path) -> Result<DependencyGraph, PersistError> {
    let bytes = fs::read(path).map_err(|source| io_error(path, source))?;
    let graph = decode(&bytes)?;
    debug!(nodes = graph.node_count(), edges = graph.edge_count(), "graph loaded");
    Ok(graph)
}

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

/// Write the flat edge list, sorted by `(source, target)`.
///
/// # Errors
///
/// Returns [`PersistError::Csv`] if writing fails.
pub fn write_edge_list<W: Write>(graph: &DependencyGraph, writer: W) -> Result<(), PersistError> {
    let mut rows: Vec<(&str, &str, &DependencyEdge)> = graph.edges().collect();
    rows.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["source", "target", "kind", "optional"])?;
    for (source, target, edge) in rows {
        csv.write_record([
            source,
            target,
            edge.kind.as_str(),
            if edge.optional { "true" } else { "false" },
        ])?;
    }
    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Write the node table, sorted by name.
///
/// # Errors
///
/// Returns [`PersistError::Csv`] if writing fails.
pub fn write_node_table<W: Write>(graph: &DependencyGraph, writer: W) -> Result<(), PersistError> {
    let feature_keys: BTreeSet<&str> = graph
        .nodes()
        .flat_map(|n| n.features.keys().map(String::as_str))
        .collect();

    let mut nodes: Vec<&PackageNode> = graph.nodes().collect();
    nodes.sort_by(|a, b| a.name.cmp(&b.name));

    let mut csv = csv::Writer::from_writer(writer);
    let header: Vec<&str> = NODE_TABLE_COLUMNS
        .iter()
        .copied()
        .chain(feature_keys.iter().copied())
        .collect();
    csv.write_record(&header)?;

    for node in nodes {
        let mut row = vec![
            node.name.clone(),
            node.core.to_string(),
            node.is_copycat.to_string(),
            node.is_recent.map(|r| r.to_string()).unwrap_or_default(),
            node.missing_metadata.to_string(),
            node.rank.to_string(),
            node.stars.to_string(),
            node.forks.to_string(),
            node.keyword_count.to_string(),
            node.license.clone(),
            node.repository_url.clone(),
            node.has_funding.to_string(),
            node.latest_release.map(|t| t.to_rfc3339()).unwrap_or_default(),
            node.features.len().to_string(),
        ];
        row.extend(
            feature_keys
                .iter()
                .map(|key| node.features.get(*key).map(ToString::to_string).unwrap_or_default()),
        );
        csv.write_record(&row)?;
    }
    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Write the edge list CSV to `path`.
///
/// # Errors
///
/// Returns [`PersistError`] on I/O or CSV failure.
pub fn save_edge_list(graph: &DependencyGraph, path: &Path) -> Result<(), PersistError> {
    ensure_parent(path)?;
    let file = fs::File::create(path).map_err(|source| io_error(path, source))?;
    write_edge_list(graph, io::BufWriter::new(file))
}

/// Write the node table CSV to `path`.
///
/// # Errors
///
/// Returns [`PersistError`] on I/O or CSV failure.
pub fn save_node_table(graph: &DependencyGraph, path: &Path) -> Result<(), PersistError> {
    ensure_parent(path)?;
    let file = fs::File::create(path).map_err(|source| io_error(path, source))?;
    write_node_table(graph, io::BufWriter::new(file))
}

// ---------------------------------------------------------------------------
// Artifact naming
// ---------------------------------------------------------------------------

/// Output file locations for one named graph artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub graph: PathBuf,
    pub edges: PathBuf,
    pub nodes: PathBuf,
}

impl ArtifactPaths {
    /// `<dir>/<name>.pkgr`, `<dir>/<name>_edges.csv`, `<dir>/<name>_nodes.csv`.
    #[must_use]
    pub fn new(dir: &Path, name: &str) -> Self {
        Self {
            graph: dir.join(format!("{name}.pkgr")),
            edges: dir.join(format!("{name}_edges.csv")),
            nodes: dir.join(format!("{name}_nodes.csv")),
        }
    }
}

fn ensure_parent(path: &Path) -> Result<(), PersistError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| io_error(parent, source))
        }
        _ => Ok(()),
    }
}

fn io_error(path: &Path, source: io::Error) -> PersistError {
    PersistError::Io {
        path: path.to_path_buf(),
        source,
    }
}
