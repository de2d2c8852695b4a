//! `pkgraph export`: flat CSV views of a saved graph.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::Args;
use pkgraph_core::DependencyGraph;
use pkgraph_core::graph::persist;
use pkgraph_core::timing::StageTimings;
use serde::Serialize;

use crate::cmd::{load_graph, sibling_artifacts};
use crate::output::{OutputMode, pretty_kv, pretty_section, render};

/// Arguments for `pkgraph export`.
///
/// With neither `--edges` nor `--nodes`, both files are written next to the
/// graph as `<stem>_edges.csv` and `<stem>_nodes.csv`.
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Graph file (`.pkgr`).
    #[arg(value_name = "GRAPH")]
    pub graph: PathBuf,

    /// Edge list destination (`-` for stdout).
    #[arg(long, value_name = "PATH")]
    pub edges: Option<PathBuf>,

    /// Node table destination (`-` for stdout).
    #[arg(long, value_name = "PATH")]
    pub nodes: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ExportReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    edges: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nodes: Option<PathBuf>,
}

fn is_stdout(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Execute `pkgraph export`.
pub fn run_export(args: &ExportArgs, output: OutputMode, timings: &mut StageTimings) -> Result<()> {
    let graph = load_graph(&args.graph, output, timings)?;

    let (edges, nodes) = if args.edges.is_none() && args.nodes.is_none() {
        let defaults = sibling_artifacts(&args.graph);
        (Some(defaults.edges), Some(defaults.nodes))
    } else {
        (args.edges.clone(), args.nodes.clone())
    };

    if let Some(path) = &edges {
        timings.timed("export.edges", || export_edges(&graph, path))?;
    }
    if let Some(path) = &nodes {
        timings.timed("export.nodes", || export_nodes(&graph, path))?;
    }

    // CSV on stdout is the output.
    if edges.iter().chain(&nodes).any(|p| is_stdout(p)) {
        return Ok(());
    }

    render(output, &ExportReport { edges, nodes }, |r, w| {
        pretty_section(w, "Exported")?;
        if let Some(path) = &r.edges {
            pretty_kv(w, "Edges", path.display().to_string())?;
        }
        if let Some(path) = &r.nodes {
            pretty_kv(w, "Nodes", path.display().to_string())?;
        }
        Ok(())
    })
}

fn export_edges(graph: &DependencyGraph, path: &Path) -> Result<()> {
    if is_stdout(path) {
        persist::write_edge_list(graph, io::stdout().lock()).context("failed to write edge list to stdout")?;
        return Ok(());
    }
    persist::save_edge_list(graph, path).with_context(|| format!("failed to write {}", path.display()))
}

fn export_nodes(graph: &DependencyGraph, path: &Path) -> Result<()> {
    if is_stdout(path) {
        persist::write_node_table(graph, io::stdout().lock()).context("failed to write node table to stdout")?;
        return Ok(());
    }
    persist::save_node_table(graph, path).with_context(|| format!("failed to write {}", path.display()))
}
