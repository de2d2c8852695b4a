//! `pkgraph build`: dependency graph for a package name set.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use pkgraph_core::JsonDirStore;
use pkgraph_core::config::PipelineConfig;
use pkgraph_core::features::add_features;
use pkgraph_core::graph::persist::ArtifactPaths;
use pkgraph_core::graph::{GraphBuilder, GraphSummary};
use pkgraph_core::names::PackageNameSet;
use pkgraph_core::timing::StageTimings;
use serde::Serialize;
use tracing::{info, warn};

use crate::cmd::save_artifacts;
use crate::cmd::summary::{write_summary_pretty, write_summary_text};
use crate::output::{OutputMode, pretty_kv, render_mode};

/// Arguments for `pkgraph build`.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Package name set: collector JSON or a text file with one name per line.
    #[arg(value_name = "NAMES")]
    pub names: PathBuf,

    /// Artifact name (defaults to one derived from the name set, e.g. `top_200_2d`).
    #[arg(long)]
    pub name: Option<String>,

    /// Output directory (defaults to `[output] dir`).
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Compute node features before saving.
    #[arg(long)]
    pub features: bool,
}

/// Report payload shared by `build` and `merge`.
#[derive(Debug, Serialize)]
pub struct GraphReport {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub communities: Option<usize>,
    pub written: Vec<PathBuf>,
    pub summary: GraphSummary,
}

/// Execute `pkgraph build`.
pub fn run_build(
    args: &BuildArgs,
    config: &PipelineConfig,
    output: OutputMode,
    timings: &mut StageTimings,
) -> Result<()> {
    let names = PackageNameSet::read(&args.names)
        .with_context(|| format!("failed to read package names from {}", args.names.display()))?;
    let requested = names.canonical_names();

    let store = JsonDirStore::new(config.store.dir.clone());
    let records = timings.timed("build.load", || store.load_named(&requested));
    if records.len() < requested.len() {
        warn!(
            requested = requested.len(),
            loaded = records.len(),
            "some requested packages have no stored record and are left out"
        );
    }

    let mut graph = timings.timed("build.graph", || GraphBuilder::new(&store).build(&records));
    let communities = args
        .features
        .then(|| timings.timed("build.features", || add_features(&mut graph, &config.features)));

    let name = args.name.clone().unwrap_or_else(|| names.artifact_name());
    let dir = args.output_dir.as_ref().unwrap_or(&config.output.dir);
    let written = save_artifacts(&graph, &ArtifactPaths::new(dir, &name), &config.output, timings)?;
    info!(artifact = %name, nodes = graph.node_count(), edges = graph.edge_count(), "graph saved");

    let report = GraphReport {
        name,
        requested: Some(requested.len()),
        loaded: Some(records.len()),
        communities,
        written,
        summary: GraphSummary::from_graph(&graph),
    };
    render_graph_report(output, &report, "Built graph")
}

/// Render a [`GraphReport`] with the shared summary layout.
pub fn render_graph_report(output: OutputMode, report: &GraphReport, heading: &str) -> Result<()> {
    render_mode(
        output,
        report,
        |r, w| {
            writeln!(w, "name={}", r.name)?;
            if let (Some(requested), Some(loaded)) = (r.requested, r.loaded) {
                writeln!(w, "requested={requested}")?;
                writeln!(w, "loaded={loaded}")?;
            }
            if let Some(communities) = r.communities {
                writeln!(w, "communities={communities}")?;
            }
            for path in &r.written {
                writeln!(w, "written={}", path.display())?;
            }
            write_summary_text(w, &r.summary)
        },
        |r, w| {
            write_summary_pretty(w, &format!("{heading}: {}", r.name), &r.summary)?;
            if let (Some(requested), Some(loaded)) = (r.requested, r.loaded) {
                pretty_kv(w, "Requested", requested.to_string())?;
                pretty_kv(w, "Loaded", loaded.to_string())?;
            }
            if let Some(communities) = r.communities {
                pretty_kv(w, "Communities", communities.to_string())?;
            }
            for path in &r.written {
                pretty_kv(w, "Written", path.display().to_string())?;
            }
            Ok(())
        },
    )
}
