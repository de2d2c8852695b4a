//! `pkgraph merge`: fold a secondary graph (recent uploads) into a primary one.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use pkgraph_core::config::PipelineConfig;
use pkgraph_core::features::add_features;
use pkgraph_core::graph::persist::ArtifactPaths;
use pkgraph_core::graph::{GraphSummary, merge};
use pkgraph_core::timing::StageTimings;

use crate::cmd::build::{GraphReport, render_graph_report};
use crate::cmd::{load_graph, save_artifacts};
use crate::output::OutputMode;

/// Arguments for `pkgraph merge`.
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Primary graph; its attributes win for packages in both.
    #[arg(value_name = "PRIMARY")]
    pub primary: PathBuf,

    /// Secondary graph; its packages are marked recent.
    #[arg(value_name = "SECONDARY")]
    pub secondary: PathBuf,

    /// Artifact name for the merged graph.
    #[arg(long, default_value = "merged")]
    pub name: String,

    /// Output directory (defaults to `[output] dir`).
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Compute node features on the merged graph before saving.
    #[arg(long)]
    pub features: bool,
}

/// Execute `pkgraph merge`.
pub fn run_merge(
    args: &MergeArgs,
    config: &PipelineConfig,
    output: OutputMode,
    timings: &mut StageTimings,
) -> Result<()> {
    let primary = load_graph(&args.primary, output, timings)?;
    let secondary = load_graph(&args.secondary, output, timings)?;

    let mut merged = timings.timed("merge", || merge(&primary, &secondary));
    let communities = args
        .features
        .then(|| timings.timed("merge.features", || add_features(&mut merged, &config.features)));

    let dir = args.output_dir.as_ref().unwrap_or(&config.output.dir);
    let written = save_artifacts(&merged, &ArtifactPaths::new(dir, &args.name), &config.output, timings)?;

    let report = GraphReport {
        name: args.name.clone(),
        requested: None,
        loaded: None,
        communities,
        written,
        summary: GraphSummary::from_graph(&merged),
    };
    render_graph_report(output, &report, "Merged graph")
}
