//! `pkgraph features`: annotate a saved graph with structural features.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Args, ValueEnum};
use pkgraph_core::config::PipelineConfig;
use pkgraph_core::features::{FeatureConfig, add_features};
use pkgraph_core::graph::persist;
use pkgraph_core::timing::StageTimings;
use serde::Serialize;

use crate::cmd::{load_graph, sibling_artifacts};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// A feature pass that can be switched off from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FeaturePass {
    Communities,
    Clustering,
    Degree,
    Betweenness,
    Closeness,
}

/// Arguments for `pkgraph features`.
#[derive(Args, Debug)]
pub struct FeaturesArgs {
    /// Graph file (`.pkgr`) to annotate.
    #[arg(value_name = "GRAPH")]
    pub graph: PathBuf,

    /// Write the annotated graph here instead of overwriting the input.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Skip a feature pass (repeatable).
    #[arg(long = "skip", value_enum, value_name = "PASS")]
    pub skip: Vec<FeaturePass>,
}

#[derive(Debug, Serialize)]
struct FeaturesReport {
    graph: PathBuf,
    nodes: usize,
    features: Vec<String>,
    communities: usize,
    written: Vec<PathBuf>,
}

/// Apply `--skip` flags on top of the configured passes.
fn effective_config(base: &FeatureConfig, skip: &[FeaturePass]) -> FeatureConfig {
    let mut config = base.clone();
    for pass in skip {
        match pass {
            FeaturePass::Communities => config.communities = false,
            FeaturePass::Clustering => config.clustering = false,
            FeaturePass::Degree => config.degree_centrality = false,
            FeaturePass::Betweenness => config.betweenness_centrality = false,
            FeaturePass::Closeness => config.closeness_centrality = false,
        }
    }
    config
}

/// Execute `pkgraph features`.
pub fn run_features(
    args: &FeaturesArgs,
    config: &PipelineConfig,
    output: OutputMode,
    timings: &mut StageTimings,
) -> Result<()> {
    let mut graph = load_graph(&args.graph, output, timings)?;
    let feature_config = effective_config(&config.features, &args.skip);
    let communities = timings.timed("features", || add_features(&mut graph, &feature_config));

    let target = args.output.clone().unwrap_or_else(|| args.graph.clone());
    timings
        .timed("save.binary", || persist::save_binary(&graph, &target))
        .with_context(|| format!("failed to write {}", target.display()))?;
    let mut written = vec![target.clone()];

    if config.output.write_node_table {
        let nodes = sibling_artifacts(&target).nodes;
        timings
            .timed("save.nodes", || persist::save_node_table(&graph, &nodes))
            .with_context(|| format!("failed to write {}", nodes.display()))?;
        written.push(nodes);
    }

    let features = graph
        .nodes()
        .next()
        .map(|node| node.features.keys().cloned().collect())
        .unwrap_or_default();

    let report = FeaturesReport {
        graph: target,
        nodes: graph.node_count(),
        features,
        communities,
        written,
    };

    render_mode(
        output,
        &report,
        |r, w| {
            writeln!(w, "nodes={}", r.nodes)?;
            writeln!(w, "features={}", r.features.join(","))?;
            writeln!(w, "communities={}", r.communities)?;
            for path in &r.written {
                writeln!(w, "written={}", path.display())?;
            }
            Ok(())
        },
        |r, w| {
            pretty_section(w, &format!("Features: {}", r.graph.display()))?;
            pretty_kv(w, "Nodes", r.nodes.to_string())?;
            pretty_kv(w, "Features", r.features.join(", "))?;
            pretty_kv(w, "Communities", r.communities.to_string())?;
            for path in &r.written {
                pretty_kv(w, "Written", path.display().to_string())?;
            }
            Ok(())
        },
    )
}
