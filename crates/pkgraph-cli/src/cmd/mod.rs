pub mod build;
pub mod completions;
pub mod export;
pub mod features;
pub mod merge;
pub mod missing;
pub mod normalize;
pub mod summary;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use pkgraph_core::DependencyGraph;
use pkgraph_core::config::OutputConfig;
use pkgraph_core::graph::persist::{self, ArtifactPaths};
use pkgraph_core::timing::StageTimings;

use crate::output::{CliError, OutputMode, render_error};

/// Load a binary graph, reporting a missing file as a structured error.
pub fn load_graph(path: &Path, output: OutputMode, timings: &mut StageTimings) -> Result<DependencyGraph> {
    if !path.exists() {
        render_error(
            output,
            &CliError::with_details(
                format!("graph file not found: {}", path.display()),
                "run `pkgraph build` to create it",
                "graph_missing",
            ),
        )?;
        anyhow::bail!("graph file not found: {}", path.display());
    }
    timings
        .timed("graph.load", || persist::load_binary(path))
        .with_context(|| format!("failed to load graph {}", path.display()))
}

/// Artifact paths that sit next to an existing graph file.
pub fn sibling_artifacts(graph_path: &Path) -> ArtifactPaths {
    let dir = graph_path.parent().unwrap_or_else(|| Path::new(""));
    let stem = graph_path
        .file_stem()
        .map_or_else(|| "graph".to_string(), |s| s.to_string_lossy().into_owned());
    ArtifactPaths::new(dir, &stem)
}

/// Write the binary graph plus whichever CSV files `config` enables.
///
/// Returns the paths written, binary first.
pub fn save_artifacts(
    graph: &DependencyGraph,
    paths: &ArtifactPaths,
    config: &OutputConfig,
    timings: &mut StageTimings,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    timings
        .timed("save.binary", || persist::save_binary(graph, &paths.graph))
        .with_context(|| format!("failed to write {}", paths.graph.display()))?;
    written.push(paths.graph.clone());

    if config.write_edge_list {
        timings
            .timed("save.edges", || persist::save_edge_list(graph, &paths.edges))
            .with_context(|| format!("failed to write {}", paths.edges.display()))?;
        written.push(paths.edges.clone());
    }

    if config.write_node_table {
        timings
            .timed("save.nodes", || persist::save_node_table(graph, &paths.nodes))
            .with_context(|| format!("failed to write {}", paths.nodes.display()))?;
        written.push(paths.nodes.clone());
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_artifacts_share_stem_and_dir() {
        let paths = sibling_artifacts(Path::new("data/graph/top_200_2d.pkgr"));
        assert_eq!(paths.graph, PathBuf::from("data/graph/top_200_2d.pkgr"));
        assert_eq!(paths.edges, PathBuf::from("data/graph/top_200_2d_edges.csv"));
        assert_eq!(paths.nodes, PathBuf::from("data/graph/top_200_2d_nodes.csv"));
    }

    #[test]
    fn save_artifacts_respects_output_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = ArtifactPaths::new(dir.path(), "g");
        let config = OutputConfig {
            dir: dir.path().to_path_buf(),
            write_edge_list: false,
            write_node_table: true,
        };
        let mut timings = StageTimings::new(false);

        let written = save_artifacts(&DependencyGraph::new(), &paths, &config, &mut timings).expect("save");
        assert_eq!(written, vec![paths.graph.clone(), paths.nodes.clone()]);
        assert!(paths.graph.exists());
        assert!(!paths.edges.exists());
    }
}
