use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::features::FeatureConfig;

/// File name looked up in the working directory.
pub const PROJECT_CONFIG_FILE: &str = "pkgraph.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub features: FeatureConfig,
}

/// Where per-package metadata documents live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
        }
    }
}

/// Where graph artifacts are written and which ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_true")]
    pub write_edge_list: bool,
    #[serde(default)]
    pub write_node_table: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            write_edge_list: default_true(),
            write_node_table: false,
        }
    }
}

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit(PathBuf),
    Project(PathBuf),
    User(PathBuf),
    Defaults,
}

impl ConfigSource {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Explicit(p) | Self::Project(p) | Self::User(p) => Some(p),
            Self::Defaults => None,
        }
    }
}

/// Read and parse a config file.
///
/// # Errors
///
/// Fails if the file cannot be read or is not valid TOML for
/// [`PipelineConfig`].
pub fn load_config_file(path: &Path) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<PipelineConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// `<config dir>/pkgraph/config.toml`, if the platform has a config dir.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pkgraph").join("config.toml"))
}

/// Resolve the effective configuration.
///
/// Order: `explicit` path (must exist), then `<project_root>/pkgraph.toml`,
/// then the user config file, then built-in defaults. The first file found
/// wins; files are not layered.
///
/// # Errors
///
/// Fails if the explicit file is missing, or if the selected file cannot be
/// parsed.
pub fn resolve_config(explicit: Option<&Path>, project_root: &Path) -> Result<(PipelineConfig, ConfigSource)> {
    if let Some(path) = explicit {
        let config = load_config_file(path)?;
        return Ok((config, ConfigSource::Explicit(path.to_path_buf())));
    }

    let project = project_root.join(PROJECT_CONFIG_FILE);
    if project.exists() {
        let config = load_config_file(&project)?;
        return Ok((config, ConfigSource::Project(project)));
    }

    if let Some(user) = user_config_path().filter(|p| p.exists()) {
        let config = load_config_file(&user)?;
        return Ok((config, ConfigSource::User(user)));
    }

    Ok((PipelineConfig::default(), ConfigSource::Defaults))
}

const fn default_true() -> bool {
    true
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("data/raw/packages")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/graph")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: PipelineConfig = toml::from_str("").expect("parse");
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.store.dir, PathBuf::from("data/raw/packages"));
        assert!(config.output.write_edge_list);
        assert!(!config.output.write_node_table);
        assert!(config.features.betweenness_centrality);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
            [output]
            write_node_table = true

            [features]
            closeness_wf_improved = false
            "#,
        )
        .expect("parse");
        assert_eq!(config.output.dir, PathBuf::from("data/graph"));
        assert!(config.output.write_node_table);
        assert!(!config.features.closeness_wf_improved);
        assert!(config.features.clustering);
    }

    #[test]
    fn explicit_path_wins() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(PROJECT_CONFIG_FILE), "[store]\ndir = \"project\"\n").expect("write");
        let explicit = dir.path().join("other.toml");
        std::fs::write(&explicit, "[store]\ndir = \"explicit\"\n").expect("write");

        let (config, source) = resolve_config(Some(&explicit), dir.path()).expect("resolve");
        assert_eq!(config.store.dir, PathBuf::from("explicit"));
        assert_eq!(source, ConfigSource::Explicit(explicit));
    }

    #[test]
    fn project_file_is_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(PROJECT_CONFIG_FILE), "[store]\ndir = \"project\"\n").expect("write");

        let (config, source) = resolve_config(None, dir.path()).expect("resolve");
        assert_eq!(config.store.dir, PathBuf::from("project"));
        assert!(matches!(source, ConfigSource::Project(_)));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = resolve_config(Some(&dir.path().join("nope.toml")), dir.path()).expect_err("missing");
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(PROJECT_CONFIG_FILE), "[store\n").expect("write");
        let err = resolve_config(None, dir.path()).expect_err("malformed");
        assert!(err.to_string().contains("Failed to parse"));
    }
}
