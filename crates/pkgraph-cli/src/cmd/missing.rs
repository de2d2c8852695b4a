//! `pkgraph missing`: list stored packages with incomplete metadata.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use pkgraph_core::JsonDirStore;
use pkgraph_core::config::PipelineConfig;
use pkgraph_core::names::PackageNameSet;
use pkgraph_core::timing::StageTimings;
use serde::Serialize;
use tracing::info;

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// Arguments for `pkgraph missing`.
#[derive(Args, Debug)]
pub struct MissingArgs {
    /// Where to write the `{"packages": [...]}` name set.
    #[arg(long, value_name = "PATH", default_value = "data/missing_package_names.json")]
    pub output: PathBuf,
}

#[derive(Debug, Serialize)]
struct MissingReport {
    store: PathBuf,
    output: PathBuf,
    count: usize,
    packages: Vec<String>,
}

/// Execute `pkgraph missing`.
pub fn run_missing(
    args: &MissingArgs,
    config: &PipelineConfig,
    output: OutputMode,
    timings: &mut StageTimings,
) -> Result<()> {
    let store = JsonDirStore::new(config.store.dir.clone());
    let packages = timings
        .timed("missing.scan", || store.missing_metadata_names())
        .with_context(|| format!("failed to scan {}", store.dir().display()))?;

    PackageNameSet::from_names(packages.iter().cloned())
        .write(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!(count = packages.len(), path = %args.output.display(), "missing-metadata names written");

    let report = MissingReport {
        store: store.dir().to_path_buf(),
        output: args.output.clone(),
        count: packages.len(),
        packages,
    };

    render_mode(
        output,
        &report,
        |r, w| {
            for name in &r.packages {
                writeln!(w, "{name}")?;
            }
            Ok(())
        },
        |r, w| {
            pretty_section(w, "Packages with missing metadata")?;
            pretty_kv(w, "Store", r.store.display().to_string())?;
            pretty_kv(w, "Count", r.count.to_string())?;
            pretty_kv(w, "Written", r.output.display().to_string())
        },
    )
}
