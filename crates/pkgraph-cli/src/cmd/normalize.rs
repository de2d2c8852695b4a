//! `pkgraph normalize`: raw registry documents into the package store.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use pkgraph_core::JsonDirStore;
use pkgraph_core::config::PipelineConfig;
use pkgraph_core::store::StoreError;
use pkgraph_core::timing::StageTimings;
use serde::Serialize;
use tracing::{info, warn};

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// Arguments for `pkgraph normalize`.
#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Directory of raw registry documents, one `<name>.json` per package.
    #[arg(value_name = "RAW_DIR")]
    pub input: PathBuf,

    /// Store directory to write normalized records to (defaults to `[store] dir`).
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct NormalizeReport {
    input: PathBuf,
    output: PathBuf,
    written: usize,
    missing_metadata: usize,
}

/// Execute `pkgraph normalize`.
pub fn run_normalize(
    args: &NormalizeArgs,
    config: &PipelineConfig,
    output: OutputMode,
    timings: &mut StageTimings,
) -> Result<()> {
    let source = JsonDirStore::new(args.input.clone());
    let records = timings
        .timed("normalize.load", || source.load_all())
        .with_context(|| format!("failed to read raw documents from {}", args.input.display()))?;

    let dest = JsonDirStore::new(args.output.clone().unwrap_or_else(|| config.store.dir.clone()));
    let mut missing_metadata = 0;
    let mut written = 0;
    timings.timed("normalize.write", || -> Result<()> {
        for record in records.values() {
            match dest.write(record) {
                Ok(_) => written += 1,
                Err(err @ StoreError::InvalidName(_)) => {
                    warn!(error = %err, "skipping record with unsafe name");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
            if record.has_missing_metadata() {
                missing_metadata += 1;
            }
        }
        Ok(())
    })?;

    info!(written, missing_metadata, "normalized package records");

    let report = NormalizeReport {
        input: args.input.clone(),
        output: dest.dir().to_path_buf(),
        written,
        missing_metadata,
    };

    render_mode(
        output,
        &report,
        |r, w| {
            writeln!(w, "written={}", r.written)?;
            writeln!(w, "missing_metadata={}", r.missing_metadata)?;
            writeln!(w, "output={}", r.output.display())
        },
        |r, w| {
            pretty_section(w, "Normalized package records")?;
            pretty_kv(w, "Source", r.input.display().to_string())?;
            pretty_kv(w, "Store", r.output.display().to_string())?;
            pretty_kv(w, "Written", r.written.to_string())?;
            pretty_kv(w, "Missing metadata", r.missing_metadata.to_string())
        },
    )
}
