#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::{OutputMode, resolve_output_mode};
use pkgraph_core::config::resolve_config;
use pkgraph_core::timing::StageTimings;
use std::env;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "pkgraph: package dependency graphs and structural features",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit a per-stage timing report to stderr.
    #[arg(long, global = true)]
    timing: bool,

    /// Emit JSON output (same as `--format json`).
    #[arg(long, global = true)]
    json: bool,

    /// Output format; defaults to pretty on a terminal, text when piped.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Config file (defaults to ./pkgraph.toml, then the user config).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Ingest",
        about = "Normalize raw registry documents",
        long_about = "Read raw per-package registry JSON documents, normalize them and write them to the package store.",
        after_help = "EXAMPLES:\n    # Normalize into the configured store\n    pkgraph normalize data/raw/libraries_io\n\n    # Write somewhere else\n    pkgraph normalize data/raw/libraries_io --output /tmp/packages"
    )]
    Normalize(cmd::normalize::NormalizeArgs),

    #[command(
        next_help_heading = "Graph",
        about = "Build a dependency graph",
        long_about = "Build the dependency graph for a package name set from the package store and save it.",
        after_help = "EXAMPLES:\n    # Build from collector output\n    pkgraph build data/top_200_2d.json\n\n    # Build from a text list and compute features\n    pkgraph build names.txt --name seed --features\n\n    # Emit machine-readable output\n    pkgraph build data/top_200_2d.json --json"
    )]
    Build(cmd::build::BuildArgs),

    #[command(
        next_help_heading = "Graph",
        about = "Merge two graphs",
        long_about = "Fold a secondary graph into a primary one. Primary attributes win for shared packages; secondary packages are marked recent.",
        after_help = "EXAMPLES:\n    # Merge recent uploads into the top packages graph\n    pkgraph merge data/graph/top_200_2d.pkgr data/graph/recent_50.pkgr\n\n    # Name the result and compute features\n    pkgraph merge a.pkgr b.pkgr --name combined --features"
    )]
    Merge(cmd::merge::MergeArgs),

    #[command(
        next_help_heading = "Graph",
        about = "Compute node features",
        long_about = "Compute communities, inter/intra community ratio, clustering and centrality features and store them on every node.",
        after_help = "EXAMPLES:\n    # Annotate in place\n    pkgraph features data/graph/top_200_2d.pkgr\n\n    # Skip the slow passes\n    pkgraph features g.pkgr --skip betweenness --skip closeness"
    )]
    Features(cmd::features::FeaturesArgs),

    #[command(
        next_help_heading = "Read",
        about = "Export CSV files",
        long_about = "Write the edge list and node table of a saved graph as CSV.",
        after_help = "EXAMPLES:\n    # Write both files next to the graph\n    pkgraph export data/graph/top_200_2d.pkgr\n\n    # Edge list to stdout\n    pkgraph export g.pkgr --edges -"
    )]
    Export(cmd::export::ExportArgs),

    #[command(
        next_help_heading = "Read",
        about = "Summarize a graph",
        long_about = "Print structural statistics for a saved graph, or one package's attributes and edges.",
        after_help = "EXAMPLES:\n    # Graph statistics\n    pkgraph summary data/graph/top_200_2d.pkgr\n\n    # One package\n    pkgraph summary g.pkgr --package requests --json"
    )]
    Summary(cmd::summary::SummaryArgs),

    #[command(
        next_help_heading = "Ingest",
        about = "List packages with missing metadata",
        long_about = "Scan the package store for records without rank, stars, forks or licenses and write their names.",
        after_help = "EXAMPLES:\n    # Write data/missing_package_names.json\n    pkgraph missing\n\n    # Choose the output file\n    pkgraph missing --output todo.json"
    )]
    Missing(cmd::missing::MissingArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completions",
        long_about = "Generate a shell completion script for pkgraph.",
        after_help = "EXAMPLES:\n    # Bash\n    pkgraph completions bash > /etc/bash_completion.d/pkgraph"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

impl Commands {
    const fn timing_name(&self) -> &'static str {
        match self {
            Self::Normalize(_) => "cmd.normalize",
            Self::Build(_) => "cmd.build",
            Self::Merge(_) => "cmd.merge",
            Self::Features(_) => "cmd.features",
            Self::Export(_) => "cmd.export",
            Self::Summary(_) => "cmd.summary",
            Self::Missing(_) => "cmd.missing",
            Self::Completions(_) => "cmd.completions",
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PKGRAPH_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "pkgraph=debug,info"
        } else {
            "pkgraph=info,warn"
        })
    });

    let format = env::var("PKGRAPH_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry.with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr)).init();
        }
        _ => {
            registry.with(fmt::layer().compact().with_writer(std::io::stderr)).init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut timings = if cli.timing {
        StageTimings::new(true)
    } else {
        StageTimings::from_env()
    };

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = env::current_dir()?;
    let output = cli.output_mode();
    let (config, source) = resolve_config(cli.config.as_deref(), &project_root)?;
    debug!(source = ?source.path(), "configuration resolved");

    let started = Instant::now();
    let command_result = match &cli.command {
        Commands::Normalize(args) => cmd::normalize::run_normalize(args, &config, output, &mut timings),
        Commands::Build(args) => cmd::build::run_build(args, &config, output, &mut timings),
        Commands::Merge(args) => cmd::merge::run_merge(args, &config, output, &mut timings),
        Commands::Features(args) => cmd::features::run_features(args, &config, output, &mut timings),
        Commands::Export(args) => cmd::export::run_export(args, output, &mut timings),
        Commands::Summary(args) => cmd::summary::run_summary(args, output, &mut timings),
        Commands::Missing(args) => cmd::missing::run_missing(args, &config, output, &mut timings),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    };
    timings.record(cli.command.timing_name(), started.elapsed());

    if timings.is_enabled() {
        let report = timings.report();
        if report.is_empty() {
            eprintln!("timing report: no samples recorded");
        } else {
            eprintln!("timing report:");
            eprintln!("{}", report.display_table());
            eprintln!("timing report (json):");
            eprintln!("{}", serde_json::to_string_pretty(&report.to_json())?);
        }
    }

    command_result
}
