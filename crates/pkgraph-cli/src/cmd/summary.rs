//! `pkgraph summary`: structural statistics, or one package's neighborhood.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use pkgraph_core::graph::GraphSummary;
use pkgraph_core::model::canonical_name;
use pkgraph_core::timing::StageTimings;
use pkgraph_core::{AttrValue, PackageNode};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::cmd::load_graph;
use crate::output::{CliError, OutputMode, pretty_kv, pretty_section, render_error, render_mode};

/// Arguments for `pkgraph summary`.
#[derive(Args, Debug)]
pub struct SummaryArgs {
    /// Graph file (`.pkgr`).
    #[arg(value_name = "GRAPH")]
    pub graph: PathBuf,

    /// Show one package's attributes and edges instead.
    #[arg(long, value_name = "NAME")]
    pub package: Option<String>,
}

#[derive(Debug, Serialize)]
struct GraphOverview {
    graph: PathBuf,
    #[serde(flatten)]
    summary: GraphSummary,
}

#[derive(Debug, Serialize)]
struct PackageDetail<'g> {
    name: &'g str,
    core: bool,
    rank: i64,
    stars: u64,
    forks: u64,
    license: &'g str,
    repository_url: &'g str,
    missing_metadata: bool,
    is_copycat: bool,
    is_recent: Option<bool>,
    features: BTreeMap<&'g str, JsonValue>,
    dependencies: Vec<&'g str>,
    dependents: Vec<&'g str>,
}

/// Execute `pkgraph summary`.
pub fn run_summary(args: &SummaryArgs, output: OutputMode, timings: &mut StageTimings) -> Result<()> {
    let graph = load_graph(&args.graph, output, timings)?;

    let Some(package) = &args.package else {
        let overview = GraphOverview {
            graph: args.graph.clone(),
            summary: timings.timed("summary.compute", || GraphSummary::from_graph(&graph)),
        };
        return render_mode(
            output,
            &overview,
            |o, w| write_summary_text(w, &o.summary),
            |o, w| write_summary_pretty(w, &o.graph.display().to_string(), &o.summary),
        );
    };

    let key = canonical_name(package);
    let Some(node) = graph.node(&key) else {
        render_error(
            output,
            &CliError::with_details(
                format!("package '{key}' is not in {}", args.graph.display()),
                "names are matched after lowercasing and trimming",
                "package_not_found",
            ),
        )?;
        anyhow::bail!("package '{key}' not found");
    };

    let detail = PackageDetail {
        dependencies: graph.dependencies_of(&key),
        dependents: graph.dependents_of(&key),
        ..PackageDetail::from_node(node)
    };
    render_mode(output, &detail, write_detail_text, write_detail_pretty)
}

impl<'g> PackageDetail<'g> {
    fn from_node(node: &'g PackageNode) -> Self {
        Self {
            name: &node.name,
            core: node.core,
            rank: node.rank,
            stars: node.stars,
            forks: node.forks,
            license: &node.license,
            repository_url: &node.repository_url,
            missing_metadata: node.missing_metadata,
            is_copycat: node.is_copycat,
            is_recent: node.is_recent,
            features: node
                .features
                .iter()
                .map(|(key, value)| (key.as_str(), attr_json(value)))
                .collect(),
            dependencies: Vec::new(),
            dependents: Vec::new(),
        }
    }
}

fn attr_json(value: &AttrValue) -> JsonValue {
    match value {
        AttrValue::Null => JsonValue::Null,
        AttrValue::Bool(v) => JsonValue::Bool(*v),
        AttrValue::Int(v) => JsonValue::from(*v),
        AttrValue::Float(v) => JsonValue::from(*v),
        AttrValue::Text(v) => JsonValue::String(v.clone()),
    }
}

/// `key=value` lines for a [`GraphSummary`].
pub fn write_summary_text(w: &mut dyn Write, s: &GraphSummary) -> io::Result<()> {
    writeln!(w, "nodes={}", s.node_count)?;
    writeln!(w, "edges={}", s.edge_count)?;
    writeln!(w, "core={}", s.core_count)?;
    writeln!(w, "num_core_packages={}", s.num_core_packages)?;
    writeln!(w, "copycats={}", s.copycat_count)?;
    writeln!(w, "missing_metadata={}", s.missing_metadata_count)?;
    writeln!(w, "recent={}", s.recent_count)?;
    writeln!(w, "density={:.6}", s.density)?;
    writeln!(w, "components={}", s.weakly_connected_component_count)?;
    writeln!(w, "isolated={}", s.isolated_node_count)?;
    writeln!(w, "self_loops={}", s.self_loop_count)?;
    writeln!(w, "optional_edges={}", s.optional_edge_count)?;
    writeln!(w, "max_in_degree={}", s.max_in_degree)?;
    writeln!(w, "max_out_degree={}", s.max_out_degree)?;
    writeln!(w, "content_hash={}", s.content_hash)
}

/// Sectioned view of a [`GraphSummary`].
pub fn write_summary_pretty(w: &mut dyn Write, heading: &str, s: &GraphSummary) -> io::Result<()> {
    pretty_section(w, heading)?;
    pretty_kv(w, "Nodes", format!("{} ({} core)", s.node_count, s.core_count))?;
    pretty_kv(w, "Edges", format!("{} ({} optional)", s.edge_count, s.optional_edge_count))?;
    pretty_kv(w, "Core packages", s.num_core_packages.to_string())?;
    pretty_kv(w, "Copycats", s.copycat_count.to_string())?;
    pretty_kv(w, "Missing metadata", s.missing_metadata_count.to_string())?;
    if s.recent_count > 0 {
        pretty_kv(w, "Recent", s.recent_count.to_string())?;
    }
    pretty_kv(w, "Density", format!("{:.6}", s.density))?;
    pretty_kv(w, "Components", s.weakly_connected_component_count.to_string())?;
    pretty_kv(w, "Isolated", s.isolated_node_count.to_string())?;
    pretty_kv(w, "Self-loops", s.self_loop_count.to_string())?;
    pretty_kv(w, "Max in/out", format!("{}/{}", s.max_in_degree, s.max_out_degree))?;
    pretty_kv(w, "Content hash", &s.content_hash)
}

fn write_detail_text(d: &PackageDetail<'_>, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "name={}", d.name)?;
    writeln!(w, "core={}", d.core)?;
    writeln!(w, "rank={}", d.rank)?;
    writeln!(w, "stars={}", d.stars)?;
    writeln!(w, "forks={}", d.forks)?;
    writeln!(w, "license={}", d.license)?;
    writeln!(w, "repository_url={}", d.repository_url)?;
    writeln!(w, "missing_metadata={}", d.missing_metadata)?;
    writeln!(w, "is_copycat={}", d.is_copycat)?;
    for (key, value) in &d.features {
        writeln!(w, "{key}={value}")?;
    }
    writeln!(w, "dependencies={}", d.dependencies.join(","))?;
    writeln!(w, "dependents={}", d.dependents.join(","))
}

fn write_detail_pretty(d: &PackageDetail<'_>, w: &mut dyn Write) -> io::Result<()> {
    let role = if d.core { "core" } else { "dependency only" };
    pretty_section(w, &format!("{} ({role})", d.name))?;
    pretty_kv(w, "Rank", d.rank.to_string())?;
    pretty_kv(w, "Stars/forks", format!("{}/{}", d.stars, d.forks))?;
    pretty_kv(w, "License", d.license)?;
    pretty_kv(w, "Repository", d.repository_url)?;
    if d.missing_metadata {
        pretty_kv(w, "Metadata", "missing")?;
    }
    if d.is_copycat {
        pretty_kv(w, "Copycat", "yes")?;
    }
    for (key, value) in &d.features {
        pretty_kv(w, key, value.to_string())?;
    }
    pretty_kv(w, "Depends on", d.dependencies.join(", "))?;
    pretty_kv(w, "Used by", d.dependents.join(", "))
}
