//! E2E tests for the pipeline commands:
//! `pkgraph normalize`, `build`, `merge`, `features`, `export`, `summary`,
//! `missing`.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test harness helpers
// ---------------------------------------------------------------------------

fn pkgraph(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("pkgraph"));
    cmd.current_dir(dir);
    cmd.env("PKGRAPH_LOG", "error");
    cmd.env_remove("PKGRAPH_FORMAT");
    cmd.env_remove("PKGRAPH_TIMING");
    cmd
}

fn write_json(path: &Path, value: &Value) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
}

/// Raw registry documents for a small ecosystem:
/// `web` needs `http` and optionally `pytest` for tests; `http` needs `idna`;
/// `idna` has no metadata beyond its name.
fn seed_raw(dir: &Path) {
    let raw = dir.join("raw");
    write_json(
        &raw.join("web.json"),
        &json!({
            "name": "Web",
            "rank": 12, "stars": 500, "forks": 40,
            "licenses": ["MIT"], "normalized_licenses": ["MIT"],
            "repository_url": "https://github.com/acme/web",
            "keywords": ["http", "framework"],
            "dependencies": [
                {"name": "http", "kind": "runtime", "optional": false},
                {"name": "pytest", "kind": "extra == \"test\"", "optional": true}
            ]
        }),
    );
    write_json(
        &raw.join("http.json"),
        &json!({
            "name": "http",
            "rank": 9, "stars": 80, "forks": 3,
            "licenses": "Apache-2.0", "normalized_licenses": ["Apache-2.0"],
            "repository_url": "https://github.com/acme/web",
            "dependencies": [{"name": "idna", "kind": "runtime", "optional": false}]
        }),
    );
    write_json(&raw.join("idna.json"), &json!({"name": "idna"}));
    fs::write(raw.join("broken.json"), "{ not json").unwrap();
}

fn normalize(dir: &Path) {
    pkgraph(dir).args(["normalize", "raw"]).assert().success();
}

fn build(dir: &Path, names_file: &str, packages: &Value, extra: &[&str]) -> Value {
    write_json(&dir.join(names_file), packages);
    let output = pkgraph(dir)
        .args(["build", names_file, "--json"])
        .args(extra)
        .output()
        .expect("build should not crash");
    assert!(
        output.status.success(),
        "build failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid JSON from build")
}

// ---------------------------------------------------------------------------
// normalize / missing
// ---------------------------------------------------------------------------

#[test]
fn normalize_writes_canonical_records_and_skips_broken_files() {
    let dir = TempDir::new().unwrap();
    seed_raw(dir.path());

    let output = pkgraph(dir.path())
        .args(["normalize", "raw", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["written"], 3);
    assert_eq!(report["missing_metadata"], 1);

    let store = dir.path().join("data/raw/packages");
    let web: Value = serde_json::from_slice(&fs::read(store.join("web.json")).unwrap()).unwrap();
    assert_eq!(web["name"], "web");
    assert!(store.join("idna.json").exists());
    assert!(!store.join("broken.json").exists());
}

#[test]
fn missing_lists_incomplete_records() {
    let dir = TempDir::new().unwrap();
    seed_raw(dir.path());
    normalize(dir.path());

    pkgraph(dir.path())
        .args(["missing", "--format", "text"])
        .assert()
        .success()
        .stdout("idna\n");

    let written: Value = serde_json::from_slice(
        &fs::read(dir.path().join("data/missing_package_names.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(written, json!({"packages": ["idna"]}));
}

// ---------------------------------------------------------------------------
// build / summary
// ---------------------------------------------------------------------------

#[test]
fn build_names_artifacts_after_the_name_set() {
    let dir = TempDir::new().unwrap();
    seed_raw(dir.path());
    normalize(dir.path());

    let report = build(
        dir.path(),
        "top.json",
        &json!({"mode": "top", "num_packages": 2, "days": 2, "packages": ["web", "http"]}),
        &[],
    );
    assert_eq!(report["name"], "top_2_2d");
    assert_eq!(report["requested"], 2);
    assert_eq!(report["loaded"], 2);

    let summary = &report["summary"];
    // web, http, pytest, idna
    assert_eq!(summary["node_count"], 4);
    assert_eq!(summary["edge_count"], 3);
    assert_eq!(summary["core_count"], 2);
    assert_eq!(summary["num_core_packages"], 2);
    assert_eq!(summary["copycat_count"], 2);
    assert_eq!(summary["optional_edge_count"], 1);

    let graph_dir = dir.path().join("data/graph");
    assert!(graph_dir.join("top_2_2d.pkgr").exists());
    let edges = fs::read_to_string(graph_dir.join("top_2_2d_edges.csv")).unwrap();
    assert_eq!(
        edges,
        "source,target,kind,optional\n\
         http,idna,runtime,false\n\
         web,http,runtime,false\n\
         web,pytest,test,true\n"
    );
    assert!(!graph_dir.join("top_2_2d_nodes.csv").exists());
}

#[test]
fn summary_reports_a_single_package() {
    let dir = TempDir::new().unwrap();
    seed_raw(dir.path());
    normalize(dir.path());
    build(dir.path(), "names.json", &json!({"packages": ["web", "http"]}), &["--name", "g"]);

    let output = pkgraph(dir.path())
        .args(["summary", "data/graph/g.pkgr", "--package", "HTTP", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let detail: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(detail["name"], "http");
    assert_eq!(detail["core"], true);
    assert_eq!(detail["license"], "Apache-2.0");
    assert_eq!(detail["dependencies"], json!(["idna"]));
    assert_eq!(detail["dependents"], json!(["web"]));
}

#[test]
fn summary_of_missing_graph_fails_with_suggestion() {
    let dir = TempDir::new().unwrap();
    pkgraph(dir.path())
        .args(["summary", "nope.pkgr", "--format", "text"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("graph file not found"))
        .stderr(predicate::str::contains("pkgraph build"));
}

#[test]
fn unknown_package_is_reported() {
    let dir = TempDir::new().unwrap();
    seed_raw(dir.path());
    normalize(dir.path());
    build(dir.path(), "names.json", &json!({"packages": ["web"]}), &["--name", "g"]);

    pkgraph(dir.path())
        .args(["summary", "data/graph/g.pkgr", "--package", "flask", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("package_not_found"));
}

// ---------------------------------------------------------------------------
// features / export / merge
// ---------------------------------------------------------------------------

#[test]
fn features_annotate_in_place() {
    let dir = TempDir::new().unwrap();
    seed_raw(dir.path());
    normalize(dir.path());
    build(dir.path(), "names.json", &json!({"packages": ["web", "http"]}), &["--name", "g"]);

    let output = pkgraph(dir.path())
        .args(["features", "data/graph/g.pkgr", "--skip", "closeness", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["nodes"], 4);
    let features: Vec<&str> = report["features"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(features.contains(&"community"));
    assert!(features.contains(&"betweenness_centrality"));
    assert!(!features.contains(&"closeness_centrality"));

    let output = pkgraph(dir.path())
        .args(["summary", "data/graph/g.pkgr", "--package", "web", "--json"])
        .output()
        .unwrap();
    let detail: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(detail["features"]["degree_centrality"].is_number());
}

#[test]
fn export_edges_to_stdout() {
    let dir = TempDir::new().unwrap();
    seed_raw(dir.path());
    normalize(dir.path());
    build(dir.path(), "names.json", &json!({"packages": ["http"]}), &["--name", "g"]);

    pkgraph(dir.path())
        .args(["export", "data/graph/g.pkgr", "--edges", "-"])
        .assert()
        .success()
        .stdout("source,target,kind,optional\nhttp,idna,runtime,false\n");
}

#[test]
fn export_defaults_write_both_files() {
    let dir = TempDir::new().unwrap();
    seed_raw(dir.path());
    normalize(dir.path());
    build(dir.path(), "names.json", &json!({"packages": ["web"]}), &["--name", "g"]);

    pkgraph(dir.path()).args(["export", "data/graph/g.pkgr"]).assert().success();

    let nodes = fs::read_to_string(dir.path().join("data/graph/g_nodes.csv")).unwrap();
    assert!(nodes.starts_with("name,core,is_copycat,is_recent,missing_metadata,rank"));
    assert!(nodes.contains("\nweb,true,"));
}

#[test]
fn merge_marks_secondary_packages_recent() {
    let dir = TempDir::new().unwrap();
    seed_raw(dir.path());
    normalize(dir.path());
    build(dir.path(), "top.json", &json!({"packages": ["web"]}), &["--name", "top"]);
    build(dir.path(), "recent.json", &json!({"packages": ["http"]}), &["--name", "recent"]);

    let output = pkgraph(dir.path())
        .args(["merge", "data/graph/top.pkgr", "data/graph/recent.pkgr", "--json"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "merge failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["name"], "merged");
    // web, http, pytest, idna; http and idna come from the recent graph
    assert_eq!(report["summary"]["node_count"], 4);
    assert_eq!(report["summary"]["recent_count"], 2);
    assert_eq!(report["summary"]["num_core_packages"], 2);
    assert!(dir.path().join("data/graph/merged.pkgr").exists());
}

// ---------------------------------------------------------------------------
// config / timing
// ---------------------------------------------------------------------------

#[test]
fn project_config_redirects_output() {
    let dir = TempDir::new().unwrap();
    seed_raw(dir.path());
    normalize(dir.path());
    fs::write(
        dir.path().join("pkgraph.toml"),
        "[output]\ndir = \"out\"\nwrite_edge_list = false\nwrite_node_table = true\n",
    )
    .unwrap();

    build(dir.path(), "names.json", &json!({"packages": ["web"]}), &["--name", "g"]);
    assert!(dir.path().join("out/g.pkgr").exists());
    assert!(dir.path().join("out/g_nodes.csv").exists());
    assert!(!dir.path().join("out/g_edges.csv").exists());
}

#[test]
fn timing_report_goes_to_stderr() {
    let dir = TempDir::new().unwrap();
    seed_raw(dir.path());
    normalize(dir.path());

    write_json(&dir.path().join("names.json"), &json!({"packages": ["web"]}));
    pkgraph(dir.path())
        .args(["--timing", "build", "names.json", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("name=custom_1"))
        .stderr(predicate::str::contains("cmd.build"))
        .stderr(predicate::str::contains("build.graph"));
}

#[test]
fn completions_are_generated() {
    let dir = TempDir::new().unwrap();
    pkgraph(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pkgraph"));
}
