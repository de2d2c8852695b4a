//! Graph construction from package records.
//!
//! # Overview
//!
//! [`GraphBuilder::build`] turns the requested package set into a
//! [`DependencyGraph`]:
//!
//! 1. Every requested record becomes a `core` node with full attributes.
//! 2. Every declared dependency becomes an edge `package → dependency`. The
//!    dependency's node is filled from the requested set if present, else from
//!    the [`MetadataStore`], else left empty. Its `core` flag is true only if
//!    it is itself a requested package.
//! 3. Nodes whose repository URL is shared by more than one core package are
//!    flagged `is_copycat`.
//! 4. The number of core packages is recorded on the graph.
//!
//! ## Edge Direction
//!
//! An edge `A → B` means "A depends on B". Runtime dependencies carry
//! [`DependencyEdge::runtime`]; optional ones carry the extra they belong to.
//!
//! ## Failure tolerance
//!
//! Nothing here fails. Blank dependency names are skipped, and a dependency
//! whose metadata cannot be found gets an empty record (`missing_metadata`).

#![allow(clippy::module_name_repetitions)]

use std::collections::{BTreeMap, HashMap};

use tracing::{info, instrument, trace, warn};

use super::{DependencyEdge, DependencyGraph, PackageNode};
use crate::model::{PackageRecord, canonical_name};
use crate::store::MetadataStore;

/// Builds [`DependencyGraph`]s, resolving unknown dependencies through a
/// metadata store.
#[derive(Debug, Clone, Copy)]
pub struct GraphBuilder<'s, S: MetadataStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: MetadataStore + ?Sized> GraphBuilder<'s, S> {
    #[must_use]
    pub const fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Build a graph from the requested records, keyed by canonical name.
    ///
    /// Records are visited in key order, so the result does not depend on how
    /// the caller assembled the map.
    #[instrument(skip_all, fields(records = records.len()))]
    pub fn build(&self, records: &BTreeMap<String, PackageRecord>) -> DependencyGraph {
        let mut graph = DependencyGraph::new();

        // Step 1: core nodes, tallying repository URLs among them.
        let mut repo_tally: HashMap<String, usize> = HashMap::new();
        for (name, record) in records {
            let node = PackageNode::from_record(name, record, true);
            if node.has_known_repository() {
                *repo_tally.entry(node.repository_url.clone()).or_default() += 1;
            }
            graph.upsert_node(node);
        }

        // Step 2: dependency nodes and edges.
        let mut lookups: HashMap<String, PackageRecord> = HashMap::new();
        for (name, record) in records {
            let Some(source) = graph.node_index(name) else {
                continue;
            };

            for (target, edge) in declared_dependencies(record) {
                let node = self.resolve(&target, records, &mut lookups);
                let target_idx = graph.upsert_node(node);
                trace!(source = %name, target = %target, kind = %edge.kind, "dependency edge");
                graph.upsert_edge(source, target_idx, edge);
            }
        }

        // Step 3: duplicate-repository heuristic.
        let mut copycats = 0usize;
        for node in graph.graph.node_weights_mut() {
            node.is_copycat = node.has_known_repository()
                && repo_tally
                    .get(&node.repository_url)
                    .is_some_and(|&count| count > 1);
            copycats += usize::from(node.is_copycat);
        }

        // Step 4: graph-level core count.
        graph.num_core_packages = records.len();

        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            core = graph.num_core_packages,
            copycats,
            store_lookups = lookups.len(),
            "dependency graph built"
        );
        graph
    }

    /// Node attributes for a dependency: requested set, then store, then empty.
    fn resolve(
        &self,
        name: &str,
        records: &BTreeMap<String, PackageRecord>,
        lookups: &mut HashMap<String, PackageRecord>,
    ) -> PackageNode {
        if let Some(record) = records.get(name) {
            return PackageNode::from_record(name, record, true);
        }

        let record = lookups.entry(name.to_string()).or_insert_with(|| {
            self.store.get(name).unwrap_or_else(|| {
                warn!(package = name, "no metadata for dependency, using empty record");
                PackageRecord::empty(name)
            })
        });
        PackageNode::from_record(name, record, false)
    }
}

/// Build a graph from records in any order, without store lookups.
#[must_use]
pub fn build_graph(records: impl IntoIterator<Item = PackageRecord>) -> DependencyGraph {
    let indexed = crate::model::index_records(records);
    GraphBuilder::new(&crate::store::EmptyStore).build(&indexed)
}

/// `(target, edge)` pairs for every dependency a record declares, runtime
/// first, then optional. Blank names are dropped.
fn declared_dependencies(record: &PackageRecord) -> Vec<(String, DependencyEdge)> {
    let runtime = record
        .runtime_dependencies
        .iter()
        .map(|name| (canonical_name(name), DependencyEdge::runtime()));

    let optional = record
        .optional_entries()
        .map(|(extra, name)| (canonical_name(name), DependencyEdge::extra(extra)));

    runtime
        .chain(optional)
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DependencyKind;
    use crate::model::{UNKNOWN, index_records};

    fn record(name: &str, runtime: &[&str], optional: &[&str]) -> PackageRecord {
        PackageRecord {
            runtime_dependencies: runtime.iter().map(ToString::to_string).collect(),
            optional_dependencies: optional.iter().map(ToString::to_string).collect(),
            ..PackageRecord::empty(name)
        }
    }

    fn with_repo(mut rec: PackageRecord, url: &str) -> PackageRecord {
        rec.repository_url = Some(url.to_string());
        rec
    }

    #[test]
    fn empty_input_produces_empty_graph() {
        let graph = build_graph(Vec::new());
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.num_core_packages, 0);
    }

    #[test]
    fn runtime_and_optional_edges() {
        let graph = build_graph(vec![record(
            "flask",
            &["werkzeug"],
            &["async:asgiref", "unspecified:dotenv"],
        )]);

        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.edge("flask", "werkzeug"), Some(&DependencyEdge::runtime()));
        let asgiref = graph.edge("flask", "asgiref").expect("asgiref edge");
        assert_eq!(asgiref.kind, DependencyKind::Extra("async".into()));
        assert!(asgiref.optional);
        assert_eq!(
            graph.edge("flask", "dotenv"),
            Some(&DependencyEdge::extra("unspecified"))
        );
    }

    #[test]
    fn core_flag_tracks_requested_set() {
        let graph = build_graph(vec![
            record("a", &["b", "c"], &[]),
            record("b", &[], &[]),
        ]);
        assert!(graph.node("a").expect("a").core);
        assert!(graph.node("b").expect("b").core);
        assert!(!graph.node("c").expect("c").core);
        assert_eq!(graph.num_core_packages, 2);
    }

    #[test]
    fn self_dependency_is_a_self_loop() {
        let graph = build_graph(vec![record("ouroboros", &["ouroboros"], &[])]);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(
            graph.edge("ouroboros", "ouroboros"),
            Some(&DependencyEdge::runtime())
        );
    }

    #[test]
    fn blank_dependency_names_are_ignored() {
        let graph = build_graph(vec![record("a", &["  ", ""], &["test: ", "dev:"])]);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn duplicate_declaration_latest_wins() {
        // Declared both as runtime and as an extra: the optional pass runs last.
        let graph = build_graph(vec![record("a", &["b"], &["test:b"])]);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edge("a", "b"), Some(&DependencyEdge::extra("test")));
    }

    #[test]
    fn dependency_names_are_canonicalized() {
        let graph = build_graph(vec![record("a", &[" B "], &["dev: C"])]);
        assert!(graph.contains_edge("a", "b"));
        assert!(graph.contains_edge("a", "c"));
    }

    #[test]
    fn store_fills_dependency_metadata() {
        let mut store = BTreeMap::new();
        store.insert(
            "requests".to_string(),
            PackageRecord {
                stars: Some(50_000),
                ..PackageRecord::empty("requests")
            },
        );

        let requested = index_records(vec![record("httpie", &["requests", "ghost"], &[])]);
        let graph = GraphBuilder::new(&store).build(&requested);

        let requests = graph.node("requests").expect("requests");
        assert_eq!(requests.stars, 50_000);
        assert!(!requests.core);

        let ghost = graph.node("ghost").expect("ghost");
        assert!(ghost.missing_metadata);
        assert_eq!(ghost.license, UNKNOWN);
    }

    #[test]
    fn missing_metadata_flag() {
        let full = PackageRecord {
            rank: Some(10),
            stars: Some(1),
            forks: Some(2),
            normalized_licenses: Some(vec!["MIT".into()]),
            ..PackageRecord::empty("full")
        };
        let partial = PackageRecord {
            rank: Some(10),
            stars: Some(1),
            ..PackageRecord::empty("partial")
        };
        let graph = build_graph(vec![full, partial]);
        assert!(!graph.node("full").expect("full").missing_metadata);
        assert!(graph.node("partial").expect("partial").missing_metadata);
    }

    #[test]
    fn copycat_detection_counts_core_repositories() {
        let graph = build_graph(vec![
            with_repo(record("a", &[], &[]), "https://github.com/x/y"),
            with_repo(record("b", &[], &[]), "https://github.com/x/y"),
            with_repo(record("c", &[], &[]), "https://github.com/x/z"),
        ]);
        assert!(graph.node("a").expect("a").is_copycat);
        assert!(graph.node("b").expect("b").is_copycat);
        assert!(!graph.node("c").expect("c").is_copycat);
    }

    #[test]
    fn copycat_ignores_unknown_and_dependency_only_collisions() {
        let mut store = BTreeMap::new();
        store.insert(
            "dep".to_string(),
            with_repo(PackageRecord::empty("dep"), "https://github.com/x/solo"),
        );
        let requested = index_records(vec![
            with_repo(record("a", &["dep"], &[]), "https://github.com/x/solo"),
            record("b", &[], &[]),
            record("c", &[], &[]),
        ]);
        let graph = GraphBuilder::new(&store).build(&requested);

        // Only one core package uses the URL; the dependency does not count.
        assert!(!graph.node("a").expect("a").is_copycat);
        assert!(!graph.node("dep").expect("dep").is_copycat);
        // Unknown repositories never collide.
        assert!(!graph.node("b").expect("b").is_copycat);
        assert!(!graph.node("c").expect("c").is_copycat);
    }

    #[test]
    fn dependency_sharing_core_repository_is_flagged() {
        let mut store = BTreeMap::new();
        store.insert(
            "fork".to_string(),
            with_repo(PackageRecord::empty("fork"), "https://github.com/x/y"),
        );
        let requested = index_records(vec![
            with_repo(record("a", &["fork"], &[]), "https://github.com/x/y"),
            with_repo(record("b", &[], &[]), "https://github.com/x/y"),
        ]);
        let graph = GraphBuilder::new(&store).build(&requested);
        assert!(graph.node("fork").expect("fork").is_copycat);
    }

    #[test]
    fn store_is_consulted_once_per_name() {
        use std::cell::Cell;

        struct CountingStore(Cell<usize>);
        impl MetadataStore for CountingStore {
            fn get(&self, _name: &str) -> Option<PackageRecord> {
                self.0.set(self.0.get() + 1);
                None
            }
        }

        let store = CountingStore(Cell::new(0));
        let requested = index_records(vec![
            record("a", &["shared"], &[]),
            record("b", &["shared"], &["test:shared"]),
        ]);
        let graph = GraphBuilder::new(&store).build(&requested);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(store.0.get(), 1);
    }

    #[test]
    fn rebuilding_is_deterministic() {
        let records = vec![
            record("a", &["b", "x"], &["dev:y"]),
            record("b", &["a"], &[]),
        ];
        let mut reversed = records.clone();
        reversed.reverse();

        let first = build_graph(records);
        let second = build_graph(reversed);
        assert_eq!(first, second);
        assert_eq!(first.content_hash(), second.content_hash());
    }
}
