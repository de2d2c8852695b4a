#![forbid(unsafe_code)]
//! pkgraph-core library.
//!
//! Builds a directed dependency graph of packages from per-package metadata
//! records and annotates it with structural features.
//!
//! ## Pipeline
//!
//! ```text
//! RawMetadata (registry JSON)
//!        ↓  normalize::normalize()
//! PackageRecord
//!        ↓  graph::build::GraphBuilder::build()
//! DependencyGraph ──┐
//!        ↓          ↓ graph::merge::merge()   (optional)
//! DependencyGraph
//!        ↓  features::add_features()
//! DependencyGraph with feature attributes
//!        ↓  graph::persist::{save_binary, save_edge_list, save_node_table}
//! ```
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums for library failures, `anyhow::Result`
//!   at file and configuration boundaries.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`, `trace!`).

pub mod config;
pub mod features;
pub mod graph;
pub mod model;
pub mod names;
pub mod normalize;
pub mod store;
pub mod timing;

pub use graph::{AttrValue, DependencyEdge, DependencyGraph, DependencyKind, PackageNode};
pub use model::{PackageRecord, RawDependency, RawMetadata};
pub use store::{EmptyStore, JsonDirStore, MetadataStore};
