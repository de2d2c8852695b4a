//! Package metadata records.
//!
//! [`RawMetadata`] mirrors what the dependency-metadata service returns for a
//! single package. [`crate::normalize::normalize`] turns it into the canonical
//! [`PackageRecord`] consumed by the graph builder.
//!
//! Every quality field on [`PackageRecord`] is an `Option`: `None` means the
//! registry did not report a value, which is distinct from a reported zero.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder used for license and repository URL when nothing is known.
pub const UNKNOWN: &str = "Unknown";

/// Extra group assigned to optional dependencies without an `extra == ".."`
/// marker.
pub const UNSPECIFIED_EXTRA: &str = "unspecified";

/// Canonicalize a package name: trimmed and lower-cased.
///
/// This is the join key across every stage of the pipeline.
#[must_use]
pub fn canonical_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// Raw registry metadata
// ---------------------------------------------------------------------------

/// One entry of a raw dependency list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDependency {
    #[serde(default)]
    pub name: Option<String>,
    /// `"runtime"`, `extra == "<name>"`, or anything else the registry reports.
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub optional: Option<bool>,
}

impl RawDependency {
    /// Convenience constructor used by the requirement parser and tests.
    #[must_use]
    pub fn new(name: &str, kind: &str, optional: bool) -> Self {
        Self {
            name: Some(name.to_string()),
            kind: Some(kind.to_string()),
            optional: Some(optional),
        }
    }
}

/// A package document as fetched from the registry, before normalization.
///
/// Unknown keys are ignored; `versions` is accepted only so that it can be
/// dropped. Files that were already normalized carry `runtime_dependencies`
/// and `optional_dependencies` instead of `dependencies`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rank: Option<i64>,
    #[serde(default)]
    pub stars: Option<u64>,
    #[serde(default)]
    pub forks: Option<u64>,
    /// A list of license names, a single string, or something unusable.
    #[serde(default)]
    pub licenses: Option<serde_json::Value>,
    #[serde(default)]
    pub normalized_licenses: Option<Vec<String>>,
    /// RFC 3339 timestamp; parsed leniently during normalization.
    #[serde(default)]
    pub latest_release_published_at: Option<String>,
    #[serde(default)]
    pub repository_url: Option<String>,
    #[serde(default)]
    pub funding_urls: Option<Vec<String>>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    /// Present on documents written back by [`crate::store::JsonDirStore`].
    #[serde(default)]
    pub has_funding: Option<bool>,
    #[serde(default)]
    pub keyword_count: Option<u64>,
    #[serde(default)]
    pub dependencies: Vec<RawDependency>,
    /// PyPI `requires_dist` strings, used when `dependencies` is empty.
    #[serde(default)]
    pub requires_dist: Vec<String>,
    #[serde(default)]
    pub versions: Option<serde_json::Value>,
    #[serde(default)]
    pub runtime_dependencies: Option<Vec<String>>,
    #[serde(default)]
    pub optional_dependencies: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// PackageRecord
// ---------------------------------------------------------------------------

/// Canonical per-package record: the input to the graph builder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    #[serde(default)]
    pub rank: Option<i64>,
    #[serde(default)]
    pub stars: Option<u64>,
    #[serde(default)]
    pub forks: Option<u64>,
    /// Normalized license string (joined, truncated).
    #[serde(default)]
    pub licenses: Option<String>,
    #[serde(default)]
    pub normalized_licenses: Option<Vec<String>>,
    #[serde(default)]
    pub latest_release_published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub repository_url: Option<String>,
    #[serde(default)]
    pub has_funding: Option<bool>,
    #[serde(default)]
    pub keyword_count: Option<u64>,
    /// Lower-cased names required unconditionally at run time.
    #[serde(default)]
    pub runtime_dependencies: BTreeSet<String>,
    /// `"<extra>:<name>"` entries.
    #[serde(default)]
    pub optional_dependencies: BTreeSet<String>,
}

impl PackageRecord {
    /// A record with only a name: every quality field missing, no dependencies.
    #[must_use]
    pub fn empty(name: &str) -> Self {
        Self {
            name: canonical_name(name),
            ..Self::default()
        }
    }

    /// True if any of rank, stars, forks or normalized licenses is absent.
    #[must_use]
    pub const fn has_missing_metadata(&self) -> bool {
        self.rank.is_none()
            || self.stars.is_none()
            || self.forks.is_none()
            || self.normalized_licenses.is_none()
    }

    /// Split optional dependency entries into `(extra, name)` pairs.
    ///
    /// Entries without a `:` separator fall back to [`UNSPECIFIED_EXTRA`].
    pub fn optional_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.optional_dependencies
            .iter()
            .map(|entry| split_optional_entry(entry))
    }
}

/// Split `"<extra>:<name>"` on the first colon.
#[must_use]
pub fn split_optional_entry(entry: &str) -> (&str, &str) {
    match entry.split_once(':') {
        Some((extra, name)) => (extra, name),
        None => (UNSPECIFIED_EXTRA, entry),
    }
}

/// Key records by canonical name. Later records with the same name win.
///
/// Records whose name is blank after trimming are dropped.
#[must_use]
pub fn index_records(records: impl IntoIterator<Item = PackageRecord>) -> BTreeMap<String, PackageRecord> {
    let mut out = BTreeMap::new();
    for mut record in records {
        let key = canonical_name(&record.name);
        if key.is_empty() {
            continue;
        }
        record.name.clone_from(&key);
        out.insert(key, record);
    }
    out
}
