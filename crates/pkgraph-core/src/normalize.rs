//! Metadata normalization.
//!
//! Turns a [`RawMetadata`] document into a canonical [`PackageRecord`]. This is
//! a best-effort transform, not a validator: entries without a usable name
//! are skipped, unparsable timestamps become `None`, and nothing here fails.
//!
//! ## Dependency classification
//!
//! | raw `kind`               | raw `optional` | result                  |
//! |--------------------------|----------------|-------------------------|
//! | `runtime`                | false          | runtime dependency      |
//! | `extra == "test"`        | any            | `test:<name>`           |
//! | anything else            | true           | `unspecified:<name>`    |
//! | anything else            | false          | dropped                 |

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::model::{
    PackageRecord, RawDependency, RawMetadata, UNKNOWN, UNSPECIFIED_EXTRA, canonical_name,
    split_optional_entry,
};

/// Longest license string kept on a record, in characters.
pub const MAX_LICENSE_CHARS: usize = 100;

/// `extra == "<value>"` at the start of a dependency kind tag.
static EXTRA_KIND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^extra\s*==\s*"([^"]+)""#).expect("extra kind pattern is valid")
});

/// Leading distribution name of a PEP 508 requirement string.
static REQUIREMENT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9_.\-]+)").expect("requirement pattern is valid"));

/// `extra == "<value>"` anywhere inside a requirement's environment marker.
static REQUIREMENT_EXTRA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)extra\s*==\s*["']([^"']+)["']"#).expect("marker pattern is valid")
});

/// Normalize a raw registry document.
///
/// Returns `None` when the document has no usable name.
#[must_use]
pub fn normalize(raw: RawMetadata) -> Option<PackageRecord> {
    let name = canonical_name(raw.name.as_deref()?);
    if name.is_empty() {
        return None;
    }

    let (runtime_dependencies, optional_dependencies) = if !raw.dependencies.is_empty() {
        (
            runtime_dependencies(&raw.dependencies),
            optional_dependencies(&raw.dependencies),
        )
    } else if !raw.requires_dist.is_empty() {
        debug!(package = %name, "no registry dependencies, using requires_dist");
        let parsed = parse_requires_dist(&raw.requires_dist);
        (runtime_dependencies(&parsed), optional_dependencies(&parsed))
    } else {
        (
            canonical_runtime_list(raw.runtime_dependencies.as_deref().unwrap_or_default()),
            canonical_optional_list(raw.optional_dependencies.as_deref().unwrap_or_default()),
        )
    };

    let latest_release_published_at = raw
        .latest_release_published_at
        .as_deref()
        .and_then(|ts| match DateTime::parse_from_rfc3339(ts.trim()) {
            Ok(parsed) => Some(parsed.with_timezone(&Utc)),
            Err(err) => {
                debug!(package = %name, timestamp = ts, error = %err, "unparsable release timestamp");
                None
            }
        });

    let repository_url = raw
        .repository_url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty());

    Some(PackageRecord {
        name,
        rank: raw.rank,
        stars: raw.stars,
        forks: raw.forks,
        licenses: Some(normalize_license(raw.licenses.as_ref())),
        normalized_licenses: raw.normalized_licenses,
        latest_release_published_at,
        repository_url,
        has_funding: raw
            .funding_urls
            .map(|urls| urls.iter().any(|u| !u.trim().is_empty()))
            .or(raw.has_funding),
        keyword_count: raw
            .keywords
            .map(|k| u64::try_from(k.len()).unwrap_or(u64::MAX))
            .or(raw.keyword_count),
        runtime_dependencies,
        optional_dependencies,
    })
}

/// Names of dependencies whose kind is exactly `runtime` and that are not
/// flagged optional.
#[must_use]
pub fn runtime_dependencies(raw: &[RawDependency]) -> BTreeSet<String> {
    raw.iter()
        .filter(|dep| dep.kind.as_deref() == Some("runtime") && !dep.optional.unwrap_or(false))
        .filter_map(|dep| usable_name(dep.name.as_deref()))
        .collect()
}

/// `"<extra>:<name>"` entries for every optional or extra-gated dependency.
#[must_use]
pub fn optional_dependencies(raw: &[RawDependency]) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for dep in raw {
        let Some(name) = usable_name(dep.name.as_deref()) else {
            continue;
        };
        let kind = dep.kind.as_deref().unwrap_or_default();

        if let Some(caps) = EXTRA_KIND.captures(kind) {
            out.insert(format!("{}:{name}", caps[1].to_lowercase()));
        } else if dep.optional.unwrap_or(false) {
            out.insert(format!("{UNSPECIFIED_EXTRA}:{name}"));
        }
    }
    out
}

/// Normalize the raw `licenses` field.
///
/// Lists are joined with `", "` and strings are kept. Both are truncated to
/// [`MAX_LICENSE_CHARS`] characters, so an empty list or string stays empty.
/// A missing value or any other JSON type is [`UNKNOWN`].
#[must_use]
pub fn normalize_license(value: Option<&Value>) -> String {
    let joined = match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        Some(Value::String(s)) => s.clone(),
        _ => return UNKNOWN.to_string(),
    };

    joined.chars().take(MAX_LICENSE_CHARS).collect()
}

/// Parse PyPI `requires_dist` strings into raw dependency entries.
///
/// `numpy>=1.20` becomes a runtime dependency; `pytest; extra == "test"`
/// becomes an optional entry with kind `extra == "test"`. Strings without a
/// leading distribution name are skipped.
#[must_use]
pub fn parse_requires_dist(requirements: &[String]) -> Vec<RawDependency> {
    requirements
        .iter()
        .filter_map(|req| {
            let req = req.trim();
            let name = REQUIREMENT_NAME.captures(req)?[1].to_lowercase();
            Some(match REQUIREMENT_EXTRA.captures(req) {
                Some(caps) => RawDependency::new(&name, &format!("extra == \"{}\"", &caps[1]), true),
                None => RawDependency::new(&name, "runtime", false),
            })
        })
        .collect()
}

fn usable_name(name: Option<&str>) -> Option<String> {
    let name = canonical_name(name?);
    (!name.is_empty()).then_some(name)
}

fn canonical_runtime_list(names: &[String]) -> BTreeSet<String> {
    names
        .iter()
        .filter_map(|n| usable_name(Some(n.as_str())))
        .collect()
}

fn canonical_optional_list(entries: &[String]) -> BTreeSet<String> {
    entries
        .iter()
        .filter_map(|entry| {
            let (extra, name) = split_optional_entry(entry);
            let name = usable_name(Some(name))?;
            let extra = canonical_name(extra);
            let extra = if extra.is_empty() {
                UNSPECIFIED_EXTRA.to_string()
            } else {
                extra
            };
            Some(format!("{extra}:{name}"))
        })
        .collect()
}
