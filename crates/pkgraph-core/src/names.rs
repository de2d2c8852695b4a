//! Package name sets: which packages a graph is built for.
//!
//! A name set is a JSON document
//!
//! ```json
//! {"date": "2025-01-01T00:00:00Z", "mode": "top", "num_packages": 200,
//!  "days": 2, "packages": ["requests", "numpy"]}
//! ```
//!
//! where every field except `packages` is optional. Plain text files with
//! one name per line (`#` starts a comment) are accepted too.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::canonical_name;

#[derive(Debug, thiserror::Error)]
pub enum NamesError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid package name set in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// How the name set was collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionMode {
    /// Most downloaded over a lookback window.
    Top,
    /// Most recently uploaded.
    Recent,
}

impl fmt::Display for CollectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Top => "top",
            Self::Recent => "recent",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageNameSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<CollectionMode>,
    /// Requested count; may differ from `packages.len()`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_packages: Option<usize>,
    /// Lookback window in days (top mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<u32>,
    #[serde(default)]
    pub packages: Vec<String>,
}

impl PackageNameSet {
    /// An untagged set.
    #[must_use]
    pub fn from_names(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            packages: names.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Read a `.json` name set or a plain text list.
    ///
    /// # Errors
    ///
    /// Returns [`NamesError`] if the file cannot be read or the JSON is
    /// invalid.
    pub fn read(path: &Path) -> Result<Self, NamesError> {
        let content = fs::read_to_string(path).map_err(|source| NamesError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        if path.extension().is_some_and(|ext| ext == "json") {
            return serde_json::from_str(&content).map_err(|source| NamesError::Json {
                path: path.to_path_buf(),
                source,
            });
        }

        let names = content
            .lines()
            .map(|line| line.split('#').next().unwrap_or_default().trim())
            .filter(|line| !line.is_empty())
            .map(str::to_string);
        Ok(Self::from_names(names))
    }

    /// Write as pretty JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`NamesError`] if the file cannot be written.
    pub fn write(&self, path: &Path) -> Result<(), NamesError> {
        let io_err = |source| NamesError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let body = serde_json::to_string_pretty(self).map_err(|source| NamesError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, body + "\n").map_err(io_err)
    }

    /// Canonical names, blanks dropped, first occurrence kept.
    #[must_use]
    pub fn canonical_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.packages
            .iter()
            .map(|name| canonical_name(name))
            .filter(|name| !name.is_empty() && seen.insert(name.clone()))
            .collect()
    }

    /// Identifying name for artifacts built from this set.
    ///
    /// `top_<n>_<days>d`, `recent_<n>`, or `custom_<len>` for untagged sets.
    /// `n` falls back to the number of listed packages.
    #[must_use]
    pub fn artifact_name(&self) -> String {
        let n = self.num_packages.unwrap_or(self.packages.len());
        match (self.mode, self.days) {
            (Some(CollectionMode::Top), Some(days)) => format!("top_{n}_{days}d"),
            (Some(CollectionMode::Top), None) => format!("top_{n}"),
            (Some(CollectionMode::Recent), _) => format!("recent_{n}"),
            (None, _) => format!("custom_{}", self.packages.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_names() {
        let mut set = PackageNameSet {
            mode: Some(CollectionMode::Top),
            num_packages: Some(200),
            days: Some(2),
            packages: vec!["a".into()],
            ..PackageNameSet::default()
        };
        assert_eq!(set.artifact_name(), "top_200_2d");

        set.mode = Some(CollectionMode::Recent);
        assert_eq!(set.artifact_name(), "recent_200");

        set.mode = None;
        assert_eq!(set.artifact_name(), "custom_1");

        set.mode = Some(CollectionMode::Top);
        set.days = None;
        set.num_packages = None;
        assert_eq!(set.artifact_name(), "top_1");
    }

    #[test]
    fn canonical_names_dedupe_in_order() {
        let set = PackageNameSet::from_names(
            ["Requests", "numpy", " requests ", "", "NumPy", "flask"].map(String::from),
        );
        assert_eq!(set.canonical_names(), vec!["requests", "numpy", "flask"]);
    }

    #[test]
    fn reads_collector_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("top.json");
        fs::write(
            &path,
            r#"{"date": "2025-03-01T10:20:30.123456Z", "mode": "top",
                "num_packages": 2, "days": 7, "packages": ["a", "B"]}"#,
        )
        .expect("write");

        let set = PackageNameSet::read(&path).expect("read");
        assert_eq!(set.mode, Some(CollectionMode::Top));
        assert!(set.date.is_some());
        assert_eq!(set.artifact_name(), "top_2_7d");
    }

    #[test]
    fn reads_packages_only_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing.json");
        fs::write(&path, r#"{"packages": ["x", "y", "z"]}"#).expect("write");
        let set = PackageNameSet::read(&path).expect("read");
        assert_eq!(set.artifact_name(), "custom_3");
    }

    #[test]
    fn reads_text_lists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("names.txt");
        fs::write(&path, "# seed set\nrequests\n\n  Flask  # web\n").expect("write");
        let set = PackageNameSet::read(&path).expect("read");
        assert_eq!(set.canonical_names(), vec!["requests", "flask"]);
    }

    #[test]
    fn write_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out").join("set.json");
        let set = PackageNameSet {
            mode: Some(CollectionMode::Recent),
            num_packages: Some(3),
            packages: vec!["a".into(), "b".into()],
            ..PackageNameSet::default()
        };
        set.write(&path).expect("write");
        assert_eq!(PackageNameSet::read(&path).expect("read"), set);
    }

    #[test]
    fn untagged_set_writes_packages_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing.json");
        PackageNameSet::from_names(["a".to_string(), "b".to_string()])
            .write(&path)
            .expect("write");
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(value, serde_json::json!({"packages": ["a", "b"]}));
    }

    #[test]
    fn invalid_json_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.json");
        fs::write(&path, "{").expect("write");
        assert!(matches!(PackageNameSet::read(&path), Err(NamesError::Json { .. })));
    }
}
