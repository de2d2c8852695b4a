//! Metadata stores: where package records come from.
//!
//! The graph builder only needs [`MetadataStore::get`], which never fails: a
//! missing or undecodable record is reported as `None` and the builder falls
//! back to an empty record. [`JsonDirStore`] is the on-disk implementation,
//! one `<name>.json` document per package.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use crate::model::{PackageRecord, RawMetadata, canonical_name};
use crate::normalize::normalize;

/// Errors from reading or writing a [`JsonDirStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode record for {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The document decoded but has no usable `name`.
    #[error("record in {0} has no package name")]
    Unnamed(PathBuf),

    /// The name is empty or could resolve outside the store directory.
    #[error("invalid package name {0:?}")]
    InvalidName(String),
}

/// Source of per-package metadata for on-demand lookups.
pub trait MetadataStore {
    /// Fetch the record for `name`, or `None` if it is missing or malformed.
    fn get(&self, name: &str) -> Option<PackageRecord>;
}

/// A store that knows nothing. Dependencies outside the input set get empty
/// records.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyStore;

impl MetadataStore for EmptyStore {
    fn get(&self, _name: &str) -> Option<PackageRecord> {
        None
    }
}

impl MetadataStore for BTreeMap<String, PackageRecord> {
    fn get(&self, name: &str) -> Option<PackageRecord> {
        BTreeMap::get(self, &canonical_name(name)).cloned()
    }
}

// ---------------------------------------------------------------------------
// JsonDirStore
// ---------------------------------------------------------------------------

/// Directory of per-package JSON documents.
///
/// Documents may be raw registry responses or already-normalized records;
/// both are normalized on read.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] for empty names and names
    /// containing `/`, `\` or `..`.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        let key = canonical_name(name);
        if key.is_empty() || key.contains(['/', '\\']) || key.contains("..") {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    /// Read and normalize the document for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the name is invalid, or the file cannot be
    /// read or decoded, or has no package name.
    pub fn read(&self, name: &str) -> Result<PackageRecord, StoreError> {
        read_record(&self.path_for(name)?)
    }

    /// Normalize and write `record` as `<name>.json`, creating the directory
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] if the record name is not a safe
    /// file stem, or [`StoreError::Io`] if the directory or file cannot be
    /// written.
    pub fn write(&self, record: &PackageRecord) -> Result<PathBuf, StoreError> {
        let path = self.path_for(&record.name)?;
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let body = serde_json::to_vec_pretty(record).map_err(|source| StoreError::Encode {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, body).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Load every `*.json` document in the directory, keyed by canonical name.
    ///
    /// Documents that fail to decode are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] only if the directory itself cannot be listed.
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    pub fn load_all(&self) -> Result<BTreeMap<String, PackageRecord>, StoreError> {
        let mut records = BTreeMap::new();
        for path in self.json_files()? {
            match read_record(&path) {
                Ok(record) => {
                    records.insert(record.name.clone(), record);
                }
                Err(err) => warn!(error = %err, "skipping unreadable package record"),
            }
        }
        debug!(count = records.len(), "loaded package records");
        Ok(records)
    }

    /// Load the records for `names`. Missing or malformed documents are
    /// logged and left out.
    #[instrument(skip_all, fields(dir = %self.dir.display(), requested = names.len()))]
    pub fn load_named(&self, names: &[String]) -> BTreeMap<String, PackageRecord> {
        let mut records = BTreeMap::new();
        for name in names {
            let key = canonical_name(name);
            if key.is_empty() {
                continue;
            }
            match self.read(&key) {
                Ok(record) => {
                    records.insert(key, record);
                }
                Err(err) => warn!(package = %key, error = %err, "requested package has no usable record"),
            }
        }
        records
    }

    /// Sorted names of stored records lacking rank, stars, forks or
    /// normalized licenses.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be listed.
    pub fn missing_metadata_names(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self
            .load_all()?
            .into_values()
            .filter(PackageRecord::has_missing_metadata)
            .map(|record| record.name)
            .collect();
        names.sort();
        Ok(names)
    }

    fn json_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();
        Ok(files)
    }
}

impl MetadataStore for JsonDirStore {
    fn get(&self, name: &str) -> Option<PackageRecord> {
        match self.read(name) {
            Ok(record) => Some(record),
            Err(StoreError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                None
            }
            Err(err @ StoreError::InvalidName(_)) => {
                debug!(error = %err, "refusing store lookup");
                None
            }
            Err(err) => {
                warn!(package = name, error = %err, "dependency metadata unavailable");
                None
            }
        }
    }
}

/// Read one document and normalize it.
fn read_record(path: &Path) -> Result<PackageRecord, StoreError> {
    let bytes = fs::read(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: RawMetadata = serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    normalize(raw).ok_or_else(|| StoreError::Unnamed(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_json(dir: &Path, file: &str, value: &serde_json::Value) {
        fs::write(dir.join(file), serde_json::to_vec(value).expect("json")).expect("write");
    }

    #[test]
    fn get_reads_raw_documents() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_json(
            dir.path(),
            "six.json",
            &json!({"name": "Six", "stars": 10, "dependencies": []}),
        );
        let store = JsonDirStore::new(dir.path());
        let record = store.get("SIX").expect("record");
        assert_eq!(record.name, "six");
        assert_eq!(record.stars, Some(10));
    }

    #[test]
    fn get_missing_or_malformed_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("broken.json"), b"{not json").expect("write");
        write_json(dir.path(), "nameless.json", &json!({"stars": 1}));
        let store = JsonDirStore::new(dir.path());
        assert!(store.get("absent").is_none());
        assert!(store.get("broken").is_none());
        assert!(store.get("nameless").is_none());
    }

    #[test]
    fn names_cannot_leave_the_store() {
        let root = tempfile::tempdir().expect("tempdir");
        let dir = root.path().join("packages");
        fs::create_dir_all(&dir).expect("mkdir");
        write_json(root.path(), "outside.json", &json!({"name": "outside"}));
        write_json(&dir, "inside.json", &json!({"name": "inside"}));
        let store = JsonDirStore::new(&dir);

        assert!(store.get("inside").is_some());
        assert!(store.get("../outside").is_none());
        assert!(store.get("..\\outside").is_none());
        assert!(store.get("/tmp/outside").is_none());
        assert!(store.get("  ").is_none());
        assert!(matches!(store.read("../outside"), Err(StoreError::InvalidName(_))));

        let escaping = PackageRecord::empty("../escaped");
        assert!(matches!(store.write(&escaping), Err(StoreError::InvalidName(_))));
        assert!(!root.path().join("escaped.json").exists());
    }

    #[test]
    fn load_all_skips_bad_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_json(dir.path(), "a.json", &json!({"name": "A"}));
        write_json(dir.path(), "b.json", &json!({"name": "b"}));
        fs::write(dir.path().join("c.json"), b"[").expect("write");
        fs::write(dir.path().join("notes.txt"), b"ignored").expect("write");

        let records = JsonDirStore::new(dir.path()).load_all().expect("load");
        assert_eq!(records.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn load_all_on_missing_dir_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonDirStore::new(dir.path().join("nope"));
        assert!(matches!(store.load_all(), Err(StoreError::Io { .. })));
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonDirStore::new(dir.path().join("packages"));
        let mut record = PackageRecord::empty("flask");
        record.runtime_dependencies.insert("werkzeug".into());
        record.optional_dependencies.insert("async:asgiref".into());
        record.stars = Some(0);

        store.write(&record).expect("write");
        let back = store.read("flask").expect("read");
        assert_eq!(back.runtime_dependencies, record.runtime_dependencies);
        assert_eq!(back.optional_dependencies, record.optional_dependencies);
        assert_eq!(back.stars, Some(0));
    }

    #[test]
    fn load_named_and_missing_scan() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_json(
            dir.path(),
            "full.json",
            &json!({
                "name": "full", "rank": 3, "stars": 1, "forks": 1,
                "normalized_licenses": ["MIT"]
            }),
        );
        write_json(dir.path(), "partial.json", &json!({"name": "partial", "rank": 3}));
        let store = JsonDirStore::new(dir.path());

        let named = store.load_named(&["FULL".into(), "ghost".into(), String::new()]);
        assert_eq!(named.keys().collect::<Vec<_>>(), vec!["full"]);

        assert_eq!(store.missing_metadata_names().expect("scan"), vec!["partial"]);
    }

    #[test]
    fn map_store_canonicalizes_lookups() {
        let mut map = BTreeMap::new();
        map.insert("numpy".to_string(), PackageRecord::empty("numpy"));
        assert!(MetadataStore::get(&map, " NumPy").is_some());
        assert!(MetadataStore::get(&map, "pandas").is_none());
    }
}
