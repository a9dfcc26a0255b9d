//! On-disk registry document and its atomic persistence.
//!
//! The registry is one JSON document. Every save serializes the full
//! document to a temp file in the same directory, fsyncs it, and atomically
//! renames it over the original, so a crash mid-write leaves either the
//! pre- or post-mutation document intact, never a corrupt hybrid.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{SiloError, SiloResult};
use crate::models::{CacheEntry, REGISTRY_SCHEMA_VERSION};

/// Suffix of the scratch file written before the atomic rename.
const TMP_SUFFIX: &str = ".tmp";

/// The persisted registry document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistryDocument {
    pub version: String,
    pub last_updated: String,
    #[serde(default)]
    pub extracts: Vec<CacheEntry>,
}

impl Default for RegistryDocument {
    fn default() -> Self {
        Self {
            version: REGISTRY_SCHEMA_VERSION.to_string(),
            last_updated: now_utc(),
            extracts: Vec::new(),
        }
    }
}

impl RegistryDocument {
    /// Parse a document from raw JSON.
    pub fn from_json(raw: &str) -> SiloResult<Self> {
        serde_json::from_str(raw).map_err(|e| SiloError::RegistryCorruption(e.to_string()))
    }
}

/// Current UTC time as an RFC 3339 string with a trailing `Z`.
pub fn now_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Load the document at `path`.
///
/// A missing file is a fresh, empty registry. Malformed JSON is registry
/// corruption: the cache is disposable by design, so the document is
/// replaced by an empty one with a warning instead of failing the pipeline.
pub fn load(path: &Path) -> SiloResult<RegistryDocument> {
    if !path.exists() {
        return Ok(RegistryDocument::default());
    }
    let raw = fs::read_to_string(path)?;
    match RegistryDocument::from_json(&raw) {
        Ok(document) => Ok(document),
        Err(e) => {
            warn!(
                "registry at {} is unreadable ({}); starting from an empty registry",
                path.display(),
                e
            );
            Ok(RegistryDocument::default())
        }
    }
}

/// Serialize `document` and atomically replace the file at `path`.
pub fn save(path: &Path, document: &RegistryDocument) -> SiloResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let bytes = serde_json::to_vec_pretty(document)?;
    let tmp = tmp_path(path);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Scratch path next to the registry file (same filesystem, so the rename
/// is atomic).
fn tmp_path(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "registry.json".to_string());
    name.push_str(TMP_SUFFIX);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry(signature: &str) -> CacheEntry {
        CacheEntry {
            extract_signature: signature.to_string(),
            extract_id: format!("usa:{}", &signature[..4]),
            collection: "usa".to_string(),
            files: Default::default(),
            registration_timestamp: now_utc(),
            last_accessed: now_utc(),
            metadata: Default::default(),
        }
    }

    /// A missing file loads as an empty document.
    #[test]
    fn load_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let doc = load(&dir.path().join("registry.json")).unwrap();
        assert!(doc.extracts.is_empty());
        assert_eq!(doc.version, REGISTRY_SCHEMA_VERSION);
    }

    /// Malformed JSON is downgraded to an empty document, not an error.
    #[test]
    fn load_corrupt_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(&path, "{\"version\": \"1.0\", \"extracts\": [tru").unwrap();
        let doc = load(&path).unwrap();
        assert!(doc.extracts.is_empty());
    }

    /// Save then load round-trips the document.
    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        let mut doc = RegistryDocument::default();
        doc.extracts.push(sample_entry("aaaa"));
        save(&path, &doc).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.extracts.len(), 1);
        assert_eq!(loaded.extracts[0].extract_signature, "aaaa");
    }

    /// A crash between temp-write and rename leaves the previous document
    /// fully readable: the scratch file never shadows the real one.
    #[test]
    fn leftover_tmp_does_not_shadow_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");

        let mut doc = RegistryDocument::default();
        doc.extracts.push(sample_entry("aaaa"));
        save(&path, &doc).unwrap();

        // Simulate a crash mid-save of a second mutation: the temp file was
        // written (even half-written) but never renamed into place.
        fs::write(tmp_path(&path), "{\"version\": \"1.0\", \"extr").unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.extracts.len(), 1);
        assert_eq!(loaded.extracts[0].extract_signature, "aaaa");
    }

    /// The scratch file is gone after a successful save.
    #[test]
    fn save_leaves_no_tmp_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        save(&path, &RegistryDocument::default()).unwrap();
        assert!(path.exists());
        assert!(!tmp_path(&path).exists());
    }

    /// Unknown per-entry keys survive a load/save cycle via the metadata
    /// flatten map.
    #[test]
    fn extra_metadata_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(
            &path,
            r#"{
                "version": "1.0",
                "last_updated": "2025-01-01T00:00:00Z",
                "extracts": [{
                    "extract_signature": "abcd",
                    "extract_id": "usa:1",
                    "collection": "usa",
                    "files": {},
                    "registration_timestamp": "2025-01-01T00:00:00Z",
                    "last_accessed": "2025-01-01T00:00:00Z",
                    "description": "acs 2021 five-year"
                }]
            }"#,
        )
        .unwrap();

        let doc = load(&path).unwrap();
        assert_eq!(
            doc.extracts[0].metadata.get("description").and_then(|v| v.as_str()),
            Some("acs 2021 five-year")
        );
        save(&path, &doc).unwrap();
        let again = load(&path).unwrap();
        assert!(again.extracts[0].metadata.contains_key("description"));
    }
}
