//! Durable signature→artifact cache registry.
//!
//! One JSON document on disk, one insertion-ordered map in memory, at most
//! one entry per signature. Single writer per process; concurrent processes
//! racing on the same registry file are out of scope.

pub mod document;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::errors::SiloResult;
use crate::models::CacheEntry;
use crate::signature;

use document::RegistryDocument;

/// Durable mapping from extract signature to downloaded artifacts.
pub struct CacheRegistry {
    path: PathBuf,
    entries: IndexMap<String, CacheEntry>,
    version: String,
}

impl CacheRegistry {
    /// Open the registry at `path`, creating an empty one if the file does
    /// not exist. An unreadable document is treated as empty (the cache is
    /// disposable), never as a fatal error.
    pub fn open(path: impl Into<PathBuf>) -> SiloResult<Self> {
        let path = path.into();
        let doc = document::load(&path)?;
        let mut entries = IndexMap::with_capacity(doc.extracts.len());
        for entry in doc.extracts {
            entries.insert(entry.extract_signature.clone(), entry);
        }
        debug!(
            "opened registry at {} with {} entries",
            path.display(),
            entries.len()
        );
        Ok(Self {
            path,
            entries,
            version: doc.version,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in registration order.
    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.values()
    }

    /// Look up a signature, validating that every referenced file still
    /// exists on disk. A stale entry (files deleted out from under the
    /// registry) reports a miss so the caller falls through to
    /// re-acquisition; it is never an error.
    pub fn lookup(&self, signature_hex: &str) -> Option<&CacheEntry> {
        let entry = self.entries.get(signature_hex)?;
        if entry.files_present() {
            Some(entry)
        } else {
            debug!(
                "registry entry {} ({}) is stale: referenced files are missing",
                signature::short(signature_hex),
                entry.extract_id
            );
            None
        }
    }

    /// Bump `last_accessed` on a hit and persist.
    pub fn touch(&mut self, signature_hex: &str) -> SiloResult<()> {
        if let Some(entry) = self.entries.get_mut(signature_hex) {
            entry.last_accessed = document::now_utc();
            self.save()?;
        }
        Ok(())
    }

    /// Register an entry. Idempotent: an existing entry for the same
    /// signature is replaced in place, and an existing entry holding the same
    /// extract id under a different signature is evicted, so one remote
    /// extract is never reachable from two signatures.
    pub fn register(&mut self, entry: CacheEntry) -> SiloResult<()> {
        let displaced: Vec<String> = self
            .entries
            .values()
            .filter(|e| e.extract_id == entry.extract_id && e.extract_signature != entry.extract_signature)
            .map(|e| e.extract_signature.clone())
            .collect();
        for sig in displaced {
            warn!(
                "extract {} re-registered under a new signature; dropping old entry {}",
                entry.extract_id,
                signature::short(&sig)
            );
            self.entries.shift_remove(&sig);
        }

        let sig = entry.extract_signature.clone();
        let replaced = self.entries.insert(sig.clone(), entry).is_some();
        debug!(
            "{} registry entry {}",
            if replaced { "updated" } else { "added" },
            signature::short(&sig)
        );
        self.save()
    }

    /// Remove the entry for `extract_id`, optionally deleting its backing
    /// files. Returns whether an entry was removed.
    pub fn invalidate(&mut self, extract_id: &str, delete_files: bool) -> SiloResult<bool> {
        let sig = self
            .entries
            .values()
            .find(|e| e.extract_id == extract_id)
            .map(|e| e.extract_signature.clone());
        let Some(entry) = sig.and_then(|s| self.entries.shift_remove(&s)) else {
            return Ok(false);
        };

        if delete_files {
            remove_backing_files(&entry);
        }
        info!("invalidated registry entry for extract {extract_id}");
        self.save()?;
        Ok(true)
    }

    /// Remove entries whose `last_accessed` is older than `max_age`, along
    /// with their backing files. Entries with unparsable timestamps are
    /// conservatively kept. Returns the extract ids that were removed.
    pub fn sweep(&mut self, max_age: Duration) -> SiloResult<Vec<String>> {
        let now = Utc::now();
        let expired: Vec<String> = self
            .entries
            .values()
            .filter(|entry| match entry.last_accessed_time() {
                Some(t) => {
                    let age = (now - t).to_std().unwrap_or(Duration::ZERO);
                    age > max_age
                }
                None => {
                    warn!(
                        "entry {} has unparsable last_accessed {:?}; keeping it",
                        entry.extract_id, entry.last_accessed
                    );
                    false
                }
            })
            .map(|entry| entry.extract_signature.clone())
            .collect();

        let mut removed = Vec::with_capacity(expired.len());
        for sig in expired {
            if let Some(entry) = self.entries.shift_remove(&sig) {
                remove_backing_files(&entry);
                removed.push(entry.extract_id);
            }
        }
        if !removed.is_empty() {
            info!("swept {} expired registry entries", removed.len());
            self.save()?;
        }
        Ok(removed)
    }

    /// Rewrite the whole document atomically.
    fn save(&mut self) -> SiloResult<()> {
        let doc = RegistryDocument {
            version: self.version.clone(),
            last_updated: document::now_utc(),
            extracts: self.entries.values().cloned().collect(),
        };
        document::save(&self.path, &doc)
    }
}

/// Best-effort deletion of an entry's artifact files.
fn remove_backing_files(entry: &CacheEntry) {
    for path in entry.files.values() {
        if let Err(e) = fs::remove_file(path) {
            if path.exists() {
                warn!("failed to remove cached file {}: {}", path.display(), e);
            }
        }
    }
}
