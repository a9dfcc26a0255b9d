//! Cache-first acquisition orchestrator.
//!
//! The sole entry point consumers use: compute the request signature, serve
//! a validated registry hit without touching the network, otherwise run the
//! full lifecycle and register the artifacts. Registration happens only
//! after a fully successful download, so no partial entry is ever visible
//! to future lookups.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::client::api::ExtractApi;
use crate::client::ExtractClient;
use crate::errors::{SiloError, SiloResult};
use crate::models::{Acquisition, CacheEntry, ExtractRequest, JobStage};
use crate::registry::{document, CacheRegistry};
use crate::signature;
use crate::sources::adapter_for;

/// Per-call acquisition options.
#[derive(Clone, Debug)]
pub struct AcquireOptions {
    /// Bypass the registry and re-run the lifecycle even on a valid hit.
    pub force_refresh: bool,
    /// Where downloaded artifacts land.
    pub download_dir: PathBuf,
}

impl AcquireOptions {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            force_refresh: false,
            download_dir: download_dir.into(),
        }
    }

    pub fn force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }
}

/// Composes the signature generator, cache registry, and lifecycle client
/// into the cache-first acquisition policy. The remote client is injected
/// at construction; callers hold one `Acquirer` for as long as they like.
pub struct Acquirer<A: ExtractApi> {
    registry: CacheRegistry,
    client: ExtractClient<A>,
}

impl<A: ExtractApi> Acquirer<A> {
    pub fn new(registry: CacheRegistry, client: ExtractClient<A>) -> Self {
        Self { registry, client }
    }

    pub fn registry(&self) -> &CacheRegistry {
        &self.registry
    }

    /// Remove entries not accessed within `max_age`; returns removed ids.
    pub fn sweep(&mut self, max_age: Duration) -> SiloResult<Vec<String>> {
        self.registry.sweep(max_age)
    }

    /// Drop one extract from the registry, optionally deleting its files.
    pub fn invalidate(&mut self, extract_id: &str, delete_files: bool) -> SiloResult<bool> {
        self.registry.invalidate(extract_id, delete_files)
    }

    /// Acquire the artifacts for `request`, from cache when possible.
    pub fn acquire(
        &mut self,
        request: &ExtractRequest,
        options: &AcquireOptions,
    ) -> SiloResult<Acquisition> {
        let adapter = adapter_for(request.source);
        adapter.validate(request)?;

        let sig = signature::digest(&adapter.identity(request));
        let collection = adapter.collection();

        if options.force_refresh {
            info!(
                "force refresh requested for {} extract {}; bypassing registry",
                collection,
                signature::short(&sig)
            );
        } else if let Some(entry) = self.registry.lookup(&sig) {
            let acquisition = Acquisition {
                files: entry.files.clone(),
                extract_id: entry.extract_id.clone(),
                signature: sig.clone(),
                from_cache: true,
            };
            info!(
                "registry hit for {} extract {} ({})",
                collection,
                signature::short(&sig),
                acquisition.extract_id
            );
            self.registry.touch(&sig)?;
            return Ok(acquisition);
        } else {
            debug!(
                "registry miss for {} extract {}",
                collection,
                signature::short(&sig)
            );
        }

        // Full lifecycle. Any failure below leaves the registry untouched.
        debug!("{}: request built for {}", JobStage::Built.as_str(), collection);
        let number = self.client.submit(adapter, request)?;
        let extract_id = format!("{collection}:{number}");
        debug!("{}: extract {}", JobStage::Submitted.as_str(), extract_id);

        debug!("{}: extract {}", JobStage::Polling.as_str(), extract_id);
        self.client.wait(adapter, number).map_err(|e| {
            let stage = match &e {
                SiloError::PollingTimeout { .. } => JobStage::TimedOut,
                _ => JobStage::Failed,
            };
            warn!(
                "acquisition of {} stopped at stage {}; registry left untouched",
                extract_id,
                stage.as_str()
            );
            e
        })?;
        debug!("{}: extract {}", JobStage::Completed.as_str(), extract_id);

        let files = self.client.download(adapter, number, &options.download_dir)?;
        debug!(
            "{}: extract {} ({} files)",
            JobStage::Downloaded.as_str(),
            extract_id,
            files.len()
        );

        let now = document::now_utc();
        let mut metadata = serde_json::Map::new();
        if !request.description.is_empty() {
            metadata.insert("description".to_string(), request.description.clone().into());
        }
        self.registry.register(CacheEntry {
            extract_signature: sig.clone(),
            extract_id: extract_id.clone(),
            collection: collection.to_string(),
            files: files.clone(),
            registration_timestamp: now.clone(),
            last_accessed: now,
            metadata,
        })?;
        info!(
            "{}: extract {} under signature {}",
            JobStage::Registered.as_str(),
            extract_id,
            signature::short(&sig)
        );

        Ok(Acquisition {
            files,
            extract_id,
            signature: sig,
            from_cache: false,
        })
    }
}
