//! Remote extract service seam.
//!
//! Everything above this trait is transport-agnostic: the lifecycle client
//! and orchestrator only ever see `ExtractApi`, so tests substitute a
//! scripted fake and production wires in the blocking HTTP implementation.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::errors::SiloResult;

/// Remote acknowledgement of a submitted extract request.
///
/// The service assigns a per-collection extract number. An acknowledgement
/// without a number violates the service contract and is fatal upstream.
#[derive(Clone, Debug, Deserialize)]
pub struct SubmitReceipt {
    #[serde(default)]
    pub number: Option<u64>,
}

/// Remote status report for one extract.
#[derive(Clone, Debug, Deserialize)]
pub struct StatusReport {
    #[serde(default)]
    pub status: String,
}

/// Operations consumed from the remote extract service.
pub trait ExtractApi {
    /// Send a built request body; returns the service's acknowledgement.
    fn submit(&self, collection: &str, body: &Value) -> SiloResult<SubmitReceipt>;

    /// Fetch the current status of a previously submitted extract.
    fn status(&self, collection: &str, number: u64) -> SiloResult<StatusReport>;

    /// Fetch every result artifact of a completed extract into `dest`,
    /// returning the written paths. The service does not label file roles;
    /// classification happens above this trait.
    fn download(&self, collection: &str, number: u64, dest: &Path) -> SiloResult<Vec<PathBuf>>;
}
