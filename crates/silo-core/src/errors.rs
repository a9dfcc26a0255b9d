//! Error types for the Silo acquisition core.

use std::time::Duration;

/// Top-level error enum for the Silo core library.
///
/// Lifecycle errors name the stage that failed; registry-read problems are
/// downgraded to soft misses by the callers that can recover from them.
#[derive(Debug, thiserror::Error)]
pub enum SiloError {
    #[error("invalid extract request: {0}")]
    Configuration(String),

    #[error("extract submission failed: {0}")]
    Submission(String),

    #[error("polling for extract {extract_id} timed out after {waited:?}; the remote job may still complete under the same id")]
    PollingTimeout { extract_id: String, waited: Duration },

    #[error("remote extract {extract_id} reported terminal status {status:?}")]
    RemoteJobFailure { extract_id: String, status: String },

    #[error("download for extract {extract_id} failed: {reason}")]
    Download { extract_id: String, reason: String },

    #[error("cache registry is corrupt: {0}")]
    RegistryCorruption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type SiloResult<T> = Result<T, SiloError>;
