//! Per-source adapters.
//!
//! One generic acquisition core, parameterized by a small adapter interface
//! per survey source: which fields count toward extract identity, how the
//! wire request is built, and how remote status strings are interpreted.
//! Source-specific quirks (ACS supports case selections, NHIS does not)
//! live here and nowhere else.

pub mod acs;
pub mod nhis;

use serde_json::{json, Map, Value};

use crate::errors::{SiloError, SiloResult};
use crate::models::{ExtractRequest, RemoteStatus, Source};

/// Source-specific behavior plugged into the generic acquisition core.
pub trait SourceAdapter {
    fn source(&self) -> Source;

    /// Remote collection identifier.
    fn collection(&self) -> &'static str {
        self.source().collection()
    }

    /// Reject malformed requests before any network call is made.
    fn validate(&self, request: &ExtractRequest) -> SiloResult<()>;

    /// The identity-relevant subset of the request, as a JSON document the
    /// signature generator canonicalizes and hashes. Incidental fields
    /// (description, output locations) never appear here.
    fn identity(&self, request: &ExtractRequest) -> Value;

    /// The wire body submitted to the remote service.
    fn request_body(&self, request: &ExtractRequest) -> Value;

    /// Map a raw remote status string onto the lifecycle state machine.
    fn interpret_status(&self, raw: &str) -> RemoteStatus;
}

/// Adapter lookup for a source.
pub fn adapter_for(source: Source) -> &'static dyn SourceAdapter {
    match source {
        Source::Acs => &acs::AcsAdapter,
        Source::Nhis => &nhis::NhisAdapter,
    }
}

/// Checks shared by every source.
pub(crate) fn validate_common(
    adapter: &dyn SourceAdapter,
    request: &ExtractRequest,
) -> SiloResult<()> {
    if request.source != adapter.source() {
        return Err(SiloError::Configuration(format!(
            "request targets {:?} but was handed to the {} adapter",
            request.source,
            adapter.collection()
        )));
    }
    if request.samples.is_empty() {
        return Err(SiloError::Configuration(
            "at least one sample is required".to_string(),
        ));
    }
    if request.variables.is_empty() {
        return Err(SiloError::Configuration(
            "at least one variable is required".to_string(),
        ));
    }
    let mut seen = std::collections::BTreeSet::new();
    for variable in &request.variables {
        if !seen.insert(variable.name.as_str()) {
            return Err(SiloError::Configuration(format!(
                "variable {} is requested more than once",
                variable.name
            )));
        }
    }
    Ok(())
}

/// Identity fields every source shares. Description and output locations
/// are deliberately absent.
pub(crate) fn identity_common(adapter: &dyn SourceAdapter, request: &ExtractRequest) -> Value {
    json!({
        "collection": adapter.collection(),
        "samples": request.samples,
        "variables": request.variables,
        "data_format": request.data_format,
    })
}

/// Wire body fields every source shares. `variables` is keyed by name, with
/// per-variable options nested under each entry.
pub(crate) fn body_common(request: &ExtractRequest) -> Value {
    let mut samples = Map::new();
    for sample in &request.samples {
        samples.insert(sample.clone(), json!({}));
    }

    let mut variables = Map::new();
    for variable in &request.variables {
        let mut spec = Map::new();
        if !variable.attached_characteristics.is_empty() {
            spec.insert(
                "attachedCharacteristics".to_string(),
                json!(variable.attached_characteristics),
            );
        }
        if variable.data_quality_flags {
            spec.insert("dataQualityFlags".to_string(), json!(true));
        }
        variables.insert(variable.name.clone(), Value::Object(spec));
    }

    json!({
        "description": request.description,
        "dataFormat": request.data_format.as_str(),
        "dataStructure": {"rectangular": {"on": "P"}},
        "samples": samples,
        "variables": variables,
    })
}

/// Status vocabulary shared by the IPUMS-style collections.
pub(crate) fn interpret_status_common(raw: &str) -> RemoteStatus {
    match raw.trim().to_ascii_lowercase().as_str() {
        "queued" => RemoteStatus::Queued,
        "started" | "produced" => RemoteStatus::Running,
        "completed" => RemoteStatus::Completed,
        "failed" | "canceled" => RemoteStatus::Failed(raw.trim().to_string()),
        other => RemoteStatus::Unrecognized(other.to_string()),
    }
}
