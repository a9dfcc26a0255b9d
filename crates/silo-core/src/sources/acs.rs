//! ACS adapter (IPUMS `usa` collection).
//!
//! ACS extracts support case selections: record filters keyed by variable
//! (state FIPS codes, age ranges). Selections are identity-relevant and are
//! attached to their variables in the wire body.

use serde_json::{json, Value};

use crate::errors::SiloResult;
use crate::models::{ExtractRequest, RemoteStatus, Source};

use super::{body_common, identity_common, interpret_status_common, validate_common, SourceAdapter};

pub struct AcsAdapter;

impl SourceAdapter for AcsAdapter {
    fn source(&self) -> Source {
        Source::Acs
    }

    fn validate(&self, request: &ExtractRequest) -> SiloResult<()> {
        validate_common(self, request)
    }

    fn identity(&self, request: &ExtractRequest) -> Value {
        let mut identity = identity_common(self, request);
        if !request.case_selections.is_empty() {
            identity["case_selections"] = json!(request.case_selections);
        }
        identity
    }

    fn request_body(&self, request: &ExtractRequest) -> Value {
        let mut body = body_common(request);
        // Case selections ride on their variable's entry; a selection on a
        // variable that was not requested gets a bare entry added.
        for (variable, values) in &request.case_selections {
            let entry = body["variables"]
                .as_object_mut()
                .and_then(|vars| {
                    if !vars.contains_key(variable) {
                        vars.insert(variable.clone(), json!({}));
                    }
                    vars.get_mut(variable)
                })
                .and_then(|v| v.as_object_mut());
            if let Some(entry) = entry {
                entry.insert(
                    "caseSelections".to_string(),
                    json!({ "general": values }),
                );
            }
        }
        body
    }

    fn interpret_status(&self, raw: &str) -> RemoteStatus {
        interpret_status_common(raw)
    }
}
