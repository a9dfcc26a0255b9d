//! NHIS adapter (IPUMS `nhis` collection).
//!
//! NHIS extracts have no case-selection facility; a request carrying one is
//! a configuration error, caught before any network call.

use serde_json::Value;

use crate::errors::{SiloError, SiloResult};
use crate::models::{ExtractRequest, RemoteStatus, Source};

use super::{body_common, identity_common, interpret_status_common, validate_common, SourceAdapter};

pub struct NhisAdapter;

impl SourceAdapter for NhisAdapter {
    fn source(&self) -> Source {
        Source::Nhis
    }

    fn validate(&self, request: &ExtractRequest) -> SiloResult<()> {
        validate_common(self, request)?;
        if !request.case_selections.is_empty() {
            return Err(SiloError::Configuration(
                "NHIS extracts do not support case selections".to_string(),
            ));
        }
        Ok(())
    }

    fn identity(&self, request: &ExtractRequest) -> Value {
        identity_common(self, request)
    }

    fn request_body(&self, request: &ExtractRequest) -> Value {
        body_common(request)
    }

    fn interpret_status(&self, raw: &str) -> RemoteStatus {
        interpret_status_common(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VariableSpec;
    use crate::signature;

    fn request() -> ExtractRequest {
        let mut request = ExtractRequest::new(Source::Nhis, "nhis test");
        request.samples = vec!["ih2019".to_string()];
        request.variables = vec![VariableSpec::new("HRSLEEP")];
        request
    }

    #[test]
    fn rejects_case_selections() {
        let mut r = request();
        r.case_selections
            .insert("REGION".to_string(), vec!["1".to_string()]);
        assert!(matches!(
            NhisAdapter.validate(&r),
            Err(SiloError::Configuration(_))
        ));
    }

    #[test]
    fn accepts_plain_request() {
        NhisAdapter.validate(&request()).unwrap();
    }

    /// The same logical request differs in identity across collections.
    #[test]
    fn identity_differs_from_acs() {
        let nhis = request();
        let mut acs = request();
        acs.source = Source::Acs;
        assert_ne!(
            signature::digest(&NhisAdapter.identity(&nhis)),
            signature::digest(&super::super::acs::AcsAdapter.identity(&acs))
        );
    }
}
