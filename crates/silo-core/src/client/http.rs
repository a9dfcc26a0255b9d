//! Blocking HTTP implementation of the remote extract service.
//!
//! Speaks the IPUMS microdata extract API: JSON bodies, an API-key
//! `Authorization` header, per-collection extract numbers, and a
//! `download_links` map on the extract detail resource. Transport and auth
//! stay entirely inside this module.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::errors::SiloResult;

use super::api::{ExtractApi, StatusReport, SubmitReceipt};

const DEFAULT_BASE_URL: &str = "https://api.ipums.org";
const API_VERSION: &str = "2";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Extract detail resource, as served by `GET /extracts/{number}`.
#[derive(Clone, Debug, Deserialize)]
struct ExtractDetails {
    #[serde(default)]
    status: String,
    #[serde(default)]
    download_links: BTreeMap<String, DownloadLink>,
}

#[derive(Clone, Debug, Deserialize)]
struct DownloadLink {
    url: String,
}

/// Authenticated client for the IPUMS extract API.
pub struct IpumsApi {
    base_url: String,
    api_key: String,
    client: Client,
}

impl IpumsApi {
    /// Build a client against the production endpoint.
    pub fn new(api_key: impl Into<String>) -> SiloResult<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Build a client against a custom endpoint (mock servers, mirrors).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> SiloResult<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            // Extract archives run to gigabytes; no overall deadline.
            .timeout(None)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    fn authorized(&self, builder: RequestBuilder, collection: &str) -> RequestBuilder {
        builder
            .header("Authorization", &self.api_key)
            .query(&[("collection", collection), ("version", API_VERSION)])
    }

    fn extract_details(&self, collection: &str, number: u64) -> SiloResult<ExtractDetails> {
        let url = format!("{}/extracts/{}", self.base_url, number);
        let response = self
            .authorized(self.client.get(&url), collection)
            .send()?
            .error_for_status()?;
        Ok(response.json()?)
    }
}

impl ExtractApi for IpumsApi {
    fn submit(&self, collection: &str, body: &Value) -> SiloResult<SubmitReceipt> {
        let url = format!("{}/extracts", self.base_url);
        let response = self
            .authorized(self.client.post(&url), collection)
            .json(body)
            .send()?
            .error_for_status()?;
        Ok(response.json()?)
    }

    fn status(&self, collection: &str, number: u64) -> SiloResult<StatusReport> {
        let details = self.extract_details(collection, number)?;
        Ok(StatusReport {
            status: details.status,
        })
    }

    fn download(&self, collection: &str, number: u64, dest: &Path) -> SiloResult<Vec<PathBuf>> {
        let details = self.extract_details(collection, number)?;
        fs::create_dir_all(dest)?;

        let mut paths = Vec::with_capacity(details.download_links.len());
        for (name, link) in &details.download_links {
            let filename = url_basename(&link.url).unwrap_or_else(|| name.clone());
            let path = dest.join(filename);
            debug!(
                "downloading {} artifact for extract {}:{} to {}",
                name,
                collection,
                number,
                path.display()
            );

            let mut response = self
                .client
                .get(&link.url)
                .header("Authorization", &self.api_key)
                .send()?
                .error_for_status()?;
            let mut file = File::create(&path)?;
            response.copy_to(&mut file)?;
            paths.push(path);
        }
        Ok(paths)
    }
}

/// Final path segment of a URL, without query parameters.
fn url_basename(raw: &str) -> Option<String> {
    let url = reqwest::Url::parse(raw).ok()?;
    let name = url.path_segments()?.next_back()?.to_string();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

impl std::fmt::Debug for IpumsApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The API key never appears in debug output.
        f.debug_struct("IpumsApi")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_basename_strips_query() {
        assert_eq!(
            url_basename("https://example.org/downloads/usa_00012.dat.gz?X-Sig=abc"),
            Some("usa_00012.dat.gz".to_string())
        );
    }

    #[test]
    fn url_basename_rejects_bare_host() {
        assert_eq!(url_basename("https://example.org"), None);
        assert_eq!(url_basename("not a url"), None);
    }
}
