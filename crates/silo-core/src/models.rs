//! Shared typed models used across the signature, registry, client, and
//! orchestration layers.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Schema / contract constants
// ---------------------------------------------------------------------------

/// Registry document schema version.
pub const REGISTRY_SCHEMA_VERSION: &str = "1.0";

// ---------------------------------------------------------------------------
// Extract request
// ---------------------------------------------------------------------------

/// Survey source an extract is requested from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Acs,
    Nhis,
}

impl Source {
    /// Remote collection identifier (ACS microdata lives in the `usa`
    /// collection).
    pub fn collection(self) -> &'static str {
        match self {
            Source::Acs => "usa",
            Source::Nhis => "nhis",
        }
    }
}

/// On-the-wire format of the produced data file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFormat {
    #[default]
    FixedWidth,
    Csv,
}

impl DataFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            DataFormat::FixedWidth => "fixed_width",
            DataFormat::Csv => "csv",
        }
    }
}

/// A single requested variable, with its optional nested sub-lists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSpec {
    pub name: String,
    /// Household/person characteristics attached to this variable
    /// (e.g. attach the mother's EDUC to each child record).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attached_characteristics: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub data_quality_flags: bool,
}

impl VariableSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attached_characteristics: Vec::new(),
            data_quality_flags: false,
        }
    }

    pub fn with_attached_characteristics(mut self, chars: &[&str]) -> Self {
        self.attached_characteristics = chars.iter().map(|c| c.to_string()).collect();
        self
    }
}

/// Caller-supplied parameters identifying one extract. Consumed by the
/// acquisition layers, never mutated.
///
/// `description` is incidental metadata and is excluded from the extract
/// signature; everything else is identity-relevant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractRequest {
    pub source: Source,
    #[serde(default)]
    pub description: String,
    /// Sample identifiers, e.g. `us2021a` or `ih2019`.
    pub samples: Vec<String>,
    pub variables: Vec<VariableSpec>,
    /// Record filters keyed by variable name, e.g. `STATEFIP -> ["27", "31"]`.
    /// ACS only; NHIS requests must leave this empty.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub case_selections: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub data_format: DataFormat,
}

impl ExtractRequest {
    pub fn new(source: Source, description: impl Into<String>) -> Self {
        Self {
            source,
            description: description.into(),
            samples: Vec::new(),
            variables: Vec::new(),
            case_selections: BTreeMap::new(),
            data_format: DataFormat::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Artifact roles
// ---------------------------------------------------------------------------

/// Semantic role of a downloaded artifact. The remote service does not label
/// its files; roles are discovered from filename convention.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRole {
    /// Primary microdata file.
    Data,
    /// DDI codebook describing the data file.
    Codebook,
}

impl FileRole {
    pub fn as_str(self) -> &'static str {
        match self {
            FileRole::Data => "data",
            FileRole::Codebook => "codebook",
        }
    }
}

/// Downloaded artifacts keyed by role.
pub type RoleMap = BTreeMap<FileRole, PathBuf>;

// ---------------------------------------------------------------------------
// Cache entry
// ---------------------------------------------------------------------------

/// One registered extract in the cache registry.
///
/// Timestamps are kept as ISO-8601 strings rather than parsed types so a
/// single unparsable value can never make the whole document unreadable;
/// `sweep` conservatively keeps entries it cannot date.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheEntry {
    pub extract_signature: String,
    pub extract_id: String,
    pub collection: String,
    pub files: RoleMap,
    pub registration_timestamp: String,
    pub last_accessed: String,
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl CacheEntry {
    /// Parse `last_accessed`, or `None` when it is not valid RFC 3339.
    pub fn last_accessed_time(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.last_accessed)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Whether every referenced file still exists on disk.
    pub fn files_present(&self) -> bool {
        !self.files.is_empty() && self.files.values().all(|p| p.exists())
    }
}

// ---------------------------------------------------------------------------
// Lifecycle job
// ---------------------------------------------------------------------------

/// Stage of one acquisition lifecycle. Transient, never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStage {
    Built,
    Submitted,
    Polling,
    Completed,
    Failed,
    TimedOut,
    Downloaded,
    Registered,
}

impl JobStage {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStage::Built => "built",
            JobStage::Submitted => "submitted",
            JobStage::Polling => "polling",
            JobStage::Completed => "completed",
            JobStage::Failed => "failed",
            JobStage::TimedOut => "timed_out",
            JobStage::Downloaded => "downloaded",
            JobStage::Registered => "registered",
        }
    }
}

/// Remote job status as interpreted by a source adapter.
///
/// `Unrecognized` is an explicit state, not an error: the poll loop logs it
/// and keeps polling, so a new server-side status string can never abort a
/// long-running extract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteStatus {
    Queued,
    Running,
    Completed,
    Failed(String),
    Unrecognized(String),
}

impl RemoteStatus {
    /// Whether the poll loop should keep waiting on this status.
    pub fn in_progress(&self) -> bool {
        matches!(
            self,
            RemoteStatus::Queued | RemoteStatus::Running | RemoteStatus::Unrecognized(_)
        )
    }
}

// ---------------------------------------------------------------------------
// Acquisition result
// ---------------------------------------------------------------------------

/// What the orchestrator hands to the downstream loading stage.
#[derive(Clone, Debug)]
pub struct Acquisition {
    pub files: RoleMap,
    pub extract_id: String,
    pub signature: String,
    /// `true` when the artifacts came from the registry without touching the
    /// network.
    pub from_cache: bool,
}
