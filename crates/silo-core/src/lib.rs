//! Silo core library — extract acquisition and caching for the survey-data
//! pipelines.
//!
//! IPUMS-style extracts take 15–60+ minutes to produce server-side, so this
//! crate never resubmits a request it already holds the artifacts for: each
//! request is reduced to a deterministic signature, signatures map to
//! downloaded artifacts through a durable JSON registry, and misses run the
//! submit → poll → download → register lifecycle against the remote extract
//! service. Config loading, format conversion, and the statistical layers
//! above are external collaborators.

pub mod acquire;
pub mod client;
pub mod errors;
pub mod models;
pub mod registry;
pub mod signature;
pub mod sources;

pub use acquire::{AcquireOptions, Acquirer};
pub use client::http::IpumsApi;
pub use client::{ExtractClient, PollConfig};
pub use errors::{SiloError, SiloResult};
pub use models::{Acquisition, CacheEntry, ExtractRequest, FileRole, Source, VariableSpec};
pub use registry::CacheRegistry;
