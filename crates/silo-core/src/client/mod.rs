//! Extract lifecycle client.
//!
//! Drives one extract through `submit → poll → download` against an
//! [`ExtractApi`] implementation. Blocking and single-threaded: the only
//! suspension points are the poll interval sleep and the network calls
//! themselves.

pub mod api;
pub mod http;

use std::path::Path;
use std::sync::LazyLock;
use std::thread;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, info, warn};

use crate::errors::{SiloError, SiloResult};
use crate::models::{ExtractRequest, FileRole, RemoteStatus, RoleMap};
use crate::sources::SourceAdapter;

use api::ExtractApi;

/// Primary microdata file: fixed-width or CSV, usually gzipped.
static DATA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(dat|csv)(\.gz)?$").unwrap());

/// DDI codebook delivered alongside the data file.
static CODEBOOK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\.(xml|ddi)$").unwrap());

/// Polling cadence and wall-clock bound for one extract.
///
/// Extract production typically takes 15–60+ minutes server-side, so the
/// defaults poll every 30 seconds for up to 90 minutes.
#[derive(Clone, Copy, Debug)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(90 * 60),
        }
    }
}

/// Lifecycle client over a remote extract service.
pub struct ExtractClient<A: ExtractApi> {
    api: A,
    poll: PollConfig,
}

impl<A: ExtractApi> ExtractClient<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            poll: PollConfig::default(),
        }
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// The injected remote service implementation.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Submit a built request. The service must hand back a stable extract
    /// number; an acknowledgement without one is a contract violation and is
    /// not retried.
    pub fn submit(&self, adapter: &dyn SourceAdapter, request: &ExtractRequest) -> SiloResult<u64> {
        let body = adapter.request_body(request);
        let receipt = self.api.submit(adapter.collection(), &body)?;
        match receipt.number {
            Some(number) => {
                info!(
                    "submitted {} extract, assigned number {}",
                    adapter.collection(),
                    number
                );
                Ok(number)
            }
            None => Err(SiloError::Submission(format!(
                "{} service acknowledged the request without an extract number",
                adapter.collection()
            ))),
        }
    }

    /// Poll until the extract completes, fails, or the wall clock runs out.
    ///
    /// In-progress statuses sleep and retry. An unrecognized status is an
    /// explicit keep-polling transition, logged at warn. Transport errors
    /// are transient and retried at the same interval; polling is
    /// at-least-once and idempotent. `PollingTimeout` is distinct from
    /// remote failure because the remote job may still complete later under
    /// the same number.
    pub fn wait(&self, adapter: &dyn SourceAdapter, number: u64) -> SiloResult<()> {
        let collection = adapter.collection();
        let started = Instant::now();
        loop {
            match self.api.status(collection, number) {
                Ok(report) => match adapter.interpret_status(&report.status) {
                    RemoteStatus::Completed => {
                        info!(
                            "extract {}:{} completed after {:?}",
                            collection,
                            number,
                            started.elapsed()
                        );
                        return Ok(());
                    }
                    RemoteStatus::Failed(status) => {
                        return Err(SiloError::RemoteJobFailure {
                            extract_id: format!("{collection}:{number}"),
                            status,
                        });
                    }
                    RemoteStatus::Queued | RemoteStatus::Running => {
                        debug!(
                            "extract {}:{} still processing ({})",
                            collection, number, report.status
                        );
                    }
                    RemoteStatus::Unrecognized(status) => {
                        warn!(
                            "extract {}:{} reported unrecognized status {:?}; continuing to poll",
                            collection, number, status
                        );
                    }
                },
                Err(e @ (SiloError::Http(_) | SiloError::Io(_))) => {
                    warn!(
                        "transient error polling extract {}:{} ({}); retrying",
                        collection, number, e
                    );
                }
                Err(other) => return Err(other),
            }

            if started.elapsed() >= self.poll.timeout {
                return Err(SiloError::PollingTimeout {
                    extract_id: format!("{collection}:{number}"),
                    waited: started.elapsed(),
                });
            }
            thread::sleep(self.poll.interval);
        }
    }

    /// Download all artifacts of a completed extract into `dest` and
    /// classify each by filename convention. Fails if nothing matches the
    /// primary-data pattern.
    pub fn download(
        &self,
        adapter: &dyn SourceAdapter,
        number: u64,
        dest: &Path,
    ) -> SiloResult<RoleMap> {
        let collection = adapter.collection();
        let paths = self.api.download(collection, number, dest)?;

        let mut files = RoleMap::new();
        for path in &paths {
            match classify_role(path) {
                Some(role) => {
                    if files.insert(role, path.clone()).is_some() {
                        warn!(
                            "extract {}:{} delivered more than one {} file; keeping {}",
                            collection,
                            number,
                            role.as_str(),
                            path.display()
                        );
                    }
                }
                None => debug!(
                    "ignoring unclassified artifact {} for extract {}:{}",
                    path.display(),
                    collection,
                    number
                ),
            }
        }

        if !files.contains_key(&FileRole::Data) {
            return Err(SiloError::Download {
                extract_id: format!("{collection}:{number}"),
                reason: format!(
                    "no file matching the primary data pattern among {} downloaded artifacts",
                    paths.len()
                ),
            });
        }
        Ok(files)
    }
}

/// Classify an artifact by filename convention; the remote service does not
/// label roles.
fn classify_role(path: &Path) -> Option<FileRole> {
    let name = path.file_name()?.to_string_lossy();
    if DATA_RE.is_match(&name) {
        Some(FileRole::Data)
    } else if CODEBOOK_RE.is_match(&name) {
        Some(FileRole::Codebook)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Scripted fake for tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod fake {
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::fs;
    use std::io;
    use std::path::{Path, PathBuf};

    use serde_json::Value;

    use crate::client::api::{ExtractApi, StatusReport, SubmitReceipt};
    use crate::errors::{SiloError, SiloResult};

    /// One scripted poll response.
    pub(crate) enum Step {
        Status(&'static str),
        TransientError,
    }

    /// In-process `ExtractApi` with a scripted status sequence and call
    /// counters. Single-threaded by design, like the real client.
    pub(crate) struct FakeApi {
        pub number: Option<u64>,
        pub steps: RefCell<VecDeque<Step>>,
        /// Reported once the scripted steps run out.
        pub final_status: &'static str,
        /// Artifact filenames materialized by `download`.
        pub artifacts: Vec<&'static str>,
        pub submits: Cell<usize>,
        pub polls: Cell<usize>,
        pub downloads: Cell<usize>,
    }

    impl Default for FakeApi {
        fn default() -> Self {
            Self {
                number: Some(12345),
                steps: RefCell::new(VecDeque::new()),
                final_status: "completed",
                artifacts: vec!["usa_00012.dat.gz", "usa_00012.xml"],
                submits: Cell::new(0),
                polls: Cell::new(0),
                downloads: Cell::new(0),
            }
        }
    }

    impl FakeApi {
        pub fn scripted(steps: Vec<Step>) -> Self {
            Self {
                steps: RefCell::new(steps.into()),
                ..Self::default()
            }
        }
    }

    impl ExtractApi for FakeApi {
        fn submit(&self, _collection: &str, _body: &Value) -> SiloResult<SubmitReceipt> {
            self.submits.set(self.submits.get() + 1);
            Ok(SubmitReceipt {
                number: self.number,
            })
        }

        fn status(&self, _collection: &str, _number: u64) -> SiloResult<StatusReport> {
            self.polls.set(self.polls.get() + 1);
            match self.steps.borrow_mut().pop_front() {
                Some(Step::Status(status)) => Ok(StatusReport {
                    status: status.to_string(),
                }),
                Some(Step::TransientError) => Err(SiloError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "connection reset by peer",
                ))),
                None => Ok(StatusReport {
                    status: self.final_status.to_string(),
                }),
            }
        }

        fn download(&self, _collection: &str, _number: u64, dest: &Path) -> SiloResult<Vec<PathBuf>> {
            self.downloads.set(self.downloads.get() + 1);
            fs::create_dir_all(dest)?;
            let mut paths = Vec::new();
            for name in &self.artifacts {
                let path = dest.join(name);
                fs::write(&path, b"artifact")?;
                paths.push(path);
            }
            Ok(paths)
        }
    }
}
