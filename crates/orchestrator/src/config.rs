use std::time::Duration;

use portfina_core::catalog::Catalog;

/// Default interval between status polls of a watched job.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Shortest accepted poll interval; shorter values are raised to this.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Default HTTP timeout for a single orchestrator request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything the orchestrator client needs at construction.
///
/// Nothing about the deployment is hard-coded in the client: the base
/// URL and the key catalogs always come from here, so tests can point
/// the client at a mock server.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Base HTTP URL, e.g. `http://localhost:8081`.
    pub base_url: String,
    /// Upload file keys accepted by `POST /upload/{key}`.
    pub files: Catalog,
    /// Jobs accepted by `POST /trigger/{key}` and `GET /status/{key}`.
    pub jobs: Catalog,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

impl OrchestratorConfig {
    /// Config with the default catalogs and timings.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            files: Catalog::default_files(),
            jobs: Catalog::default_jobs(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Set the poll interval, raised to [`MIN_POLL_INTERVAL`] if shorter.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = effective_poll_interval(interval);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_files(mut self, files: Catalog) -> Self {
        self.files = files;
        self
    }

    pub fn with_jobs(mut self, jobs: Catalog) -> Self {
        self.jobs = jobs;
        self
    }
}

/// Clamp a poll interval to [`MIN_POLL_INTERVAL`], warning when it was
/// too short.
pub(crate) fn effective_poll_interval(interval: Duration) -> Duration {
    if interval < MIN_POLL_INTERVAL {
        tracing::warn!(
            requested_ms = interval.as_millis() as u64,
            min_ms = MIN_POLL_INTERVAL.as_millis() as u64,
            "Poll interval too short, using minimum",
        );
        return MIN_POLL_INTERVAL;
    }
    interval
}
