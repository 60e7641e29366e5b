//! One-shot run history fetches.
//!
//! [`StatusPoller::fetch_status`] performs a single request and never
//! retries; the poll controller decides whether a failure ends its loop.

use std::sync::Arc;

use portfina_core::catalog::Catalog;
use portfina_core::runs::JobStatusSnapshot;
use portfina_events::{Notification, NotificationSink};

use crate::api::{ApiError, Orchestrator};

/// Errors from [`StatusPoller`].
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("Unknown job key: {0}")]
    UnknownJob(String),

    #[error("Failed to fetch status for {job_key}: {source}")]
    Fetch {
        job_key: String,
        #[source]
        source: ApiError,
    },
}

/// Fetches a job's run history and turns it into a snapshot.
#[derive(Clone)]
pub struct StatusPoller {
    api: Arc<dyn Orchestrator>,
    jobs: Catalog,
    sink: Arc<dyn NotificationSink>,
}

impl StatusPoller {
    pub fn new(api: Arc<dyn Orchestrator>, jobs: Catalog, sink: Arc<dyn NotificationSink>) -> Self {
        Self { api, jobs, sink }
    }

    /// Fetch the run history once and build a fresh snapshot.
    pub async fn fetch_status(&self, job_key: &str) -> Result<JobStatusSnapshot, StatusError> {
        let response = self
            .api
            .job_runs(job_key)
            .await
            .map_err(|source| StatusError::Fetch {
                job_key: job_key.to_string(),
                source,
            })?;

        let snapshot = JobStatusSnapshot::from_response(job_key, response);
        tracing::debug!(
            job_key,
            runs = snapshot.runs.len(),
            latest_state = snapshot.latest_run.as_ref().map(|r| r.state.as_str()),
            "Fetched job status",
        );
        Ok(snapshot)
    }

    /// Fetch once on operator request, reporting the outcome.
    pub async fn check_status(&self, job_key: &str) -> Result<JobStatusSnapshot, StatusError> {
        if !self.jobs.contains(job_key) {
            return Err(StatusError::UnknownJob(job_key.to_string()));
        }

        match self.fetch_status(job_key).await {
            Ok(snapshot) => {
                self.sink.notify(
                    Notification::success(format!("Fetched status for {job_key}")).about(job_key),
                );
                Ok(snapshot)
            }
            Err(e) => {
                tracing::warn!(job_key, error = %e, "Status check failed");
                self.sink.notify(
                    Notification::error(format!("Failed to fetch status for {job_key}"))
                        .about(job_key),
                );
                Err(e)
            }
        }
    }
}
