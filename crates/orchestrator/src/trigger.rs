//! Fire-and-forget job start requests.
//!
//! A trigger only asks the orchestrator to start a job. Acceptance says
//! nothing about whether the run has begun; completion is tracked
//! separately by polling the run history.

use std::sync::Arc;

use portfina_core::catalog::Catalog;
use portfina_core::types::Timestamp;
use portfina_events::{Notification, NotificationSink};

use crate::api::{ApiError, Orchestrator};

/// Advisory acknowledgment of an accepted trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerAck {
    pub job_key: String,
    pub accepted_at: Timestamp,
}

/// Errors from [`JobTrigger`].
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    /// The job is not in the configured job catalog.
    #[error("Unknown job key: {0}")]
    UnknownJob(String),

    /// The trigger request failed (transport or non-2xx).
    #[error("Failed to trigger {job_key}: {source}")]
    Failed {
        job_key: String,
        #[source]
        source: ApiError,
    },
}

/// Starts orchestrator jobs.
#[derive(Clone)]
pub struct JobTrigger {
    api: Arc<dyn Orchestrator>,
    jobs: Catalog,
    sink: Arc<dyn NotificationSink>,
}

impl JobTrigger {
    pub fn new(api: Arc<dyn Orchestrator>, jobs: Catalog, sink: Arc<dyn NotificationSink>) -> Self {
        Self { api, jobs, sink }
    }

    pub fn jobs(&self) -> &Catalog {
        &self.jobs
    }

    /// Trigger a job and report the outcome to the notification sink.
    pub async fn trigger(&self, job_key: &str) -> Result<TriggerAck, TriggerError> {
        match self.send(job_key).await {
            Ok(ack) => {
                self.sink.notify(
                    Notification::success(format!("{job_key} triggered successfully")).about(job_key),
                );
                Ok(ack)
            }
            Err(e) => {
                self.sink
                    .notify(Notification::error(format!("Failed to trigger {job_key}")).about(job_key));
                Err(e)
            }
        }
    }

    /// Trigger a job without notifying. Callers report the outcome.
    pub async fn send(&self, job_key: &str) -> Result<TriggerAck, TriggerError> {
        if !self.jobs.contains(job_key) {
            return Err(TriggerError::UnknownJob(job_key.to_string()));
        }

        match self.api.trigger_job(job_key).await {
            Ok(()) => {
                tracing::info!(job_key, "Job trigger accepted");
                Ok(TriggerAck {
                    job_key: job_key.to_string(),
                    accepted_at: chrono::Utc::now(),
                })
            }
            Err(e) => {
                tracing::error!(job_key, error = %e, "Job trigger failed");
                Err(TriggerError::Failed {
                    job_key: job_key.to_string(),
                    source: e,
                })
            }
        }
    }
}
