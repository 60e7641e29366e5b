//! The job board: every catalog job with its latest known run.

use std::collections::HashMap;

use portfina_core::catalog::Catalog;
use portfina_core::records::Record;
use portfina_core::runs::{JobStatusSnapshot, Run};
use portfina_orchestrator::{JobTrigger, StatusError, StatusPoller, TriggerAck, TriggerError};
use serde_json::Value;

use crate::table::{RowKey, TableView};

const COLUMNS: [&str; 5] = ["job", "label", "state", "execution_date", "end_date"];

/// Catalog jobs with their most recently fetched run.
pub struct JobBoard {
    jobs: Catalog,
    trigger: JobTrigger,
    poller: StatusPoller,
    latest: HashMap<String, Run>,
}

impl JobBoard {
    pub fn new(trigger: JobTrigger, poller: StatusPoller) -> Self {
        Self {
            jobs: trigger.jobs().clone(),
            trigger,
            poller,
            latest: HashMap::new(),
        }
    }

    /// Start `job_key` once, without watching it.
    pub async fn trigger(&self, job_key: &str) -> Result<TriggerAck, TriggerError> {
        self.trigger.trigger(job_key).await
    }

    /// Fetch the run history of `job_key` and remember its latest run.
    ///
    /// A job with no runs keeps whatever run was known before.
    pub async fn fetch_status(&mut self, job_key: &str) -> Result<JobStatusSnapshot, StatusError> {
        let snapshot = self.poller.check_status(job_key).await?;
        self.apply(&snapshot);
        Ok(snapshot)
    }

    /// Fetch every catalog job in turn. Failures are already reported by
    /// the poller, so they only reduce the returned count.
    pub async fn refresh_all(&mut self) -> usize {
        let keys: Vec<String> = self.jobs.entries().iter().map(|e| e.key.clone()).collect();
        let mut fetched = 0;
        for key in keys {
            if self.fetch_status(&key).await.is_ok() {
                fetched += 1;
            }
        }
        fetched
    }

    /// Record a snapshot obtained elsewhere, such as from a poll loop.
    pub fn apply(&mut self, snapshot: &JobStatusSnapshot) {
        if let Some(run) = &snapshot.latest_run {
            self.latest.insert(snapshot.job_key.clone(), run.clone());
        }
    }

    pub fn latest(&self, job_key: &str) -> Option<&Run> {
        self.latest.get(job_key)
    }

    /// One row per catalog job, in catalog order.
    pub fn table(&self) -> TableView {
        let rows = self
            .jobs
            .entries()
            .iter()
            .map(|entry| {
                let mut row = Record::new();
                row.insert("job".into(), Value::from(entry.key.clone()));
                row.insert("label".into(), Value::from(entry.label.clone()));
                if let Some(run) = self.latest.get(&entry.key) {
                    row.insert("state".into(), Value::from(run.state.as_str()));
                    row.insert(
                        "execution_date".into(),
                        Value::from(run.execution_timestamp.to_rfc3339()),
                    );
                    if let Some(end) = run.end_timestamp {
                        row.insert("end_date".into(), Value::from(end.to_rfc3339()));
                    }
                }
                row
            })
            .collect();
        TableView::new(&COLUMNS, rows, RowKey::Column("job".into()))
    }
}
