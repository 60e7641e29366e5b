//! In-memory test doubles.
//!
//! Used by this crate's unit tests, and by downstream crates through the
//! `testing` feature.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use portfina_core::runs::{DagRunsResponse, JobStatusSnapshot, Run, RunState};
use portfina_events::{Notification, NotificationSink};
use serde_json::Value;

use crate::api::{ApiError, Dataset, Orchestrator};
use crate::controller::ResultRefresh;
use crate::upload::UploadFile;

/// Collects every notification for later inspection.
#[derive(Default)]
pub struct RecordingSink {
    notes: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.notes.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.notes.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.lock().unwrap().is_empty()
    }

    pub fn messages(&self) -> Vec<String> {
        self.notes
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.message.clone())
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.notes.lock().unwrap().push(notification);
    }
}

/// Orchestrator double answering from per-endpoint queues.
///
/// Empty queues fall back to: upload accepted without message, trigger
/// accepted, an empty run history, and a 404 for datasets.
#[derive(Default)]
pub struct ScriptedOrchestrator {
    uploads: Mutex<VecDeque<Result<Option<String>, ApiError>>>,
    triggers: Mutex<VecDeque<Result<(), ApiError>>>,
    statuses: Mutex<VecDeque<Result<DagRunsResponse, ApiError>>>,
    datasets: Mutex<HashMap<&'static str, VecDeque<Result<Value, ApiError>>>>,
    status_delay: Mutex<Duration>,
    uploaded: Mutex<Vec<(String, String)>>,
    upload_calls: AtomicUsize,
    trigger_calls: AtomicUsize,
    status_calls: AtomicUsize,
    dataset_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedOrchestrator {
    pub fn set_upload_result(&self, result: Result<Option<String>, ApiError>) {
        self.uploads.lock().unwrap().push_back(result);
    }

    pub fn push_trigger(&self, result: Result<(), ApiError>) {
        self.triggers.lock().unwrap().push_back(result);
    }

    pub fn push_status(&self, result: Result<DagRunsResponse, ApiError>) {
        self.statuses.lock().unwrap().push_back(result);
    }

    pub fn push_states(&self, states: &[&str]) {
        for state in states {
            self.push_status(Ok(runs_response(&[(10, state)])));
        }
    }

    pub fn push_dataset(&self, dataset: Dataset, result: Result<Value, ApiError>) {
        self.datasets
            .lock()
            .unwrap()
            .entry(dataset.path())
            .or_default()
            .push_back(result);
    }

    pub fn set_status_delay(&self, delay: Duration) {
        *self.status_delay.lock().unwrap() = delay;
    }

    /// `(file key, file name)` of every upload attempt.
    pub fn uploaded(&self) -> Vec<(String, String)> {
        self.uploaded.lock().unwrap().clone()
    }

    pub fn dataset_calls(&self) -> usize {
        self.dataset_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn trigger_calls(&self) -> usize {
        self.trigger_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Orchestrator for ScriptedOrchestrator {
    async fn upload_file(&self, key: &str, file: &UploadFile) -> Result<Option<String>, ApiError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.uploaded
            .lock()
            .unwrap()
            .push((key.to_string(), file.file_name.clone()));
        self.uploads.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }

    async fn trigger_job(&self, _job_key: &str) -> Result<(), ApiError> {
        self.trigger_calls.fetch_add(1, Ordering::SeqCst);
        self.triggers.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn job_runs(&self, _job_key: &str) -> Result<DagRunsResponse, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.status_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(runs_response(&[])))
    }

    async fn dataset(&self, dataset: Dataset) -> Result<Value, ApiError> {
        self.dataset_calls.fetch_add(1, Ordering::SeqCst);
        self.datasets
            .lock()
            .unwrap()
            .get_mut(dataset.path())
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(remote_error(404)))
    }
}

/// Build a status response from `(hour, state)` pairs on a fixed day.
pub fn runs_response(runs: &[(u32, &str)]) -> DagRunsResponse {
    let dag_runs: Vec<Run> = runs
        .iter()
        .map(|(hour, state)| Run {
            execution_timestamp: Utc.with_ymd_and_hms(2025, 3, 1, *hour, 0, 0).unwrap(),
            state: RunState::from(state.to_string()),
            end_timestamp: None,
        })
        .collect();
    DagRunsResponse {
        total_entries: dag_runs.len() as u64,
        dag_runs,
    }
}

pub fn remote_error(status: u16) -> ApiError {
    ApiError::Remote {
        status,
        body: "unavailable".into(),
    }
}

/// Counts result refreshes and per-tick snapshots, remembering the last
/// state seen by each.
#[derive(Default)]
pub struct CountingRefresh {
    calls: AtomicUsize,
    observed: AtomicUsize,
    last_state: Mutex<Option<RunState>>,
    last_observed_state: Mutex<Option<RunState>>,
}

impl CountingRefresh {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_state(&self) -> Option<RunState> {
        self.last_state.lock().unwrap().clone()
    }

    pub fn observed(&self) -> usize {
        self.observed.load(Ordering::SeqCst)
    }

    pub fn last_observed_state(&self) -> Option<RunState> {
        self.last_observed_state.lock().unwrap().clone()
    }
}

fn latest_state(snapshot: &JobStatusSnapshot) -> Option<RunState> {
    snapshot.latest_run.as_ref().map(|r| r.state.clone())
}

#[async_trait]
impl ResultRefresh for CountingRefresh {
    async fn refresh(&self, snapshot: &JobStatusSnapshot) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_state.lock().unwrap() = latest_state(snapshot);
    }

    async fn on_snapshot(&self, snapshot: &JobStatusSnapshot) {
        self.observed.fetch_add(1, Ordering::SeqCst);
        *self.last_observed_state.lock().unwrap() = latest_state(snapshot);
    }
}
