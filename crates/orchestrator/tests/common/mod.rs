//! Shared helpers for orchestrator integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use portfina_core::runs::JobStatusSnapshot;
use portfina_events::{Notification, NotificationLevel, NotificationSink};
use portfina_orchestrator::{OrchestratorApi, OrchestratorConfig, ResultRefresh};
use serde_json::json;
use wiremock::MockServer;

/// Poll interval short enough for real-time tests.
pub const TEST_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Default)]
pub struct RecordingSink {
    notes: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn snapshot(&self) -> Vec<Notification> {
        self.notes.lock().unwrap().clone()
    }

    pub fn count(&self, level: NotificationLevel) -> usize {
        self.notes
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.level == level)
            .count()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.notes.lock().unwrap().push(notification);
    }
}

#[derive(Default)]
pub struct CountingRefresh {
    calls: AtomicUsize,
}

impl CountingRefresh {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResultRefresh for CountingRefresh {
    async fn refresh(&self, _snapshot: &JobStatusSnapshot) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn config_for(server: &MockServer) -> OrchestratorConfig {
    OrchestratorConfig::new(server.uri())
        .with_poll_interval(TEST_INTERVAL)
        .with_request_timeout(Duration::from_secs(2))
}

pub fn api_for(server: &MockServer) -> Arc<OrchestratorApi> {
    Arc::new(OrchestratorApi::new(&config_for(server)).expect("client should build"))
}

/// A status body with one run in `state`.
pub fn status_body(state: &str) -> serde_json::Value {
    json!({
        "dag_runs": [
            {
                "execution_date": "2025-03-01T08:00:00+00:00",
                "state": "success",
                "end_date": "2025-03-01T08:03:00+00:00"
            },
            {
                "execution_date": "2025-03-01T10:00:00+00:00",
                "state": state,
                "end_date": null
            }
        ],
        "total_entries": 2
    })
}
