//! End-to-end poll controller behaviour against a mock orchestrator.
//!
//! Uses a 50 ms poll interval and real time.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use common::{api_for, config_for, status_body, CountingRefresh, RecordingSink, TEST_INTERVAL};
use portfina_events::NotificationLevel;
use portfina_orchestrator::{JobPhase, PollController, PollError};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JOB: &str = "bond_enrichment_dag";
const WAIT_LIMIT: Duration = Duration::from_secs(5);

fn controller(server: &MockServer) -> (PollController, Arc<RecordingSink>, Arc<CountingRefresh>) {
    let sink = Arc::new(RecordingSink::default());
    let refresh = Arc::new(CountingRefresh::default());
    let controller =
        PollController::new(api_for(server), &config_for(server), sink.clone(), refresh.clone());
    (controller, sink, refresh)
}

async fn mount_trigger(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path(format!("/trigger/{JOB}")))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

async fn status_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == format!("/status/{JOB}"))
        .count()
}

// ---------------------------------------------------------------------------
// Test: three running polls, then success
// ---------------------------------------------------------------------------

#[tokio::test]
async fn running_three_times_then_success() {
    let server = MockServer::start().await;
    mount_trigger(&server, 200).await;
    Mock::given(method("GET"))
        .and(path(format!("/status/{JOB}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("running")))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/status/{JOB}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("success")))
        .expect(1)
        .mount(&server)
        .await;

    let (controller, sink, refresh) = controller(&server);
    let handle = controller.start(JOB).await.unwrap();
    tokio::time::timeout(WAIT_LIMIT, handle.wait()).await.expect("job should settle");

    tokio::time::sleep(TEST_INTERVAL * 3).await;
    assert_eq!(status_requests(&server).await, 4);
    assert_eq!(refresh.calls(), 1);
    assert_eq!(sink.count(NotificationLevel::Success), 1);
    assert_eq!(sink.count(NotificationLevel::Error), 0);
    assert_eq!(controller.phase(JOB).await, JobPhase::Idle);
}

// ---------------------------------------------------------------------------
// Test: first poll reports failure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_run_stops_polling() {
    let server = MockServer::start().await;
    mount_trigger(&server, 200).await;
    Mock::given(method("GET"))
        .and(path(format!("/status/{JOB}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("failed")))
        .expect(1)
        .mount(&server)
        .await;

    let (controller, sink, refresh) = controller(&server);
    let handle = controller.start(JOB).await.unwrap();
    tokio::time::timeout(WAIT_LIMIT, handle.wait()).await.expect("job should settle");

    tokio::time::sleep(TEST_INTERVAL * 3).await;
    assert_eq!(status_requests(&server).await, 1);
    assert_eq!(refresh.calls(), 1);
    let notes = sink.snapshot();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].level, NotificationLevel::Error);
}

// ---------------------------------------------------------------------------
// Test: status endpoint errors are transient
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_errors_do_not_end_the_session() {
    let server = MockServer::start().await;
    mount_trigger(&server, 200).await;
    Mock::given(method("GET"))
        .and(path(format!("/status/{JOB}")))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/status/{JOB}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("success")))
        .mount(&server)
        .await;

    let (controller, sink, _refresh) = controller(&server);
    let handle = controller.start(JOB).await.unwrap();
    tokio::time::timeout(WAIT_LIMIT, handle.wait()).await.expect("job should settle");

    assert_eq!(sink.count(NotificationLevel::Error), 2);
    assert_eq!(sink.count(NotificationLevel::Success), 1);
}

// ---------------------------------------------------------------------------
// Test: unreadable runs beside a terminal run
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unreadable_runs_do_not_block_settling() {
    let server = MockServer::start().await;
    mount_trigger(&server, 200).await;
    Mock::given(method("GET"))
        .and(path(format!("/status/{JOB}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "dag_runs": [
                {"execution_date": "yesterday", "state": "running", "end_date": null},
                {
                    "execution_date": "2025-03-01T10:00:00",
                    "state": "success",
                    "end_date": ""
                }
            ],
            "total_entries": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (controller, sink, refresh) = controller(&server);
    let handle = controller.start(JOB).await.unwrap();
    tokio::time::timeout(WAIT_LIMIT, handle.wait()).await.expect("job should settle");

    assert_eq!(refresh.calls(), 1);
    assert_eq!(sink.count(NotificationLevel::Success), 1);
    assert_eq!(sink.count(NotificationLevel::Error), 0);
}

// ---------------------------------------------------------------------------
// Test: trigger rejection never starts a timer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejected_trigger_never_polls() {
    let server = MockServer::start().await;
    mount_trigger(&server, 500).await;

    let (controller, sink, _refresh) = controller(&server);
    let result = controller.start(JOB).await;

    assert_matches!(result, Err(PollError::TriggerFailed(_)));
    tokio::time::sleep(TEST_INTERVAL * 3).await;
    assert_eq!(status_requests(&server).await, 0);
    assert_eq!(sink.count(NotificationLevel::Error), 1);
}

// ---------------------------------------------------------------------------
// Test: teardown while polling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn teardown_stops_callbacks() {
    let server = MockServer::start().await;
    mount_trigger(&server, 200).await;
    Mock::given(method("GET"))
        .and(path(format!("/status/{JOB}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("running")))
        .mount(&server)
        .await;

    let (controller, sink, refresh) = controller(&server);
    let handle = controller.start(JOB).await.unwrap();
    tokio::time::sleep(TEST_INTERVAL * 2 + TEST_INTERVAL / 2).await;

    controller.shutdown().await;
    assert!(handle.is_finished());
    // Let a request that was already on the wire reach the server.
    tokio::time::sleep(TEST_INTERVAL / 5).await;
    let polls_at_teardown = status_requests(&server).await;
    let notes_at_teardown = sink.snapshot().len();

    tokio::time::sleep(TEST_INTERVAL * 4).await;
    assert_eq!(status_requests(&server).await, polls_at_teardown);
    assert_eq!(sink.snapshot().len(), notes_at_teardown);
    assert_eq!(refresh.calls(), 0);
}
