//! Integration tests for the HTTP client and the upload/trigger/status
//! operations against a mock orchestrator.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use common::{api_for, status_body, RecordingSink};
use portfina_core::catalog::Catalog;
use portfina_core::records::decode_records;
use portfina_core::runs::RunState;
use portfina_events::NotificationLevel;
use portfina_orchestrator::{
    ApiError, Dataset, JobTrigger, Orchestrator, OrchestratorApi, OrchestratorConfig, StatusError, StatusPoller, TriggerError,
    UploadDispatcher, UploadError, UploadFile,
};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upload_sends_multipart_file_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/bond"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .and(body_string_contains("name=\"file\""))
        .and(body_string_contains("filename=\"bonds.csv\""))
        .and(body_string_contains("id,type,maturity_date"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "message": "bond.csv ingested" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let dispatcher = UploadDispatcher::new(api_for(&server), Catalog::default_files(), sink.clone());
    let file = UploadFile::new("bonds.csv", "id,type,maturity_date\nB1,fixed,2030-01-01\n");

    let message = dispatcher.upload("bond", Some(&file)).await.unwrap();

    assert_eq!(message, "bond.csv ingested");
    assert_eq!(sink.count(NotificationLevel::Success), 1);
}

#[tokio::test]
async fn upload_without_file_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let dispatcher = UploadDispatcher::new(api_for(&server), Catalog::default_files(), sink.clone());

    let result = dispatcher.upload("bond", None).await;

    assert_matches!(result, Err(UploadError::MissingFile(_)));
    let notes = sink.snapshot();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].level, NotificationLevel::Warning);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn upload_error_status_is_reported_generically() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/interestrate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Traceback ..."))
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let dispatcher = UploadDispatcher::new(api_for(&server), Catalog::default_files(), sink.clone());
    let file = UploadFile::new("rates.csv", "date,rate\n");

    let result = dispatcher.upload("interestrate", Some(&file)).await;

    assert_matches!(
        result,
        Err(UploadError::Failed { source: ApiError::Remote { status: 500, .. }, .. })
    );
    assert_eq!(sink.snapshot()[0].message, "Upload failed");
}

#[tokio::test]
async fn upload_non_json_success_uses_default_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/forwardcurve"))
        .respond_with(ResponseTemplate::new(201).set_body_string("ok"))
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let dispatcher = UploadDispatcher::new(api_for(&server), Catalog::default_files(), sink);
    let file = UploadFile::new("curve.csv", "tenor,rate\n");

    let message = dispatcher.upload("forwardcurve", Some(&file)).await.unwrap();

    assert_eq!(message, "Upload success!");
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn trigger_posts_to_job_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/trigger/inflation_index_dag"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "dag_run_id": "manual__1" })))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let trigger = JobTrigger::new(api_for(&server), Catalog::default_jobs(), sink.clone());

    let ack = trigger.trigger("inflation_index_dag").await.unwrap();

    assert_eq!(ack.job_key, "inflation_index_dag");
    assert_eq!(sink.count(NotificationLevel::Success), 1);
}

#[tokio::test]
async fn trigger_rejection_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/trigger/exchange_rate_dag"))
        .respond_with(ResponseTemplate::new(409).set_body_string("already queued"))
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let trigger = JobTrigger::new(api_for(&server), Catalog::default_jobs(), sink.clone());

    let result = trigger.trigger("exchange_rate_dag").await;

    assert_matches!(
        result,
        Err(TriggerError::Failed { source: ApiError::Remote { status: 409, .. }, .. })
    );
    assert_eq!(sink.count(NotificationLevel::Error), 1);
}

#[tokio::test]
async fn unreachable_orchestrator_is_a_transport_error() {
    // Nothing listens on port 1.
    let api = OrchestratorApi::new(&OrchestratorConfig::new("http://127.0.0.1:1")).unwrap();

    let result = api.trigger_job("bond_ingestion_dag").await;

    assert_matches!(result, Err(ApiError::Transport(_)));
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_fetch_builds_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status/forward_curve_dag"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("running")))
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let poller = StatusPoller::new(api_for(&server), Catalog::default_jobs(), sink);

    let snapshot = poller.fetch_status("forward_curve_dag").await.unwrap();

    assert_eq!(snapshot.job_key, "forward_curve_dag");
    assert_eq!(snapshot.runs.len(), 2);
    assert_eq!(snapshot.latest_run.unwrap().state, RunState::Running);
}

#[tokio::test]
async fn malformed_status_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status/forward_curve_dag"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let poller = StatusPoller::new(api_for(&server), Catalog::default_jobs(), sink);

    let result = poller.fetch_status("forward_curve_dag").await;

    assert_matches!(result, Err(StatusError::Fetch { source: ApiError::Decode(_), .. }));
}

// ---------------------------------------------------------------------------
// Datasets
// ---------------------------------------------------------------------------

#[tokio::test]
async fn datasets_decode_both_shapes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bonds"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "columns": ["id", "type", "notional"],
            "rows": [["B1", "fixed", 1000000], ["B2", "linker", 500000]]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bond_results"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "bond_id": "B1", "duration": 4.1, "yield": 0.042, "dirty_price": 101.3 }
        ])))
        .mount(&server)
        .await;

    let api = api_for(&server);

    let bonds = decode_records(&api.dataset(Dataset::Bonds).await.unwrap());
    let results = decode_records(&api.dataset(Dataset::BondResults).await.unwrap());

    assert_eq!(bonds.len(), 2);
    assert_eq!(bonds[1]["type"], "linker");
    assert_eq!(results[0]["bond_id"], "B1");
}
