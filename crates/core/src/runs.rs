//! Job runs as reported by the orchestrator, and per-poll status
//! snapshots.
//!
//! Run states are orchestrator-defined strings. Only `success` and
//! `failed` are terminal; every other value, including states this code
//! has never seen, keeps a watcher polling.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// RunState
// ---------------------------------------------------------------------------

pub const RUN_STATE_QUEUED: &str = "queued";
pub const RUN_STATE_RUNNING: &str = "running";
pub const RUN_STATE_SUCCESS: &str = "success";
pub const RUN_STATE_FAILED: &str = "failed";

/// State of a single run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunState {
    Queued,
    Running,
    Success,
    Failed,
    /// Any state string not listed above, kept verbatim.
    Other(String),
}

impl RunState {
    /// Whether no further progress is expected for a run in this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Success | RunState::Failed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            RunState::Queued => RUN_STATE_QUEUED,
            RunState::Running => RUN_STATE_RUNNING,
            RunState::Success => RUN_STATE_SUCCESS,
            RunState::Failed => RUN_STATE_FAILED,
            RunState::Other(s) => s,
        }
    }
}

impl From<String> for RunState {
    fn from(s: String) -> Self {
        match s.as_str() {
            RUN_STATE_QUEUED => RunState::Queued,
            RUN_STATE_RUNNING => RunState::Running,
            RUN_STATE_SUCCESS => RunState::Success,
            RUN_STATE_FAILED => RunState::Failed,
            _ => RunState::Other(s),
        }
    }
}

impl From<RunState> for String {
    fn from(state: RunState) -> Self {
        match state {
            RunState::Other(s) => s,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// One execution attempt of a named job.
///
/// `execution_date` accepts RFC 3339 or an offset-less timestamp, read as
/// UTC. An `end_date` that cannot be read decodes as `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    #[serde(rename = "execution_date", deserialize_with = "deserialize_timestamp")]
    pub execution_timestamp: Timestamp,
    pub state: RunState,
    #[serde(
        rename = "end_date",
        default,
        deserialize_with = "deserialize_lenient_timestamp"
    )]
    pub end_timestamp: Option<Timestamp>,
}

impl Run {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Wire shape of `GET /status/{job_key}`.
///
/// Runs that cannot be decoded are skipped with a warning; the rest of
/// the history is kept.
#[derive(Debug, Clone, Deserialize)]
pub struct DagRunsResponse {
    #[serde(default, deserialize_with = "deserialize_runs")]
    pub dag_runs: Vec<Run>,
    #[serde(default)]
    pub total_entries: u64,
}

// ---------------------------------------------------------------------------
// JobStatusSnapshot
// ---------------------------------------------------------------------------

/// The runs of one job as observed by a single poll.
///
/// Built fresh on every poll and never mutated afterwards; the next poll
/// produces a new snapshot that supersedes this one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatusSnapshot {
    pub job_key: String,
    /// Every run returned by the orchestrator, in delivery order.
    pub runs: Vec<Run>,
    /// The run with the greatest execution timestamp, if any.
    pub latest_run: Option<Run>,
    pub total_entries: u64,
    pub observed_at: Timestamp,
}

impl JobStatusSnapshot {
    pub fn from_response(job_key: impl Into<String>, response: DagRunsResponse) -> Self {
        let mut snapshot = Self::from_runs(job_key, response.dag_runs);
        snapshot.total_entries = snapshot.total_entries.max(response.total_entries);
        snapshot
    }

    /// Build a snapshot from an unordered set of runs.
    pub fn from_runs(job_key: impl Into<String>, runs: Vec<Run>) -> Self {
        let latest_run = latest_run(&runs).cloned();
        Self {
            job_key: job_key.into(),
            total_entries: runs.len() as u64,
            runs,
            latest_run,
            observed_at: chrono::Utc::now(),
        }
    }

    /// True once the latest run has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.latest_run.as_ref().is_some_and(Run::is_terminal)
    }
}

/// Parse an orchestrator timestamp.
///
/// Accepts RFC 3339, and `YYYY-MM-DDTHH:MM:SS[.fff]` (or with a space
/// separator) without an offset, which is taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Timestamp, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp {raw:?}")))
}

fn deserialize_lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Timestamp>, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(Value::as_str).and_then(parse_timestamp))
}

fn deserialize_runs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Run>, D::Error> {
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<Run>(value) {
            Ok(run) => Some(run),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable run");
                None
            }
        })
        .collect())
}

/// Select the run with the maximum execution timestamp.
///
/// Ties keep the first run encountered. Returns `None` for an empty set.
pub fn latest_run(runs: &[Run]) -> Option<&Run> {
    runs.iter().fold(None, |best: Option<&Run>, run| match best {
        Some(b) if b.execution_timestamp >= run.execution_timestamp => Some(b),
        _ => Some(run),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
