//! Trigger-then-poll controller for orchestrator jobs.
//!
//! [`PollController`] starts a job, then samples its run history on a
//! fixed interval until the latest run reaches a terminal state. Each
//! job key moves through
//!
//! ```text
//! Idle -> Triggering -> Polling -> Settled -> Idle
//! ```
//!
//! and at most one session exists per job key at any time. Every stored
//! snapshot is handed to [`ResultRefresh::on_snapshot`]. On settle the
//! controller runs exactly one [`ResultRefresh::refresh`] and then
//! notifies the operator. Poll failures are reported and the loop keeps going; there
//! is no timeout, so a job that never settles is polled until it is
//! stopped or the controller is torn down.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use portfina_core::catalog::Catalog;
use portfina_core::runs::{JobStatusSnapshot, Run, RunState};
use portfina_events::{Notification, NotificationSink};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::api::Orchestrator;
use crate::config::{effective_poll_interval, OrchestratorConfig};
use crate::poller::StatusPoller;
use crate::session::PollHandle;
use crate::trigger::{JobTrigger, TriggerError};

/// Upper bound on waiting for a poll task to exit during teardown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a job key is in the trigger/poll lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    /// No session exists.
    Idle,
    /// The trigger request is in flight.
    Triggering,
    /// The job was accepted and its status is being sampled.
    Polling,
    /// The latest run is terminal and the result refresh is running.
    Settled,
}

/// Downstream re-fetch of derived results once a job settles.
#[async_trait]
pub trait ResultRefresh: Send + Sync {
    /// Called exactly once per settled session with the snapshot that
    /// showed the terminal run.
    async fn refresh(&self, snapshot: &JobStatusSnapshot);

    /// Called with every snapshot the poll loop stores, terminal or not.
    /// Stale snapshots are not passed on.
    async fn on_snapshot(&self, _snapshot: &JobStatusSnapshot) {}
}

/// A [`ResultRefresh`] that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRefresh;

#[async_trait]
impl ResultRefresh for NoRefresh {
    async fn refresh(&self, _snapshot: &JobStatusSnapshot) {}
}

/// Errors from [`PollController::start`].
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("Unknown job key: {0}")]
    UnknownJob(String),

    #[error("{0} is already being watched")]
    AlreadyActive(String),

    #[error(transparent)]
    TriggerFailed(#[from] TriggerError),

    #[error("Watch of {0} was stopped before the job was accepted")]
    Stopped(String),
}

/// Live state of one watched job.
struct PollSession {
    /// Distinguishes this session from earlier ones for the same key.
    generation: u64,
    phase: JobPhase,
    handle: PollHandle,
    task: Option<JoinHandle<()>>,
    last_snapshot: Option<JobStatusSnapshot>,
}

/// Outcome of storing a freshly polled snapshot.
enum Recorded {
    Stored,
    /// Older than the stored snapshot; discarded.
    Stale,
    /// The session was stopped or replaced.
    Gone,
}

/// Orchestrates trigger, status polling, and result refresh per job.
///
/// Dropping the controller cancels every poll loop. Call
/// [`shutdown`](Self::shutdown) to also wait for them to exit.
pub struct PollController {
    inner: Arc<Inner>,
}

struct Inner {
    trigger: JobTrigger,
    poller: StatusPoller,
    jobs: Catalog,
    interval: Duration,
    sink: Arc<dyn NotificationSink>,
    refresh: Arc<dyn ResultRefresh>,
    sessions: RwLock<HashMap<String, PollSession>>,
    next_generation: AtomicU64,
    /// Master cancellation token; every session token is a child.
    cancel: CancellationToken,
}

impl PollController {
    pub fn new(
        api: Arc<dyn Orchestrator>,
        config: &OrchestratorConfig,
        sink: Arc<dyn NotificationSink>,
        refresh: Arc<dyn ResultRefresh>,
    ) -> Self {
        let trigger = JobTrigger::new(Arc::clone(&api), config.jobs.clone(), Arc::clone(&sink));
        let poller = StatusPoller::new(api, config.jobs.clone(), Arc::clone(&sink));

        Self {
            inner: Arc::new(Inner {
                trigger,
                poller,
                jobs: config.jobs.clone(),
                interval: effective_poll_interval(config.poll_interval),
                sink,
                refresh,
                sessions: RwLock::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// Trigger `job_key` and start polling it.
    ///
    /// Rejected with a warning if the job already has a session. On
    /// trigger failure no session remains and no timer is started.
    pub async fn start(&self, job_key: &str) -> Result<PollHandle, PollError> {
        if !self.inner.jobs.contains(job_key) {
            self.inner
                .sink
                .notify(Notification::warning(format!("Unknown job {job_key}")).about(job_key));
            return Err(PollError::UnknownJob(job_key.to_string()));
        }

        let (generation, handle, guard) = {
            let mut sessions = self.inner.sessions.write().await;
            if let Some(existing) = sessions.get(job_key) {
                tracing::warn!(job_key, phase = ?existing.phase, "Job already watched, ignoring start");
                self.inner.sink.notify(
                    Notification::warning(format!("{job_key} is already running")).about(job_key),
                );
                return Err(PollError::AlreadyActive(job_key.to_string()));
            }

            let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
            let (handle, guard) = PollHandle::new(job_key, self.inner.cancel.child_token());
            sessions.insert(
                job_key.to_string(),
                PollSession {
                    generation,
                    phase: JobPhase::Triggering,
                    handle: handle.clone(),
                    task: None,
                    last_snapshot: None,
                },
            );
            (generation, handle, guard)
        };

        let triggered = tokio::select! {
            biased;
            _ = handle.token().cancelled() => None,
            result = self.inner.trigger.send(job_key) => Some(result),
        };

        match triggered {
            None => {
                self.inner.remove_session(job_key, generation).await;
                return Err(PollError::Stopped(job_key.to_string()));
            }
            Some(Err(e)) => {
                self.inner.remove_session(job_key, generation).await;
                self.inner.sink.notify(
                    Notification::error(format!("Failed to trigger {job_key}")).about(job_key),
                );
                return Err(e.into());
            }
            Some(Ok(_ack)) => {}
        }

        let inner = Arc::clone(&self.inner);
        let task_handle = handle.clone();
        let key = job_key.to_string();
        let task = tokio::spawn(async move {
            let _guard = guard;
            inner.run_poll_loop(&key, generation, &task_handle).await;
            inner.remove_session(&key, generation).await;
            tracing::debug!(job_key = %key, "Poll task exited");
        });

        if let Some(session) = self
            .inner
            .sessions
            .write()
            .await
            .get_mut(job_key)
            .filter(|s| s.generation == generation)
        {
            session.phase = JobPhase::Polling;
            session.task = Some(task);
        }

        Ok(handle)
    }

    /// Current lifecycle phase of `job_key`.
    pub async fn phase(&self, job_key: &str) -> JobPhase {
        self.inner
            .sessions
            .read()
            .await
            .get(job_key)
            .map_or(JobPhase::Idle, |s| s.phase)
    }

    /// Whether `job_key` has a session in any phase.
    pub async fn is_active(&self, job_key: &str) -> bool {
        self.inner.sessions.read().await.contains_key(job_key)
    }

    /// The most recent snapshot of an active session.
    pub async fn last_snapshot(&self, job_key: &str) -> Option<JobStatusSnapshot> {
        self.inner
            .sessions
            .read()
            .await
            .get(job_key)
            .and_then(|s| s.last_snapshot.clone())
    }

    /// Keys of every job with a session.
    pub async fn active_jobs(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.sessions.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Stop watching one job and wait for its loop to exit.
    ///
    /// Returns `false` if the job had no session.
    pub async fn stop(&self, job_key: &str) -> bool {
        let Some(session) = self.inner.sessions.write().await.remove(job_key) else {
            return false;
        };

        tracing::info!(job_key, phase = ?session.phase, "Stopping job watch");
        session.handle.stop();
        if let Some(task) = session.task {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await.is_err() {
                tracing::warn!(job_key, "Poll task did not stop in time");
            }
        }
        true
    }

    /// Cancel every session and wait for the poll tasks to exit.
    ///
    /// Once this returns no notification, refresh, or snapshot update
    /// from any earlier session will happen.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down poll controller");
        self.inner.cancel.cancel();

        let drained: Vec<(String, PollSession)> =
            self.inner.sessions.write().await.drain().collect();

        let waits = drained.into_iter().filter_map(|(key, session)| {
            session.task.map(|task| async move {
                if tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await.is_err() {
                    tracing::warn!(job_key = %key, "Poll task did not stop in time");
                }
            })
        });
        futures::future::join_all(waits).await;

        tracing::info!("Poll controller shut down complete");
    }
}

impl Drop for PollController {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}

impl Inner {
    /// Sample the job's status until it settles or the session is
    /// cancelled.
    async fn run_poll_loop(&self, job_key: &str, generation: u64, handle: &PollHandle) {
        let cancel = handle.token();
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            job_key,
            interval_ms = self.interval.as_millis() as u64,
            "Polling job status",
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(job_key, "Poll loop cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }

            // Fetched inside the loop body, so a tick never starts while
            // the previous fetch is outstanding.
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(job_key, "Poll loop cancelled during fetch");
                    return;
                }
                result = self.poller.fetch_status(job_key) => result,
            };

            let snapshot = match result {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!(job_key, error = %e, "Status poll failed, retrying next tick");
                    self.sink.notify(
                        Notification::error(format!("Failed to poll {job_key} status"))
                            .about(job_key),
                    );
                    continue;
                }
            };

            match self.record_snapshot(job_key, generation, &snapshot).await {
                Recorded::Stored => {}
                Recorded::Stale => continue,
                Recorded::Gone => return,
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(job_key, "Poll loop cancelled while publishing snapshot");
                    return;
                }
                _ = self.refresh.on_snapshot(&snapshot) => {}
            }

            if let Some(run) = snapshot.latest_run.clone().filter(Run::is_terminal) {
                self.settle(job_key, generation, cancel, &snapshot, &run).await;
                return;
            }
        }
    }

    async fn record_snapshot(
        &self,
        job_key: &str,
        generation: u64,
        snapshot: &JobStatusSnapshot,
    ) -> Recorded {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions
            .get_mut(job_key)
            .filter(|s| s.generation == generation)
        else {
            return Recorded::Gone;
        };

        if is_stale(session.last_snapshot.as_ref(), snapshot) {
            tracing::debug!(job_key, "Discarding snapshot older than the stored one");
            return Recorded::Stale;
        }

        session.last_snapshot = Some(snapshot.clone());
        Recorded::Stored
    }

    /// Run the result refresh, then report the outcome.
    async fn settle(
        &self,
        job_key: &str,
        generation: u64,
        cancel: &CancellationToken,
        snapshot: &JobStatusSnapshot,
        run: &Run,
    ) {
        if let Some(session) = self
            .sessions
            .write()
            .await
            .get_mut(job_key)
            .filter(|s| s.generation == generation)
        {
            session.phase = JobPhase::Settled;
        }
        tracing::info!(job_key, state = %run.state, "Job reached terminal state");

        let refreshed = tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = self.refresh.refresh(snapshot) => true,
        };
        if !refreshed {
            tracing::info!(job_key, "Torn down during result refresh, skipping notification");
            return;
        }

        let label = self.jobs.label(job_key).unwrap_or(job_key);
        let notification = match run.state {
            RunState::Success => Notification::success(format!("{label} completed successfully!")),
            _ => Notification::error(format!("{label} failed. Please check logs.")),
        };
        self.sink.notify(notification.about(job_key));
    }

    async fn remove_session(&self, job_key: &str, generation: u64) {
        let mut sessions = self.sessions.write().await;
        if sessions
            .get(job_key)
            .is_some_and(|s| s.generation == generation)
        {
            sessions.remove(job_key);
        }
    }
}

/// A snapshot is stale when its latest run predates the stored one's.
fn is_stale(previous: Option<&JobStatusSnapshot>, next: &JobStatusSnapshot) -> bool {
    let previous = previous
        .and_then(|s| s.latest_run.as_ref())
        .map(|r| r.execution_timestamp);
    let next = next.latest_run.as_ref().map(|r| r.execution_timestamp);
    matches!((previous, next), (Some(p), Some(n)) if n < p)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
