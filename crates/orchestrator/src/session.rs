//! Cancellable handles for running poll loops.
//!
//! A [`PollHandle`] pairs two [`CancellationToken`]s: `cancel` asks the
//! loop to stop, and `finished` is cancelled by a drop guard held inside
//! the loop task, so it fires however the task exits.

use tokio_util::sync::{CancellationToken, DropGuard};

/// Handle to one job's poll loop.
///
/// Cloning is cheap; every clone controls the same loop.
#[derive(Debug, Clone)]
pub struct PollHandle {
    job_key: String,
    cancel: CancellationToken,
    finished: CancellationToken,
}

impl PollHandle {
    /// Create a handle plus the guard the loop task must hold until it
    /// exits.
    pub(crate) fn new(job_key: &str, cancel: CancellationToken) -> (Self, DropGuard) {
        let finished = CancellationToken::new();
        let guard = finished.clone().drop_guard();
        let handle = Self {
            job_key: job_key.to_string(),
            cancel,
            finished,
        };
        (handle, guard)
    }

    pub fn job_key(&self) -> &str {
        &self.job_key
    }

    /// Ask the loop to stop. Calling this more than once is a no-op.
    ///
    /// The loop drops any in-flight fetch at its next await point. Use
    /// [`wait`](Self::wait) to be sure it has exited.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!(job_key = %self.job_key, "Stopping poll loop");
        }
        self.cancel.cancel();
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether the loop task has exited (settled, stopped, or torn down).
    pub fn is_finished(&self) -> bool {
        self.finished.is_cancelled()
    }

    /// Wait until the loop task has exited.
    pub async fn wait(&self) {
        self.finished.cancelled().await
    }
}
