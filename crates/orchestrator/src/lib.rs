//! Client for the remote workflow orchestrator.
//!
//! Wraps the orchestrator's REST API and builds the console's job
//! lifecycle on top of it:
//!
//! - [`api`] -- HTTP client and the [`Orchestrator`](api::Orchestrator) seam.
//! - [`upload`] -- reference-data CSV uploads.
//! - [`trigger`] -- fire-and-forget job start requests.
//! - [`poller`] -- one-shot run history fetches.
//! - [`controller`] -- trigger-then-poll state machine, one loop per job.
//! - [`session`] -- cancellable handles for running poll loops.

pub mod api;
pub mod config;
pub mod controller;
pub mod poller;
pub mod session;
pub mod trigger;
pub mod upload;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use api::{ApiError, Dataset, Orchestrator, OrchestratorApi};
pub use config::OrchestratorConfig;
pub use controller::{JobPhase, NoRefresh, PollController, PollError, ResultRefresh};
pub use poller::{StatusError, StatusPoller};
pub use session::PollHandle;
pub use trigger::{JobTrigger, TriggerAck, TriggerError};
pub use upload::{UploadDispatcher, UploadError, UploadFile};
