//! Domain types for the Portfina operator console.
//!
//! Pure, I/O-free building blocks shared by the orchestrator client and
//! the dashboard: job runs and status snapshots, columnar payload
//! materialization, and the file/job key catalogs.

pub mod catalog;
pub mod error;
pub mod records;
pub mod runs;
pub mod types;
