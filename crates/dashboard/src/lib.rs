//! Portfina operator console library crate.
//!
//! View state and configuration for the console, exposed for the
//! binary entrypoint in `main.rs` and for integration testing.

pub mod cli;
pub mod config;
pub mod enrichment;
pub mod jobs;
pub mod table;
pub mod uploads;
