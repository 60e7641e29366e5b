//! `portfina` -- operator console for the bond analytics orchestrator.
//!
//! Uploads reference-data CSVs, triggers and watches orchestrator jobs,
//! and shows bond enrichment results.
//!
//! # Environment variables
//!
//! | Variable               | Required | Default                 | Description                     |
//! |------------------------|----------|-------------------------|---------------------------------|
//! | `ORCHESTRATOR_URL`     | no       | `http://localhost:8081` | Orchestrator base URL           |
//! | `POLL_INTERVAL_SECS`   | no       | `5`                     | Seconds between status polls    |
//! | `REQUEST_TIMEOUT_SECS` | no       | `30`                    | HTTP request timeout            |
//! | `FILE_KEYS`            | no       | built-in                | Comma-separated upload keys     |
//! | `JOB_KEYS`             | no       | built-in                | Comma-separated job keys        |

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use portfina_dashboard::cli::{Cli, Console};
use portfina_dashboard::config::DashboardConfig;
use portfina_events::TracingSink;
use portfina_orchestrator::OrchestratorApi;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portfina=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = DashboardConfig::from_env().context("Invalid configuration")?;
    if let Some(url) = cli.orchestrator_url {
        config = config.with_orchestrator_url(url)?;
    }

    tracing::info!(
        orchestrator_url = %config.orchestrator_url,
        poll_interval_secs = config.poll_interval_secs,
        "Starting portfina",
    );

    let api = OrchestratorApi::new(&config.orchestrator()).context("Failed to build HTTP client")?;
    let console = Console::new(config, Arc::new(api), Arc::new(TracingSink));

    console.run(cli.command).await
}
