//! Command-line surface of the `portfina` binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use portfina_core::records::Record;
use portfina_core::runs::JobStatusSnapshot;
use portfina_events::NotificationSink;
use portfina_orchestrator::{
    JobTrigger, NoRefresh, Orchestrator, PollController, PollHandle, StatusPoller,
    UploadDispatcher, UploadFile,
};
use serde_json::Value;

use crate::config::DashboardConfig;
use crate::enrichment::BondEnrichmentView;
use crate::jobs::JobBoard;
use crate::table::{RowKey, TableView};
use crate::uploads::UploadPanel;

#[derive(Debug, Parser)]
#[command(name = "portfina")]
#[command(about = "Portfina operator console", long_about = None)]
pub struct Cli {
    /// Orchestrator base URL
    #[arg(long, global = true, env = "ORCHESTRATOR_URL")]
    pub orchestrator_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Upload a reference-data CSV under a file key
    Upload {
        /// File key, e.g. `bond` or `forwardcurve`
        key: String,
        /// Path to the CSV file
        path: PathBuf,
    },

    /// Trigger a job once without watching it
    Trigger {
        /// Job key, e.g. `bond_ingestion_dag`
        job: String,
    },

    /// Show the run history of one job, or the latest run of every job
    Status { job: Option<String> },

    /// Trigger a job and poll its status until it finishes
    Watch { job: String },

    /// List bonds
    Bonds,

    /// List bond enrichment results
    Results,

    /// List the cashflows of one bond
    Cashflows { bond_id: String },

    /// Run bond enrichment and show the refreshed results
    Enrich,

    /// List the known file and job keys
    Keys,
}

/// Runs console commands against one orchestrator.
pub struct Console {
    config: DashboardConfig,
    api: Arc<dyn Orchestrator>,
    sink: Arc<dyn NotificationSink>,
}

impl Console {
    pub fn new(
        config: DashboardConfig,
        api: Arc<dyn Orchestrator>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self { config, api, sink }
    }

    /// Run one command, stopping long-running ones on Ctrl-C.
    pub async fn run(&self, command: Commands) -> anyhow::Result<()> {
        self.run_until(command, interrupted()).await
    }

    /// Run one command; `watch` and `enrich` stop early when `stop`
    /// completes.
    pub async fn run_until(
        &self,
        command: Commands,
        stop: impl std::future::Future<Output = ()>,
    ) -> anyhow::Result<()> {
        match command {
            Commands::Upload { key, path } => self.upload(&key, path).await,
            Commands::Trigger { job } => {
                self.board().trigger(&job).await?;
                Ok(())
            }
            Commands::Status { job: Some(job) } => self.job_history(&job).await,
            Commands::Status { job: None } => {
                let mut board = self.board();
                board.refresh_all().await;
                print!("{}", board.table());
                Ok(())
            }
            Commands::Watch { job } => self.watch(&job, stop).await,
            Commands::Bonds => {
                let view = self.enrichment_view();
                if !view.fetch_bonds().await {
                    bail!("Failed to fetch bonds");
                }
                print!("{}", view.state().await.bonds_table());
                Ok(())
            }
            Commands::Results => {
                let view = self.enrichment_view();
                if !view.fetch_results().await {
                    bail!("Failed to fetch bond results");
                }
                print!("{}", view.state().await.results_table());
                Ok(())
            }
            Commands::Cashflows { bond_id } => {
                let view = self.enrichment_view();
                if !view.select_bond(&bond_id).await {
                    bail!("Failed to fetch bond cashflows");
                }
                print!("{}", view.state().await.cashflows_table());
                Ok(())
            }
            Commands::Enrich => self.enrich(stop).await,
            Commands::Keys => {
                for catalog in [&self.config.files, &self.config.jobs] {
                    println!("{} keys:", catalog.kind());
                    for entry in catalog.entries() {
                        println!("  {:<28} {}", entry.key, entry.label);
                    }
                }
                Ok(())
            }
        }
    }

    async fn upload(&self, key: &str, path: PathBuf) -> anyhow::Result<()> {
        let file = UploadFile::from_path(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let mut panel = UploadPanel::new(UploadDispatcher::new(
            Arc::clone(&self.api),
            self.config.files.clone(),
            Arc::clone(&self.sink),
        ));
        panel.select(key, file);
        let message = panel.upload(key).await?;
        println!("{message}");
        Ok(())
    }

    async fn job_history(&self, job_key: &str) -> anyhow::Result<()> {
        let snapshot = self.board().fetch_status(job_key).await?;
        print!("{}", runs_table(&snapshot));
        println!("{} of {} runs shown", snapshot.runs.len(), snapshot.total_entries);
        Ok(())
    }

    async fn watch(
        &self,
        job_key: &str,
        stop: impl std::future::Future<Output = ()>,
    ) -> anyhow::Result<()> {
        let controller = PollController::new(
            Arc::clone(&self.api),
            &self.config.orchestrator(),
            Arc::clone(&self.sink),
            Arc::new(NoRefresh),
        );
        let handle = controller.start(job_key).await?;
        let finished = wait_or_stop(&handle, stop).await;
        controller.shutdown().await;
        if !finished {
            bail!("Stopped watching {job_key}");
        }
        Ok(())
    }

    async fn enrich(&self, stop: impl std::future::Future<Output = ()>) -> anyhow::Result<()> {
        let view = Arc::new(self.enrichment_view());
        view.load().await;
        print!("{}", view.state().await.bonds_table());

        let controller = PollController::new(
            Arc::clone(&self.api),
            &self.config.orchestrator(),
            Arc::clone(&self.sink),
            view.clone(),
        );
        let handle = view.run_enrichment(&controller).await?;
        let finished = wait_or_stop(&handle, stop).await;
        if !finished {
            view.stop_enrichment(&controller).await;
        }
        controller.shutdown().await;
        if !finished {
            bail!("Bond enrichment watch stopped");
        }

        let state = view.state().await;
        if let Some(line) = state.status_line() {
            println!("{line}");
        }
        print!("{}", state.results_table());
        Ok(())
    }

    fn board(&self) -> JobBoard {
        JobBoard::new(
            JobTrigger::new(
                Arc::clone(&self.api),
                self.config.jobs.clone(),
                Arc::clone(&self.sink),
            ),
            self.poller(),
        )
    }

    fn enrichment_view(&self) -> BondEnrichmentView {
        BondEnrichmentView::new(Arc::clone(&self.api), self.poller(), Arc::clone(&self.sink))
    }

    fn poller(&self) -> StatusPoller {
        StatusPoller::new(
            Arc::clone(&self.api),
            self.config.jobs.clone(),
            Arc::clone(&self.sink),
        )
    }
}

/// Wait for the poll loop to exit. Returns `false` if `stop` won.
async fn wait_or_stop(handle: &PollHandle, stop: impl std::future::Future<Output = ()>) -> bool {
    tokio::select! {
        _ = handle.wait() => true,
        _ = stop => {
            tracing::info!(job_key = handle.job_key(), "Interrupted, stopping watch");
            false
        }
    }
}

async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Runs of one job, newest first, with the latest run marked.
fn runs_table(snapshot: &JobStatusSnapshot) -> TableView {
    let mut runs = snapshot.runs.clone();
    runs.sort_by(|a, b| b.execution_timestamp.cmp(&a.execution_timestamp));

    let rows: Vec<Record> = runs
        .iter()
        .map(|run| {
            let mut row = Record::new();
            row.insert(
                "execution_date".into(),
                Value::from(run.execution_timestamp.to_rfc3339()),
            );
            row.insert("state".into(), Value::from(run.state.as_str()));
            if let Some(end) = run.end_timestamp {
                row.insert("end_date".into(), Value::from(end.to_rfc3339()));
            }
            row
        })
        .collect();

    let latest = snapshot
        .latest_run
        .as_ref()
        .map(|r| r.execution_timestamp.to_rfc3339());
    TableView::new(
        &["execution_date", "state", "end_date"],
        rows,
        RowKey::Column("execution_date".into()),
    )
    .with_selected(latest.as_deref())
}
