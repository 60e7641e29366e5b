//! Bond enrichment view: bonds, enrichment results, and per-bond
//! cashflows, refreshed when the enrichment job settles.
//!
//! The view is shared between the operator and the poll controller. The
//! poll task hands it every stored snapshot through
//! [`ResultRefresh::on_snapshot`], so the status line follows the job
//! between ticks, and calls [`ResultRefresh::refresh`] once the job
//! settles. State lives behind a lock that is never held across a request.

use std::sync::Arc;

use async_trait::async_trait;
use portfina_core::catalog::BOND_ENRICHMENT_JOB;
use portfina_core::records::{decode_records, field_text, materialize, Record};
use portfina_core::runs::JobStatusSnapshot;
use portfina_events::{Notification, NotificationSink};
use portfina_orchestrator::{
    ApiError, Dataset, Orchestrator, PollController, PollError, PollHandle, ResultRefresh,
    StatusPoller,
};
use tokio::sync::RwLock;

use crate::table::{RowKey, TableView};

pub const BOND_COLUMNS: [&str; 6] = [
    "id",
    "type",
    "maturity_date",
    "term",
    "notional",
    "clean_price",
];
pub const RESULT_COLUMNS: [&str; 4] = ["bond_id", "duration", "yield", "dirty_price"];
pub const CASHFLOW_COLUMNS: [&str; 2] = ["cashflow_date", "amount"];

/// Everything the enrichment view displays.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentState {
    pub bonds: Vec<Record>,
    pub results: Vec<Record>,
    /// Cashflows of `selected_bond` only.
    pub cashflows: Vec<Record>,
    pub selected_bond: Option<String>,
    /// True from a successful start until the job settles or is stopped.
    pub loading: bool,
    pub status: Option<JobStatusSnapshot>,
}

impl EnrichmentState {
    pub fn bonds_table(&self) -> TableView {
        TableView::new(&BOND_COLUMNS, self.bonds.clone(), RowKey::Column("id".into()))
    }

    pub fn results_table(&self) -> TableView {
        TableView::new(&RESULT_COLUMNS, self.results.clone(), RowKey::Column("bond_id".into()))
            .with_selected(self.selected_bond.as_deref())
    }

    /// Cashflow dates repeat within a bond, so rows are keyed by index.
    pub fn cashflows_table(&self) -> TableView {
        TableView::new(&CASHFLOW_COLUMNS, self.cashflows.clone(), RowKey::Index)
    }

    /// `Last Run` and `Status` lines for the latest enrichment run.
    pub fn status_line(&self) -> Option<String> {
        let run = self.status.as_ref()?.latest_run.as_ref()?;
        Some(format!(
            "Last Run: {} | Status: {}",
            run.execution_timestamp.to_rfc3339(),
            run.state,
        ))
    }
}

/// Bond enrichment data plus the controls that refresh it.
pub struct BondEnrichmentView {
    api: Arc<dyn Orchestrator>,
    poller: StatusPoller,
    sink: Arc<dyn NotificationSink>,
    state: RwLock<EnrichmentState>,
}

impl BondEnrichmentView {
    pub fn new(
        api: Arc<dyn Orchestrator>,
        poller: StatusPoller,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            api,
            poller,
            sink,
            state: RwLock::new(EnrichmentState::default()),
        }
    }

    /// A copy of the current state.
    pub async fn state(&self) -> EnrichmentState {
        self.state.read().await.clone()
    }

    /// Initial load: bonds and the enrichment job's status.
    pub async fn load(&self) {
        tokio::join!(self.fetch_bonds(), self.fetch_status());
    }

    /// Reload bonds from the columnar `bonds` dataset.
    pub async fn fetch_bonds(&self) -> bool {
        match self.api.dataset(Dataset::Bonds).await {
            Ok(payload) => {
                let bonds = materialize(&payload);
                tracing::debug!(count = bonds.len(), "Fetched bonds");
                self.state.write().await.bonds = bonds;
                true
            }
            Err(e) => {
                self.report("Failed to fetch bonds", &e);
                false
            }
        }
    }

    /// Reload enrichment results.
    pub async fn fetch_results(&self) -> bool {
        match self.api.dataset(Dataset::BondResults).await {
            Ok(payload) => {
                let results = decode_records(&payload);
                tracing::debug!(count = results.len(), "Fetched bond results");
                self.state.write().await.results = results;
                true
            }
            Err(e) => {
                self.report("Failed to fetch bond results", &e);
                false
            }
        }
    }

    /// Fetch the enrichment job's run history once.
    pub async fn fetch_status(&self) -> bool {
        match self.poller.fetch_status(BOND_ENRICHMENT_JOB).await {
            Ok(snapshot) => {
                self.state.write().await.status = Some(snapshot);
                true
            }
            Err(e) => {
                tracing::error!(
                    job_key = BOND_ENRICHMENT_JOB,
                    error = %e,
                    "Failed to fetch DAG status",
                );
                self.sink.notify(
                    Notification::error("Failed to fetch DAG status").about(BOND_ENRICHMENT_JOB),
                );
                false
            }
        }
    }

    /// Select a bond and load its cashflows.
    ///
    /// The selection changes even if the fetch fails; the previous
    /// cashflows then stay on display.
    pub async fn select_bond(&self, bond_id: &str) -> bool {
        self.state.write().await.selected_bond = Some(bond_id.to_string());

        match self.api.dataset(Dataset::BondCashflows).await {
            Ok(payload) => {
                let cashflows: Vec<Record> = decode_records(&payload)
                    .into_iter()
                    .filter(|cf| field_text(cf, "bond_id") == bond_id)
                    .collect();
                tracing::debug!(bond_id, count = cashflows.len(), "Fetched bond cashflows");

                let mut state = self.state.write().await;
                // A later selection wins over this one.
                if state.selected_bond.as_deref() == Some(bond_id) {
                    state.cashflows = cashflows;
                }
                true
            }
            Err(e) => {
                self.report("Failed to fetch bond cashflows", &e);
                false
            }
        }
    }

    /// Trigger the enrichment job through `controller` and watch it.
    ///
    /// `loading` stays set until the controller refreshes the results. A
    /// start refused because the job is already watched leaves `loading`
    /// tracking that watch.
    pub async fn run_enrichment(
        &self,
        controller: &PollController,
    ) -> Result<PollHandle, PollError> {
        self.state.write().await.loading = true;
        let started = controller.start(BOND_ENRICHMENT_JOB).await;
        match &started {
            Ok(_) => {}
            Err(PollError::AlreadyActive(_)) => {
                let active = controller.is_active(BOND_ENRICHMENT_JOB).await;
                self.state.write().await.loading = active;
            }
            Err(_) => self.state.write().await.loading = false,
        }
        started
    }

    /// Stop watching the enrichment job and clear `loading`.
    pub async fn stop_enrichment(&self, controller: &PollController) -> bool {
        let stopped = controller.stop(BOND_ENRICHMENT_JOB).await;
        self.state.write().await.loading = false;
        stopped
    }

    fn report(&self, message: &str, error: &ApiError) {
        tracing::error!(error = %error, "{message}");
        self.sink.notify(Notification::error(message));
    }
}

#[async_trait]
impl ResultRefresh for BondEnrichmentView {
    async fn refresh(&self, snapshot: &JobStatusSnapshot) {
        if snapshot.job_key != BOND_ENRICHMENT_JOB {
            return;
        }

        self.state.write().await.status = Some(snapshot.clone());
        self.fetch_results().await;
        self.state.write().await.loading = false;
    }

    async fn on_snapshot(&self, snapshot: &JobStatusSnapshot) {
        if snapshot.job_key == BOND_ENRICHMENT_JOB {
            self.state.write().await.status = Some(snapshot.clone());
        }
    }
}
