//! REST API client for the orchestrator HTTP endpoints.
//!
//! Wraps file upload, job trigger, run history, and dataset retrieval
//! using [`reqwest`]. Higher layers depend on the [`Orchestrator`] trait
//! rather than on [`OrchestratorApi`] directly.

use async_trait::async_trait;
use portfina_core::runs::DagRunsResponse;
use serde::Deserialize;

use crate::config::OrchestratorConfig;
use crate::upload::UploadFile;

/// Content type sent with uploaded reference-data files.
const UPLOAD_MIME: &str = "text/csv";

/// Multipart field name the upload endpoint reads.
const UPLOAD_FIELD: &str = "file";

/// Errors from the orchestrator REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The orchestrator returned a non-2xx status code.
    #[error("Orchestrator API error ({status}): {body}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx response whose body could not be decoded.
    #[error("Unexpected response body: {0}")]
    Decode(String),
}

/// Tabular datasets exposed by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    Bonds,
    BondResults,
    BondCashflows,
}

impl Dataset {
    pub fn path(self) -> &'static str {
        match self {
            Dataset::Bonds => "bonds",
            Dataset::BondResults => "bond_results",
            Dataset::BondCashflows => "bond_cashflows",
        }
    }
}

/// Body of a successful `POST /upload/{key}`.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    message: Option<String>,
}

/// The orchestrator operations the console relies on.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Upload a file under a logical key. Returns the orchestrator's
    /// message, if it sent a usable one.
    async fn upload_file(
        &self,
        file_key: &str,
        file: &UploadFile,
    ) -> Result<Option<String>, ApiError>;

    /// Ask the orchestrator to start a job.
    async fn trigger_job(&self, job_key: &str) -> Result<(), ApiError>;

    /// Fetch the run history of a job.
    async fn job_runs(&self, job_key: &str) -> Result<DagRunsResponse, ApiError>;

    /// Fetch a dataset as raw JSON.
    async fn dataset(&self, dataset: Dataset) -> Result<serde_json::Value, ApiError>;
}

/// HTTP client for a single orchestrator deployment.
pub struct OrchestratorApi {
    client: reqwest::Client,
    base_url: String,
}

impl OrchestratorApi {
    /// Create a client from the orchestrator config.
    pub fn new(config: &OrchestratorConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, &config.base_url))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    // ---- private helpers ----

    /// Return the response unchanged on a success status, or an
    /// [`ApiError::Remote`] with the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Remote {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Orchestrator for OrchestratorApi {
    async fn upload_file(
        &self,
        file_key: &str,
        file: &UploadFile,
    ) -> Result<Option<String>, ApiError> {
        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(UPLOAD_MIME)?;
        let form = reqwest::multipart::Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .client
            .post(self.url(&format!("upload/{file_key}")))
            .multipart(form)
            .send()
            .await?;

        let body = Self::ensure_success(response).await?.text().await?;
        let message = serde_json::from_str::<UploadResponse>(&body)
            .ok()
            .and_then(|r| r.message)
            .filter(|m| !m.trim().is_empty());
        Ok(message)
    }

    async fn trigger_job(&self, job_key: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.url(&format!("trigger/{job_key}")))
            .send()
            .await?;

        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn job_runs(&self, job_key: &str) -> Result<DagRunsResponse, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("status/{job_key}")))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn dataset(&self, dataset: Dataset) -> Result<serde_json::Value, ApiError> {
        let response = self.client.get(self.url(dataset.path())).send().await?;
        Self::parse_response(response).await
    }
}
