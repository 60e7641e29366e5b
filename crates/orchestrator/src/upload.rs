//! Reference-data file uploads.
//!
//! Each file key has its own upload endpoint, and uploads are
//! independent: one failing key does not affect the others, and the
//! operator retries it on its own.

use std::path::Path;
use std::sync::Arc;

use portfina_core::catalog::Catalog;
use portfina_events::{Notification, NotificationSink};

use crate::api::{ApiError, Orchestrator};

/// Message shown when the orchestrator does not send one.
const DEFAULT_UPLOAD_MESSAGE: &str = "Upload success!";

/// A file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, naming it after the path's final component.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.csv".to_string());
        Ok(Self { file_name, bytes })
    }
}

/// Errors from [`UploadDispatcher::upload`].
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// No file was selected for the key. Raised before any request.
    #[error("No file selected for {0}")]
    MissingFile(String),

    /// The key is not in the configured file catalog.
    #[error("Unknown file key: {0}")]
    UnknownKey(String),

    /// The upload request failed (transport or non-2xx).
    #[error("Upload of {key} failed: {source}")]
    Failed {
        key: String,
        #[source]
        source: ApiError,
    },
}

/// Sends files to `upload/{key}` and reports the outcome.
pub struct UploadDispatcher {
    api: Arc<dyn Orchestrator>,
    files: Catalog,
    sink: Arc<dyn NotificationSink>,
}

impl UploadDispatcher {
    pub fn new(
        api: Arc<dyn Orchestrator>,
        files: Catalog,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self { api, files, sink }
    }

    pub fn files(&self) -> &Catalog {
        &self.files
    }

    /// Upload `file` under `key`.
    ///
    /// Returns the orchestrator's message on success. Both outcomes are
    /// also reported to the notification sink.
    pub async fn upload(&self, key: &str, file: Option<&UploadFile>) -> Result<String, UploadError> {
        let Some(file) = file else {
            self.sink
                .notify(Notification::warning(format!("Please select a file for {key}")).about(key));
            return Err(UploadError::MissingFile(key.to_string()));
        };

        if !self.files.contains(key) {
            self.sink
                .notify(Notification::warning(format!("Unknown file key {key}")).about(key));
            return Err(UploadError::UnknownKey(key.to_string()));
        }

        tracing::info!(
            file_key = key,
            file_name = %file.file_name,
            size_bytes = file.bytes.len(),
            "Uploading file",
        );

        match self.api.upload_file(key, file).await {
            Ok(message) => {
                let message = message.unwrap_or_else(|| DEFAULT_UPLOAD_MESSAGE.to_string());
                tracing::info!(file_key = key, message = %message, "Upload accepted");
                self.sink
                    .notify(Notification::success(message.clone()).about(key));
                Ok(message)
            }
            Err(e) => {
                tracing::error!(file_key = key, error = %e, "Upload failed");
                self.sink.notify(Notification::error("Upload failed").about(key));
                Err(UploadError::Failed {
                    key: key.to_string(),
                    source: e,
                })
            }
        }
    }
}
