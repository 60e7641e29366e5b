//! Per-key file selection in front of the upload dispatcher.

use std::collections::HashMap;

use portfina_core::catalog::CatalogEntry;
use portfina_orchestrator::{UploadDispatcher, UploadError, UploadFile};

/// Holds the file chosen for each upload key until it is sent.
pub struct UploadPanel {
    dispatcher: UploadDispatcher,
    selections: HashMap<String, UploadFile>,
}

impl UploadPanel {
    pub fn new(dispatcher: UploadDispatcher) -> Self {
        Self {
            dispatcher,
            selections: HashMap::new(),
        }
    }

    /// Every upload key, in catalog order.
    pub fn keys(&self) -> &[CatalogEntry] {
        self.dispatcher.files().entries()
    }

    /// Choose `file` for `key`, replacing any earlier choice.
    pub fn select(&mut self, key: &str, file: UploadFile) {
        tracing::debug!(file_key = key, file_name = %file.file_name, "File selected");
        self.selections.insert(key.to_string(), file);
    }

    pub fn clear(&mut self, key: &str) {
        self.selections.remove(key);
    }

    pub fn selected(&self, key: &str) -> Option<&UploadFile> {
        self.selections.get(key)
    }

    /// Upload the file selected for `key`.
    ///
    /// The selection is kept after both success and failure so the
    /// operator can resend it.
    pub async fn upload(&self, key: &str) -> Result<String, UploadError> {
        self.dispatcher.upload(key, self.selections.get(key)).await
    }
}
