#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Unknown {kind} key: {key}")]
    UnknownKey { kind: &'static str, key: String },

    #[error("Validation failed: {0}")]
    Validation(String),
}
