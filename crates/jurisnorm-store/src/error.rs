use jurisnorm_core::NormalizationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("raw record not found: {0}")]
    RecordNotFound(String),

    #[error("object not found: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("invalid raw record: {0}")]
    Invalid(#[from] NormalizationError),

    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl From<StoreError> for NormalizationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RecordNotFound(id) => NormalizationError::not_found("raw record", id),
            StoreError::ObjectNotFound { bucket, key } => {
                NormalizationError::not_found("object", format!("{bucket}/{key}"))
            }
            StoreError::Invalid(inner) => inner,
            other => NormalizationError::unexpected(other.to_string()),
        }
    }
}
