use thiserror::Error;

/// Failure taxonomy for normalizing one raw record.
///
/// Every variant except [`MissingConfiguration`](Self::MissingConfiguration)
/// is caught at the record boundary and turned into a terminal event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    /// A required setting is absent. Fatal, raised at startup only.
    #[error("missing configuration: {0}")]
    MissingConfiguration(String),

    /// A lookup came back empty.
    #[error("{what} not found: {key}")]
    NotFound { what: String, key: String },

    /// The input has a shape this pipeline does not handle.
    #[error("{field} not supported: {reason}")]
    NotSupported { field: String, reason: String },

    /// An upstream service is temporarily saturated; retry later.
    #[error("postponed: {0}")]
    Postponable(String),

    #[error("{0}")]
    Unexpected(String),
}

impl NormalizationError {
    pub fn not_found(what: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            what: what.into(),
            key: key.into(),
        }
    }

    pub fn not_supported(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NotSupported {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Whether the retry controller should count and back off instead of blocking.
    pub fn is_postponable(&self) -> bool {
        matches!(self, Self::Postponable(_))
    }
}

impl From<serde_json::Error> for NormalizationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Unexpected(format!("JSON error: {err}"))
    }
}

pub type Result<T, E = NormalizationError> = std::result::Result<T, E>;
