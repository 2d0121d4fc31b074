use jurisnorm_core::NormalizationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{service} returned {status}: {body}")]
    Server {
        service: &'static str,
        status: u16,
        body: String,
    },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Json(_) => None,
        }
    }
}

/// Saturation statuses are retried later, everything else blocks the record.
impl From<ClientError> for NormalizationError {
    fn from(err: ClientError) -> Self {
        match (err.status(), &err) {
            (Some(429 | 503), _) => NormalizationError::Postponable(err.to_string()),
            (Some(404), ClientError::Server { service, body, .. }) => {
                NormalizationError::not_found(*service, body.clone())
            }
            (Some(404), _) => NormalizationError::not_found("resource", err.to_string()),
            _ => NormalizationError::unexpected(err.to_string()),
        }
    }
}
