use jurisnorm_core::{RawRecord, SourceName};
use tracing::Span;
use uuid::Uuid;

/// Correlation data for one record attempt, threaded through every call.
#[derive(Debug, Clone)]
pub struct RecordContext {
    pub correlation_id: Uuid,
    pub record_id: String,
    pub source_name: SourceName,
    span: Span,
}

impl RecordContext {
    pub fn new(raw: &RawRecord, source_name: SourceName) -> Self {
        let correlation_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "record",
            correlation_id = %correlation_id,
            record_id = %raw.id,
            source_name = %source_name,
            source_id = raw.source_id.as_deref().unwrap_or_default(),
        );
        Self {
            correlation_id,
            record_id: raw.id.clone(),
            source_name,
            span,
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}
