//! Narrow contracts of the external services the pipeline talks to.
//!
//! Implementations live in `jurisnorm-client` (HTTP and in-memory).

use crate::annotation::{NerRequest, NerResponse};
use crate::decision::{CanonicalDecision, DecisionPatch, SourceName};
use crate::error::Result;
use crate::occultation::ClassificationCode;
use crate::zoning::{Zoning, ZoningRequest};

/// Named-entity recognition over a decision text.
#[async_trait::async_trait]
pub trait AnnotationService: Send + Sync {
    async fn ner(&self, request: &NerRequest) -> Result<NerResponse>;
}

/// Structural segmentation of a decision text.
#[async_trait::async_trait]
pub trait ZoningService: Send + Sync {
    async fn zone(&self, request: &ZoningRequest) -> Result<Zoning>;
}

/// Redaction policy lookup by classification code.
#[async_trait::async_trait]
pub trait ClassificationLookup: Send + Sync {
    /// `Ok(None)` when the code is unknown.
    async fn find(&self, code: &str) -> Result<Option<ClassificationCode>>;
}

/// Downstream store of canonical decisions.
#[async_trait::async_trait]
pub trait DecisionStore: Send + Sync {
    async fn find(
        &self,
        source_name: SourceName,
        source_id: &str,
    ) -> Result<Option<CanonicalDecision>>;

    /// Insert or fully overwrite; returns the stored id.
    async fn put(&self, decision: &CanonicalDecision) -> Result<String>;

    /// Partial metadata update of an existing decision.
    async fn patch(&self, id: &str, patch: &DecisionPatch) -> Result<()>;
}
