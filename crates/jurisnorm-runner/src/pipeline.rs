//! From a raw record to a candidate canonical decision.

use std::sync::Arc;

use jurisnorm_core::occultation::{self, ComputedOccultation};
use jurisnorm_core::{
    CanonicalDecision, ClassificationCode, ClassificationLookup, LabelRules, NormalizationError,
    OccultationInput, RawRecord, Result, Zoning, ZoningRequest, ZoningService, rules, text,
};
use tracing::info;

use crate::context::RecordContext;
use crate::source::{OccultationSource, SourceAdapter, SourceContent};

/// Fetch, clean, map, redact-rule and label one record. No writes.
#[derive(Clone)]
pub struct Normalizer {
    adapter: Arc<dyn SourceAdapter>,
    zoning: Arc<dyn ZoningService>,
    classification: Arc<dyn ClassificationLookup>,
    rules: LabelRules,
}

impl Normalizer {
    pub fn new(
        adapter: Arc<dyn SourceAdapter>,
        zoning: Arc<dyn ZoningService>,
        classification: Arc<dyn ClassificationLookup>,
        rules: LabelRules,
    ) -> Self {
        Self {
            adapter,
            zoning,
            classification,
            rules,
        }
    }

    pub fn adapter(&self) -> &Arc<dyn SourceAdapter> {
        &self.adapter
    }

    pub async fn normalize(&self, raw: &RawRecord, ctx: &RecordContext) -> Result<CanonicalDecision> {
        let fetched = self.adapter.fetch_content(raw).await?;
        let cleaned = text::clean(&fetched.text);
        if text::is_empty_text(&cleaned) {
            return Err(NormalizationError::not_supported("originalText", "empty text"));
        }
        if text::has_no_break(&cleaned) {
            return Err(NormalizationError::not_supported(
                "originalText",
                "text has no line break",
            ));
        }
        let content = SourceContent {
            text: cleaned,
            metadata: fetched.metadata,
        };

        let mut decision = self.adapter.map_to_canonical(raw, &content)?;
        info!(
            correlation_id = %ctx.correlation_id,
            source_id = %decision.source_id,
            text_len = decision.original_text.len(),
            "decision mapped"
        );

        let (computed, policy) = self.occultation(&decision, &content).await?;
        decision.occultation = computed.rule;
        decision.occultation_block = computed.occultation_block;

        let zoning = self.zone(&decision).await?;
        decision.label_status = self
            .rules
            .label_status(&decision, zoning.as_ref(), policy.as_ref());
        decision.publish_status = rules::publish_status(decision.label_status);
        decision.original_text_zoning = zoning;
        Ok(decision)
    }

    async fn occultation(
        &self,
        decision: &CanonicalDecision,
        content: &SourceContent,
    ) -> Result<(ComputedOccultation, Option<ClassificationCode>)> {
        match self.adapter.occultation_source(content)? {
            OccultationSource::Flags(flags) => {
                Ok((occultation::compute(OccultationInput::Flags(&flags))?, None))
            }
            OccultationSource::Classification {
                recommendation,
                supplementary_terms,
            } => {
                let code = decision.classification_code.as_deref().ok_or_else(|| {
                    NormalizationError::not_found("classification code of decision", &decision.source_id)
                })?;
                let policy = self.classification.find(code).await?;
                let computed = occultation::compute(OccultationInput::Classification {
                    code,
                    policy: policy.as_ref(),
                    recommendation: recommendation.or(decision.occultation_recommendation),
                    supplementary_terms: &supplementary_terms,
                    debate_public: decision.debate_public,
                })?;
                Ok((computed, policy))
            }
        }
    }

    /// Zoning of zoned sources, `None` for the others.
    ///
    /// Zoning decides publicity, so a failing zoning service fails the record.
    async fn zone(&self, decision: &CanonicalDecision) -> Result<Option<Zoning>> {
        if !decision.source_name.supports_zoning() {
            return Ok(None);
        }
        let request = ZoningRequest {
            id: decision.source_id.clone(),
            source: decision.source_name.zoning_label().to_string(),
            text: decision.original_text.clone(),
        };
        let zoning = self.zoning.zone(&request).await?;
        info!(source_id = %decision.source_id, is_public = ?zoning.is_public, "decision zoned");
        Ok(Some(zoning))
    }
}
