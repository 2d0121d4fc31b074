//! One annotation pass over a decision.

use std::sync::Arc;

use chrono::Utc;
use jurisnorm_core::occultation::new_categories_to_omit;
use jurisnorm_core::{
    AnnotationResult, AnnotationService, CanonicalDecision, NerRequest, Result, Treatment,
};
use tracing::info;

use crate::categories::allow_list;
use crate::overlap::remove_overlaps;
use crate::zones::motivation_entities;

pub const NER_TREATMENT_SOURCE: &str = "annotation-service";
pub const SUPPLEMENTARY_TREATMENT_SOURCE: &str = "supplementary";

#[derive(Clone)]
pub struct AnnotationOrchestrator {
    service: Arc<dyn AnnotationService>,
}

impl AnnotationOrchestrator {
    pub fn new(service: Arc<dyn AnnotationService>) -> Self {
        Self { service }
    }

    /// Call the annotation service and build the treatments for `decision`.
    ///
    /// When motivations must be redacted and the source is zoned, a second
    /// treatment adds whole-zone entities merged with the service's ones.
    pub async fn annotate(&self, decision: &CanonicalDecision) -> Result<AnnotationResult> {
        let occultation = &decision.occultation;
        let request = NerRequest {
            source_id: decision.source_id.clone(),
            source_name: decision.source_name.as_str().to_string(),
            parties: decision.parties.clone(),
            text: decision.original_text.clone(),
            categories: allow_list(&occultation.categories_to_omit),
            additional_terms: occultation.additional_terms.clone(),
        };

        info!(
            source_name = %decision.source_name,
            source_id = %decision.source_id,
            "sending decision to annotation service"
        );
        let response = self.service.ner(&request).await?;

        let mut treatments = vec![Treatment {
            annotations: response.entities.clone(),
            source: NER_TREATMENT_SOURCE.to_string(),
            order: 1,
            checklist: Some(response.checklist.clone()),
            version: response.versions.clone(),
            treatment_date: Utc::now(),
        }];

        if occultation.motivation_occultation && decision.source_name.supports_zoning() {
            let zone_entities =
                motivation_entities(decision.original_text_zoning.as_ref(), &decision.original_text)?;
            let mut merged = response.entities.clone();
            merged.extend(zone_entities);
            treatments.push(Treatment {
                annotations: remove_overlaps(merged),
                source: SUPPLEMENTARY_TREATMENT_SOURCE.to_string(),
                order: 2,
                checklist: None,
                version: None,
                treatment_date: Utc::now(),
            });
        }

        let suggests_terms = response
            .additional_terms_to_annotate
            .as_ref()
            .is_some_and(|t| !t.is_empty())
            || response
                .additional_terms_to_un_annotate
                .as_ref()
                .is_some_and(|t| !t.is_empty());
        let (terms_to_annotate, terms_to_un_annotate) = if suggests_terms {
            (
                response.additional_terms_to_annotate,
                response.additional_terms_to_un_annotate,
            )
        } else {
            (None, None)
        };

        Ok(AnnotationResult {
            new_categories_to_omit: new_categories_to_omit(
                &occultation.categories_to_omit,
                response.new_categories_to_annotate.as_deref(),
                response.new_categories_to_un_annotate.as_deref(),
            ),
            treatments,
            additional_terms_to_annotate: terms_to_annotate,
            additional_terms_to_un_annotate: terms_to_un_annotate,
        })
    }
}

/// Write an annotation result onto its decision.
pub fn apply(decision: &mut CanonicalDecision, result: AnnotationResult) {
    decision.label_treatments = result.treatments;
    if let Some(categories) = result.new_categories_to_omit {
        decision.occultation.categories_to_omit = categories;
    }
    if result.additional_terms_to_annotate.is_some()
        || result.additional_terms_to_un_annotate.is_some()
    {
        decision.occultation.additional_terms_to_annotate = result.additional_terms_to_annotate;
        decision.occultation.additional_terms_to_un_annotate =
            result.additional_terms_to_un_annotate;
    }
}
