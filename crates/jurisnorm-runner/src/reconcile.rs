//! Insert, re-annotate, patch or skip a candidate against its stored version.

use std::sync::Arc;

use jurisnorm_annotate::{AnnotationOrchestrator, apply};
use jurisnorm_core::{
    CanonicalDecision, DecisionPatch, DecisionStore, Diff, LabelStatus, NormalizationError,
    PublishStatus, Result, classify,
};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    NoPriorVersion,
    MajorChange(Diff),
    MinorChangeOnly(Diff),
    NoChange,
}

/// What was done with a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Inserted(String),
    Reannotated(String),
    Patched(String),
    Unchanged,
}

/// Choose the reconciliation state for `candidate`.
///
/// A stored version awaiting human resolution is always fully replaced, so a
/// minor or empty diff is promoted to a major change.
pub fn plan(previous: Option<&CanonicalDecision>, candidate: &CanonicalDecision) -> Reconciliation {
    let Some(previous) = previous else {
        return Reconciliation::NoPriorVersion;
    };
    let diff = classify(previous, candidate);
    if diff.has_major() {
        return Reconciliation::MajorChange(diff);
    }
    if previous.label_status == LabelStatus::WaitingForResolution {
        warn!(
            source_id = %candidate.source_id,
            "stored decision awaits resolution, replacing it"
        );
        return Reconciliation::MajorChange(diff);
    }
    if diff.minor.is_empty() {
        Reconciliation::NoChange
    } else {
        Reconciliation::MinorChangeOnly(diff)
    }
}

/// Metadata patch for a minor change, with workflow statuses carried over.
pub fn minor_patch(previous: &CanonicalDecision, candidate: &CanonicalDecision) -> DecisionPatch {
    let mut patch = DecisionPatch::from_candidate(candidate);
    if candidate.label_status.is_anomaly() {
        warn!(
            source_id = %candidate.source_id,
            status = ?candidate.label_status,
            "patched decision is anomalous, blocking publication"
        );
        patch.publish_status = PublishStatus::Blocked;
        return patch;
    }

    patch.label_status = match previous.label_status {
        LabelStatus::Exported => LabelStatus::Done,
        status => status,
    };
    patch.publish_status = if previous.publish_status.is_settled() {
        PublishStatus::ToBePublished
    } else {
        previous.publish_status
    };
    patch
}

#[derive(Clone)]
pub struct Reconciler {
    decisions: Arc<dyn DecisionStore>,
    annotator: AnnotationOrchestrator,
}

impl Reconciler {
    pub fn new(decisions: Arc<dyn DecisionStore>, annotator: AnnotationOrchestrator) -> Self {
        Self {
            decisions,
            annotator,
        }
    }

    pub async fn reconcile(&self, mut candidate: CanonicalDecision) -> Result<Outcome> {
        let previous = self
            .decisions
            .find(candidate.source_name, &candidate.source_id)
            .await?;

        match plan(previous.as_ref(), &candidate) {
            Reconciliation::NoPriorVersion => {
                self.annotate(&mut candidate).await?;
                let id = self.decisions.put(&candidate).await?;
                info!(id = %id, "decision inserted");
                Ok(Outcome::Inserted(id))
            }
            Reconciliation::MajorChange(diff) => {
                candidate.id = previous.and_then(|p| p.id);
                self.annotate(&mut candidate).await?;
                let id = self.decisions.put(&candidate).await?;
                info!(id = %id, major = ?diff.major, "decision replaced after major change");
                Ok(Outcome::Reannotated(id))
            }
            Reconciliation::MinorChangeOnly(diff) => {
                let previous = previous.ok_or_else(|| {
                    NormalizationError::unexpected("minor change without a stored decision")
                })?;
                let id = previous.id.clone().ok_or_else(|| {
                    NormalizationError::unexpected(format!(
                        "stored decision {} has no id",
                        previous.source_id
                    ))
                })?;
                self.decisions
                    .patch(&id, &minor_patch(&previous, &candidate))
                    .await?;
                info!(id = %id, minor = ?diff.minor, "decision patched with minor changes");
                Ok(Outcome::Patched(id))
            }
            Reconciliation::NoChange => {
                info!(source_id = %candidate.source_id, "decision has no change");
                Ok(Outcome::Unchanged)
            }
        }
    }

    async fn annotate(&self, candidate: &mut CanonicalDecision) -> Result<()> {
        let result = self.annotator.annotate(candidate).await?;
        apply(candidate, result);
        Ok(())
    }
}
