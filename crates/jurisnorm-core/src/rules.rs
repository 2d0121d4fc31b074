//! Workflow status of a freshly normalized decision.

use chrono::{DateTime, NaiveDate};
use tracing::warn;

use crate::decision::{CanonicalDecision, LabelStatus, PublishStatus};
use crate::occultation::ClassificationCode;
use crate::text;
use crate::zoning::{Zoning, publicity};

/// Source-level settings for the label-status checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelRules {
    /// Decisions dated before this are out of scope for the source.
    pub commissioning_date: Option<NaiveDate>,
    /// End-case codes whose decisions are never published.
    pub blocked_end_case_codes: Vec<String>,
}

impl LabelRules {
    /// First applicable ignore reason, or the decision's own status.
    pub fn label_status(
        &self,
        decision: &CanonicalDecision,
        zoning: Option<&Zoning>,
        code: Option<&ClassificationCode>,
    ) -> LabelStatus {
        let status = self.ignore_reason(decision, zoning, code);
        if let Some(status) = status {
            warn!(
                source_id = %decision.source_id,
                jurisdiction = decision.jurisdiction_name.as_deref().unwrap_or_default(),
                status = ?status,
                "decision ignored for annotation"
            );
        }
        status.unwrap_or(decision.label_status)
    }

    fn ignore_reason(
        &self,
        decision: &CanonicalDecision,
        zoning: Option<&Zoning>,
        code: Option<&ClassificationCode>,
    ) -> Option<LabelStatus> {
        if decision.public == Some(false) {
            return Some(if decision.debate_public == Some(false) {
                LabelStatus::IgnoredDebatesNotPublic
            } else {
                LabelStatus::IgnoredNotPublic
            });
        }

        match zoning.and_then(|z| z.is_public) {
            Some(publicity::NOT_PUBLIC) => return Some(LabelStatus::IgnoredNotPublicByZoning),
            Some(publicity::PARTIALLY_PUBLIC) if decision.debate_public == Some(true) => {
                return Some(LabelStatus::IgnoredPartiallyPublicByZoning);
            }
            _ => {}
        }

        if let Some(code) = code {
            if code.publicly_rendered == Some(false) {
                return Some(LabelStatus::IgnoredCodeNotPublic);
            }
            if decision.debate_public == Some(true) && code.public_debates == Some(false) {
                return Some(LabelStatus::IgnoredCodePartiallyPublic);
            }
        }

        let decided = decision.date_decision.as_deref().and_then(parse_day);
        let created = decision.date_creation.as_deref().and_then(parse_day);
        if let (Some(decided), Some(created)) = (decided, created)
            && decided > created
        {
            return Some(LabelStatus::IgnoredIncoherentDate);
        }
        if let (Some(decided), Some(commissioning)) = (decided, self.commissioning_date)
            && decided < commissioning
        {
            return Some(LabelStatus::IgnoredBeforeCommissioning);
        }

        if decision
            .end_case_code
            .as_ref()
            .is_some_and(|c| self.blocked_end_case_codes.contains(c))
        {
            return Some(LabelStatus::IgnoredBlockedEndCaseCode);
        }

        if text::has_unknown_characters(&decision.original_text) {
            return Some(LabelStatus::IgnoredUnknownCharacters);
        }

        None
    }
}

/// Publish status implied by a label status.
pub fn publish_status(label: LabelStatus) -> PublishStatus {
    if label == LabelStatus::ToBeTreated {
        PublishStatus::ToBePublished
    } else {
        PublishStatus::Blocked
    }
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
pub fn parse_day(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|d| d.date_naive()))
}
