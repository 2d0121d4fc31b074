//! Canonical decision schema shared with the downstream decision store.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::annotation::{Category, Treatment};
use crate::zoning::Zoning;

/// Originating record system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceName {
    #[serde(rename = "jurinet")]
    Jurinet,
    #[serde(rename = "jurica")]
    Jurica,
    #[serde(rename = "juritj")]
    Juritj,
    #[serde(rename = "juritcom")]
    Juritcom,
    #[serde(rename = "portalis-cph")]
    PortalisCph,
}

impl SourceName {
    pub const ALL: [SourceName; 5] = [
        Self::Jurinet,
        Self::Jurica,
        Self::Juritj,
        Self::Juritcom,
        Self::PortalisCph,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jurinet => "jurinet",
            Self::Jurica => "jurica",
            Self::Juritj => "juritj",
            Self::Juritcom => "juritcom",
            Self::PortalisCph => "portalis-cph",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|source| source.as_str() == s)
    }

    /// Sources whose texts go through the structural zoning service.
    pub fn supports_zoning(&self) -> bool {
        matches!(self, Self::Juritj | Self::Juritcom)
    }

    /// Short source label expected by the zoning service.
    pub fn zoning_label(&self) -> &'static str {
        match self {
            Self::Jurinet => "cc",
            Self::Jurica => "ca",
            Self::Juritj => "tj",
            Self::Juritcom => "tcom",
            Self::PortalisCph => "cph",
        }
    }
}

impl fmt::Display for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Annotation workflow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LabelStatus {
    #[default]
    #[serde(rename = "toBeTreated")]
    ToBeTreated,
    #[serde(rename = "loaded")]
    Loaded,
    #[serde(rename = "locked")]
    Locked,
    #[serde(rename = "done")]
    Done,
    #[serde(rename = "exported")]
    Exported,
    /// Human triage pending; automated updates must not silently overwrite it.
    #[serde(rename = "waitingForAffaireResolution")]
    WaitingForResolution,
    #[serde(rename = "ignored_debatNonPublic")]
    IgnoredDebatesNotPublic,
    #[serde(rename = "ignored_decisionNonPublique")]
    IgnoredNotPublic,
    #[serde(rename = "ignored_decisionNonPubliqueParZonage")]
    IgnoredNotPublicByZoning,
    #[serde(rename = "ignored_decisionPartiellementPubliqueParZonage")]
    IgnoredPartiallyPublicByZoning,
    #[serde(rename = "ignored_dateDecisionIncoherente")]
    IgnoredIncoherentDate,
    #[serde(rename = "ignored_dateAvantMiseEnService")]
    IgnoredBeforeCommissioning,
    #[serde(rename = "ignored_codeDecisionBloqueCC")]
    IgnoredBlockedEndCaseCode,
    #[serde(rename = "ignored_caractereInconnu")]
    IgnoredUnknownCharacters,
    #[serde(rename = "ignored_codeNACdeDecisionNonPublique")]
    IgnoredCodeNotPublic,
    #[serde(rename = "ignored_codeNACdeDecisionPartiellementPublique")]
    IgnoredCodePartiallyPublic,
}

impl LabelStatus {
    /// Statuses that flag bad incoming data rather than a policy decision.
    pub fn is_anomaly(&self) -> bool {
        matches!(
            self,
            Self::IgnoredIncoherentDate
                | Self::IgnoredBeforeCommissioning
                | Self::IgnoredBlockedEndCaseCode
                | Self::IgnoredUnknownCharacters
        )
    }
}

/// Publication workflow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PublishStatus {
    #[default]
    #[serde(rename = "toBePublished")]
    ToBePublished,
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "unpublished")]
    Unpublished,
    #[serde(rename = "failure_preparing")]
    FailurePreparing,
    #[serde(rename = "failure_indexing")]
    FailureIndexing,
    #[serde(rename = "blocked")]
    Blocked,
}

impl PublishStatus {
    /// Settled states that must be re-queued when metadata changes.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::Unpublished | Self::FailurePreparing | Self::FailureIndexing
        )
    }
}

/// Occultation recommendation attached to a decision by its court.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OccultationRecommendation {
    #[serde(rename = "conforme")]
    Conforme,
    #[serde(rename = "complément", alias = "complement")]
    Complement,
    #[serde(rename = "substituant")]
    Substituant,
    #[serde(rename = "aucune")]
    Aucune,
}

impl OccultationRecommendation {
    /// Whether the classification-code defaults are followed.
    pub fn follows_defaults(&self) -> bool {
        matches!(self, Self::Conforme | Self::Complement)
    }

    /// Whether supplementary terms from the court apply.
    pub fn carries_terms(&self) -> bool {
        matches!(self, Self::Complement | Self::Substituant)
    }
}

/// Redaction settings of a decision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccultationRule {
    /// `"|"`-joined terms; kept terms are prefixed with `"+"`.
    #[serde(default)]
    pub additional_terms: String,
    #[serde(default)]
    pub categories_to_omit: Vec<Category>,
    #[serde(default)]
    pub motivation_occultation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_terms_to_annotate: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_terms_to_un_annotate: Option<Vec<String>>,
}

/// A decision in the canonical schema, keyed by `(source_name, source_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalDecision {
    /// Store-assigned identifier, absent until persisted.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source_id: String,
    pub source_name: SourceName,

    // ── Major fields ──
    #[serde(default)]
    pub public: Option<bool>,
    #[serde(rename = "debatPublic", default)]
    pub debate_public: Option<bool>,
    #[serde(default)]
    pub original_text: String,
    #[serde(default)]
    pub occultation: OccultationRule,
    #[serde(default)]
    pub end_case_code: Option<String>,
    #[serde(rename = "NACCode", default)]
    pub classification_code: Option<String>,
    #[serde(rename = "recommandationOccultation", default)]
    pub occultation_recommendation: Option<OccultationRecommendation>,

    // ── Minor fields ──
    #[serde(default)]
    pub date_decision: Option<String>,
    #[serde(default)]
    pub date_creation: Option<String>,
    #[serde(default)]
    pub jurisdiction_id: Option<String>,
    #[serde(default)]
    pub jurisdiction_name: Option<String>,
    #[serde(default)]
    pub jurisdiction_code: Option<String>,
    #[serde(default)]
    pub chamber_id: Option<String>,
    #[serde(default)]
    pub chamber_name: Option<String>,
    #[serde(default)]
    pub parties: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub composition: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub register_number: Option<String>,
    #[serde(rename = "numeroRoleGeneral", default)]
    pub general_roll_number: Option<String>,
    #[serde(default)]
    pub selection: Option<bool>,
    #[serde(rename = "libelleEndCaseCode", default)]
    pub end_case_label: Option<String>,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default)]
    pub formation: Option<String>,
    #[serde(rename = "libelleNAC", default)]
    pub classification_label: Option<String>,
    #[serde(rename = "NPCode", default)]
    pub special_nature_code: Option<String>,
    #[serde(rename = "libelleNatureParticuliere", default)]
    pub special_nature_label: Option<String>,
    #[serde(rename = "codeService", default)]
    pub service_code: Option<String>,
    #[serde(rename = "libelleService", default)]
    pub service_label: Option<String>,
    #[serde(rename = "indicateurQPC", default)]
    pub qpc_indicator: Option<bool>,
    #[serde(rename = "matiereDeterminee", default)]
    pub determined_matter: Option<bool>,
    #[serde(rename = "pourvoiCourDeCassation", default)]
    pub cassation_appeal: Option<bool>,
    #[serde(rename = "pourvoiLocal", default)]
    pub local_appeal: Option<bool>,
    #[serde(rename = "sommaire", default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub president: Option<String>,
    #[serde(rename = "decisionAssociee", default)]
    pub associated_decision: Option<serde_json::Value>,

    // ── Workflow ──
    #[serde(default)]
    pub label_status: LabelStatus,
    #[serde(default)]
    pub publish_status: PublishStatus,
    #[serde(default)]
    pub label_treatments: Vec<Treatment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_text_zoning: Option<Zoning>,
    #[serde(rename = "blocOccultation", default, skip_serializing_if = "Option::is_none")]
    pub occultation_block: Option<u32>,
}

impl CanonicalDecision {
    pub fn new(
        source_name: SourceName,
        source_id: impl Into<String>,
        original_text: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            source_id: source_id.into(),
            source_name,
            public: None,
            debate_public: None,
            original_text: original_text.into(),
            occultation: OccultationRule::default(),
            end_case_code: None,
            classification_code: None,
            occultation_recommendation: None,
            date_decision: None,
            date_creation: None,
            jurisdiction_id: None,
            jurisdiction_name: None,
            jurisdiction_code: None,
            chamber_id: None,
            chamber_name: None,
            parties: None,
            composition: None,
            register_number: None,
            general_roll_number: None,
            selection: None,
            end_case_label: None,
            solution: None,
            formation: None,
            classification_label: None,
            special_nature_code: None,
            special_nature_label: None,
            service_code: None,
            service_label: None,
            qpc_indicator: None,
            determined_matter: None,
            cassation_appeal: None,
            local_appeal: None,
            summary: None,
            president: None,
            associated_decision: None,
            label_status: LabelStatus::default(),
            publish_status: PublishStatus::default(),
            label_treatments: Vec::new(),
            original_text_zoning: None,
            occultation_block: None,
        }
    }
}

/// Metadata-only update: the candidate stripped of identity and content fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_decision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_creation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jurisdiction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jurisdiction_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jurisdiction_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chamber_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chamber_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parties: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composition: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub register_number: Option<String>,
    #[serde(rename = "numeroRoleGeneral", skip_serializing_if = "Option::is_none")]
    pub general_roll_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<bool>,
    #[serde(rename = "libelleEndCaseCode", skip_serializing_if = "Option::is_none")]
    pub end_case_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formation: Option<String>,
    #[serde(rename = "libelleNAC", skip_serializing_if = "Option::is_none")]
    pub classification_label: Option<String>,
    #[serde(rename = "NPCode", skip_serializing_if = "Option::is_none")]
    pub special_nature_code: Option<String>,
    #[serde(rename = "libelleNatureParticuliere", skip_serializing_if = "Option::is_none")]
    pub special_nature_label: Option<String>,
    #[serde(rename = "codeService", skip_serializing_if = "Option::is_none")]
    pub service_code: Option<String>,
    #[serde(rename = "libelleService", skip_serializing_if = "Option::is_none")]
    pub service_label: Option<String>,
    #[serde(rename = "indicateurQPC", skip_serializing_if = "Option::is_none")]
    pub qpc_indicator: Option<bool>,
    #[serde(rename = "matiereDeterminee", skip_serializing_if = "Option::is_none")]
    pub determined_matter: Option<bool>,
    #[serde(rename = "pourvoiCourDeCassation", skip_serializing_if = "Option::is_none")]
    pub cassation_appeal: Option<bool>,
    #[serde(rename = "pourvoiLocal", skip_serializing_if = "Option::is_none")]
    pub local_appeal: Option<bool>,
    #[serde(rename = "sommaire", skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub president: Option<String>,
    #[serde(rename = "decisionAssociee", skip_serializing_if = "Option::is_none")]
    pub associated_decision: Option<serde_json::Value>,
    pub label_status: LabelStatus,
    pub publish_status: PublishStatus,
}

impl DecisionPatch {
    /// Descriptive metadata of `candidate`, with its computed workflow statuses.
    pub fn from_candidate(candidate: &CanonicalDecision) -> Self {
        Self {
            date_decision: candidate.date_decision.clone(),
            date_creation: candidate.date_creation.clone(),
            jurisdiction_id: candidate.jurisdiction_id.clone(),
            jurisdiction_name: candidate.jurisdiction_name.clone(),
            jurisdiction_code: candidate.jurisdiction_code.clone(),
            chamber_id: candidate.chamber_id.clone(),
            chamber_name: candidate.chamber_name.clone(),
            parties: candidate.parties.clone(),
            composition: candidate.composition.clone(),
            register_number: candidate.register_number.clone(),
            general_roll_number: candidate.general_roll_number.clone(),
            selection: candidate.selection,
            end_case_label: candidate.end_case_label.clone(),
            solution: candidate.solution.clone(),
            formation: candidate.formation.clone(),
            classification_label: candidate.classification_label.clone(),
            special_nature_code: candidate.special_nature_code.clone(),
            special_nature_label: candidate.special_nature_label.clone(),
            service_code: candidate.service_code.clone(),
            service_label: candidate.service_label.clone(),
            qpc_indicator: candidate.qpc_indicator,
            determined_matter: candidate.determined_matter,
            cassation_appeal: candidate.cassation_appeal,
            local_appeal: candidate.local_appeal,
            summary: candidate.summary.clone(),
            president: candidate.president.clone(),
            associated_decision: candidate.associated_decision.clone(),
            label_status: candidate.label_status,
            publish_status: candidate.publish_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_wire_names() {
        let mut decision = CanonicalDecision::new(SourceName::Juritj, "TJ75011A01-1234", "texte");
        decision.classification_code = Some("4AA".into());
        decision.debate_public = Some(true);
        decision.occultation_recommendation = Some(OccultationRecommendation::Complement);

        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["sourceName"], "juritj");
        assert_eq!(json["sourceId"], "TJ75011A01-1234");
        assert_eq!(json["NACCode"], "4AA");
        assert_eq!(json["debatPublic"], true);
        assert_eq!(json["recommandationOccultation"], "complément");
        assert_eq!(json["labelStatus"], "toBeTreated");
        assert!(json.get("_id").is_none());
    }

    #[test]
    fn recommendation_accepts_unaccented_alias() {
        let parsed: OccultationRecommendation = serde_json::from_str(r#""complement""#).unwrap();
        assert_eq!(parsed, OccultationRecommendation::Complement);
    }

    #[test]
    fn patch_strips_identity_and_content() {
        let mut decision = CanonicalDecision::new(SourceName::Juritcom, "42", "texte intégral");
        decision.id = Some("abc".into());
        decision.public = Some(true);
        decision.jurisdiction_name = Some("Tribunal de commerce de Lyon".into());

        let json = serde_json::to_value(DecisionPatch::from_candidate(&decision)).unwrap();
        for stripped in ["_id", "sourceId", "sourceName", "public", "debatPublic", "originalText", "occultation"] {
            assert!(json.get(stripped).is_none(), "{stripped} should be stripped");
        }
        assert_eq!(json["jurisdictionName"], "Tribunal de commerce de Lyon");
        assert_eq!(json["publishStatus"], "toBePublished");
    }

    #[test]
    fn source_name_roundtrip() {
        for source in SourceName::ALL {
            assert_eq!(SourceName::parse(source.as_str()), Some(source));
        }
        assert_eq!(SourceName::parse("dila"), None);
    }

    #[test]
    fn anomaly_statuses() {
        assert!(LabelStatus::IgnoredIncoherentDate.is_anomaly());
        assert!(LabelStatus::IgnoredUnknownCharacters.is_anomaly());
        assert!(!LabelStatus::IgnoredNotPublic.is_anomaly());
        assert!(!LabelStatus::ToBeTreated.is_anomaly());
    }
}
