//! Field-level comparison of a stored decision with a fresh candidate.
//!
//! Major fields change what gets redacted or published and require a new
//! annotation pass. Minor fields are descriptive metadata that can be patched
//! in place. Zoning output is never compared: it is derived from the text,
//! which is itself a major field.

use std::collections::BTreeSet;
use std::fmt::Debug;

use tracing::info;

use crate::decision::CanonicalDecision;

/// Names of changed fields, by significance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    pub major: BTreeSet<&'static str>,
    pub minor: BTreeSet<&'static str>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.major.is_empty() && self.minor.is_empty()
    }

    pub fn has_major(&self) -> bool {
        !self.major.is_empty()
    }
}

struct Collector<'a> {
    source_id: &'a str,
    changed: BTreeSet<&'static str>,
}

impl<'a> Collector<'a> {
    fn new(source_id: &'a str) -> Self {
        Self {
            source_id,
            changed: BTreeSet::new(),
        }
    }

    fn check<T: PartialEq + Debug>(&mut self, field: &'static str, previous: &T, candidate: &T) {
        if previous != candidate {
            info!(
                source_id = self.source_id,
                field,
                previous = ?previous,
                candidate = ?candidate,
                "decision field changed"
            );
            self.changed.insert(field);
        }
    }

    /// Large values are logged by size only.
    fn check_text(&mut self, field: &'static str, previous: &str, candidate: &str) {
        if previous != candidate {
            info!(
                source_id = self.source_id,
                field,
                previous_len = previous.len(),
                candidate_len = candidate.len(),
                "decision field changed"
            );
            self.changed.insert(field);
        }
    }
}

/// Compare `previous` and `candidate` over the fixed major and minor field sets.
pub fn classify(previous: &CanonicalDecision, candidate: &CanonicalDecision) -> Diff {
    let (p, c) = (previous, candidate);
    let source_id = c.source_id.as_str();

    let mut major = Collector::new(source_id);
    major.check("public", &p.public, &c.public);
    major.check("debatPublic", &p.debate_public, &c.debate_public);
    major.check_text("originalText", &p.original_text, &c.original_text);
    major.check(
        "occultation.additionalTerms",
        &p.occultation.additional_terms,
        &c.occultation.additional_terms,
    );
    major.check(
        "occultation.motivationOccultation",
        &p.occultation.motivation_occultation,
        &c.occultation.motivation_occultation,
    );
    let mut previous_omit = p.occultation.categories_to_omit.clone();
    let mut candidate_omit = c.occultation.categories_to_omit.clone();
    previous_omit.sort();
    candidate_omit.sort();
    major.check(
        "occultation.categoriesToOmit",
        &previous_omit,
        &candidate_omit,
    );
    major.check("endCaseCode", &p.end_case_code, &c.end_case_code);
    major.check("NACCode", &p.classification_code, &c.classification_code);
    major.check(
        "recommandationOccultation",
        &p.occultation_recommendation,
        &c.occultation_recommendation,
    );

    let mut minor = Collector::new(source_id);
    minor.check("dateDecision", &p.date_decision, &c.date_decision);
    minor.check("jurisdictionId", &p.jurisdiction_id, &c.jurisdiction_id);
    minor.check("jurisdictionName", &p.jurisdiction_name, &c.jurisdiction_name);
    minor.check("jurisdictionCode", &p.jurisdiction_code, &c.jurisdiction_code);
    minor.check("chamberId", &p.chamber_id, &c.chamber_id);
    minor.check("chamberName", &p.chamber_name, &c.chamber_name);
    minor.check("numeroRoleGeneral", &p.general_roll_number, &c.general_roll_number);
    minor.check("registerNumber", &p.register_number, &c.register_number);
    minor.check("parties", &p.parties, &c.parties);
    minor.check("composition", &p.composition, &c.composition);
    minor.check("selection", &p.selection, &c.selection);
    minor.check("libelleEndCaseCode", &p.end_case_label, &c.end_case_label);
    minor.check("solution", &p.solution, &c.solution);
    minor.check("formation", &p.formation, &c.formation);
    minor.check("libelleNAC", &p.classification_label, &c.classification_label);
    minor.check("NPCode", &p.special_nature_code, &c.special_nature_code);
    minor.check(
        "libelleNatureParticuliere",
        &p.special_nature_label,
        &c.special_nature_label,
    );
    minor.check("codeService", &p.service_code, &c.service_code);
    minor.check("libelleService", &p.service_label, &c.service_label);
    minor.check("indicateurQPC", &p.qpc_indicator, &c.qpc_indicator);
    minor.check("matiereDeterminee", &p.determined_matter, &c.determined_matter);
    minor.check("pourvoiCourDeCassation", &p.cassation_appeal, &c.cassation_appeal);
    minor.check("pourvoiLocal", &p.local_appeal, &c.local_appeal);
    minor.check("sommaire", &p.summary, &c.summary);
    minor.check("president", &p.president, &c.president);
    minor.check("decisionAssociee", &p.associated_decision, &c.associated_decision);

    Diff {
        major: major.changed,
        minor: minor.changed,
    }
}
