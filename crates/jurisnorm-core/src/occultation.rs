//! Redaction rule engine.
//!
//! Two families of sources feed it. Flag-driven sources send one boolean per
//! category group plus free-form keep/remove term lists. Lookup-driven
//! sources carry a classification code whose stored policy picks a category
//! set according to the court's recommendation.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::annotation::Category;
use crate::decision::{OccultationRecommendation, OccultationRule};
use crate::error::{NormalizationError, Result};

/// Per-source occultation flags. A flag that is not `true` omits its categories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccultationFlags {
    #[serde(rename = "personneMorale", default)]
    pub legal_person: Option<bool>,
    #[serde(rename = "personnePhysicoMoraleGeoMorale", default)]
    pub geographic_legal_person: Option<bool>,
    #[serde(rename = "adresse", default)]
    pub address: Option<bool>,
    #[serde(rename = "dateCivile", default)]
    pub civil_date: Option<bool>,
    #[serde(rename = "plaqueImmatriculation", default)]
    pub license_plate: Option<bool>,
    #[serde(rename = "cadastre", default)]
    pub land_registry: Option<bool>,
    #[serde(rename = "chaineNumeroIdentifiante", default)]
    pub identifying_number: Option<bool>,
    #[serde(rename = "coordonneeElectronique", default)]
    pub electronic_contact: Option<bool>,
    #[serde(rename = "professionnelMagistratGreffier", default)]
    pub magistrate_or_clerk: Option<bool>,
    #[serde(rename = "motifsDebatsChambreConseil", default)]
    pub chamber_council_motivations: Option<bool>,
    /// `"|"`-separated terms to keep visible.
    #[serde(rename = "conserverElement", default)]
    pub keep_terms: Option<String>,
    /// `"|"`-separated terms to redact in addition to the categories.
    #[serde(rename = "supprimerElement", default)]
    pub remove_terms: Option<String>,
}

impl OccultationFlags {
    /// Union of the categories contributed by every unset flag, first-seen order.
    pub fn categories_to_omit(&self) -> Vec<Category> {
        use Category::*;

        let rules: [(Option<bool>, &[Category]); 9] = [
            (self.legal_person, &[LegalPerson, CompanyNumber]),
            (
                self.geographic_legal_person,
                &[LegalPerson, Locality, CompanyNumber],
            ),
            (self.address, &[Address, Locality, Establishment]),
            (self.civil_date, &[BirthDate, DeathDate, MarriageDate]),
            (self.license_plate, &[LicensePlate]),
            (self.land_registry, &[LandRegistry]),
            (
                self.identifying_number,
                &[Insee, IdentifyingNumber, BankAccount, LicensePlate],
            ),
            (self.electronic_contact, &[SensitiveWebsite, PhoneFax]),
            (self.magistrate_or_clerk, &[MagistrateOrClerk]),
        ];

        let mut omitted = Vec::new();
        for (flag, categories) in rules {
            if flag != Some(true) {
                push_unique(&mut omitted, categories.iter().copied());
            }
        }
        omitted
    }

    pub fn motivation_occultation(&self) -> bool {
        self.chamber_council_motivations == Some(true)
    }
}

/// Category sets of a classification code, by recommendation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoriesByRecommendation {
    #[serde(rename = "suivi", default)]
    pub followed: Vec<Category>,
    #[serde(rename = "nonSuivi", default)]
    pub not_followed: Vec<Category>,
}

/// Stored policy of a classification code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationCode {
    #[serde(rename = "codeNAC")]
    pub code: String,
    #[serde(rename = "blocOccultation", default)]
    pub occultation_block: Option<u32>,
    #[serde(default)]
    pub categories_to_omit: Option<CategoriesByRecommendation>,
    #[serde(rename = "indicateurDecisionRenduePubliquement", default)]
    pub publicly_rendered: Option<bool>,
    #[serde(rename = "indicateurDebatsPublics", default)]
    pub public_debates: Option<bool>,
}

/// What the engine computes from.
#[derive(Debug, Clone, Copy)]
pub enum OccultationInput<'a> {
    Flags(&'a OccultationFlags),
    Classification {
        /// Code carried by the decision, for error reporting.
        code: &'a str,
        /// Lookup result; `None` when the code is unknown.
        policy: Option<&'a ClassificationCode>,
        recommendation: Option<OccultationRecommendation>,
        supplementary_terms: &'a str,
        debate_public: Option<bool>,
    },
}

/// Engine output: the rule plus the occultation block copied from the lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedOccultation {
    pub rule: OccultationRule,
    pub occultation_block: Option<u32>,
}

pub fn compute(input: OccultationInput<'_>) -> Result<ComputedOccultation> {
    match input {
        OccultationInput::Flags(flags) => {
            let rule = OccultationRule {
                additional_terms: additional_terms(
                    flags.keep_terms.as_deref().into_iter(),
                    flags.remove_terms.as_deref().into_iter(),
                ),
                categories_to_omit: flags.categories_to_omit(),
                motivation_occultation: flags.motivation_occultation(),
                ..Default::default()
            };
            debug!(
                categories = ?rule.categories_to_omit,
                additional_terms = %rule.additional_terms,
                motivation = rule.motivation_occultation,
                "occultation computed from flags"
            );
            Ok(ComputedOccultation {
                rule,
                occultation_block: None,
            })
        }
        OccultationInput::Classification {
            code,
            policy,
            recommendation,
            supplementary_terms,
            debate_public,
        } => {
            let policy =
                policy.ok_or_else(|| NormalizationError::not_found("classification code", code))?;
            let (Some(categories), Some(block)) =
                (&policy.categories_to_omit, policy.occultation_block)
            else {
                return Err(NormalizationError::not_found(
                    "occultation policy of classification code",
                    code,
                ));
            };

            let follows = recommendation.is_some_and(|r| r.follows_defaults());
            let categories_to_omit = if follows {
                categories.followed.clone()
            } else {
                categories.not_followed.clone()
            };
            let additional_terms = if recommendation.is_some_and(|r| r.carries_terms()) {
                supplementary_terms.to_string()
            } else {
                String::new()
            };
            let motivation_occultation = match recommendation {
                Some(OccultationRecommendation::Aucune | OccultationRecommendation::Substituant) => {
                    false
                }
                _ => debate_public != Some(true),
            };

            Ok(ComputedOccultation {
                rule: OccultationRule {
                    additional_terms,
                    categories_to_omit,
                    motivation_occultation,
                    ..Default::default()
                },
                occultation_block: Some(block),
            })
        }
    }
}

/// Join keep and remove term lists into the `"|"`-separated form.
///
/// Each list entry is split on `"|"` and trimmed; empties are dropped, kept
/// terms get a `"+"` prefix and come first, duplicates keep their first
/// position. Terms are not escaped.
pub fn additional_terms<'a, K, R>(keep: K, remove: R) -> String
where
    K: IntoIterator<Item = &'a str>,
    R: IntoIterator<Item = &'a str>,
{
    let split = |entry: &'a str| {
        entry
            .split('|')
            .map(str::trim)
            .filter(|term| !term.is_empty())
    };

    let mut terms: Vec<String> = Vec::new();
    let kept = keep.into_iter().flat_map(split).map(|t| format!("+{t}"));
    let removed = remove.into_iter().flat_map(split).map(str::to_string);
    for term in kept.chain(removed) {
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms.join("|")
}

/// Revise an omit set with the annotation service's suggestions.
///
/// Returns `None` when the service suggested nothing.
pub fn new_categories_to_omit(
    current: &[Category],
    to_annotate: Option<&[Category]>,
    to_un_annotate: Option<&[Category]>,
) -> Option<Vec<Category>> {
    if to_annotate.is_none() && to_un_annotate.is_none() {
        return None;
    }
    let mut omitted = current.to_vec();
    if let Some(extra) = to_un_annotate {
        push_unique(&mut omitted, extra.iter().copied());
    }
    if let Some(annotate) = to_annotate {
        omitted.retain(|c| !annotate.contains(c));
    }
    Some(omitted)
}

fn push_unique(into: &mut Vec<Category>, items: impl IntoIterator<Item = Category>) {
    for item in items {
        if !into.contains(&item) {
            into.push(item);
        }
    }
}
