//! Annotation types exchanged with the pseudonymisation service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A redaction category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "personnePhysique")]
    NaturalPerson,
    #[serde(rename = "dateNaissance")]
    BirthDate,
    #[serde(rename = "dateMariage")]
    MarriageDate,
    #[serde(rename = "dateDeces")]
    DeathDate,
    #[serde(rename = "insee")]
    Insee,
    #[serde(rename = "numeroIdentifiant")]
    IdentifyingNumber,
    #[serde(rename = "personneMorale")]
    LegalPerson,
    #[serde(rename = "etablissement")]
    Establishment,
    #[serde(rename = "numeroSiretSiren")]
    CompanyNumber,
    #[serde(rename = "adresse")]
    Address,
    #[serde(rename = "localite")]
    Locality,
    #[serde(rename = "telephoneFax")]
    PhoneFax,
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "siteWebSensible")]
    SensitiveWebsite,
    #[serde(rename = "compteBancaire")]
    BankAccount,
    #[serde(rename = "cadastre")]
    LandRegistry,
    #[serde(rename = "plaqueImmatriculation")]
    LicensePlate,
    #[serde(rename = "professionnelMagistratGreffier")]
    MagistrateOrClerk,
    #[serde(rename = "professionnelAvocat")]
    Lawyer,
    #[serde(rename = "motivations")]
    Motivations,
}

/// One annotated span of the original text.
///
/// Offsets count Unicode scalar values. The span covered for overlap
/// purposes is `[start, start + text length)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(default)]
    pub entity_id: String,
    pub category: Category,
    pub start: usize,
    pub end: usize,
    pub text: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub source: String,
}

impl Entity {
    /// Length of the entity text in chars.
    pub fn text_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Exclusive end of the covered span.
    pub fn span_end(&self) -> usize {
        self.start + self.text_len()
    }
}

/// One pass of annotations over a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Treatment {
    pub annotations: Vec<Entity>,
    pub source: String,
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checklist: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<serde_json::Value>,
    pub treatment_date: DateTime<Utc>,
}

/// Outcome of annotating one decision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationResult {
    pub treatments: Vec<Treatment>,
    /// Revised omit set, when the service suggested category changes.
    pub new_categories_to_omit: Option<Vec<Category>>,
    pub additional_terms_to_annotate: Option<Vec<String>>,
    pub additional_terms_to_un_annotate: Option<Vec<String>>,
}

/// Request body for the annotation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NerRequest {
    pub source_id: String,
    pub source_name: String,
    pub parties: Option<Vec<serde_json::Value>>,
    pub text: String,
    pub categories: Vec<Category>,
    pub additional_terms: String,
}

/// Response body of the annotation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NerResponse {
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub checklist: Vec<serde_json::Value>,
    #[serde(default)]
    pub versions: Option<serde_json::Value>,
    #[serde(default)]
    pub new_categories_to_annotate: Option<Vec<Category>>,
    #[serde(default)]
    pub new_categories_to_un_annotate: Option<Vec<Category>>,
    #[serde(default)]
    pub additional_terms_to_annotate: Option<Vec<String>>,
    #[serde(default)]
    pub additional_terms_to_un_annotate: Option<Vec<String>>,
    #[serde(default)]
    pub additional_terms_parsing_failed: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_wire_names() {
        let json = serde_json::to_string(&[Category::NaturalPerson, Category::CompanyNumber]).unwrap();
        assert_eq!(json, r#"["personnePhysique","numeroSiretSiren"]"#);
    }

    #[test]
    fn span_counts_chars_not_bytes() {
        let entity = Entity {
            entity_id: "personnePhysique_1".into(),
            category: Category::NaturalPerson,
            start: 4,
            end: 10,
            text: "Hélène".into(),
            score: 0.9,
            source: "NLP".into(),
        };
        assert_eq!(entity.text_len(), 6);
        assert_eq!(entity.span_end(), 10);
    }

    #[test]
    fn ner_response_optional_fields() {
        let json = r#"{
            "entities": [
                { "entityId": "adresse_1", "category": "adresse", "start": 0, "end": 5,
                  "text": "Paris", "score": 0.7, "source": "NLP" }
            ],
            "checklist": [],
            "newCategoriesToUnAnnotate": ["adresse"]
        }"#;
        let parsed: NerResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.entities.len(), 1);
        assert_eq!(parsed.entities[0].category, Category::Address);
        assert_eq!(
            parsed.new_categories_to_un_annotate.as_deref(),
            Some(&[Category::Address][..])
        );
        assert!(parsed.new_categories_to_annotate.is_none());
        assert!(parsed.versions.is_none());
    }
}
