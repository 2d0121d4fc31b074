//! What differs between source systems, behind one capability trait.
//!
//! The pipeline only needs three things from a source: the artifact text and
//! metadata of a raw record, a mapping of that metadata onto the canonical
//! schema, and the inputs of the occultation engine. [`PayloadAdapter`] covers
//! every source whose collector stores metadata in the raw record payload and
//! the extracted text as an object.

use std::sync::Arc;

use jurisnorm_core::{
    CanonicalDecision, NormalizationError, OccultationFlags, OccultationRecommendation, RawRecord,
    Result, SourceName,
};
use jurisnorm_store::ObjectStore;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

/// Text and metadata fetched for one raw record.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceContent {
    pub text: String,
    pub metadata: Value,
}

/// Occultation inputs carried by a source, before any lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum OccultationSource {
    Flags(OccultationFlags),
    /// Policy comes from the decision's classification code.
    Classification {
        recommendation: Option<OccultationRecommendation>,
        supplementary_terms: String,
    },
}

#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source_name(&self) -> SourceName;

    /// Whether a newer reception of the same source id supersedes a record.
    fn detects_supersession(&self) -> bool {
        false
    }

    async fn fetch_content(&self, raw: &RawRecord) -> Result<SourceContent>;

    /// Map metadata and cleaned text onto the canonical schema.
    fn map_to_canonical(
        &self,
        raw: &RawRecord,
        content: &SourceContent,
    ) -> Result<CanonicalDecision>;

    fn occultation_source(&self, content: &SourceContent) -> Result<OccultationSource>;
}

/// How a source describes its redaction policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccultationMode {
    /// Per-category flags under `occultation` in the metadata.
    Flags,
    /// Classification-code lookup plus `recommandationOccultation`.
    Classification,
}

const FLAGS_KEY: &str = "occultation";
const SUPPLEMENTARY_TERMS_KEY: &str = "occultationComplementaire";
const RECOMMENDATION_KEY: &str = "recommandationOccultation";

/// Fields the adapter sets itself, occultation inputs, and workflow state.
const RESERVED_KEYS: &[&str] = &[
    FLAGS_KEY,
    SUPPLEMENTARY_TERMS_KEY,
    "_id",
    "sourceName",
    "sourceId",
    "originalText",
    "labelStatus",
    "publishStatus",
    "labelTreatments",
    "originalTextZoning",
    "blocOccultation",
];

/// Source whose raw payload holds canonical-named metadata.
#[derive(Clone)]
pub struct PayloadAdapter {
    source_name: SourceName,
    objects: Arc<dyn ObjectStore>,
    bucket: String,
    occultation: OccultationMode,
    supersession: bool,
}

impl PayloadAdapter {
    pub fn new(
        source_name: SourceName,
        objects: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        occultation: OccultationMode,
    ) -> Self {
        Self {
            source_name,
            objects,
            bucket: bucket.into(),
            occultation,
            supersession: false,
        }
    }

    /// The default adapter for a known source.
    pub fn for_source(
        source_name: SourceName,
        objects: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
    ) -> Self {
        let mode = match source_name {
            SourceName::Juritj => OccultationMode::Classification,
            _ => OccultationMode::Flags,
        };
        let supersession = source_name == SourceName::Jurinet;
        Self::new(source_name, objects, bucket, mode).with_supersession(supersession)
    }

    pub fn with_supersession(mut self, enabled: bool) -> Self {
        self.supersession = enabled;
        self
    }

    fn metadata<'a>(&self, content: &'a SourceContent) -> Result<&'a Map<String, Value>> {
        match &content.metadata {
            Value::Object(map) => Ok(map),
            Value::Null => Err(NormalizationError::not_supported(
                "payload",
                "raw record carries no metadata",
            )),
            other => Err(NormalizationError::not_supported(
                "payload",
                format!("expected an object, got {other}"),
            )),
        }
    }
}

#[derive(Deserialize)]
struct ClassificationFields {
    #[serde(rename = "recommandationOccultation", default)]
    recommendation: Option<OccultationRecommendation>,
    #[serde(rename = "occultationComplementaire", default)]
    supplementary_terms: Option<String>,
}

#[async_trait::async_trait]
impl SourceAdapter for PayloadAdapter {
    fn source_name(&self) -> SourceName {
        self.source_name
    }

    fn detects_supersession(&self) -> bool {
        self.supersession
    }

    async fn fetch_content(&self, raw: &RawRecord) -> Result<SourceContent> {
        let bytes = self.objects.get(&self.bucket, &raw.source_location).await?;
        debug!(key = %raw.source_location, size = bytes.len(), "artifact fetched");
        let text = String::from_utf8(bytes).map_err(|e| {
            NormalizationError::not_supported("originalText", format!("not UTF-8: {e}"))
        })?;
        Ok(SourceContent {
            text,
            metadata: raw.payload.clone(),
        })
    }

    fn map_to_canonical(
        &self,
        raw: &RawRecord,
        content: &SourceContent,
    ) -> Result<CanonicalDecision> {
        let mut fields = self.metadata(content)?.clone();
        let source_id = match fields.get("sourceId") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => raw.source_id.clone().ok_or_else(|| {
                NormalizationError::not_supported("sourceId", format!("missing on record {}", raw.id))
            })?,
        };

        for key in RESERVED_KEYS {
            fields.remove(*key);
        }
        if self.occultation == OccultationMode::Flags {
            fields.remove(RECOMMENDATION_KEY);
        }
        fields.insert("sourceName".into(), Value::from(self.source_name.as_str()));
        fields.insert("sourceId".into(), Value::from(source_id));
        fields.insert("originalText".into(), Value::from(content.text.clone()));

        Ok(serde_json::from_value(Value::Object(fields))?)
    }

    fn occultation_source(&self, content: &SourceContent) -> Result<OccultationSource> {
        let metadata = self.metadata(content)?;
        match self.occultation {
            OccultationMode::Flags => {
                let flags = match metadata.get(FLAGS_KEY) {
                    Some(value) => serde_json::from_value(value.clone())?,
                    None => OccultationFlags::default(),
                };
                Ok(OccultationSource::Flags(flags))
            }
            OccultationMode::Classification => {
                let fields: ClassificationFields =
                    serde_json::from_value(Value::Object(metadata.clone()))?;
                Ok(OccultationSource::Classification {
                    recommendation: fields.recommendation,
                    supplementary_terms: fields.supplementary_terms.unwrap_or_default(),
                })
            }
        }
    }
}
