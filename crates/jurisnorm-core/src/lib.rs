pub mod annotation;
pub mod decision;
pub mod diff;
pub mod error;
pub mod event;
pub mod gateway;
pub mod occultation;
pub mod rules;
pub mod selection;
pub mod text;
pub mod zoning;

pub use annotation::{AnnotationResult, Category, Entity, NerRequest, NerResponse, Treatment};
pub use decision::{
    CanonicalDecision, DecisionPatch, LabelStatus, OccultationRecommendation, OccultationRule,
    PublishStatus, SourceName,
};
pub use diff::{Diff, classify};
pub use error::{NormalizationError, Result};
pub use event::{Event, EventKind, RawRecord};
pub use gateway::{AnnotationService, ClassificationLookup, DecisionStore, ZoningService};
pub use occultation::{ClassificationCode, OccultationFlags, OccultationInput};
pub use rules::LabelRules;
pub use selection::{Filter, Query, select};
pub use zoning::{Zoning, ZoningRequest};
