//! Annotation of canonical decisions: NER request, motivation zones and
//! overlap removal.

pub mod categories;
pub mod orchestrator;
pub mod overlap;
pub mod zones;

pub use orchestrator::{AnnotationOrchestrator, apply};
pub use overlap::remove_overlaps;
