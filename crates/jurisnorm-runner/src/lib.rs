//! Normalization runner: source adapters, per-record pipeline, reconciliation
//! against the decision store, retry escalation and the batch driver.

pub mod batch;
pub mod config;
pub mod context;
pub mod pipeline;
pub mod queue;
pub mod reconcile;
pub mod retry;
pub mod source;

pub use batch::{BatchDriver, RecordOutcome, RunSummary};
pub use config::{Buckets, PipelineConfig, RetryPolicy};
pub use context::RecordContext;
pub use pipeline::Normalizer;
pub use queue::{JobQueue, QueueConfig};
pub use reconcile::{Outcome, Reconciler, Reconciliation};
pub use retry::{Escalation, FailureCounter, RetryController};
pub use source::{OccultationMode, OccultationSource, PayloadAdapter, SourceAdapter, SourceContent};
