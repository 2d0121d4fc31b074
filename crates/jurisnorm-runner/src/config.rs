//! Settings passed into the pipeline at construction time.

use std::time::Duration;

use jurisnorm_core::{LabelRules, SourceName};

/// Postponed failures tolerated per record before its artifact is escalated.
pub const MAX_POSTPONED: u32 = 3;

/// Raw records fetched per selection page during a run.
pub const PAGE_SIZE: usize = 100;

/// Back-off applied by the retry controller between record attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_postponed: u32,
    /// Wait before retrying a record whose upstream asked to postpone.
    pub postpone_delay: Duration,
    /// Wait after a generic failure before moving to the next record.
    pub failure_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_postponed: MAX_POSTPONED,
            postpone_delay: Duration::from_secs(20),
            failure_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Same thresholds, no waiting.
    pub fn immediate() -> Self {
        Self {
            postpone_delay: Duration::ZERO,
            failure_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Object-storage buckets holding source artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buckets {
    pub raw: String,
    pub normalized: String,
    pub failed: String,
}

impl Default for Buckets {
    fn default() -> Self {
        Self {
            raw: "raw".into(),
            normalized: "normalized".into(),
            failed: "failed".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub source_name: SourceName,
    pub buckets: Buckets,
    pub label_rules: LabelRules,
    pub retry: RetryPolicy,
    pub page_size: usize,
}

impl PipelineConfig {
    pub fn new(source_name: SourceName) -> Self {
        Self {
            source_name,
            buckets: Buckets::default(),
            label_rules: LabelRules::default(),
            retry: RetryPolicy::default(),
            page_size: PAGE_SIZE,
        }
    }
}
