//! Single-consumer job queue over [`BatchDriver::process_id`].
//!
//! One job runs at a time. A job whose record cannot be loaded is retried
//! with exponential back-off, then dropped.

use std::time::Duration;

use jurisnorm_core::{NormalizationError, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::batch::{BatchDriver, RunSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    pub capacity: usize,
    pub attempts: u32,
    pub base_backoff: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            attempts: 3,
            base_backoff: Duration::from_secs(2),
        }
    }
}

impl QueueConfig {
    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Producer side. Dropping every handle lets the consumer finish.
#[derive(Debug, Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<String>,
}

impl JobQueue {
    /// Start the consumer; its task returns the summary once the queue closes.
    pub fn spawn(driver: BatchDriver, config: QueueConfig) -> (Self, JoinHandle<RunSummary>) {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let handle = tokio::spawn(consume(driver, rx, config));
        (Self { tx }, handle)
    }

    pub async fn enqueue(&self, record_id: impl Into<String>) -> Result<()> {
        self.tx
            .send(record_id.into())
            .await
            .map_err(|e| NormalizationError::unexpected(format!("job queue closed, dropping {}", e.0)))
    }
}

async fn consume(
    mut driver: BatchDriver,
    mut rx: mpsc::Receiver<String>,
    config: QueueConfig,
) -> RunSummary {
    let mut summary = RunSummary::default();
    while let Some(id) = rx.recv().await {
        let mut attempt = 1;
        loop {
            match driver.process_id(&id).await {
                Ok(outcome) => {
                    summary.add(&outcome);
                    break;
                }
                Err(e) if attempt < config.attempts => {
                    let delay = config.backoff(attempt);
                    warn!(record_id = %id, attempt, error = %e, "job failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(record_id = %id, attempts = attempt, error = %e, "job dropped");
                    break;
                }
            }
        }
    }
    info!(
        normalized = summary.normalized,
        blocked = summary.blocked,
        deleted = summary.deleted,
        "job queue drained"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use jurisnorm_annotate::AnnotationOrchestrator;
    use jurisnorm_client::{
        MemoryClassificationLookup, MemoryDecisionStore, StaticAnnotationService,
        StaticZoningService,
    };
    use jurisnorm_core::{RawRecord, SourceName};
    use jurisnorm_store::{EventLog, MemoryObjectStore, MemoryRawStore, ObjectStore, RawStore};
    use serde_json::json;

    use crate::config::{PipelineConfig, RetryPolicy};
    use crate::pipeline::Normalizer;
    use crate::reconcile::Reconciler;
    use crate::source::PayloadAdapter;

    #[test]
    fn backoff_doubles() {
        let config = QueueConfig::default();
        assert_eq!(config.backoff(1), Duration::from_secs(2));
        assert_eq!(config.backoff(2), Duration::from_secs(4));
        assert_eq!(config.backoff(3), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn processes_jobs_in_order_and_drains() {
        let raw = Arc::new(MemoryRawStore::new());
        let objects = Arc::new(MemoryObjectStore::new());
        for id in ["a", "b"] {
            objects
                .put("raw", id, b"Cour de cassation\nArret".to_vec())
                .await
                .unwrap();
            raw.insert(&RawRecord::new(id, id, Utc::now(), json!({})).with_source_id(id))
                .await
                .unwrap();
        }

        let mut config = PipelineConfig::new(SourceName::Jurica);
        config.retry = RetryPolicy::immediate();
        let annotation = Arc::new(StaticAnnotationService::new(
            serde_json::from_value(json!({ "entities": [] })).unwrap(),
        ));
        let decisions = Arc::new(MemoryDecisionStore::new());
        let driver = BatchDriver::new(
            config.clone(),
            EventLog::new(raw.clone()),
            objects.clone(),
            Normalizer::new(
                Arc::new(PayloadAdapter::for_source(SourceName::Jurica, objects.clone(), "raw")),
                Arc::new(StaticZoningService::unavailable()),
                Arc::new(MemoryClassificationLookup::default()),
                config.label_rules.clone(),
            ),
            Reconciler::new(decisions.clone(), AnnotationOrchestrator::new(annotation.clone())),
        );

        let queue_config = QueueConfig {
            base_backoff: Duration::ZERO,
            ..QueueConfig::default()
        };
        let (queue, handle) = JobQueue::spawn(driver, queue_config);
        queue.enqueue("a").await.unwrap();
        queue.enqueue("missing").await.unwrap();
        queue.enqueue("b").await.unwrap();
        drop(queue);

        let summary = handle.await.unwrap();
        assert_eq!(summary.normalized, 2);
        assert_eq!(summary.total(), 2);
        assert_eq!(decisions.put_count(), 2);
    }
}
