//! Drive selected raw records through normalization and reconciliation.

use std::sync::Arc;

use jurisnorm_core::{Event, Filter, NormalizationError, Query, RawRecord, Result};
use jurisnorm_store::{EventLog, ObjectStore};
use tracing::{Instrument, error, info, warn};

use crate::config::PipelineConfig;
use crate::context::RecordContext;
use crate::pipeline::Normalizer;
use crate::reconcile::{Outcome, Reconciler};
use crate::retry::{Escalation, RetryController};

/// Counts of terminal events written during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub normalized: usize,
    pub blocked: usize,
    pub deleted: usize,
}

impl RunSummary {
    pub fn add(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Normalized(_) => self.normalized += 1,
            RecordOutcome::Blocked(_) | RecordOutcome::Escalated(_) => self.blocked += 1,
            RecordOutcome::Deleted => self.deleted += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.normalized + self.blocked + self.deleted
    }
}

/// Terminal result of processing one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Normalized(Outcome),
    Blocked(String),
    /// Blocked after too many postponements; the artifact was moved away.
    Escalated(String),
    Deleted,
}

enum Attempt {
    Superseded,
    Reconciled(Outcome),
}

pub struct BatchDriver {
    config: PipelineConfig,
    events: EventLog,
    objects: Arc<dyn ObjectStore>,
    normalizer: Normalizer,
    reconciler: Reconciler,
    retry: RetryController,
}

impl BatchDriver {
    pub fn new(
        config: PipelineConfig,
        events: EventLog,
        objects: Arc<dyn ObjectStore>,
        normalizer: Normalizer,
        reconciler: Reconciler,
    ) -> Self {
        let retry = RetryController::new(config.retry);
        Self {
            config,
            events,
            objects,
            normalizer,
            reconciler,
            retry,
        }
    }

    pub fn retry(&self) -> &RetryController {
        &self.retry
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Process every record matched by `query`, one at a time.
    ///
    /// Records are loaded a page at a time, resuming after the last record
    /// seen. A failing listing ends the run with what was processed so far.
    pub async fn run(&mut self, query: Query) -> RunSummary {
        let mut summary = RunSummary::default();
        let page_size = self.config.page_size.max(1);
        let mut remaining = query.limit;
        let mut cursor: Option<Filter> = None;
        info!(source_name = %self.config.source_name, page_size, "starting normalization run");

        loop {
            let take = remaining.map_or(page_size, |r| r.min(page_size));
            if take == 0 {
                break;
            }
            let mut page = query.clone().with_limit(Some(take));
            if let Some(after) = cursor.take() {
                page = page.filter(after);
            }
            let records = match self.events.store().find(&page).await {
                Ok(records) => records,
                Err(e) => {
                    error!(error = %e, "failed to list raw records");
                    break;
                }
            };
            let Some(last) = records.last() else {
                break;
            };
            cursor = Some(Filter::after(last));
            info!(count = records.len(), "processing page");

            for raw in &records {
                let outcome = self.process(raw).await;
                summary.add(&outcome);
            }
            remaining = remaining.map(|r| r - records.len());
            if records.len() < take {
                break;
            }
        }

        info!(
            normalized = summary.normalized,
            blocked = summary.blocked,
            deleted = summary.deleted,
            "normalization run finished"
        );
        summary
    }

    /// Process the raw record with id `id`.
    pub async fn process_id(&mut self, id: &str) -> Result<RecordOutcome> {
        let raw = self
            .events
            .store()
            .get(id)
            .await?
            .ok_or_else(|| NormalizationError::not_found("raw record", id))?;
        Ok(self.process(&raw).await)
    }

    /// Process one record until it reaches a terminal event.
    ///
    /// Never fails: errors become `Blocked` events, postponements are retried
    /// in place until escalation.
    pub async fn process(&mut self, raw: &RawRecord) -> RecordOutcome {
        let ctx = RecordContext::new(raw, self.config.source_name);
        let span = ctx.span().clone();
        async move {
            loop {
                let failure = match self.attempt(raw, &ctx).await {
                    Ok(Attempt::Superseded) => {
                        info!("newer reception of the same decision, marking deleted");
                        self.retry.on_success(&raw.id);
                        self.events.record(&raw.id, Event::deleted()).await;
                        return RecordOutcome::Deleted;
                    }
                    Ok(Attempt::Reconciled(outcome)) => {
                        self.retry.on_success(&raw.id);
                        self.archive(raw).await;
                        self.events.record(&raw.id, Event::normalized()).await;
                        info!(outcome = ?outcome, "record normalized");
                        return RecordOutcome::Normalized(outcome);
                    }
                    Err(e) => e,
                };

                let reason = failure.to_string();
                if !failure.is_postponable() {
                    error!(error = %reason, "record failed");
                    self.retry.on_blocked(&raw.id);
                    self.events.record(&raw.id, Event::blocked(reason.clone())).await;
                    tokio::time::sleep(self.retry.failure_delay()).await;
                    return RecordOutcome::Blocked(reason);
                }

                match self.retry.on_postponed(&raw.id) {
                    Escalation::Retry { attempt, delay } => {
                        warn!(attempt, delay_secs = delay.as_secs(), error = %reason, "record postponed");
                        tokio::time::sleep(delay).await;
                    }
                    Escalation::Escalate { attempts } => {
                        warn!(attempts, error = %reason, "record postponed too often, escalating");
                        self.escalate(raw).await;
                        self.events.record(&raw.id, Event::blocked(reason.clone())).await;
                        return RecordOutcome::Escalated(reason);
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn attempt(&self, raw: &RawRecord, ctx: &RecordContext) -> Result<Attempt> {
        if self.normalizer.adapter().detects_supersession() && self.events.is_superseded(raw).await?
        {
            return Ok(Attempt::Superseded);
        }
        let candidate = self.normalizer.normalize(raw, ctx).await?;
        let outcome = self.reconciler.reconcile(candidate).await?;
        Ok(Attempt::Reconciled(outcome))
    }

    /// Copy the artifact to the normalized bucket.
    async fn archive(&self, raw: &RawRecord) {
        let buckets = &self.config.buckets;
        if let Err(e) = self
            .objects
            .copy(&buckets.raw, &buckets.normalized, &raw.source_location)
            .await
        {
            error!(key = %raw.source_location, error = %e, "failed to archive artifact");
        }
    }

    /// Move the artifact to the failed bucket.
    async fn escalate(&self, raw: &RawRecord) {
        let buckets = &self.config.buckets;
        if let Err(e) = self
            .objects
            .rename(&buckets.raw, &buckets.failed, &raw.source_location)
            .await
        {
            error!(key = %raw.source_location, error = %e, "failed to move artifact to failure store");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jurisnorm_annotate::AnnotationOrchestrator;
    use jurisnorm_client::{
        MemoryClassificationLookup, MemoryDecisionStore, StaticAnnotationService,
        StaticZoningService,
    };
    use jurisnorm_core::{
        CanonicalDecision, EventKind, LabelStatus, NerResponse, OccultationFlags, PublishStatus,
        SourceName, Zoning, select,
    };
    use jurisnorm_store::{MemoryObjectStore, MemoryRawStore, RawStore};
    use serde_json::json;

    use crate::config::RetryPolicy;
    use crate::source::PayloadAdapter;

    const TEXT: &str = "Cour d'appel de Lyon\nArrêt du 3 mars 2025\nPar ces motifs";

    struct Harness {
        raw: Arc<MemoryRawStore>,
        objects: Arc<MemoryObjectStore>,
        decisions: Arc<MemoryDecisionStore>,
        annotation: Arc<StaticAnnotationService>,
        zoning: Arc<StaticZoningService>,
        driver: BatchDriver,
    }

    fn ner() -> NerResponse {
        serde_json::from_value(json!({ "entities": [], "checklist": [] })).unwrap()
    }

    fn public_zoning() -> Zoning {
        serde_json::from_value(json!({ "is_public": 1, "zones": {} })).unwrap()
    }

    async fn harness(source: SourceName, decisions: Vec<CanonicalDecision>) -> Harness {
        harness_with(PipelineConfig::new(source), StaticZoningService::unavailable(), decisions)
    }

    fn harness_with(
        mut config: PipelineConfig,
        zoning: StaticZoningService,
        decisions: Vec<CanonicalDecision>,
    ) -> Harness {
        let source = config.source_name;
        let raw = Arc::new(MemoryRawStore::new());
        let objects = Arc::new(MemoryObjectStore::new());
        let decisions = Arc::new(MemoryDecisionStore::with_decisions(decisions));
        let annotation = Arc::new(StaticAnnotationService::new(ner()));
        let zoning = Arc::new(zoning);

        config.retry = RetryPolicy::immediate();
        let normalizer = Normalizer::new(
            Arc::new(PayloadAdapter::for_source(source, objects.clone(), "raw")),
            zoning.clone(),
            Arc::new(MemoryClassificationLookup::default()),
            config.label_rules.clone(),
        );
        let reconciler = Reconciler::new(
            decisions.clone(),
            AnnotationOrchestrator::new(annotation.clone()),
        );
        let driver = BatchDriver::new(
            config,
            EventLog::new(raw.clone()),
            objects.clone(),
            normalizer,
            reconciler,
        );
        Harness {
            raw,
            objects,
            decisions,
            annotation,
            zoning,
            driver,
        }
    }

    impl Harness {
        async fn receive(&self, id: &str, source_id: &str, age_hours: i64, payload: serde_json::Value) {
            let key = format!("{id}.txt");
            self.objects
                .put("raw", &key, TEXT.as_bytes().to_vec())
                .await
                .unwrap();
            let record = RawRecord::new(id, key, Utc::now() - Duration::hours(age_hours), payload)
                .with_source_id(source_id);
            self.raw.insert(&record).await.unwrap();
        }

        async fn kinds(&self, id: &str) -> Vec<EventKind> {
            let record = self.raw.get(id).await.unwrap().unwrap();
            record.events().iter().map(Event::kind).collect()
        }
    }

    fn stored(jurisdiction: &str) -> CanonicalDecision {
        let mut d = CanonicalDecision::new(SourceName::Jurica, "CA-1", TEXT);
        d.id = Some("d1".into());
        d.jurisdiction_name = Some(jurisdiction.into());
        d.occultation.categories_to_omit = OccultationFlags::default().categories_to_omit();
        d.label_status = LabelStatus::Done;
        d.publish_status = PublishStatus::Success;
        d
    }

    #[tokio::test]
    async fn new_decision_is_normalized_once() {
        let mut h = harness(SourceName::Jurica, vec![]).await;
        h.receive("r1", "CA-1", 1, json!({ "jurisdictionName": "CA Lyon" })).await;

        let summary = h.driver.run(select(None, None)).await;

        assert_eq!(
            summary,
            RunSummary {
                normalized: 1,
                blocked: 0,
                deleted: 0
            }
        );
        assert_eq!(h.kinds("r1").await, [EventKind::Created, EventKind::Normalized]);
        assert_eq!(h.annotation.call_count(), 1);
        assert_eq!(h.decisions.put_count(), 1);
        assert!(h.decisions.patches().is_empty());
        assert!(h.objects.contains("normalized", "r1.txt"));
        assert!(h.objects.contains("raw", "r1.txt"));
    }

    #[tokio::test]
    async fn minor_change_is_patched_without_annotation() {
        let mut h = harness(SourceName::Jurica, vec![stored("CA Lyon")]).await;
        h.receive("r1", "CA-1", 1, json!({ "jurisdictionName": "Cour d'appel de Lyon" }))
            .await;

        let summary = h.driver.run(select(None, None)).await;

        assert_eq!(summary.normalized, 1);
        assert_eq!(h.annotation.call_count(), 0);
        assert_eq!(h.decisions.put_count(), 0);
        let patches = h.decisions.patches();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].0, "d1");
        let body = serde_json::to_value(&patches[0].1).unwrap();
        assert_eq!(body["jurisdictionName"], "Cour d'appel de Lyon");
        for stripped in ["sourceId", "sourceName", "originalText", "public", "debatPublic", "occultation"] {
            assert!(body.get(stripped).is_none(), "{stripped} should be stripped");
        }
    }

    #[tokio::test]
    async fn generic_failure_blocks_and_continues() {
        let mut h = harness(SourceName::Jurica, vec![]).await;
        h.receive("bad", "CA-0", 2, json!({})).await;
        h.objects
            .put("raw", "bad.txt", b"une seule ligne".to_vec())
            .await
            .unwrap();
        h.receive("good", "CA-1", 1, json!({})).await;

        let summary = h.driver.run(select(None, None)).await;

        assert_eq!(summary.normalized, 1);
        assert_eq!(summary.blocked, 1);
        let bad = h.raw.get("bad").await.unwrap().unwrap();
        let last = bad.events().last().unwrap();
        assert_eq!(last.kind(), EventKind::Blocked);
        assert!(last.reason().unwrap().contains("line break"));
        assert_eq!(h.kinds("good").await, [EventKind::Created, EventKind::Normalized]);
    }

    #[tokio::test]
    async fn postponed_failures_escalate_on_the_third() {
        let mut h = harness(SourceName::Jurica, vec![]).await;
        h.receive("r1", "CA-1", 1, json!({})).await;
        for _ in 0..3 {
            h.decisions
                .fail_next(NormalizationError::Postponable("429 Too Many Requests".into()));
        }

        let outcome = h.driver.process_id("r1").await.unwrap();

        assert!(matches!(outcome, RecordOutcome::Escalated(_)));
        assert_eq!(h.driver.retry().counter().count("r1"), 0);
        assert!(h.objects.contains("failed", "r1.txt"));
        assert!(!h.objects.contains("raw", "r1.txt"));
        assert_eq!(h.kinds("r1").await, [EventKind::Created, EventKind::Blocked]);
    }

    #[tokio::test]
    async fn postponed_then_successful_resets_counter() {
        let mut h = harness(SourceName::Jurica, vec![]).await;
        h.receive("r1", "CA-1", 1, json!({})).await;
        for _ in 0..2 {
            h.decisions
                .fail_next(NormalizationError::Postponable("503".into()));
        }

        let outcome = h.driver.process_id("r1").await.unwrap();

        assert!(matches!(outcome, RecordOutcome::Normalized(Outcome::Inserted(_))));
        assert_eq!(h.driver.retry().counter().count("r1"), 0);
        assert_eq!(h.kinds("r1").await, [EventKind::Created, EventKind::Normalized]);
    }

    #[tokio::test]
    async fn superseded_record_is_deleted() {
        let mut h = harness(SourceName::Jurinet, vec![]).await;
        h.receive("old", "CC-1", 5, json!({})).await;
        h.receive("new", "CC-1", 1, json!({})).await;

        let summary = h.driver.run(select(None, None)).await;

        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.normalized, 1);
        assert_eq!(h.kinds("old").await, [EventKind::Created, EventKind::Deleted]);
        assert_eq!(h.annotation.call_count(), 1);
    }

    #[tokio::test]
    async fn finished_records_are_not_selected_again() {
        let mut h = harness(SourceName::Jurica, vec![]).await;
        h.receive("r1", "CA-1", 1, json!({})).await;

        h.driver.run(select(None, None)).await;
        let second = h.driver.run(select(None, None)).await;

        assert_eq!(second.total(), 0);
        assert_eq!(h.annotation.call_count(), 1);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let mut h = harness(SourceName::Jurica, vec![]).await;
        let err = h.driver.process_id("missing").await.unwrap_err();
        assert!(matches!(err, NormalizationError::NotFound { .. }));
    }

    #[tokio::test]
    async fn saturated_zoning_is_postponed_then_escalated() {
        let mut h = harness_with(
            PipelineConfig::new(SourceName::Juritcom),
            StaticZoningService::new(public_zoning()),
            vec![],
        );
        h.receive("r1", "TCOM-1", 1, json!({})).await;
        for _ in 0..3 {
            h.zoning.fail_next(NormalizationError::Postponable("429".into()));
        }

        let outcome = h.driver.process_id("r1").await.unwrap();

        assert!(matches!(outcome, RecordOutcome::Escalated(_)));
        assert_eq!(h.zoning.call_count(), 3);
        assert_eq!(h.decisions.put_count(), 0);
        assert!(h.objects.contains("failed", "r1.txt"));
        assert_eq!(h.kinds("r1").await, [EventKind::Created, EventKind::Blocked]);
    }

    #[tokio::test]
    async fn zoning_recovers_after_postponement() {
        let mut h = harness_with(
            PipelineConfig::new(SourceName::Juritcom),
            StaticZoningService::new(public_zoning()),
            vec![],
        );
        h.receive("r1", "TCOM-1", 1, json!({})).await;
        h.zoning.fail_next(NormalizationError::Postponable("503".into()));

        let outcome = h.driver.process_id("r1").await.unwrap();

        assert!(matches!(outcome, RecordOutcome::Normalized(Outcome::Inserted(_))));
        assert_eq!(h.zoning.call_count(), 2);
        assert_eq!(h.decisions.decisions()[0].original_text_zoning, Some(public_zoning()));
    }

    #[tokio::test]
    async fn failing_zoning_blocks_instead_of_publishing() {
        let mut h = harness(SourceName::Juritcom, vec![]).await;
        h.receive("r1", "TCOM-1", 1, json!({})).await;

        let outcome = h.driver.process_id("r1").await.unwrap();

        assert!(matches!(outcome, RecordOutcome::Blocked(_)));
        assert_eq!(h.decisions.put_count(), 0);
        assert_eq!(h.kinds("r1").await, [EventKind::Created, EventKind::Blocked]);
    }

    #[tokio::test]
    async fn postponed_then_failed_clears_counter() {
        let mut h = harness(SourceName::Jurica, vec![]).await;
        h.receive("r1", "CA-1", 1, json!({})).await;
        h.decisions
            .fail_next(NormalizationError::Postponable("429".into()));
        h.decisions
            .fail_next(NormalizationError::unexpected("500 Internal Server Error"));

        let outcome = h.driver.process_id("r1").await.unwrap();

        assert!(matches!(outcome, RecordOutcome::Blocked(_)));
        assert_eq!(h.driver.retry().counter().count("r1"), 0);
    }

    #[tokio::test]
    async fn run_walks_every_page() {
        let mut config = PipelineConfig::new(SourceName::Jurica);
        config.page_size = 2;
        let mut h = harness_with(config, StaticZoningService::unavailable(), vec![]);
        for (i, id) in ["r1", "r2", "r3", "r4", "r5"].into_iter().enumerate() {
            h.receive(id, &format!("CA-{id}"), 10 - i as i64, json!({})).await;
        }
        h.objects
            .put("raw", "r2.txt", b"une seule ligne".to_vec())
            .await
            .unwrap();

        let summary = h.driver.run(select(None, None)).await;

        assert_eq!(summary.normalized, 4);
        assert_eq!(summary.blocked, 1);
        assert_eq!(h.annotation.call_count(), 4);
    }

    #[tokio::test]
    async fn run_limit_spans_pages() {
        let mut config = PipelineConfig::new(SourceName::Jurica);
        config.page_size = 2;
        let mut h = harness_with(config, StaticZoningService::unavailable(), vec![]);
        for (i, id) in ["r1", "r2", "r3", "r4", "r5"].into_iter().enumerate() {
            h.receive(id, &format!("CA-{id}"), 10 - i as i64, json!({})).await;
        }

        let summary = h.driver.run(select(None, Some(3))).await;

        assert_eq!(summary.normalized, 3);
        assert_eq!(h.kinds("r3").await, [EventKind::Created, EventKind::Normalized]);
        assert_eq!(h.kinds("r4").await, [EventKind::Created]);
    }
}
