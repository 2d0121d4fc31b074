//! In-memory service doubles that count their calls.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use jurisnorm_core::{
    AnnotationService, CanonicalDecision, ClassificationCode, ClassificationLookup, DecisionPatch,
    DecisionStore, NerRequest, NerResponse, NormalizationError, Result, SourceName, Zoning,
    ZoningRequest, ZoningService,
};

/// Errors to return from the next calls, in order.
#[derive(Debug, Default)]
struct Failures(Mutex<VecDeque<NormalizationError>>);

impl Failures {
    fn push(&self, err: NormalizationError) {
        if let Ok(mut queue) = self.0.lock() {
            queue.push_back(err);
        }
    }

    fn next(&self) -> Result<()> {
        match self.0.lock() {
            Ok(mut queue) => queue.pop_front().map_or(Ok(()), Err),
            Err(e) => Err(NormalizationError::unexpected(format!("mutex poisoned: {e}"))),
        }
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> NormalizationError {
    NormalizationError::unexpected(format!("mutex poisoned: {e}"))
}

// ── Decision store ──

#[derive(Debug, Default)]
pub struct MemoryDecisionStore {
    decisions: Mutex<Vec<CanonicalDecision>>,
    patches: Mutex<Vec<(String, DecisionPatch)>>,
    puts: AtomicUsize,
    failures: Failures,
}

impl MemoryDecisionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_decisions(decisions: impl IntoIterator<Item = CanonicalDecision>) -> Self {
        Self {
            decisions: Mutex::new(decisions.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Make the next `find` fail with `err`.
    pub fn fail_next(&self, err: NormalizationError) {
        self.failures.push(err);
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn patches(&self) -> Vec<(String, DecisionPatch)> {
        self.patches.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn decisions(&self) -> Vec<CanonicalDecision> {
        self.decisions.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl DecisionStore for MemoryDecisionStore {
    async fn find(
        &self,
        source_name: SourceName,
        source_id: &str,
    ) -> Result<Option<CanonicalDecision>> {
        self.failures.next()?;
        let decisions = self.decisions.lock().map_err(poisoned)?;
        Ok(decisions
            .iter()
            .find(|d| d.source_name == source_name && d.source_id == source_id)
            .cloned())
    }

    async fn put(&self, decision: &CanonicalDecision) -> Result<String> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let mut decisions = self.decisions.lock().map_err(poisoned)?;
        let existing = decisions
            .iter()
            .position(|d| d.source_name == decision.source_name && d.source_id == decision.source_id);
        let id = existing
            .and_then(|i| decisions[i].id.clone())
            .or_else(|| decision.id.clone())
            .unwrap_or_else(|| format!("decision-{}", decisions.len() + 1));
        let mut stored = decision.clone();
        stored.id = Some(id.clone());
        match existing {
            Some(i) => decisions[i] = stored,
            None => decisions.push(stored),
        }
        Ok(id)
    }

    async fn patch(&self, id: &str, patch: &DecisionPatch) -> Result<()> {
        let decisions = self.decisions.lock().map_err(poisoned)?;
        if !decisions.iter().any(|d| d.id.as_deref() == Some(id)) {
            return Err(NormalizationError::not_found("decision", id));
        }
        self.patches
            .lock()
            .map_err(poisoned)?
            .push((id.to_string(), patch.clone()));
        Ok(())
    }
}

// ── Annotation ──

/// Returns the same response to every request.
#[derive(Debug, Default)]
pub struct StaticAnnotationService {
    response: Option<NerResponse>,
    requests: Mutex<Vec<NerRequest>>,
    calls: AtomicUsize,
    failures: Failures,
}

impl StaticAnnotationService {
    pub fn new(response: NerResponse) -> Self {
        Self {
            response: Some(response),
            ..Self::default()
        }
    }

    pub fn fail_next(&self, err: NormalizationError) {
        self.failures.push(err);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<NerRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl AnnotationService for StaticAnnotationService {
    async fn ner(&self, request: &NerRequest) -> Result<NerResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().map_err(poisoned)?.push(request.clone());
        self.failures.next()?;
        self.response
            .clone()
            .ok_or_else(|| NormalizationError::unexpected("no annotation response configured"))
    }
}

// ── Zoning ──

#[derive(Debug, Default)]
pub struct StaticZoningService {
    zoning: Option<Zoning>,
    calls: AtomicUsize,
    failures: Failures,
}

impl StaticZoningService {
    pub fn new(zoning: Zoning) -> Self {
        Self {
            zoning: Some(zoning),
            ..Self::default()
        }
    }

    pub fn fail_next(&self, err: NormalizationError) {
        self.failures.push(err);
    }

    /// A service that always fails.
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ZoningService for StaticZoningService {
    async fn zone(&self, _request: &ZoningRequest) -> Result<Zoning> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.failures.next()?;
        self.zoning
            .clone()
            .ok_or_else(|| NormalizationError::unexpected("zoning service unavailable"))
    }
}

// ── Classification codes ──

#[derive(Debug, Default)]
pub struct MemoryClassificationLookup {
    codes: BTreeMap<String, ClassificationCode>,
}

impl MemoryClassificationLookup {
    pub fn new(codes: impl IntoIterator<Item = ClassificationCode>) -> Self {
        Self {
            codes: codes.into_iter().map(|c| (c.code.clone(), c)).collect(),
        }
    }
}

#[async_trait::async_trait]
impl ClassificationLookup for MemoryClassificationLookup {
    async fn find(&self, code: &str) -> Result<Option<ClassificationCode>> {
        Ok(self.codes.get(code).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_find_assigns_stable_id() {
        let store = MemoryDecisionStore::new();
        let decision = CanonicalDecision::new(SourceName::Juritj, "1", "texte");
        let id = store.put(&decision).await.unwrap();
        let again = store.put(&decision).await.unwrap();
        assert_eq!(id, again);
        assert_eq!(store.put_count(), 2);
        assert_eq!(store.decisions().len(), 1);

        let found = DecisionStore::find(&store, SourceName::Juritj, "1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id.as_deref(), Some(id.as_str()));
    }

    #[tokio::test]
    async fn injected_failure_is_returned_once() {
        let store = MemoryDecisionStore::new();
        store.fail_next(NormalizationError::Postponable("429".into()));
        assert!(
            DecisionStore::find(&store, SourceName::Jurinet, "x")
                .await
                .unwrap_err()
                .is_postponable()
        );
        assert!(
            DecisionStore::find(&store, SourceName::Jurinet, "x")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn patch_unknown_decision_is_not_found() {
        let store = MemoryDecisionStore::new();
        let decision = CanonicalDecision::new(SourceName::Juritj, "1", "texte");
        let err = store
            .patch("missing", &DecisionPatch::from_candidate(&decision))
            .await
            .unwrap_err();
        assert!(matches!(err, NormalizationError::NotFound { .. }));
    }
}
