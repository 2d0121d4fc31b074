//! Append-only lifecycle log over a [`RawStore`].

use std::collections::BTreeMap;
use std::sync::Arc;

use jurisnorm_core::{Event, EventKind, Filter, Query, RawRecord};
use tracing::{error, info, warn};

use crate::StoreError;
use crate::raw::RawStore;

/// Outcome of a duplicate-marking pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DuplicateSummary {
    pub groups: usize,
    pub deleted: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct EventLog {
    store: Arc<dyn RawStore>,
}

impl EventLog {
    pub fn new(store: Arc<dyn RawStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RawStore> {
        &self.store
    }

    /// Append `event` to record `id`.
    pub async fn append(&self, id: &str, event: Event) -> Result<RawRecord, StoreError> {
        self.store.append_event(id, &event).await
    }

    /// Append a terminal event; a persistence failure is logged and swallowed.
    pub async fn record(&self, id: &str, event: Event) -> Option<RawRecord> {
        let kind = event.kind();
        match self.append(id, event).await {
            Ok(updated) => Some(updated),
            Err(e) => {
                error!(record_id = id, kind = kind.as_str(), error = %e, "failed to append event");
                None
            }
        }
    }

    /// Whether another record with the same source id was received later.
    pub async fn is_superseded(&self, raw: &RawRecord) -> Result<bool, StoreError> {
        let (Some(source_id), Some(created)) = (&raw.source_id, raw.created_at()) else {
            return Ok(false);
        };
        let siblings = self
            .store
            .find(&Query::all().filter(Filter::SourceIdIn(vec![source_id.clone()])))
            .await?;
        Ok(siblings
            .iter()
            .filter(|s| s.id != raw.id)
            .filter_map(RawRecord::created_at)
            .any(|other| other > created))
    }

    /// Keep the latest reception of each source id among unprocessed records
    /// and mark the older ones deleted.
    pub async fn mark_duplicates(&self) -> Result<DuplicateSummary, StoreError> {
        let pending = self
            .store
            .find(&Query::all().filter(Filter::NoEventOf(vec![
                EventKind::Normalized,
                EventKind::Deleted,
            ])))
            .await?;

        let mut by_source: BTreeMap<&str, Vec<&RawRecord>> = BTreeMap::new();
        for raw in &pending {
            if let Some(source_id) = raw.source_id.as_deref() {
                by_source.entry(source_id).or_default().push(raw);
            }
        }

        let mut summary = DuplicateSummary::default();
        for (source_id, mut group) in by_source {
            if group.len() < 2 {
                continue;
            }
            summary.groups += 1;
            group.sort_by(|a, b| {
                a.created_at()
                    .cmp(&b.created_at())
                    .then_with(|| a.id.cmp(&b.id))
            });
            let Some((latest, older)) = group.split_last() else {
                continue;
            };
            info!(
                source_id,
                kept = %latest.id,
                duplicates = older.len(),
                "marking duplicate receptions"
            );
            for raw in older {
                match self.append(&raw.id, Event::deleted()).await {
                    Ok(_) => summary.deleted += 1,
                    Err(e) => {
                        warn!(record_id = %raw.id, error = %e, "failed to mark duplicate");
                        summary.failed += 1;
                    }
                }
            }
        }

        info!(
            groups = summary.groups,
            deleted = summary.deleted,
            failed = summary.failed,
            "duplicate marking finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::MemoryRawStore;
    use chrono::{TimeZone, Utc};

    fn raw(id: &str, source_id: &str, day: u32) -> RawRecord {
        RawRecord::new(
            id,
            format!("{id}.json"),
            Utc.with_ymd_and_hms(2025, 5, day, 0, 0, 0).unwrap(),
            serde_json::Value::Null,
        )
        .with_source_id(source_id)
    }

    fn log_with(records: Vec<RawRecord>) -> (EventLog, Arc<MemoryRawStore>) {
        let store = Arc::new(MemoryRawStore::with_records(records));
        (EventLog::new(store.clone()), store)
    }

    #[tokio::test]
    async fn record_swallows_missing_record() {
        let (log, _) = log_with(vec![]);
        assert!(log.record("nope", Event::normalized()).await.is_none());
        assert!(matches!(
            log.append("nope", Event::normalized()).await,
            Err(StoreError::RecordNotFound(_))
        ));
    }

    #[tokio::test]
    async fn older_reception_is_superseded() {
        let older = raw("a", "S1", 1);
        let newer = raw("b", "S1", 2);
        let (log, _) = log_with(vec![older.clone(), newer.clone(), raw("c", "S2", 3)]);
        assert!(log.is_superseded(&older).await.unwrap());
        assert!(!log.is_superseded(&newer).await.unwrap());
    }

    #[tokio::test]
    async fn record_without_source_id_is_never_superseded() {
        let lone = RawRecord::new("x", "x.json", Utc::now(), serde_json::Value::Null);
        let (log, _) = log_with(vec![lone.clone()]);
        assert!(!log.is_superseded(&lone).await.unwrap());
    }

    #[tokio::test]
    async fn duplicates_keep_latest_reception() {
        let (log, store) = log_with(vec![
            raw("a", "S1", 1),
            raw("b", "S1", 3),
            raw("c", "S1", 2),
            raw("d", "S2", 1),
        ]);
        let summary = log.mark_duplicates().await.unwrap();
        assert_eq!(
            summary,
            DuplicateSummary {
                groups: 1,
                deleted: 2,
                failed: 0
            }
        );

        for (id, kind) in [
            ("a", EventKind::Deleted),
            ("c", EventKind::Deleted),
            ("b", EventKind::Created),
            ("d", EventKind::Created),
        ] {
            let record = store.get(id).await.unwrap().unwrap();
            assert_eq!(record.status(), Some(kind), "record {id}");
        }
    }

    #[tokio::test]
    async fn normalized_records_are_not_grouped() {
        let mut done = raw("a", "S1", 1);
        done.push_event(Event::normalized()).unwrap();
        let (log, _) = log_with(vec![done, raw("b", "S1", 2)]);
        let summary = log.mark_duplicates().await.unwrap();
        assert_eq!(summary.groups, 0);
    }
}
