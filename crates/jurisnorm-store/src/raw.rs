//! Raw record storage.

use std::collections::BTreeMap;
use std::sync::Mutex;

use jurisnorm_core::{Event, Query, RawRecord};

use crate::StoreError;

/// Where raw records and their event lists are persisted.
#[async_trait::async_trait]
pub trait RawStore: Send + Sync {
    /// Records matching `query`, oldest reception first, up to its limit.
    async fn find(&self, query: &Query) -> Result<Vec<RawRecord>, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<RawRecord>, StoreError>;

    /// Store a new record with its events.
    async fn insert(&self, record: &RawRecord) -> Result<(), StoreError>;

    /// Append one event and return the updated record.
    ///
    /// Fails with [`StoreError::RecordNotFound`] if the record is gone.
    async fn append_event(&self, id: &str, event: &Event) -> Result<RawRecord, StoreError>;
}

/// Sort order shared by every backend: reception date, then id.
pub(crate) fn reception_order(a: &RawRecord, b: &RawRecord) -> std::cmp::Ordering {
    a.created_at()
        .cmp(&b.created_at())
        .then_with(|| a.id.cmp(&b.id))
}

/// Raw store held in memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryRawStore {
    records: Mutex<BTreeMap<String, RawRecord>>,
}

impl MemoryRawStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = RawRecord>) -> Self {
        let map = records.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self {
            records: Mutex::new(map),
        }
    }

    /// Remove a record, simulating a concurrent deletion.
    pub fn remove(&self, id: &str) -> Result<Option<RawRecord>, StoreError> {
        Ok(self.lock()?.remove(id))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, RawRecord>>, StoreError> {
        self.records
            .lock()
            .map_err(|e| StoreError::Other(format!("mutex poisoned: {e}")))
    }
}

#[async_trait::async_trait]
impl RawStore for MemoryRawStore {
    async fn find(&self, query: &Query) -> Result<Vec<RawRecord>, StoreError> {
        let records = self.lock()?;
        let mut found: Vec<RawRecord> = records
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        found.sort_by(reception_order);
        if let Some(limit) = query.limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    async fn get(&self, id: &str) -> Result<Option<RawRecord>, StoreError> {
        Ok(self.lock()?.get(id).cloned())
    }

    async fn insert(&self, record: &RawRecord) -> Result<(), StoreError> {
        self.lock()?.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn append_event(&self, id: &str, event: &Event) -> Result<RawRecord, StoreError> {
        let mut records = self.lock()?;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::RecordNotFound(id.to_string()))?;
        record.push_event(event.clone())?;
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use jurisnorm_core::EventKind;

    fn raw(id: &str, day: u32) -> RawRecord {
        RawRecord::new(
            id,
            format!("{id}.json"),
            Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0).unwrap(),
            serde_json::json!({}),
        )
    }

    #[tokio::test]
    async fn find_orders_by_reception_and_limits() {
        let store = MemoryRawStore::with_records([raw("b", 3), raw("a", 2), raw("c", 1)]);
        let found = store.find(&Query::all().with_limit(Some(2))).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["c", "a"]);
    }

    #[tokio::test]
    async fn append_event_updates_record() {
        let store = MemoryRawStore::with_records([raw("a", 1)]);
        let updated = store.append_event("a", &Event::normalized()).await.unwrap();
        assert_eq!(updated.status(), Some(EventKind::Normalized));
        assert!(store.find(&Query::eligible()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_to_vanished_record_fails() {
        let store = MemoryRawStore::with_records([raw("a", 1)]);
        store.remove("a").unwrap();
        let err = store.append_event("a", &Event::deleted()).await.unwrap_err();
        assert!(matches!(err, StoreError::RecordNotFound(id) if id == "a"));
    }
}
