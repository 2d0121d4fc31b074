//! Raw records and their append-only lifecycle events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::NormalizationError;

/// Discriminant of an [`Event`], used by selection queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Created,
    Normalized,
    Blocked,
    Deleted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Normalized => "normalized",
            Self::Blocked => "blocked",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Self::Created),
            "normalized" => Some(Self::Normalized),
            "blocked" => Some(Self::Blocked),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// One lifecycle event of a raw record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    Created { date: DateTime<Utc> },
    Normalized { date: DateTime<Utc> },
    Blocked { date: DateTime<Utc>, reason: String },
    Deleted { date: DateTime<Utc> },
}

impl Event {
    pub fn normalized() -> Self {
        Self::Normalized { date: Utc::now() }
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        Self::Blocked {
            date: Utc::now(),
            reason: reason.into(),
        }
    }

    pub fn deleted() -> Self {
        Self::Deleted { date: Utc::now() }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Created { .. } => EventKind::Created,
            Self::Normalized { .. } => EventKind::Normalized,
            Self::Blocked { .. } => EventKind::Blocked,
            Self::Deleted { .. } => EventKind::Deleted,
        }
    }

    pub fn date(&self) -> DateTime<Utc> {
        match self {
            Self::Created { date }
            | Self::Normalized { date }
            | Self::Blocked { date, .. }
            | Self::Deleted { date } => *date,
        }
    }

    /// Blocking reason, for `Blocked` events.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Blocked { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Whether this event ends a processing attempt.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Created { .. })
    }
}

/// A record as received from a source system, before normalization.
///
/// Events are append-only and, when present, start with `Created`. Records
/// imported from legacy storage may carry no events at all; selection treats
/// them as never processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRecordParts")]
pub struct RawRecord {
    pub id: String,
    /// Key of the source artifact in object storage.
    pub source_location: String,
    /// Identifier of the decision in its source system, when the collector knows it.
    pub source_id: Option<String>,
    events: Vec<Event>,
    /// Source-specific metadata, interpreted by the source adapter.
    pub payload: serde_json::Value,
}

#[derive(Deserialize)]
struct RawRecordParts {
    id: String,
    source_location: String,
    #[serde(default)]
    source_id: Option<String>,
    #[serde(default)]
    events: Vec<Event>,
    #[serde(default)]
    payload: serde_json::Value,
}

impl TryFrom<RawRecordParts> for RawRecord {
    type Error = NormalizationError;

    fn try_from(parts: RawRecordParts) -> Result<Self, Self::Error> {
        RawRecord::from_parts(
            parts.id,
            parts.source_location,
            parts.source_id,
            parts.events,
            parts.payload,
        )
    }
}

impl RawRecord {
    /// A freshly received record with its `Created` event.
    pub fn new(
        id: impl Into<String>,
        source_location: impl Into<String>,
        created_at: DateTime<Utc>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            source_location: source_location.into(),
            source_id: None,
            events: vec![Event::Created { date: created_at }],
            payload,
        }
    }

    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    /// Rebuild a record from storage, checking the event-list invariant.
    pub fn from_parts(
        id: String,
        source_location: String,
        source_id: Option<String>,
        events: Vec<Event>,
        payload: serde_json::Value,
    ) -> Result<Self, NormalizationError> {
        if let Some(first) = events.first()
            && first.kind() != EventKind::Created
        {
            return Err(NormalizationError::not_supported(
                "events",
                format!("record {id} starts with a {} event", first.kind().as_str()),
            ));
        }
        if events.iter().skip(1).any(|e| e.kind() == EventKind::Created) {
            return Err(NormalizationError::not_supported(
                "events",
                format!("record {id} has more than one created event"),
            ));
        }
        Ok(Self {
            id,
            source_location,
            source_id,
            events,
            payload,
        })
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Date of the `Created` event.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.events.first().map(Event::date)
    }

    /// Current status, derived from the tail of the event list.
    pub fn status(&self) -> Option<EventKind> {
        self.events.last().map(Event::kind)
    }

    /// Whether any event has one of the given kinds.
    pub fn has_event(&self, kinds: &[EventKind]) -> bool {
        self.events.iter().any(|e| kinds.contains(&e.kind()))
    }

    /// Whether the `n` most recent events exist and are all of `kind`.
    pub fn last_n_all(&self, n: usize, kind: EventKind) -> bool {
        n > 0
            && self.events.len() >= n
            && self.events[self.events.len() - n..]
                .iter()
                .all(|e| e.kind() == kind)
    }

    /// Append a terminal event. A second `Created` event is rejected.
    pub fn push_event(&mut self, event: Event) -> Result<(), NormalizationError> {
        if !event.is_terminal() {
            return Err(NormalizationError::not_supported(
                "events",
                format!("record {} already has a created event", self.id),
            ));
        }
        self.events.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn created(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, 8, 0, 0).unwrap()
    }

    #[test]
    fn new_record_is_created() {
        let raw = RawRecord::new("r1", "tj/r1.json", created(1), serde_json::json!({}));
        assert_eq!(raw.status(), Some(EventKind::Created));
        assert_eq!(raw.created_at(), Some(created(1)));
        assert_eq!(raw.events().len(), 1);
    }

    #[test]
    fn status_follows_tail() {
        let mut raw = RawRecord::new("r1", "k", created(1), serde_json::Value::Null);
        raw.push_event(Event::blocked("boom")).unwrap();
        assert_eq!(raw.status(), Some(EventKind::Blocked));
        raw.push_event(Event::normalized()).unwrap();
        assert_eq!(raw.status(), Some(EventKind::Normalized));
    }

    #[test]
    fn second_created_event_rejected() {
        let mut raw = RawRecord::new("r1", "k", created(1), serde_json::Value::Null);
        let err = raw.push_event(Event::Created { date: created(2) }).unwrap_err();
        assert!(matches!(err, NormalizationError::NotSupported { .. }));
    }

    #[test]
    fn from_parts_requires_created_first() {
        let result = RawRecord::from_parts(
            "r1".into(),
            "k".into(),
            None,
            vec![Event::normalized()],
            serde_json::Value::Null,
        );
        assert!(result.is_err());
    }

    #[test]
    fn from_parts_accepts_legacy_empty_events() {
        let raw =
            RawRecord::from_parts("r1".into(), "k".into(), None, vec![], serde_json::Value::Null)
                .unwrap();
        assert_eq!(raw.status(), None);
        assert_eq!(raw.created_at(), None);
    }

    #[test]
    fn last_n_all_needs_enough_events() {
        let mut raw = RawRecord::new("r1", "k", created(1), serde_json::Value::Null);
        raw.push_event(Event::blocked("a")).unwrap();
        raw.push_event(Event::blocked("b")).unwrap();
        assert!(!raw.last_n_all(3, EventKind::Blocked));
        raw.push_event(Event::blocked("c")).unwrap();
        assert!(raw.last_n_all(3, EventKind::Blocked));
    }

    #[test]
    fn event_json_is_tagged_by_type() {
        let event = Event::Blocked {
            date: created(4),
            reason: "classification code not found: 4AA".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "blocked");
        assert_eq!(json["reason"], "classification code not found: 4AA");
    }

    #[test]
    fn record_json_validates_events() {
        let json = serde_json::json!({
            "id": "r1",
            "source_location": "k",
            "events": [{ "type": "deleted", "date": "2025-03-01T08:00:00Z" }],
            "payload": {}
        });
        assert!(serde_json::from_value::<RawRecord>(json).is_err());
    }
}
