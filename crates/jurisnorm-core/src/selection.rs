//! Which raw records are eligible for (re)processing.
//!
//! A [`Query`] is a conjunction of [`Filter`]s plus an optional result limit.
//! Stores either evaluate it in memory with [`Query::matches`] or render it to
//! their own query language.

use chrono::{DateTime, Duration, Utc};

use crate::event::{EventKind, RawRecord};

/// Consecutive trailing `Blocked` events that take a record out of automatic retry.
pub const BLOCKED_STREAK_LIMIT: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// No event of any of these kinds, anywhere in the list.
    NoEventOf(Vec<EventKind>),
    /// Not all of the `n` most recent events are of `kind`.
    NotLastNAll { n: usize, kind: EventKind },
    /// `Created` date within `[from, to)`; open bounds are unbounded.
    CreatedBetween {
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    },
    IdIn(Vec<String>),
    SourceIdIn(Vec<String>),
    /// Strictly after this position in reception order (`Created` date, then id).
    ReceivedAfter {
        created: Option<DateTime<Utc>>,
        id: String,
    },
}

impl Filter {
    /// Keyset cursor placed just past `raw`.
    pub fn after(raw: &RawRecord) -> Self {
        Self::ReceivedAfter {
            created: raw.created_at(),
            id: raw.id.clone(),
        }
    }

    pub fn matches(&self, raw: &RawRecord) -> bool {
        match self {
            Self::NoEventOf(kinds) => !raw.has_event(kinds),
            Self::NotLastNAll { n, kind } => !raw.last_n_all(*n, *kind),
            Self::CreatedBetween { from, to } => match raw.created_at() {
                None => false,
                Some(created) => {
                    from.is_none_or(|from| created >= from) && to.is_none_or(|to| created < to)
                }
            },
            Self::IdIn(ids) => ids.iter().any(|id| *id == raw.id),
            Self::SourceIdIn(ids) => raw
                .source_id
                .as_ref()
                .is_some_and(|sid| ids.iter().any(|id| id == sid)),
            Self::ReceivedAfter { created, id } => {
                (raw.created_at(), raw.id.as_str()) > (*created, id.as_str())
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub limit: Option<usize>,
}

impl Query {
    /// Matches every record.
    pub fn all() -> Self {
        Self::default()
    }

    /// Records never normalized nor deleted, and not stuck in a blocked streak.
    pub fn eligible() -> Self {
        Self::all()
            .filter(Filter::NoEventOf(vec![
                EventKind::Normalized,
                EventKind::Deleted,
            ]))
            .filter(Filter::NotLastNAll {
                n: BLOCKED_STREAK_LIMIT,
                kind: EventKind::Blocked,
            })
    }

    /// Records received since `since` and never normalized nor deleted.
    ///
    /// No circuit breaker: this is an explicit reprocessing request.
    pub fn received_since(since: DateTime<Utc>) -> Self {
        Self::all()
            .filter(Filter::CreatedBetween {
                from: Some(since),
                to: None,
            })
            .filter(Filter::NoEventOf(vec![
                EventKind::Normalized,
                EventKind::Deleted,
            ]))
    }

    /// Records received during the last 24 hours, relative to `now`.
    pub fn last_day(now: DateTime<Utc>) -> Self {
        Self::received_since(now - Duration::hours(24))
    }

    /// Exactly these raw record ids, whatever their history.
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::all().filter(Filter::IdIn(ids.into_iter().map(Into::into).collect()))
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn matches(&self, raw: &RawRecord) -> bool {
        self.filters.iter().all(|f| f.matches(raw))
    }
}

/// Build the selection query for a run.
///
/// A caller-supplied override replaces the default eligibility query entirely;
/// an explicit `limit` wins over any limit carried by the override.
pub fn select(override_query: Option<Query>, limit: Option<usize>) -> Query {
    let query = override_query.unwrap_or_else(Query::eligible);
    match limit {
        Some(_) => query.with_limit(limit),
        None => query,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, d, 12, 0, 0).unwrap()
    }

    fn record_with(events: &[Event]) -> RawRecord {
        let mut raw = RawRecord::new("r1", "k", day(1), serde_json::Value::Null);
        for e in events {
            raw.push_event(e.clone()).unwrap();
        }
        raw
    }

    #[test]
    fn fresh_record_is_eligible() {
        assert!(Query::eligible().matches(&record_with(&[])));
    }

    #[test]
    fn legacy_record_without_events_is_eligible() {
        let raw = RawRecord::from_parts("r".into(), "k".into(), None, vec![], Default::default())
            .unwrap();
        assert!(Query::eligible().matches(&raw));
    }

    #[test]
    fn three_trailing_blocked_excluded() {
        let raw = record_with(&[
            Event::blocked("a"),
            Event::blocked("b"),
            Event::blocked("c"),
        ]);
        assert!(!Query::eligible().matches(&raw));
    }

    #[test]
    fn created_then_two_blocked_included() {
        // The 3 most recent events are created, blocked, blocked.
        let raw = record_with(&[Event::blocked("a"), Event::blocked("b")]);
        assert!(!raw.last_n_all(BLOCKED_STREAK_LIMIT, EventKind::Blocked));
        assert!(Query::eligible().matches(&raw));
    }

    #[test]
    fn longer_blocked_streak_excluded() {
        let raw = record_with(&[
            Event::blocked("a"),
            Event::blocked("b"),
            Event::blocked("c"),
            Event::blocked("d"),
        ]);
        assert!(!Query::eligible().matches(&raw));
    }

    #[test]
    fn normalized_anywhere_excluded() {
        let raw = record_with(&[Event::normalized(), Event::blocked("later")]);
        assert!(!Query::eligible().matches(&raw));
    }

    #[test]
    fn deleted_anywhere_excluded() {
        let raw = record_with(&[Event::deleted()]);
        assert!(!Query::eligible().matches(&raw));
    }

    #[test]
    fn override_replaces_default() {
        let stuck = record_with(&[
            Event::blocked("a"),
            Event::blocked("b"),
            Event::blocked("c"),
        ]);
        let query = select(Some(Query::ids(["r1"])), None);
        assert!(query.matches(&stuck));
        assert!(!select(None, None).matches(&stuck));
    }

    #[test]
    fn explicit_limit_wins() {
        let query = select(Some(Query::all().with_limit(Some(50))), Some(5));
        assert_eq!(query.limit, Some(5));
        assert_eq!(select(Some(Query::all().with_limit(Some(50))), None).limit, Some(50));
        assert_eq!(select(None, Some(10)).limit, Some(10));
    }

    #[test]
    fn last_day_window() {
        let now = day(2);
        let query = Query::last_day(now);
        assert!(query.matches(&record_with(&[Event::blocked("x")])));

        let old = RawRecord::new("old", "k", day(1) - Duration::hours(1), Default::default());
        assert!(!query.matches(&old));
    }

    #[test]
    fn source_id_filter() {
        let raw = record_with(&[]).with_source_id("12345");
        assert!(Query::all()
            .filter(Filter::SourceIdIn(vec!["12345".into()]))
            .matches(&raw));
        assert!(!Query::all()
            .filter(Filter::SourceIdIn(vec!["999".into()]))
            .matches(&raw));
    }

    #[test]
    fn received_after_follows_reception_order() {
        let first = RawRecord::new("b", "k", day(1), Default::default());
        let cursor = Filter::after(&first);
        assert!(!cursor.matches(&first));
        assert!(!cursor.matches(&RawRecord::new("a", "k", day(1), Default::default())));
        assert!(cursor.matches(&RawRecord::new("c", "k", day(1), Default::default())));
        assert!(cursor.matches(&RawRecord::new("a", "k", day(2), Default::default())));

        let legacy = RawRecord::from_parts("z".into(), "k".into(), None, vec![], Default::default())
            .unwrap();
        assert!(!cursor.matches(&legacy));
        assert!(Filter::after(&legacy).matches(&first));
    }
}
