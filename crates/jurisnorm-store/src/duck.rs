//! DuckDB-backed raw store.
//!
//! Two tables: `raw_records` holds one row per record with its payload as
//! JSON text, `raw_events` one row per event keyed by `(record_id, seq)`.
//! Selection queries are rendered to SQL over the event table, so "no event
//! of kind X" and "last N events all of kind Y" never load full histories.
//!
//! Dates are stored as fixed-width RFC 3339 UTC strings, which sort
//! chronologically.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use duckdb::{Connection, OptionalExt, params, params_from_iter};
use jurisnorm_core::{Event, EventKind, Filter, Query, RawRecord};
use tracing::info;

use crate::StoreError;
use crate::raw::RawStore;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS raw_records (
        id VARCHAR PRIMARY KEY,
        source_location VARCHAR NOT NULL,
        source_id VARCHAR,
        payload VARCHAR NOT NULL
    );
    CREATE TABLE IF NOT EXISTS raw_events (
        record_id VARCHAR NOT NULL,
        seq INTEGER NOT NULL,
        kind VARCHAR NOT NULL,
        date VARCHAR NOT NULL,
        reason VARCHAR,
        PRIMARY KEY (record_id, seq)
    );
";

/// Raw store over a DuckDB database, in memory or file-backed.
pub struct DuckRawStore {
    conn: Mutex<Connection>,
}

impl DuckRawStore {
    /// Open an in-memory database.
    pub fn open() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open or create a database file; tables are created on first use.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Other(format!("mutex poisoned: {e}")))
    }

    /// Number of stored records.
    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT count(*) FROM raw_records", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn load(conn: &Connection, id: &str) -> Result<Option<RawRecord>, StoreError> {
        let row: Option<(String, String, Option<String>, String)> = conn
            .query_row(
                "SELECT id, source_location, source_id, payload FROM raw_records WHERE id = ?",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        let Some((id, source_location, source_id, payload)) = row else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT kind, date, reason FROM raw_events WHERE record_id = ? ORDER BY seq",
        )?;
        let rows = stmt.query_map([&id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;
        let mut events = Vec::new();
        for row in rows {
            let (kind, date, reason) = row?;
            events.push(event_from_row(&kind, &date, reason)?);
        }

        let payload = serde_json::from_str(&payload)?;
        Ok(Some(RawRecord::from_parts(
            id,
            source_location,
            source_id,
            events,
            payload,
        )?))
    }
}

fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn event_from_row(kind: &str, date: &str, reason: Option<String>) -> Result<Event, StoreError> {
    let date = DateTime::parse_from_rfc3339(date)
        .map_err(|e| StoreError::Other(format!("bad event date {date:?}: {e}")))?
        .with_timezone(&Utc);
    let kind = EventKind::parse(kind)
        .ok_or_else(|| StoreError::Other(format!("unknown event kind {kind:?}")))?;
    Ok(match kind {
        EventKind::Created => Event::Created { date },
        EventKind::Normalized => Event::Normalized { date },
        EventKind::Blocked => Event::Blocked {
            date,
            reason: reason.unwrap_or_default(),
        },
        EventKind::Deleted => Event::Deleted { date },
    })
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Reception date of `r`: the date of its first event.
const RECEIVED: &str = "(SELECT e.date FROM raw_events e WHERE e.record_id = r.id AND e.seq = 0)";

/// Render a selection query to SQL plus its string parameters.
fn render(query: &Query) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut params = Vec::new();

    for filter in &query.filters {
        match filter {
            Filter::NoEventOf(kinds) if kinds.is_empty() => {}
            Filter::NoEventOf(kinds) => {
                clauses.push(format!(
                    "NOT EXISTS (SELECT 1 FROM raw_events e \
                     WHERE e.record_id = r.id AND e.kind IN ({}))",
                    placeholders(kinds.len())
                ));
                params.extend(kinds.iter().map(|k| k.as_str().to_string()));
            }
            Filter::NotLastNAll { n: 0, .. } => {}
            Filter::NotLastNAll { n, kind } => {
                clauses.push(format!(
                    "r.id NOT IN (\
                        SELECT record_id FROM (\
                            SELECT record_id, kind, row_number() OVER \
                                (PARTITION BY record_id ORDER BY seq DESC) AS rn \
                            FROM raw_events) t \
                        WHERE rn <= {n} \
                        GROUP BY record_id \
                        HAVING count(*) = {n} AND bool_and(kind = ?))"
                ));
                params.push(kind.as_str().to_string());
            }
            Filter::CreatedBetween { from, to } => {
                let mut sub = String::from(
                    "EXISTS (SELECT 1 FROM raw_events e \
                     WHERE e.record_id = r.id AND e.seq = 0 AND e.kind = 'created'",
                );
                if let Some(from) = from {
                    sub.push_str(" AND e.date >= ?");
                    params.push(format_date(*from));
                }
                if let Some(to) = to {
                    sub.push_str(" AND e.date < ?");
                    params.push(format_date(*to));
                }
                sub.push(')');
                clauses.push(sub);
            }
            Filter::IdIn(ids) | Filter::SourceIdIn(ids) if ids.is_empty() => {
                clauses.push("FALSE".to_string());
            }
            Filter::IdIn(ids) => {
                clauses.push(format!("r.id IN ({})", placeholders(ids.len())));
                params.extend(ids.iter().cloned());
            }
            Filter::SourceIdIn(ids) => {
                clauses.push(format!("r.source_id IN ({})", placeholders(ids.len())));
                params.extend(ids.iter().cloned());
            }
            Filter::ReceivedAfter { created: None, id } => {
                clauses.push(format!("({RECEIVED} IS NOT NULL OR r.id > ?)"));
                params.push(id.clone());
            }
            Filter::ReceivedAfter {
                created: Some(created),
                id,
            } => {
                clauses.push(format!(
                    "({RECEIVED} > ? OR ({RECEIVED} = ? AND r.id > ?))"
                ));
                let created = format_date(*created);
                params.extend([created.clone(), created, id.clone()]);
            }
        }
    }

    let mut sql = String::from("SELECT r.id FROM raw_records r");
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(&format!(" ORDER BY {RECEIVED} NULLS FIRST, r.id"));
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    (sql, params)
}

#[async_trait::async_trait]
impl RawStore for DuckRawStore {
    async fn find(&self, query: &Query) -> Result<Vec<RawRecord>, StoreError> {
        let conn = self.lock()?;
        let (sql, params) = render(query);
        let ids: Vec<String> = {
            let mut stmt = conn.prepare(&sql)?;
            let rows =
                stmt.query_map(params_from_iter(params.iter()), |row| row.get::<_, String>(0))?;
            rows.collect::<Result<_, _>>()?
        };

        let mut records = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(record) = Self::load(&conn, id)? {
                records.push(record);
            }
        }
        info!(count = records.len(), "selected raw records");
        Ok(records)
    }

    async fn get(&self, id: &str) -> Result<Option<RawRecord>, StoreError> {
        let conn = self.lock()?;
        Self::load(&conn, id)
    }

    async fn insert(&self, record: &RawRecord) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO raw_records (id, source_location, source_id, payload) VALUES (?, ?, ?, ?)",
            params![
                record.id,
                record.source_location,
                record.source_id,
                serde_json::to_string(&record.payload)?
            ],
        )?;
        for (seq, event) in record.events().iter().enumerate() {
            tx.execute(
                "INSERT INTO raw_events (record_id, seq, kind, date, reason) VALUES (?, ?, ?, ?, ?)",
                params![
                    record.id,
                    seq as i64,
                    event.kind().as_str(),
                    format_date(event.date()),
                    event.reason()
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn append_event(&self, id: &str, event: &Event) -> Result<RawRecord, StoreError> {
        let conn = self.lock()?;
        let mut record =
            Self::load(&conn, id)?.ok_or_else(|| StoreError::RecordNotFound(id.to_string()))?;
        let seq = record.events().len() as i64;
        record.push_event(event.clone())?;
        conn.execute(
            "INSERT INTO raw_events (record_id, seq, kind, date, reason) VALUES (?, ?, ?, ?, ?)",
            params![
                id,
                seq,
                event.kind().as_str(),
                format_date(event.date()),
                event.reason()
            ],
        )?;
        Ok(record)
    }
}
