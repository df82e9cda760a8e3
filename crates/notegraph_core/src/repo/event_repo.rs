//! Append-only event log contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist events exactly once per event id.
//! - Hand back the full history for replay.
//!
//! # Invariants
//! - Logs never update or delete stored events.
//! - Re-appending a known event id is a silent no-op, so merging a peer
//!   log into a local one is idempotent.
//! - Read paths reject undecodable rows instead of masking them.

use crate::db::DbError;
use crate::model::event::Event;
use rusqlite::{params, Connection};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type LogResult<T> = Result<T, LogError>;

/// Error type shared by every event log backend.
#[derive(Debug)]
pub enum LogError {
    Db(DbError),
    Io(std::io::Error),
    Serde(serde_json::Error),
    InvalidData(String),
}

impl Display for LogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "event log io failed: {err}"),
            Self::Serde(err) => write!(f, "event encoding failed: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted event data: {message}"),
        }
    }
}

impl Error for LogError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Serde(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for LogError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for LogError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<std::io::Error> for LogError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for LogError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

/// Storage contract for the append-only event history.
pub trait EventLog {
    /// Stores `event`; returns `false` when its id was already present.
    fn append(&self, event: &Event) -> LogResult<bool>;

    /// Stores every unseen event of `events`; returns how many were new.
    fn append_all(&self, events: &[Event]) -> LogResult<usize> {
        let mut inserted = 0;
        for event in events {
            if self.append(event)? {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// Loads the full history in append order.
    fn load_all(&self) -> LogResult<Vec<Event>>;

    fn len(&self) -> LogResult<usize>;

    fn is_empty(&self) -> LogResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// SQLite-backed event log over the `events` table.
pub struct SqliteEventLog<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEventLog<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn insert(conn: &Connection, event: &Event) -> LogResult<bool> {
        let body = serde_json::to_string(event)?;
        let changed = conn.execute(
            "INSERT OR IGNORE INTO events (event_id, event_type, timestamp, body)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                event.id.as_str(),
                event.event_type().as_str(),
                event.timestamp,
                body
            ],
        )?;
        Ok(changed == 1)
    }
}

impl EventLog for SqliteEventLog<'_> {
    fn append(&self, event: &Event) -> LogResult<bool> {
        Self::insert(self.conn, event)
    }

    fn append_all(&self, events: &[Event]) -> LogResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;
        for event in events {
            if Self::insert(&tx, event)? {
                inserted += 1;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn load_all(&self) -> LogResult<Vec<Event>> {
        let mut stmt = self
            .conn
            .prepare("SELECT event_id, body FROM events ORDER BY seq ASC;")?;
        let mut rows = stmt.query([])?;
        let mut events = Vec::new();

        while let Some(row) = rows.next()? {
            let event_id: String = row.get("event_id")?;
            let body: String = row.get("body")?;
            events.push(decode_row(&event_id, &body)?);
        }

        Ok(events)
    }

    fn len(&self) -> LogResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events;", [], |row| row.get(0))?;
        usize::try_from(count)
            .map_err(|_| LogError::InvalidData(format!("negative event count `{count}`")))
    }
}

fn decode_row(event_id: &str, body: &str) -> LogResult<Event> {
    let event: Event = serde_json::from_str(body).map_err(|err| {
        LogError::InvalidData(format!("undecodable body for event `{event_id}`: {err}"))
    })?;
    if event.id != event_id {
        return Err(LogError::InvalidData(format!(
            "events.event_id `{event_id}` does not match body id `{}`",
            event.id
        )));
    }
    Ok(event)
}
