//! JSON Lines event log stored inside a vault.
//!
//! # Invariants
//! - One event per line, appended with a trailing newline.
//! - A missing file reads as an empty log.
//! - Lines that are not UTF-8 or not a valid event are skipped with a
//!   warning; the rest still loads.
//! - Known event ids are cached against the file length. Appends through this
//!   log keep the cache current; any other change in length triggers a rescan.

use crate::model::event::Event;
use crate::repo::event_repo::{EventLog, LogResult};
use crate::vault::VaultPaths;
use log::warn;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Event log backed by `<vault>/.graphnotes/events.jsonl`.
#[derive(Debug, Clone)]
pub struct JsonlEventLog {
    path: PathBuf,
    index: RefCell<Option<LogIndex>>,
}

/// Summary of the file contents as of `file_len` bytes.
#[derive(Debug, Clone, Default)]
struct LogIndex {
    ids: BTreeSet<String>,
    events: usize,
    file_len: u64,
    torn_tail: bool,
}

impl JsonlEventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            index: RefCell::new(None),
        }
    }

    /// Log file of the vault rooted at `root`.
    pub fn for_vault(root: impl AsRef<Path>) -> Self {
        Self::new(VaultPaths::new(root).events_file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_bytes(&self) -> LogResult<Vec<u8>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn file_len(&self) -> LogResult<u64> {
        match fs::metadata(&self.path) {
            Ok(metadata) => Ok(metadata.len()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    fn scan(&self) -> LogResult<LogIndex> {
        let bytes = self.read_bytes()?;
        let events = parse_lines(&self.path, &bytes);
        Ok(LogIndex {
            events: events.len(),
            ids: events.into_iter().map(|event| event.id).collect(),
            file_len: bytes.len() as u64,
            torn_tail: bytes.last().is_some_and(|byte| *byte != b'\n'),
        })
    }

    fn with_index<T>(&self, apply: impl FnOnce(&mut LogIndex) -> LogResult<T>) -> LogResult<T> {
        let file_len = self.file_len()?;
        let mut slot = self.index.borrow_mut();
        if slot.as_ref().map_or(true, |index| index.file_len != file_len) {
            *slot = Some(self.scan()?);
        }
        apply(slot.get_or_insert_with(LogIndex::default))
    }
}

impl EventLog for JsonlEventLog {
    fn append(&self, event: &Event) -> LogResult<bool> {
        Ok(self.append_all(std::slice::from_ref(event))? == 1)
    }

    fn append_all(&self, events: &[Event]) -> LogResult<usize> {
        self.with_index(|index| {
            let mut batch_ids = BTreeSet::new();
            let fresh: Vec<&Event> = events
                .iter()
                .filter(|event| {
                    !index.ids.contains(&event.id) && batch_ids.insert(event.id.as_str())
                })
                .collect();
            if fresh.is_empty() {
                return Ok(0);
            }

            let mut buffer = String::new();
            // Terminate a torn last line so the first new event starts cleanly.
            if index.torn_tail {
                buffer.push('\n');
            }
            for event in &fresh {
                buffer.push_str(&serde_json::to_string(event)?);
                buffer.push('\n');
            }

            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            file.write_all(buffer.as_bytes())?;
            file.flush()?;

            index.ids.extend(fresh.iter().map(|event| event.id.clone()));
            index.events += fresh.len();
            index.file_len += buffer.len() as u64;
            index.torn_tail = false;
            Ok(fresh.len())
        })
    }

    fn load_all(&self) -> LogResult<Vec<Event>> {
        let bytes = self.read_bytes()?;
        Ok(parse_lines(&self.path, &bytes))
    }

    fn len(&self) -> LogResult<usize> {
        self.with_index(|index| Ok(index.events))
    }
}

fn parse_lines(path: &Path, bytes: &[u8]) -> Vec<Event> {
    let mut events = Vec::new();
    for (index, raw_line) in bytes.split(|byte| *byte == b'\n').enumerate() {
        let decoded = std::str::from_utf8(raw_line)
            .map_err(|err| err.to_string())
            .map(str::trim);
        let parsed = match decoded {
            Ok("") => continue,
            Ok(line) => serde_json::from_str::<Event>(line).map_err(|err| err.to_string()),
            Err(err) => Err(err),
        };
        match parsed {
            Ok(event) => events.push(event),
            Err(err) => warn!(
                "event=event_log_read module=vault status=skipped path={} line={} error={}",
                path.display(),
                index + 1,
                err
            ),
        }
    }
    events
}
