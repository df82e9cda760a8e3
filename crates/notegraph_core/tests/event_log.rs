use notegraph_core::db::open_db_in_memory;
use notegraph_core::model::event::{NoteCreated, NoteDeleted};
use notegraph_core::{
    init_vault, Event, EventLog, EventPayload, JsonlEventLog, LogError, SqliteEventLog,
};
use std::fs;

fn created(id: &str, note_id: &str, ts: i64) -> Event {
    Event::with_id(
        id,
        EventPayload::NoteCreated(NoteCreated {
            note_id: note_id.to_string(),
            filepath: format!("{note_id}.md"),
            content: "hello".to_string(),
            raw_content: None,
            title: None,
            tags: None,
        }),
        ts,
    )
}

fn deleted(id: &str, note_id: &str, ts: i64) -> Event {
    Event::with_id(
        id,
        EventPayload::NoteDeleted(NoteDeleted {
            note_id: note_id.to_string(),
        }),
        ts,
    )
}

fn ids(events: &[Event]) -> Vec<&str> {
    events.iter().map(|event| event.id.as_str()).collect()
}

/// Behavior every backend must share.
fn exercise_log(log: &impl EventLog) {
    assert!(log.is_empty().unwrap());

    assert!(log.append(&created("e2", "n1", 20)).unwrap());
    assert!(!log.append(&created("e2", "n1", 20)).unwrap());

    let inserted = log
        .append_all(&[created("e1", "n2", 10), created("e2", "n1", 20), deleted("e3", "n2", 30)])
        .unwrap();
    assert_eq!(inserted, 2);
    assert_eq!(log.len().unwrap(), 3);

    let loaded = log.load_all().unwrap();
    assert_eq!(ids(&loaded), vec!["e2", "e1", "e3"]);
    assert_eq!(loaded[0], created("e2", "n1", 20));
}

#[test]
fn sqlite_log_appends_once_per_event_id() {
    let conn = open_db_in_memory().unwrap();
    exercise_log(&SqliteEventLog::new(&conn));
}

#[test]
fn jsonl_log_appends_once_per_event_id() {
    let dir = tempfile::tempdir().unwrap();
    exercise_log(&JsonlEventLog::new(dir.path().join("events.jsonl")));
}

#[test]
fn sqlite_log_rejects_undecodable_rows() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO events (event_id, event_type, timestamp, body) VALUES ('bad', 'NOTE_CREATED', 1, 'not json');",
        [],
    )
    .unwrap();

    let err = SqliteEventLog::new(&conn).load_all().unwrap_err();
    assert!(matches!(err, LogError::InvalidData(_)));
}

#[test]
fn jsonl_log_skips_malformed_lines_and_repairs_torn_tail() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let first = serde_json::to_string(&created("e1", "n1", 1)).unwrap();
    fs::write(&path, format!("{first}\n\n{{\"id\":\"torn\"")).unwrap();

    let log = JsonlEventLog::new(&path);
    assert_eq!(ids(&log.load_all().unwrap()), vec!["e1"]);

    assert!(log.append(&deleted("e2", "n1", 2)).unwrap());
    assert_eq!(ids(&log.load_all().unwrap()), vec!["e1", "e2"]);
}

#[test]
fn jsonl_log_for_vault_reads_initialized_file() {
    let dir = tempfile::tempdir().unwrap();
    init_vault(dir.path()).unwrap();

    let log = JsonlEventLog::for_vault(dir.path());
    assert!(log.path().ends_with(".graphnotes/events.jsonl"));
    assert!(log.is_empty().unwrap());
    assert!(log.append(&created("e1", "n1", 1)).unwrap());
    assert_eq!(log.len().unwrap(), 1);
}

#[test]
fn missing_jsonl_file_reads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let log = JsonlEventLog::new(dir.path().join("absent.jsonl"));
    assert!(log.load_all().unwrap().is_empty());
}

#[test]
fn jsonl_log_skips_non_utf8_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let mut bytes = serde_json::to_vec(&created("e1", "n1", 1)).unwrap();
    bytes.extend_from_slice(b"\n\xff\xfe garbage\n");
    fs::write(&path, bytes).unwrap();

    let log = JsonlEventLog::new(&path);
    assert_eq!(ids(&log.load_all().unwrap()), vec!["e1"]);
    assert_eq!(log.len().unwrap(), 1);

    assert!(log.append(&deleted("e2", "n1", 2)).unwrap());
    assert!(!log.append(&created("e1", "n1", 1)).unwrap());
    assert_eq!(ids(&log.load_all().unwrap()), vec!["e1", "e2"]);
}

#[test]
fn jsonl_log_sees_lines_appended_by_another_writer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let log = JsonlEventLog::new(&path);
    assert!(log.append(&created("e1", "n1", 1)).unwrap());
    assert_eq!(log.len().unwrap(), 1);

    let other = JsonlEventLog::new(&path);
    assert!(other.append(&deleted("e2", "n1", 2)).unwrap());

    assert_eq!(log.len().unwrap(), 2);
    assert!(!log.append(&deleted("e2", "n1", 2)).unwrap());
    assert_eq!(ids(&log.load_all().unwrap()), vec!["e1", "e2"]);
}
