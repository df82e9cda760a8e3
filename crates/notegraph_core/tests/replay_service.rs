use notegraph_core::db::open_db_in_memory;
use notegraph_core::model::event::{NoteCreated, NoteUpdated, SuperTagMembership};
use notegraph_core::{
    init_vault, ClockStamp, Event, EventLog, EventPayload, Fingerprint, JsonlEventLog,
    ReplayService, ReplayServiceError, SqliteEventLog,
};

fn create_note(note_id: &str, content: &str) -> EventPayload {
    EventPayload::NoteCreated(NoteCreated {
        note_id: note_id.to_string(),
        filepath: format!("{note_id}.md"),
        content: content.to_string(),
        raw_content: None,
        title: None,
        tags: None,
    })
}

fn update_note(note_id: &str, content: &str, previous: &str) -> EventPayload {
    EventPayload::NoteUpdated(NoteUpdated {
        note_id: note_id.to_string(),
        content: content.to_string(),
        raw_content: None,
        previous_hash: Fingerprint::of(previous),
    })
}

#[test]
fn recorded_events_are_logged_and_visible() {
    let conn = open_db_in_memory().unwrap();
    let mut service = ReplayService::new(SqliteEventLog::new(&conn));

    let first = service.record(create_note("n1", "hello"), 100).unwrap();
    let second = service.record(update_note("n1", "hello v2", "hello"), 100).unwrap();

    assert!(first.clock.unwrap() < second.clock.unwrap());
    assert_eq!(service.state().note("n1").unwrap().content, "hello v2");
    assert_eq!(service.log().len().unwrap(), 2);
    assert!(service.sync_status().conflicts.is_empty());
}

#[test]
fn rejected_local_event_is_not_logged() {
    let conn = open_db_in_memory().unwrap();
    let mut service = ReplayService::new(SqliteEventLog::new(&conn));
    service.record(create_note("n1", "hello"), 1).unwrap();

    let err = service.record(create_note("n1", "again"), 2).unwrap_err();
    assert!(matches!(err, ReplayServiceError::Rejected(_)));
    assert_eq!(service.log().len().unwrap(), 1);
    assert_eq!(service.state().note("n1").unwrap().content, "hello");
}

#[test]
fn ignored_local_event_is_still_logged() {
    let conn = open_db_in_memory().unwrap();
    let mut service = ReplayService::new(SqliteEventLog::new(&conn));

    service
        .record(
            EventPayload::SuperTagAssigned(SuperTagMembership {
                note_id: "later".to_string(),
                super_tag_id: "t1".to_string(),
            }),
            1,
        )
        .unwrap();

    assert_eq!(service.log().len().unwrap(), 1);
    assert!(service.state().notes.is_empty());
}

#[test]
fn rebuild_matches_incremental_state() {
    let dir = tempfile::tempdir().unwrap();
    init_vault(dir.path()).unwrap();

    let mut writer = ReplayService::new(JsonlEventLog::for_vault(dir.path()));
    writer.record(create_note("n1", "a"), 10).unwrap();
    writer.record(create_note("n2", "b"), 11).unwrap();
    writer.record(update_note("n2", "b2", "b"), 12).unwrap();

    let reader = ReplayService::open(JsonlEventLog::for_vault(dir.path())).unwrap();
    assert_eq!(reader.state(), writer.state());
}

#[test]
fn imported_stale_edit_surfaces_conflict_once() {
    let conn = open_db_in_memory().unwrap();
    let mut service = ReplayService::new(SqliteEventLog::new(&conn));
    service.record(create_note("n1", "C1"), 10).unwrap();
    service.record(update_note("n1", "C2", "C1"), 20).unwrap();

    let peer_edit = Event::with_id("peer-1", update_note("n1", "C3", "C1"), 30).stamped(
        ClockStamp {
            wall_ms: 30,
            counter: 0,
        },
    );
    let outcome = service.import(&[peer_edit.clone()], 25).unwrap();

    assert_eq!(outcome.conflicts.len(), 1);
    assert_eq!(service.state().note("n1").unwrap().content, "C3");
    assert_eq!(service.sync_status().conflicts.len(), 1);

    service.import(&[peer_edit], 40).unwrap();
    service.rebuild().unwrap();
    assert_eq!(service.sync_status().conflicts.len(), 1);

    service.clear_conflicts();
    service.rebuild().unwrap();
    assert!(service.sync_status().conflicts.is_empty());
}

#[test]
fn local_clock_resumes_after_logged_history() {
    let conn = open_db_in_memory().unwrap();
    let log = SqliteEventLog::new(&conn);
    log.append(
        &Event::with_id("remote", create_note("n1", "x"), 5_000).stamped(ClockStamp {
            wall_ms: 5_000,
            counter: 3,
        }),
    )
    .unwrap();

    let mut service = ReplayService::open(log).unwrap();
    let local = service.record(create_note("n2", "y"), 1_000).unwrap();

    assert!(local.clock.unwrap() > ClockStamp { wall_ms: 5_000, counter: 3 });
    assert_eq!(service.state().notes.len(), 2);
}
