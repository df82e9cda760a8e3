//! Replay orchestration and sync status.
//!
//! # Responsibility
//! - Replay an unordered event batch over a caller-owned base snapshot.
//! - Accumulate detected conflicts into a backlog for later surfacing.
//!
//! # Invariants
//! - Base collections are never mutated; replay works on a clone.
//! - A failing event is logged and skipped; the fold always completes.
//! - Calls against one logical replica must be serialized by the caller.

use crate::model::event::Event;
use crate::model::state::{NoteMap, SuperTagMap, VaultState};
use crate::sync::causal::sort_events_causally;
use crate::sync::conflict::ConflictResult;
use crate::sync::reducer::{apply_event, ApplyOutcome};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Counters for one replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayStats {
    /// Distinct events after de-duplication.
    pub total: usize,
    pub applied: usize,
    /// No-ops, e.g. references to entities not yet seen.
    pub ignored: usize,
    /// Events rejected by their handler and skipped.
    pub failed: usize,
}

/// New snapshot plus conflicts detected during one replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayOutcome {
    pub notes: NoteMap,
    pub super_tags: SuperTagMap,
    pub conflicts: Vec<ConflictResult>,
    pub stats: ReplayStats,
}

/// Status snapshot for UI polling.
///
/// `is_syncing`, `last_sync_time` and `pending_events` are reserved for a
/// peer transport and report fixed defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    #[serde(alias = "issyncing")]
    pub is_syncing: bool,
    /// Unix epoch milliseconds.
    pub last_sync_time: Option<i64>,
    pub pending_events: u32,
    pub conflicts: Vec<ConflictResult>,
}

/// Replays `events` over clones of the base collections.
///
/// Events are causally sorted first, so any permutation of the same event
/// set yields the same snapshot.
pub fn apply_events(
    events: &[Event],
    base_notes: &NoteMap,
    base_super_tags: &SuperTagMap,
) -> ReplayOutcome {
    let started_at = Instant::now();
    info!(
        "event=replay module=sync status=start events={} base_notes={} base_super_tags={}",
        events.len(),
        base_notes.len(),
        base_super_tags.len()
    );

    let mut state = VaultState::new(base_notes.clone(), base_super_tags.clone());
    let ordered = sort_events_causally(events);
    let mut conflicts = Vec::new();
    let mut stats = ReplayStats {
        total: ordered.len(),
        ..ReplayStats::default()
    };

    for event in &ordered {
        match apply_event(&mut state, event) {
            Ok(ApplyOutcome::Applied) => stats.applied += 1,
            Ok(ApplyOutcome::Conflict(conflict)) => {
                info!(
                    "event=replay_conflict module=sync status=recorded event_id={} conflict_type={:?} resolution={:?}",
                    conflict.event_id, conflict.conflict_type, conflict.resolution
                );
                stats.applied += 1;
                conflicts.push(conflict);
            }
            Ok(ApplyOutcome::Ignored(reason)) => {
                debug!(
                    "event=replay_apply module=sync status=ignored event_id={} event_type={} reason={}",
                    event.id,
                    event.event_type(),
                    reason
                );
                stats.ignored += 1;
            }
            Err(err) => {
                warn!(
                    "event=replay_apply module=sync status=skipped event_id={} event_type={} error={}",
                    event.id,
                    event.event_type(),
                    err
                );
                stats.failed += 1;
            }
        }
    }

    info!(
        "event=replay module=sync status=ok duration_ms={} total={} applied={} ignored={} failed={} conflicts={}",
        started_at.elapsed().as_millis(),
        stats.total,
        stats.applied,
        stats.ignored,
        stats.failed,
        conflicts.len()
    );

    ReplayOutcome {
        notes: state.notes,
        super_tags: state.super_tags,
        conflicts,
        stats,
    }
}

/// Replay entry point holding the conflict backlog of one replica.
#[derive(Debug, Default)]
pub struct SyncEngine {
    conflicts: Vec<ConflictResult>,
}

impl SyncEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replays `events` and appends detected conflicts to the backlog.
    pub fn apply_events(
        &mut self,
        events: &[Event],
        base_notes: &NoteMap,
        base_super_tags: &SuperTagMap,
    ) -> ReplayOutcome {
        let outcome = apply_events(events, base_notes, base_super_tags);
        self.conflicts.extend(outcome.conflicts.iter().cloned());
        outcome
    }

    /// Adds a conflict detected outside a batch replay, e.g. on a local write.
    pub(crate) fn record_conflict(&mut self, conflict: ConflictResult) {
        self.conflicts.push(conflict);
    }

    /// Conflicts recorded since the last [`SyncEngine::clear_conflicts`].
    pub fn conflicts(&self) -> &[ConflictResult] {
        &self.conflicts
    }

    pub fn sync_status(&self) -> SyncStatus {
        SyncStatus {
            is_syncing: false,
            last_sync_time: None,
            pending_events: 0,
            conflicts: self.conflicts.clone(),
        }
    }

    /// Empties the backlog once a caller has surfaced it.
    pub fn clear_conflicts(&mut self) {
        if !self.conflicts.is_empty() {
            info!(
                "event=conflicts_clear module=sync status=ok cleared={}",
                self.conflicts.len()
            );
        }
        self.conflicts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{apply_events, SyncEngine};
    use crate::model::event::{Event, EventPayload, NoteCreated, NoteUpdated};
    use crate::model::fingerprint::Fingerprint;
    use crate::model::state::{NoteMap, SuperTagMap};

    fn create(id: &str, note_id: &str, content: &str, ts: i64) -> Event {
        Event::with_id(
            id,
            EventPayload::NoteCreated(NoteCreated {
                note_id: note_id.to_string(),
                filepath: format!("{note_id}.md"),
                content: content.to_string(),
                raw_content: None,
                title: None,
                tags: None,
            }),
            ts,
        )
    }

    fn stale_update(id: &str, ts: i64) -> Event {
        Event::with_id(
            id,
            EventPayload::NoteUpdated(NoteUpdated {
                note_id: "n1".to_string(),
                content: format!("edit {id}"),
                raw_content: None,
                previous_hash: Fingerprint::of("never seen"),
            }),
            ts,
        )
    }

    #[test]
    fn base_collections_are_left_untouched() {
        let base = apply_events(&[create("e1", "n1", "a", 1)], &NoteMap::new(), &SuperTagMap::new());
        let before = base.notes.clone();

        let next = apply_events(&[stale_update("e2", 2)], &base.notes, &base.super_tags);
        assert_eq!(base.notes, before);
        assert_ne!(next.notes, before);
    }

    #[test]
    fn failing_event_is_skipped_and_fold_continues() {
        let events = vec![
            create("e1", "n1", "a", 1),
            create("e2", "n1", "dup", 2),
            create("e3", "n2", "b", 3),
        ];
        let outcome = apply_events(&events, &NoteMap::new(), &SuperTagMap::new());
        assert_eq!(outcome.notes.len(), 2);
        assert_eq!(outcome.notes["n1"].content, "a");
        assert_eq!(outcome.stats.failed, 1);
        assert_eq!(outcome.stats.applied, 2);
    }

    #[test]
    fn engine_accumulates_and_clears_conflict_backlog() {
        let mut engine = SyncEngine::new();
        let first = engine.apply_events(
            &[create("e1", "n1", "a", 1), stale_update("e2", 2)],
            &NoteMap::new(),
            &SuperTagMap::new(),
        );
        engine.apply_events(&[stale_update("e3", 3)], &first.notes, &first.super_tags);

        let status = engine.sync_status();
        assert!(!status.is_syncing);
        assert_eq!(status.last_sync_time, None);
        assert_eq!(status.pending_events, 0);
        assert_eq!(status.conflicts.len(), 2);

        engine.clear_conflicts();
        assert!(engine.sync_status().conflicts.is_empty());
    }

    #[test]
    fn status_serializes_with_camel_case_keys() {
        let json = serde_json::to_value(SyncEngine::new().sync_status()).expect("serialize");
        assert_eq!(json["isSyncing"], false);
        assert!(json["lastSyncTime"].is_null());
        assert_eq!(json["pendingEvents"], 0);
    }
}
