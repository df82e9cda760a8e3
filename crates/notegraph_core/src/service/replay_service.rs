//! Replica-level replay use-cases.
//!
//! # Responsibility
//! - Record locally produced events into the log and the live snapshot.
//! - Merge peer events and rebuild the snapshot from the full history.
//!
//! # Invariants
//! - A locally rejected event is never appended to the log.
//! - After `rebuild`/`import`, the snapshot equals a replay of the whole log
//!   from empty state.
//! - Local clock readings order after every event seen in the log.
//! - Each conflicting event reaches the backlog once, however often the log
//!   is replayed.
//! - The set of surfaced conflict ids only grows for the life of the service;
//!   a cleared conflict is not surfaced again by later replays.

use crate::model::event::{Event, EventId, EventPayload};
use crate::model::state::{NoteMap, SuperTagMap, VaultState};
use crate::repo::event_repo::{EventLog, LogError};
use crate::sync::clock::HybridClock;
use crate::sync::conflict::ConflictResult;
use crate::sync::engine::{apply_events, ReplayOutcome, SyncEngine, SyncStatus};
use crate::sync::reducer::{apply_event, ApplyError, ApplyOutcome};
use log::{debug, info};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum ReplayServiceError {
    Log(LogError),
    /// Local event refused by the reducer; the log is unchanged.
    Rejected(ApplyError),
}

impl Display for ReplayServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Log(err) => write!(f, "{err}"),
            Self::Rejected(err) => write!(f, "event rejected: {err}"),
        }
    }
}

impl Error for ReplayServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Log(err) => Some(err),
            Self::Rejected(err) => Some(err),
        }
    }
}

impl From<LogError> for ReplayServiceError {
    fn from(value: LogError) -> Self {
        Self::Log(value)
    }
}

/// Use-case facade over one replica's event log.
pub struct ReplayService<L: EventLog> {
    log: L,
    engine: SyncEngine,
    clock: HybridClock,
    state: VaultState,
    surfaced: BTreeSet<EventId>,
}

impl<L: EventLog> ReplayService<L> {
    /// Creates a service with an empty snapshot; call [`Self::rebuild`] to load history.
    pub fn new(log: L) -> Self {
        Self {
            log,
            engine: SyncEngine::new(),
            clock: HybridClock::new(),
            state: VaultState::default(),
            surfaced: BTreeSet::new(),
        }
    }

    /// Creates a service and replays the existing log.
    pub fn open(log: L) -> Result<Self, ReplayServiceError> {
        let mut service = Self::new(log);
        service.rebuild()?;
        Ok(service)
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn state(&self) -> &VaultState {
        &self.state
    }

    /// Stamps `payload` as a local event, appends it and applies it.
    pub fn record(
        &mut self,
        payload: EventPayload,
        wall_ms: i64,
    ) -> Result<Event, ReplayServiceError> {
        let event = Event::new(payload, wall_ms).stamped(self.clock.now(wall_ms));

        let mut next = self.state.clone();
        let outcome = apply_event(&mut next, &event).map_err(ReplayServiceError::Rejected)?;
        self.log.append(&event)?;

        match outcome {
            ApplyOutcome::Applied => {}
            ApplyOutcome::Conflict(conflict) => self.surface(conflict),
            ApplyOutcome::Ignored(reason) => debug!(
                "event=record module=service status=ignored event_id={} event_type={} reason={}",
                event.id,
                event.event_type(),
                reason
            ),
        }
        self.state = next;
        Ok(event)
    }

    /// Appends unseen peer events and rebuilds the snapshot.
    pub fn import(
        &mut self,
        events: &[Event],
        wall_ms: i64,
    ) -> Result<ReplayOutcome, ReplayServiceError> {
        let inserted = self.log.append_all(events)?;
        for event in events {
            self.clock.observe(event.effective_clock(), wall_ms);
        }
        info!(
            "event=import module=service status=ok received={} inserted={}",
            events.len(),
            inserted
        );
        self.rebuild()
    }

    /// Replays the whole log from empty state and replaces the snapshot.
    pub fn rebuild(&mut self) -> Result<ReplayOutcome, ReplayServiceError> {
        let events = self.log.load_all()?;
        if let Some(latest) = events.iter().map(Event::effective_clock).max() {
            if latest > self.clock.last() {
                self.clock = HybridClock::resume_from(latest);
            }
        }

        let outcome = apply_events(&events, &NoteMap::new(), &SuperTagMap::new());
        for conflict in &outcome.conflicts {
            self.surface(conflict.clone());
        }
        self.state = VaultState::new(outcome.notes.clone(), outcome.super_tags.clone());
        Ok(outcome)
    }

    fn surface(&mut self, conflict: ConflictResult) {
        if self.surfaced.insert(conflict.event_id.clone()) {
            self.engine.record_conflict(conflict);
        }
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.engine.sync_status()
    }

    pub fn clear_conflicts(&mut self) {
        self.engine.clear_conflicts();
    }
}
