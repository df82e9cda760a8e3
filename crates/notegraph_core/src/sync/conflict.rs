//! Concurrent-edit detection.
//!
//! # Responsibility
//! - Compare an update's declared prior fingerprint with current content.
//! - Describe detected conflicts as data for higher layers.
//!
//! # Invariants
//! - Detection never blocks or rolls back an update.
//! - Only `remote_wins` is emitted; other resolutions are reserved.

use crate::model::event::EventId;
use crate::model::fingerprint::Fingerprint;
use crate::model::note::Note;
use serde::{Deserialize, Serialize};

/// Resolution applied when a conflict is recorded.
pub const DEFAULT_RESOLUTION: ConflictResolution = ConflictResolution::RemoteWins;

/// Kind of state the conflicting event targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    NoteUpdate,
    /// Reserved; no handler emits it yet.
    NoteDelete,
    /// Reserved; no handler emits it yet.
    AttributeUpdate,
}

/// Decision space for conflict handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    LocalWins,
    /// Incoming event content overwrites current state.
    RemoteWins,
    /// Materialize the losing side as a separate note.
    ConflictCopy,
}

/// Recorded conflict, surfaced to callers via the conflict backlog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictResult {
    pub event_id: EventId,
    pub conflict_type: ConflictType,
    pub resolution: ConflictResolution,
    pub details: String,
}

/// Checks a `NOTE_UPDATED` against the note it is about to overwrite.
///
/// Returns `None` when `previous_hash` matches the current content, i.e. the
/// author saw the latest state.
pub fn detect_note_update_conflict(
    event_id: &str,
    note: &Note,
    previous_hash: Fingerprint,
) -> Option<ConflictResult> {
    let current = Fingerprint::of(&note.content);
    if current == previous_hash {
        return None;
    }

    Some(ConflictResult {
        event_id: event_id.to_string(),
        conflict_type: ConflictType::NoteUpdate,
        resolution: DEFAULT_RESOLUTION,
        details: format!(
            "note `{}` changed concurrently: expected fingerprint {}, found {}; incoming content applied",
            note.id, previous_hash, current
        ),
    })
}
