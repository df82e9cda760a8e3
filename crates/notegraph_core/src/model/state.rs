//! Reconstructed vault snapshot.
//!
//! # Invariants
//! - Collections are keyed by entity id and iterate in id order, so two
//!   replicas holding the same entities serialize byte-identically.

use crate::model::note::{Note, NoteId};
use crate::model::supertag::{SuperTag, SuperTagId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Notes keyed by id.
pub type NoteMap = BTreeMap<NoteId, Note>;

/// Tag schemas keyed by id.
pub type SuperTagMap = BTreeMap<SuperTagId, SuperTag>;

/// Caller-owned state threaded through replays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultState {
    pub notes: NoteMap,
    pub super_tags: SuperTagMap,
}

impl VaultState {
    pub fn new(notes: NoteMap, super_tags: SuperTagMap) -> Self {
        Self { notes, super_tags }
    }

    pub fn note(&self, note_id: &str) -> Option<&Note> {
        self.notes.get(note_id)
    }

    pub fn super_tag(&self, super_tag_id: &str) -> Option<&SuperTag> {
        self.super_tags.get(super_tag_id)
    }

    /// Notes whose membership list contains `super_tag_id`.
    pub fn notes_with_super_tag<'a>(
        &'a self,
        super_tag_id: &'a str,
    ) -> impl Iterator<Item = &'a Note> + 'a {
        self.notes
            .values()
            .filter(move |note| note.has_super_tag(super_tag_id))
    }

    /// Notes holding at least one link whose target is `note_id`.
    ///
    /// Consumers resolve dangling targets lazily; this is the reverse lookup
    /// they use for backlinks.
    pub fn backlinks<'a>(&'a self, note_id: &'a str) -> impl Iterator<Item = &'a Note> + 'a {
        self.notes.values().filter(move |note| {
            note.frontmatter
                .links
                .as_ref()
                .is_some_and(|links| links.iter().any(|link| link.target == note_id))
        })
    }
}
