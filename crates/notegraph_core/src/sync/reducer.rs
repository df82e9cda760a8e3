//! Per-event state transitions.
//!
//! # Responsibility
//! - Apply one event to a working copy of the vault state.
//! - Run conflict detection before content overwrites.
//!
//! # Invariants
//! - Handlers validate before mutating: an `Err` leaves state untouched.
//! - References to unseen entities are no-ops, never errors.
//! - Every mutation sets the target's `modified` to the event timestamp.
//! - No I/O and no blocking.

use crate::model::event::{
    AttributeUpdated, Event, EventPayload, EventType, LinkCreated, LinkDeleted, LinkUpdated,
    NoteCreated, NoteRenamed, NoteUpdated, SuperTagCreated, SuperTagMembership, SuperTagUpdated,
};
use crate::model::note::{title_from_filepath, LinkDefinition, Note};
use crate::model::state::VaultState;
use crate::model::supertag::{duplicate_attribute_id, SuperTag};
use crate::sync::conflict::{detect_note_update_conflict, ConflictResult};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result of applying one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// State changed.
    Applied,
    /// State changed; a concurrent edit was detected and recorded.
    Conflict(ConflictResult),
    /// Nothing to do; the reason is a stable log token.
    Ignored(&'static str),
}

/// Event that cannot be applied to the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// A required id/key field is blank.
    BlankField {
        event_type: EventType,
        field: &'static str,
    },
    DuplicateNote(String),
    DuplicateSuperTag(String),
    DuplicateLink {
        source_id: String,
        link_id: String,
    },
    DuplicateAttribute {
        super_tag_id: String,
        attribute_id: String,
    },
}

impl Display for ApplyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField { event_type, field } => {
                write!(f, "{event_type} has blank `{field}`")
            }
            Self::DuplicateNote(id) => write!(f, "note already exists: {id}"),
            Self::DuplicateSuperTag(id) => write!(f, "supertag already exists: {id}"),
            Self::DuplicateLink { source_id, link_id } => {
                write!(f, "link `{link_id}` already exists on note {source_id}")
            }
            Self::DuplicateAttribute {
                super_tag_id,
                attribute_id,
            } => write!(
                f,
                "attribute id `{attribute_id}` is not unique in supertag {super_tag_id}"
            ),
        }
    }
}

impl Error for ApplyError {}

/// Applies one event to `state`.
pub fn apply_event(state: &mut VaultState, event: &Event) -> Result<ApplyOutcome, ApplyError> {
    let ts = event.timestamp;
    match &event.payload {
        EventPayload::NoteCreated(body) => create_note(state, body, ts),
        EventPayload::NoteUpdated(body) => update_note(state, &event.id, body, ts),
        EventPayload::NoteDeleted(body) => Ok(match state.notes.remove(&body.note_id) {
            Some(_) => ApplyOutcome::Applied,
            None => ApplyOutcome::Ignored("note_missing"),
        }),
        EventPayload::NoteRenamed(body) => rename_note(state, body, ts),
        EventPayload::LinkCreated(body) => create_link(state, body, ts),
        EventPayload::LinkUpdated(body) => update_link(state, body, ts),
        EventPayload::LinkDeleted(body) => delete_link(state, body, ts),
        EventPayload::SuperTagCreated(body) => create_super_tag(state, body, ts),
        EventPayload::SuperTagUpdated(body) => update_super_tag(state, body, ts),
        EventPayload::SuperTagDeleted(body) => {
            Ok(match state.super_tags.remove(&body.super_tag_id) {
                Some(_) => ApplyOutcome::Applied,
                None => ApplyOutcome::Ignored("supertag_missing"),
            })
        }
        EventPayload::SuperTagAssigned(body) => assign_super_tag(state, body, ts),
        EventPayload::SuperTagUnassigned(body) => unassign_super_tag(state, body, ts),
        EventPayload::AttributeUpdated(body) => update_attribute(state, body, ts),
    }
}

fn require(value: &str, event_type: EventType, field: &'static str) -> Result<(), ApplyError> {
    if value.trim().is_empty() {
        return Err(ApplyError::BlankField { event_type, field });
    }
    Ok(())
}

fn create_note(
    state: &mut VaultState,
    body: &NoteCreated,
    ts: i64,
) -> Result<ApplyOutcome, ApplyError> {
    require(&body.note_id, EventType::NoteCreated, "noteId")?;
    if state.notes.contains_key(&body.note_id) {
        return Err(ApplyError::DuplicateNote(body.note_id.clone()));
    }

    let mut note = Note::new(
        body.note_id.clone(),
        body.filepath.clone(),
        body.title.clone(),
        body.content.clone(),
        ts,
    );
    if let Some(raw) = &body.raw_content {
        note.raw_content = raw.clone();
    }
    note.frontmatter.tags = body.tags.clone();

    state.notes.insert(body.note_id.clone(), note);
    Ok(ApplyOutcome::Applied)
}

fn update_note(
    state: &mut VaultState,
    event_id: &str,
    body: &NoteUpdated,
    ts: i64,
) -> Result<ApplyOutcome, ApplyError> {
    let Some(note) = state.notes.get_mut(&body.note_id) else {
        return Ok(ApplyOutcome::Ignored("note_missing"));
    };

    let conflict = detect_note_update_conflict(event_id, note, body.previous_hash);
    note.content = body.content.clone();
    note.raw_content = body
        .raw_content
        .clone()
        .unwrap_or_else(|| body.content.clone());
    note.touch(ts);

    Ok(match conflict {
        Some(conflict) => ApplyOutcome::Conflict(conflict),
        None => ApplyOutcome::Applied,
    })
}

fn rename_note(
    state: &mut VaultState,
    body: &NoteRenamed,
    ts: i64,
) -> Result<ApplyOutcome, ApplyError> {
    require(&body.new_filepath, EventType::NoteRenamed, "newFilepath")?;
    let Some(note) = state.notes.get_mut(&body.note_id) else {
        return Ok(ApplyOutcome::Ignored("note_missing"));
    };

    note.filepath = body.new_filepath.clone();
    note.frontmatter.title = body
        .new_title
        .clone()
        .filter(|title| !title.trim().is_empty())
        .unwrap_or_else(|| title_from_filepath(&body.new_filepath));
    note.touch(ts);
    Ok(ApplyOutcome::Applied)
}

fn create_link(
    state: &mut VaultState,
    body: &LinkCreated,
    ts: i64,
) -> Result<ApplyOutcome, ApplyError> {
    require(&body.link_id, EventType::LinkCreated, "linkId")?;
    let Some(note) = state.notes.get_mut(&body.source_id) else {
        return Ok(ApplyOutcome::Ignored("source_note_missing"));
    };
    if note.link(&body.link_id).is_some() {
        return Err(ApplyError::DuplicateLink {
            source_id: body.source_id.clone(),
            link_id: body.link_id.clone(),
        });
    }

    note.frontmatter
        .links
        .get_or_insert_with(Vec::new)
        .push(LinkDefinition {
            id: body.link_id.clone(),
            target: body.target_id.clone(),
            name: body.name.clone(),
            description: body.description.clone(),
            created: ts,
            appearance: body.appearance.clone(),
        });
    note.touch(ts);
    Ok(ApplyOutcome::Applied)
}

fn update_link(
    state: &mut VaultState,
    body: &LinkUpdated,
    ts: i64,
) -> Result<ApplyOutcome, ApplyError> {
    let Some(note) = state.notes.get_mut(&body.source_id) else {
        return Ok(ApplyOutcome::Ignored("source_note_missing"));
    };
    let Some(link) = note
        .frontmatter
        .links
        .as_mut()
        .and_then(|links| links.iter_mut().find(|link| link.id == body.link_id))
    else {
        return Ok(ApplyOutcome::Ignored("link_missing"));
    };

    let changes = &body.changes;
    if let Some(target) = &changes.target {
        link.target = target.clone();
    }
    if let Some(name) = &changes.name {
        link.name = name.clone();
    }
    if let Some(description) = &changes.description {
        link.description = Some(description.clone());
    }
    if let Some(appearance) = &changes.appearance {
        link.appearance = Some(appearance.clone());
    }
    note.touch(ts);
    Ok(ApplyOutcome::Applied)
}

fn delete_link(
    state: &mut VaultState,
    body: &LinkDeleted,
    ts: i64,
) -> Result<ApplyOutcome, ApplyError> {
    let Some(note) = state.notes.get_mut(&body.source_id) else {
        return Ok(ApplyOutcome::Ignored("source_note_missing"));
    };
    let Some(links) = note.frontmatter.links.as_mut() else {
        return Ok(ApplyOutcome::Ignored("link_missing"));
    };

    let before = links.len();
    links.retain(|link| link.id != body.link_id);
    if links.len() == before {
        return Ok(ApplyOutcome::Ignored("link_missing"));
    }
    note.touch(ts);
    Ok(ApplyOutcome::Applied)
}

fn create_super_tag(
    state: &mut VaultState,
    body: &SuperTagCreated,
    ts: i64,
) -> Result<ApplyOutcome, ApplyError> {
    require(&body.super_tag_id, EventType::SupertagCreated, "superTagId")?;
    if state.super_tags.contains_key(&body.super_tag_id) {
        return Err(ApplyError::DuplicateSuperTag(body.super_tag_id.clone()));
    }
    if let Some(attribute_id) = duplicate_attribute_id(&body.attributes) {
        return Err(ApplyError::DuplicateAttribute {
            super_tag_id: body.super_tag_id.clone(),
            attribute_id: attribute_id.to_string(),
        });
    }

    state.super_tags.insert(
        body.super_tag_id.clone(),
        SuperTag {
            id: body.super_tag_id.clone(),
            name: body.name.clone(),
            colour: body.colour.clone(),
            icon: body.icon.clone(),
            description: body.description.clone(),
            attributes: body.attributes.clone(),
            created: ts,
            modified: ts,
        },
    );
    Ok(ApplyOutcome::Applied)
}

fn update_super_tag(
    state: &mut VaultState,
    body: &SuperTagUpdated,
    ts: i64,
) -> Result<ApplyOutcome, ApplyError> {
    let Some(super_tag) = state.super_tags.get_mut(&body.super_tag_id) else {
        return Ok(ApplyOutcome::Ignored("supertag_missing"));
    };

    let changes = &body.changes;
    if let Some(attributes) = &changes.attributes {
        if let Some(attribute_id) = duplicate_attribute_id(attributes) {
            return Err(ApplyError::DuplicateAttribute {
                super_tag_id: body.super_tag_id.clone(),
                attribute_id: attribute_id.to_string(),
            });
        }
    }

    if let Some(name) = &changes.name {
        super_tag.name = name.clone();
    }
    if let Some(colour) = &changes.colour {
        super_tag.colour = colour.clone();
    }
    if let Some(icon) = &changes.icon {
        super_tag.icon = Some(icon.clone());
    }
    if let Some(description) = &changes.description {
        super_tag.description = Some(description.clone());
    }
    if let Some(attributes) = &changes.attributes {
        super_tag.attributes = attributes.clone();
    }
    super_tag.modified = ts;
    Ok(ApplyOutcome::Applied)
}

fn assign_super_tag(
    state: &mut VaultState,
    body: &SuperTagMembership,
    ts: i64,
) -> Result<ApplyOutcome, ApplyError> {
    require(&body.super_tag_id, EventType::SupertagAssigned, "superTagId")?;
    let Some(note) = state.notes.get_mut(&body.note_id) else {
        return Ok(ApplyOutcome::Ignored("note_missing"));
    };
    if note.has_super_tag(&body.super_tag_id) {
        return Ok(ApplyOutcome::Ignored("already_assigned"));
    }

    note.frontmatter
        .super_tags
        .get_or_insert_with(Vec::new)
        .push(body.super_tag_id.clone());
    note.touch(ts);
    Ok(ApplyOutcome::Applied)
}

fn unassign_super_tag(
    state: &mut VaultState,
    body: &SuperTagMembership,
    ts: i64,
) -> Result<ApplyOutcome, ApplyError> {
    let Some(note) = state.notes.get_mut(&body.note_id) else {
        return Ok(ApplyOutcome::Ignored("note_missing"));
    };
    if !note.has_super_tag(&body.super_tag_id) {
        return Ok(ApplyOutcome::Ignored("not_assigned"));
    }

    if let Some(ids) = note.frontmatter.super_tags.as_mut() {
        ids.retain(|id| id != &body.super_tag_id);
    }
    note.touch(ts);
    Ok(ApplyOutcome::Applied)
}

fn update_attribute(
    state: &mut VaultState,
    body: &AttributeUpdated,
    ts: i64,
) -> Result<ApplyOutcome, ApplyError> {
    require(&body.super_tag_id, EventType::AttributeUpdated, "superTagId")?;
    require(&body.attribute_key, EventType::AttributeUpdated, "attributeKey")?;
    let Some(note) = state.notes.get_mut(&body.note_id) else {
        return Ok(ApplyOutcome::Ignored("note_missing"));
    };

    let previous = note
        .frontmatter
        .tag_attributes
        .get_or_insert_with(Default::default)
        .entry(body.super_tag_id.clone())
        .or_default()
        .insert(body.attribute_key.clone(), body.value.clone());
    if previous.as_ref() != Some(&body.value) {
        note.touch(ts);
    }
    Ok(ApplyOutcome::Applied)
}
