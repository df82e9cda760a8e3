//! Domain event model.
//!
//! # Responsibility
//! - Define the closed set of event variants replayed into note/schema state.
//! - Own the JSON wire shape shared by the vault log and the SQLite log.
//!
//! # Invariants
//! - Events are immutable once stamped; `id` is globally unique.
//! - Wire shape is `{id, timestamp, clock?, type, payload}` with camelCase keys.
//! - An event without `clock` orders as `(timestamp, 0)`.

use crate::model::fingerprint::Fingerprint;
use crate::model::note::{LinkAppearance, LinkId, NoteId};
use crate::model::supertag::{AttributeDefinition, SuperTagId};
use serde::ser::Error as _;
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Globally unique event identifier.
pub type EventId = String;

/// Hybrid logical clock reading carried by an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockStamp {
    /// Physical component, Unix epoch milliseconds.
    pub wall_ms: i64,
    /// Logical component disambiguating events within one millisecond.
    pub counter: u32,
}

impl PartialOrd for ClockStamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClockStamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.wall_ms
            .cmp(&other.wall_ms)
            .then(self.counter.cmp(&other.counter))
    }
}

/// Event type tag, serialized as `SCREAMING_SNAKE_CASE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    NoteCreated,
    NoteUpdated,
    NoteDeleted,
    NoteRenamed,
    LinkCreated,
    LinkUpdated,
    LinkDeleted,
    SupertagCreated,
    SupertagUpdated,
    SupertagDeleted,
    SupertagAssigned,
    SupertagUnassigned,
    AttributeUpdated,
}

impl EventType {
    /// Wire name, also used in log lines and SQLite rows.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoteCreated => "NOTE_CREATED",
            Self::NoteUpdated => "NOTE_UPDATED",
            Self::NoteDeleted => "NOTE_DELETED",
            Self::NoteRenamed => "NOTE_RENAMED",
            Self::LinkCreated => "LINK_CREATED",
            Self::LinkUpdated => "LINK_UPDATED",
            Self::LinkDeleted => "LINK_DELETED",
            Self::SupertagCreated => "SUPERTAG_CREATED",
            Self::SupertagUpdated => "SUPERTAG_UPDATED",
            Self::SupertagDeleted => "SUPERTAG_DELETED",
            Self::SupertagAssigned => "SUPERTAG_ASSIGNED",
            Self::SupertagUnassigned => "SUPERTAG_UNASSIGNED",
            Self::AttributeUpdated => "ATTRIBUTE_UPDATED",
        }
    }
}

impl Display for EventType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteCreated {
    pub note_id: NoteId,
    pub filepath: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
    /// Derived from the filename when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteUpdated {
    pub note_id: NoteId,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
    /// Fingerprint of the content the author observed before editing.
    pub previous_hash: Fingerprint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDeleted {
    pub note_id: NoteId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRenamed {
    pub note_id: NoteId,
    pub new_filepath: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkCreated {
    pub link_id: LinkId,
    pub source_id: NoteId,
    pub target_id: NoteId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appearance: Option<LinkAppearance>,
}

/// Changed link fields. Omitted fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<NoteId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appearance: Option<LinkAppearance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkUpdated {
    pub link_id: LinkId,
    pub source_id: NoteId,
    #[serde(default)]
    pub changes: LinkPatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkDeleted {
    pub link_id: LinkId,
    pub source_id: NoteId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperTagCreated {
    pub super_tag_id: SuperTagId,
    pub name: String,
    pub colour: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeDefinition>,
}

/// Changed schema fields. Omitted fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperTagPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colour: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Replaces the whole attribute list when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<AttributeDefinition>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperTagUpdated {
    pub super_tag_id: SuperTagId,
    #[serde(default)]
    pub changes: SuperTagPatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperTagDeleted {
    pub super_tag_id: SuperTagId,
}

/// Shared payload of `SUPERTAG_ASSIGNED` and `SUPERTAG_UNASSIGNED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperTagMembership {
    pub note_id: NoteId,
    pub super_tag_id: SuperTagId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeUpdated {
    pub note_id: NoteId,
    pub super_tag_id: SuperTagId,
    pub attribute_key: String,
    /// Stored as-is; type checks belong to the editing surface.
    pub value: serde_json::Value,
}

/// Type-specific event body.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    NoteCreated(NoteCreated),
    NoteUpdated(NoteUpdated),
    NoteDeleted(NoteDeleted),
    NoteRenamed(NoteRenamed),
    LinkCreated(LinkCreated),
    LinkUpdated(LinkUpdated),
    LinkDeleted(LinkDeleted),
    SuperTagCreated(SuperTagCreated),
    SuperTagUpdated(SuperTagUpdated),
    SuperTagDeleted(SuperTagDeleted),
    SuperTagAssigned(SuperTagMembership),
    SuperTagUnassigned(SuperTagMembership),
    AttributeUpdated(AttributeUpdated),
}

impl EventPayload {
    /// Returns the wire type tag for this payload.
    pub fn event_type(&self) -> EventType {
        match self {
            Self::NoteCreated(_) => EventType::NoteCreated,
            Self::NoteUpdated(_) => EventType::NoteUpdated,
            Self::NoteDeleted(_) => EventType::NoteDeleted,
            Self::NoteRenamed(_) => EventType::NoteRenamed,
            Self::LinkCreated(_) => EventType::LinkCreated,
            Self::LinkUpdated(_) => EventType::LinkUpdated,
            Self::LinkDeleted(_) => EventType::LinkDeleted,
            Self::SuperTagCreated(_) => EventType::SupertagCreated,
            Self::SuperTagUpdated(_) => EventType::SupertagUpdated,
            Self::SuperTagDeleted(_) => EventType::SupertagDeleted,
            Self::SuperTagAssigned(_) => EventType::SupertagAssigned,
            Self::SuperTagUnassigned(_) => EventType::SupertagUnassigned,
            Self::AttributeUpdated(_) => EventType::AttributeUpdated,
        }
    }

    fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::NoteCreated(body) => serde_json::to_value(body),
            Self::NoteUpdated(body) => serde_json::to_value(body),
            Self::NoteDeleted(body) => serde_json::to_value(body),
            Self::NoteRenamed(body) => serde_json::to_value(body),
            Self::LinkCreated(body) => serde_json::to_value(body),
            Self::LinkUpdated(body) => serde_json::to_value(body),
            Self::LinkDeleted(body) => serde_json::to_value(body),
            Self::SuperTagCreated(body) => serde_json::to_value(body),
            Self::SuperTagUpdated(body) => serde_json::to_value(body),
            Self::SuperTagDeleted(body) => serde_json::to_value(body),
            Self::SuperTagAssigned(body) | Self::SuperTagUnassigned(body) => {
                serde_json::to_value(body)
            }
            Self::AttributeUpdated(body) => serde_json::to_value(body),
        }
    }

    fn from_json(
        event_type: EventType,
        value: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        Ok(match event_type {
            EventType::NoteCreated => Self::NoteCreated(serde_json::from_value(value)?),
            EventType::NoteUpdated => Self::NoteUpdated(serde_json::from_value(value)?),
            EventType::NoteDeleted => Self::NoteDeleted(serde_json::from_value(value)?),
            EventType::NoteRenamed => Self::NoteRenamed(serde_json::from_value(value)?),
            EventType::LinkCreated => Self::LinkCreated(serde_json::from_value(value)?),
            EventType::LinkUpdated => Self::LinkUpdated(serde_json::from_value(value)?),
            EventType::LinkDeleted => Self::LinkDeleted(serde_json::from_value(value)?),
            EventType::SupertagCreated => Self::SuperTagCreated(serde_json::from_value(value)?),
            EventType::SupertagUpdated => Self::SuperTagUpdated(serde_json::from_value(value)?),
            EventType::SupertagDeleted => Self::SuperTagDeleted(serde_json::from_value(value)?),
            EventType::SupertagAssigned => Self::SuperTagAssigned(serde_json::from_value(value)?),
            EventType::SupertagUnassigned => {
                Self::SuperTagUnassigned(serde_json::from_value(value)?)
            }
            EventType::AttributeUpdated => Self::AttributeUpdated(serde_json::from_value(value)?),
        })
    }
}

/// One immutable state change.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "WireEvent")]
pub struct Event {
    pub id: EventId,
    /// Author wall clock, Unix epoch milliseconds.
    pub timestamp: i64,
    pub clock: Option<ClockStamp>,
    pub payload: EventPayload,
}

impl Event {
    /// Creates an event with a generated id and no HLC reading.
    pub fn new(payload: EventPayload, timestamp: i64) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), payload, timestamp)
    }

    /// Creates an event with a caller-provided id.
    ///
    /// Used by import/replay paths where identity already exists.
    pub fn with_id(id: impl Into<EventId>, payload: EventPayload, timestamp: i64) -> Self {
        Self {
            id: id.into(),
            timestamp,
            clock: None,
            payload,
        }
    }

    /// Attaches an HLC reading.
    pub fn stamped(mut self, clock: ClockStamp) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    /// Effective clock: explicit HLC, else `(timestamp, 0)`.
    pub fn effective_clock(&self) -> ClockStamp {
        self.clock.unwrap_or(ClockStamp {
            wall_ms: self.timestamp,
            counter: 0,
        })
    }

    /// Deterministic tie-break order for causally unrelated events.
    pub fn order_key(&self) -> (ClockStamp, &str) {
        (self.effective_clock(), self.id.as_str())
    }
}

/// Error raised when a wire event cannot be decoded.
#[derive(Debug)]
pub struct EventDecodeError {
    event_id: String,
    event_type: EventType,
    source: serde_json::Error,
}

impl Display for EventDecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid {} payload in event `{}`: {}",
            self.event_type, self.event_id, self.source
        )
    }
}

impl Error for EventDecodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    id: EventId,
    timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    clock: Option<ClockStamp>,
    #[serde(rename = "type")]
    event_type: EventType,
    payload: serde_json::Value,
}

impl TryFrom<WireEvent> for Event {
    type Error = EventDecodeError;

    fn try_from(wire: WireEvent) -> Result<Self, Self::Error> {
        let payload = EventPayload::from_json(wire.event_type, wire.payload).map_err(|source| {
            EventDecodeError {
                event_id: wire.id.clone(),
                event_type: wire.event_type,
                source,
            }
        })?;
        Ok(Self {
            id: wire.id,
            timestamp: wire.timestamp,
            clock: wire.clock,
            payload,
        })
    }
}

impl Serialize for Event {
    /// Errors when the payload cannot be encoded as a JSON value.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let payload = self.payload.to_json().map_err(S::Error::custom)?;
        WireEvent {
            id: self.id.clone(),
            timestamp: self.timestamp,
            clock: self.clock,
            event_type: self.event_type(),
            payload,
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AttributeUpdated, ClockStamp, Event, EventPayload, EventType, NoteCreated, NoteUpdated,
        SuperTagPatch, SuperTagUpdated,
    };
    use crate::model::fingerprint::Fingerprint;

    fn created(note_id: &str) -> EventPayload {
        EventPayload::NoteCreated(NoteCreated {
            note_id: note_id.to_string(),
            filepath: format!("{note_id}.md"),
            content: "hello".to_string(),
            raw_content: None,
            title: None,
            tags: None,
        })
    }

    #[test]
    fn serializes_to_type_and_payload_shape() {
        let event = Event::with_id("e1", created("n1"), 1_700_000_000_000);
        let json = serde_json::to_value(&event).expect("event should serialize");
        assert_eq!(json["id"], "e1");
        assert_eq!(json["type"], "NOTE_CREATED");
        assert_eq!(json["payload"]["noteId"], "n1");
        assert_eq!(json["payload"]["filepath"], "n1.md");
        assert!(json.get("clock").is_none());
    }

    #[test]
    fn every_payload_kind_encodes_as_a_decodable_object() {
        let payloads = vec![
            created("n1"),
            EventPayload::NoteUpdated(NoteUpdated {
                note_id: "n1".to_string(),
                content: "v2".to_string(),
                raw_content: Some("---\n---\nv2".to_string()),
                previous_hash: Fingerprint::of("hello"),
            }),
            EventPayload::AttributeUpdated(AttributeUpdated {
                note_id: "n1".to_string(),
                super_tag_id: "t1".to_string(),
                attribute_key: "score".to_string(),
                value: serde_json::json!({"nested": [1, 2.5, null]}),
            }),
            EventPayload::SuperTagUpdated(SuperTagUpdated {
                super_tag_id: "t1".to_string(),
                changes: SuperTagPatch::default(),
            }),
        ];

        for payload in payloads {
            let event = Event::with_id("e1", payload, 3);
            let text = serde_json::to_string(&event).expect("event should encode");
            let json: serde_json::Value = serde_json::from_str(&text).expect("valid json");
            assert!(json["payload"].is_object(), "payload missing in {text}");
            let decoded: Event = serde_json::from_str(&text).expect("event should decode");
            assert_eq!(decoded, event);
        }
    }

    #[test]
    fn decodes_update_with_previous_hash() {
        let json = serde_json::json!({
            "id": "e2",
            "timestamp": 5,
            "clock": { "wallMs": 5, "counter": 3 },
            "type": "NOTE_UPDATED",
            "payload": { "noteId": "n1", "content": "world", "previousHash": "2e9" }
        });
        let event: Event = serde_json::from_value(json).expect("event should decode");
        assert_eq!(event.event_type(), EventType::NoteUpdated);
        assert_eq!(event.effective_clock(), ClockStamp { wall_ms: 5, counter: 3 });
        match event.payload {
            EventPayload::NoteUpdated(NoteUpdated { previous_hash, .. }) => {
                assert_eq!(previous_hash, Fingerprint::of("ab"));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn rejects_payload_that_does_not_match_type() {
        let json = serde_json::json!({
            "id": "e3",
            "timestamp": 5,
            "type": "LINK_CREATED",
            "payload": { "noteId": "n1" }
        });
        let err = serde_json::from_value::<Event>(json).expect_err("payload mismatch must fail");
        assert!(err.to_string().contains("LINK_CREATED"), "unexpected error: {err}");
    }

    #[test]
    fn rejects_unknown_event_type() {
        let json = serde_json::json!({
            "id": "e4",
            "timestamp": 5,
            "type": "NOTE_ARCHIVED",
            "payload": {}
        });
        assert!(serde_json::from_value::<Event>(json).is_err());
    }

    #[test]
    fn missing_clock_orders_by_timestamp() {
        let event = Event::with_id("e5", created("n1"), 42);
        assert_eq!(event.effective_clock(), ClockStamp { wall_ms: 42, counter: 0 });
        let stamped = event.stamped(ClockStamp { wall_ms: 42, counter: 7 });
        assert!(stamped.order_key().0 > ClockStamp { wall_ms: 42, counter: 0 });
    }

    #[test]
    fn generated_ids_are_unique() {
        let first = Event::new(created("n1"), 1);
        let second = Event::new(created("n1"), 1);
        assert_ne!(first.id, second.id);
    }
}
