//! Note domain model.
//!
//! # Responsibility
//! - Define the reconstructed note shape consumed by editor/search layers.
//! - Own link definitions and tag attribute values inside note frontmatter.
//!
//! # Invariants
//! - `id` is stable and never changes after creation.
//! - Link ids are unique within one note's `links` list.
//! - Link targets may dangle; they are never repaired here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Stable note identifier.
pub type NoteId = String;

/// Link identifier, unique within its owning note.
pub type LinkId = String;

/// Attribute values keyed by tag-schema id, then by attribute key.
pub type TagAttributes = BTreeMap<String, BTreeMap<String, serde_json::Value>>;

/// Reconstructed note record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Stable id, the only cross-reference other entities may hold.
    pub id: NoteId,
    /// Vault-relative path; mutable via rename.
    pub filepath: String,
    pub frontmatter: Frontmatter,
    /// Markdown body.
    pub content: String,
    /// Serialized form of frontmatter + body, as last written.
    pub raw_content: String,
}

/// Structured note metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frontmatter {
    pub title: String,
    /// Unix epoch milliseconds.
    pub created: i64,
    /// Unix epoch milliseconds of the last applied mutation.
    pub modified: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<LinkDefinition>>,
    /// Assigned tag-schema ids, in assignment order, without duplicates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub super_tags: Option<Vec<String>>,
    /// May hold values for schemas the note is not assigned to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_attributes: Option<TagAttributes>,
}

impl Frontmatter {
    /// Creates frontmatter with all optional collections unset.
    pub fn new(title: impl Into<String>, timestamp: i64) -> Self {
        Self {
            title: title.into(),
            created: timestamp,
            modified: timestamp,
            tags: None,
            links: None,
            super_tags: None,
            tag_attributes: None,
        }
    }
}

/// Directed, named relation from the owning note to `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkDefinition {
    pub id: LinkId,
    /// Target note id. Not guaranteed to resolve.
    pub target: NoteId,
    /// Asymmetric relation label, e.g. `supports`. No inverse is generated.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appearance: Option<LinkAppearance>,
}

/// Rendering hints for a link edge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkAppearance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Stroke style name, e.g. `solid` or `dashed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thickness: Option<u32>,
}

impl Note {
    /// Creates a note whose title falls back to the filename stem.
    pub fn new(
        id: impl Into<NoteId>,
        filepath: impl Into<String>,
        title: Option<String>,
        content: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        let filepath = filepath.into();
        let title = title
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| title_from_filepath(&filepath));
        let content = content.into();
        Self {
            id: id.into(),
            filepath,
            frontmatter: Frontmatter::new(title, timestamp),
            raw_content: content.clone(),
            content,
        }
    }

    /// Returns the link with `link_id`, if present.
    pub fn link(&self, link_id: &str) -> Option<&LinkDefinition> {
        self.frontmatter
            .links
            .as_ref()
            .and_then(|links| links.iter().find(|link| link.id == link_id))
    }

    /// Returns whether `super_tag_id` is in the membership list.
    pub fn has_super_tag(&self, super_tag_id: &str) -> bool {
        self.frontmatter
            .super_tags
            .as_ref()
            .is_some_and(|ids| ids.iter().any(|id| id == super_tag_id))
    }

    /// Returns one attribute value, regardless of membership.
    pub fn attribute(&self, super_tag_id: &str, attribute_key: &str) -> Option<&serde_json::Value> {
        self.frontmatter
            .tag_attributes
            .as_ref()
            .and_then(|by_tag| by_tag.get(super_tag_id))
            .and_then(|values| values.get(attribute_key))
    }

    /// Bumps `modified` to the applying event's timestamp.
    pub fn touch(&mut self, timestamp: i64) {
        self.frontmatter.modified = timestamp;
    }
}

/// Derives a display title from a filename with its extension stripped.
///
/// `notes/Daily Log.md` -> `Daily Log`. Falls back to the raw path when no
/// usable stem exists.
pub fn title_from_filepath(filepath: &str) -> String {
    Path::new(filepath)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| filepath.to_string())
}
