//! Tag schema (SuperTag) model.
//!
//! # Responsibility
//! - Define user-defined tag schemas and their typed attribute definitions.
//!
//! # Invariants
//! - Schema `id` is unique across the schema collection.
//! - Attribute `id` is unique within its schema.
//! - Attribute values stored on notes are never validated against `type` here.

use serde::{Deserialize, Serialize};

/// Stable tag-schema identifier.
pub type SuperTagId = String;

/// User-defined named attribute set assignable to notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperTag {
    pub id: SuperTagId,
    pub name: String,
    pub colour: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ordered attribute definitions.
    #[serde(default)]
    pub attributes: Vec<AttributeDefinition>,
    pub created: i64,
    pub modified: i64,
}

impl SuperTag {
    /// Returns the attribute definition with machine name `key`.
    pub fn attribute_by_key(&self, key: &str) -> Option<&AttributeDefinition> {
        self.attributes.iter().find(|attribute| attribute.key == key)
    }

    /// Returns the first attribute id that appears more than once.
    pub fn duplicate_attribute_id(&self) -> Option<&str> {
        duplicate_attribute_id(&self.attributes)
    }
}

/// Typed attribute slot inside a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDefinition {
    pub id: String,
    /// Stable machine name used as the key in `tagAttributes`.
    pub key: String,
    /// Display label.
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AttributeType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<AttributeConfig>,
}

/// Closed set of attribute value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeType {
    Text,
    RichText,
    Number,
    Select,
    MultiSelect,
    Date,
    Checkbox,
    Rating,
    Url,
    Email,
}

/// Type-dependent attribute configuration.
///
/// Only the fields meaningful for the owning attribute's type are expected to
/// be set; the editing surface owns that validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeConfig {
    /// `number`: inclusive lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// `number`: inclusive upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    /// `select` / `multiSelect` choices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<SelectOption>>,
    /// `date`: whether a time component is captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_time: Option<bool>,
    /// `rating`: number of stars.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rating: Option<u8>,
}

/// One choice of a select attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectOption {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colour: Option<String>,
}

pub(crate) fn duplicate_attribute_id(attributes: &[AttributeDefinition]) -> Option<&str> {
    let mut seen = std::collections::BTreeSet::new();
    attributes
        .iter()
        .find(|attribute| !seen.insert(attribute.id.as_str()))
        .map(|attribute| attribute.id.as_str())
}

#[cfg(test)]
mod tests {
    use super::{AttributeDefinition, AttributeType, SuperTag};

    fn attribute(id: &str, key: &str, kind: AttributeType) -> AttributeDefinition {
        AttributeDefinition {
            id: id.to_string(),
            key: key.to_string(),
            name: key.to_string(),
            kind,
            required: false,
            config: None,
        }
    }

    #[test]
    fn attribute_type_uses_camel_case_wire_names() {
        let json = serde_json::to_value(AttributeType::MultiSelect).expect("serialize");
        assert_eq!(json, "multiSelect");
        let decoded: AttributeType =
            serde_json::from_value(serde_json::json!("richText")).expect("deserialize");
        assert_eq!(decoded, AttributeType::RichText);
    }

    #[test]
    fn finds_duplicate_attribute_ids() {
        let tag = SuperTag {
            id: "t1".to_string(),
            name: "Project".to_string(),
            colour: "#ff0000".to_string(),
            icon: None,
            description: None,
            attributes: vec![
                attribute("a1", "status", AttributeType::Select),
                attribute("a2", "due", AttributeType::Date),
                attribute("a1", "owner", AttributeType::Text),
            ],
            created: 1,
            modified: 1,
        };
        assert_eq!(tag.duplicate_attribute_id(), Some("a1"));
        assert_eq!(
            tag.attribute_by_key("due").map(|attribute| attribute.kind),
            Some(AttributeType::Date)
        );
    }
}
