//! Schema entities fetched from either account.
//!
//! A [`SchemaEntity`] is a named, typed item from the CRM's configuration
//! surface: a custom field definition, a pipeline, or a stage within a
//! pipeline. Entities are immutable once fetched; the mapper consumes them
//! by reference for the duration of one mapping pass.

use serde::{Deserialize, Serialize};

/// The kind of schema entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A custom field definition.
    Field,
    /// A sales pipeline.
    Pipeline,
    /// A stage within a pipeline.
    Stage,
}

/// Data type of a custom field.
///
/// Mirrors the CRM's field type vocabulary. Unrecognized types are carried
/// through [`FieldDataType::Other`] so a newly introduced remote type never
/// breaks deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldDataType {
    Text,
    LargeText,
    Numerical,
    Monetary,
    Date,
    Phone,
    Email,
    Checkbox,
    SingleOptions,
    MultipleOptions,
    #[serde(untagged)]
    Other(String),
}

impl FieldDataType {
    /// Parse a remote type string, falling back to [`FieldDataType::Other`].
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "TEXT" => Self::Text,
            "LARGE_TEXT" => Self::LargeText,
            "NUMERICAL" | "NUMBER" => Self::Numerical,
            "MONETARY" => Self::Monetary,
            "DATE" => Self::Date,
            "PHONE" => Self::Phone,
            "EMAIL" => Self::Email,
            "CHECKBOX" => Self::Checkbox,
            "SINGLE_OPTIONS" | "SELECT" => Self::SingleOptions,
            "MULTIPLE_OPTIONS" => Self::MultipleOptions,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A named, typed schema item from either account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaEntity {
    /// Source-system identifier (opaque).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Entity kind.
    pub kind: EntityKind,
    /// Field data type; present only for fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<FieldDataType>,
    /// Owning pipeline id; present only for stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Ordinal position within the owning pipeline; present only for stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

impl SchemaEntity {
    /// A custom field definition.
    pub fn field(id: impl Into<String>, name: impl Into<String>, data_type: FieldDataType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: EntityKind::Field,
            data_type: Some(data_type),
            parent_id: None,
            position: None,
        }
    }

    /// A pipeline.
    pub fn pipeline(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: EntityKind::Pipeline,
            data_type: None,
            parent_id: None,
            position: None,
        }
    }

    /// A stage belonging to `pipeline_id`.
    pub fn stage(
        id: impl Into<String>,
        name: impl Into<String>,
        pipeline_id: impl Into<String>,
        position: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: EntityKind::Stage,
            data_type: None,
            parent_id: Some(pipeline_id.into()),
            position: Some(position),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_and_unknown_types() {
        assert_eq!(FieldDataType::parse("text"), FieldDataType::Text);
        assert_eq!(FieldDataType::parse("MONETARY"), FieldDataType::Monetary);
        assert_eq!(
            FieldDataType::parse("SIGNATURE"),
            FieldDataType::Other("SIGNATURE".to_string())
        );
    }

    #[test]
    fn stage_carries_parent_and_position() {
        let stage = SchemaEntity::stage("s1", "Qualified", "p1", 2);
        assert_eq!(stage.kind, EntityKind::Stage);
        assert_eq!(stage.parent_id.as_deref(), Some("p1"));
        assert_eq!(stage.position, Some(2));
    }
}
