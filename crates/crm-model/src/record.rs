//! Contact and opportunity records, destination payloads, dedup keys, and
//! the append-only translation tables built during a migration run.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One custom-field value on a contact or opportunity, keyed by the field id
/// of the account the record came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldValue {
    pub field_id: String,
    pub value: String,
}

/// A contact as fetched from the source account. Immutable snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceContact {
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldValue>,
}

/// An opportunity as fetched from the source account. Immutable snapshot.
/// All ids are source-account ids; translation happens at migration time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceOpportunity {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub pipeline_id: String,
    pub stage_id: String,
    pub contact_id: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Payload for creating a contact in the destination account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactPayload {
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Custom-field values keyed by destination field id.
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldValue>,
}

/// Payload for creating an opportunity in the destination account.
/// All ids are destination-account ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpportunityPayload {
    pub name: String,
    pub pipeline_id: String,
    pub stage_id: String,
    pub contact_id: String,
    pub value: f64,
    pub status: String,
}

/// Definition for creating a missing custom field in the destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub data_type: crate::entity::FieldDataType,
}

/// Definition for creating a missing stage in a destination pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDefinition {
    pub name: String,
    pub position: u32,
}

/// Normalized natural key used to deduplicate contacts against the
/// destination. Email is the primary key; phone is a fallback used only
/// when the contact has no email.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupKey {
    Email(String),
    Phone(String),
}

impl DedupKey {
    /// Normalized email key: trimmed and lowercased. `None` for blank input.
    pub fn from_email(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            None
        } else {
            Some(Self::Email(normalized))
        }
    }

    /// Normalized phone key: non-digits removed and the leading country-code
    /// digit stripped from 11-digit numbers. `None` when no digits remain.
    pub fn from_phone(raw: &str) -> Option<Self> {
        let mut digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        if digits.len() == 11 && digits.starts_with('1') {
            digits.remove(0);
        }
        if digits.is_empty() {
            None
        } else {
            Some(Self::Phone(digits))
        }
    }

    /// The normalized key value.
    pub fn value(&self) -> &str {
        match self {
            Self::Email(value) | Self::Phone(value) => value,
        }
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email(email) => write!(f, "email:{email}"),
            Self::Phone(phone) => write!(f, "phone:{phone}"),
        }
    }
}

/// Why an opportunity was skipped rather than attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    PipelineUnmapped,
    StageUnmapped,
    ContactNotMigrated,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::PipelineUnmapped => "pipeline unmapped",
            Self::StageUnmapped => "stage unmapped",
            Self::ContactNotMigrated => "contact not migrated",
        };
        f.write_str(text)
    }
}

/// One entry in the contact translation table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactTranslation {
    pub destination_id: String,
    /// True when an existing destination contact was reused instead of
    /// creating a new one.
    pub reused: bool,
}

/// Append-only source-contact-id → destination-contact-id table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactTranslations(BTreeMap<String, ContactTranslation>);

impl ContactTranslations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_created(&mut self, source_id: impl Into<String>, destination_id: impl Into<String>) {
        self.0.insert(
            source_id.into(),
            ContactTranslation {
                destination_id: destination_id.into(),
                reused: false,
            },
        );
    }

    pub fn record_reused(&mut self, source_id: impl Into<String>, destination_id: impl Into<String>) {
        self.0.insert(
            source_id.into(),
            ContactTranslation {
                destination_id: destination_id.into(),
                reused: true,
            },
        );
    }

    /// Destination id for a source contact, if it was migrated.
    pub fn destination_of(&self, source_id: &str) -> Option<&str> {
        self.0.get(source_id).map(|t| t.destination_id.as_str())
    }

    pub fn contains(&self, source_id: &str) -> bool {
        self.0.contains_key(source_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn reused_count(&self) -> usize {
        self.0.values().filter(|t| t.reused).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ContactTranslation)> {
        self.0.iter()
    }
}

/// Outcome of one opportunity migration attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OpportunityOutcome {
    Created { destination_id: String },
    Skipped { reason: SkipReason },
    Failed { message: String },
}

/// Append-only source-opportunity-id → outcome table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpportunityResults(BTreeMap<String, OpportunityOutcome>);

impl OpportunityResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, source_id: impl Into<String>, outcome: OpportunityOutcome) {
        self.0.insert(source_id.into(), outcome);
    }

    pub fn get(&self, source_id: &str) -> Option<&OpportunityOutcome> {
        self.0.get(source_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn created_count(&self) -> usize {
        self.0
            .values()
            .filter(|o| matches!(o, OpportunityOutcome::Created { .. }))
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OpportunityOutcome)> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translations_track_reuse() {
        let mut table = ContactTranslations::new();
        table.record_created("c1", "M1");
        table.record_reused("c2", "M2");
        assert_eq!(table.len(), 2);
        assert_eq!(table.reused_count(), 1);
        assert_eq!(table.destination_of("c2"), Some("M2"));
        assert_eq!(table.destination_of("c3"), None);
    }

    #[test]
    fn phone_key_strips_country_code_and_punctuation() {
        let key = DedupKey::from_phone("+1 (555) 123-4567").unwrap();
        assert_eq!(key, DedupKey::Phone("5551234567".to_string()));
        let key = DedupKey::from_phone("555.123.4567").unwrap();
        assert_eq!(key.value(), "5551234567");
        assert_eq!(DedupKey::from_phone("n/a"), None);
    }

    #[test]
    fn email_key_normalizes_case_and_whitespace() {
        let key = DedupKey::from_email("  Jane.Doe@Example.COM ").unwrap();
        assert_eq!(key, DedupKey::Email("jane.doe@example.com".to_string()));
        assert_eq!(DedupKey::from_email("   "), None);
    }

    #[test]
    fn opportunity_outcome_serializes_tagged() {
        let outcome = OpportunityOutcome::Skipped {
            reason: SkipReason::StageUnmapped,
        };
        let json = serde_json::to_value(&outcome).expect("serialize outcome");
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["reason"], "stage_unmapped");
    }
}
