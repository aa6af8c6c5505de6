//! Mapping types: the result of resolving source schema entities against a
//! destination account.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How a mapping entry was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    /// Case-insensitive, whitespace-normalized name equality.
    Exact,
    /// Matched through the static synonym table.
    Alias,
    /// Fuzzy name similarity above the configured threshold.
    Similarity,
    /// No destination counterpart was found.
    Unresolved,
}

/// Resolution of one source entity to zero-or-one destination entity.
///
/// `destination_id` is `None` for unresolved entries. An entry that was
/// materialized on demand in the destination keeps `method = Unresolved`
/// and sets `created_in_destination`; the pair is the audit record for
/// "nothing matched, so we created it".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub source_id: String,
    pub destination_id: Option<String>,
    pub confidence: f32,
    pub method: MatchMethod,
    #[serde(default)]
    pub created_in_destination: bool,
}

impl MappingEntry {
    /// A resolved entry.
    pub fn resolved(
        source_id: impl Into<String>,
        destination_id: impl Into<String>,
        confidence: f32,
        method: MatchMethod,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            destination_id: Some(destination_id.into()),
            confidence,
            method,
            created_in_destination: false,
        }
    }

    /// An unresolved entry (no destination counterpart).
    pub fn unresolved(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            destination_id: None,
            confidence: 0.0,
            method: MatchMethod::Unresolved,
            created_in_destination: false,
        }
    }

    /// True when the entry points at a destination entity, matched or created.
    pub fn is_resolved(&self) -> bool {
        self.destination_id.is_some()
    }
}

/// Aggregate of all mapping entries for one run, partitioned by kind.
///
/// Owned by the orchestrator and passed read-only to the record migrator.
/// The translation tables are derived views over entries with a non-null
/// destination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MigrationMapping {
    pub fields: Vec<MappingEntry>,
    pub pipelines: Vec<MappingEntry>,
    pub stages: Vec<MappingEntry>,
}

impl MigrationMapping {
    /// Source field id → destination field id, resolved entries only.
    pub fn field_translation(&self) -> BTreeMap<String, String> {
        Self::translation(&self.fields)
    }

    /// Source pipeline id → destination pipeline id, resolved entries only.
    pub fn pipeline_translation(&self) -> BTreeMap<String, String> {
        Self::translation(&self.pipelines)
    }

    /// Source stage id → destination stage id, resolved entries only.
    pub fn stage_translation(&self) -> BTreeMap<String, String> {
        Self::translation(&self.stages)
    }

    fn translation(entries: &[MappingEntry]) -> BTreeMap<String, String> {
        entries
            .iter()
            .filter_map(|entry| {
                entry
                    .destination_id
                    .as_ref()
                    .map(|dest| (entry.source_id.clone(), dest.clone()))
            })
            .collect()
    }
}

/// Readiness bucket for a scored mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessLevel {
    Low,
    Medium,
    High,
}

impl ReadinessLevel {
    /// Bucket an overall readiness ratio.
    pub fn from_ratio(overall: f32) -> Self {
        if overall >= 0.80 {
            Self::High
        } else if overall >= 0.60 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Aggregate readiness report over a [`MigrationMapping`].
///
/// Advisory: the orchestrator may proceed regardless of the bucket, but a
/// `Low` report must be acknowledged by the caller before any record
/// mutation begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessReport {
    /// Resolved fields over total source fields.
    pub field_readiness: f32,
    /// Resolved pipelines over total source pipelines.
    pub pipeline_readiness: f32,
    /// Resolved stages over total stages within mapped pipelines.
    pub stage_readiness: f32,
    /// Weighted overall ratio.
    pub overall: f32,
    pub level: ReadinessLevel,
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_skips_unresolved() {
        let mapping = MigrationMapping {
            fields: vec![
                MappingEntry::resolved("f1", "F1", 1.0, MatchMethod::Exact),
                MappingEntry::unresolved("f2"),
            ],
            ..Default::default()
        };
        let table = mapping.field_translation();
        assert_eq!(table.get("f1").map(String::as_str), Some("F1"));
        assert!(!table.contains_key("f2"));
    }

    #[test]
    fn readiness_buckets() {
        assert_eq!(ReadinessLevel::from_ratio(0.80), ReadinessLevel::High);
        assert_eq!(ReadinessLevel::from_ratio(0.79), ReadinessLevel::Medium);
        assert_eq!(ReadinessLevel::from_ratio(0.60), ReadinessLevel::Medium);
        assert_eq!(ReadinessLevel::from_ratio(0.59), ReadinessLevel::Low);
    }

    #[test]
    fn created_entry_round_trips() {
        let mut entry = MappingEntry::unresolved("f9");
        entry.destination_id = Some("F9".to_string());
        entry.created_in_destination = true;
        let json = serde_json::to_string(&entry).expect("serialize entry");
        let round: MappingEntry = serde_json::from_str(&json).expect("deserialize entry");
        assert_eq!(round.method, MatchMethod::Unresolved);
        assert!(round.created_in_destination);
    }
}
