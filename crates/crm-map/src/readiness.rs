//! Readiness scoring: reduce a mapping to one interpretable report.

use tracing::debug;

use crm_model::{
    EntityKind, MappingEntry, MigrationConfig, MigrationMapping, ReadinessLevel, ReadinessReport,
    SchemaEntity,
};

/// Below this ratio a component earns a warning in the report.
const WARNING_RATIO: f32 = 0.5;

/// Scores a [`MigrationMapping`] into a [`ReadinessReport`].
///
/// Fields carry `field_weight` of the overall score; pipelines and stages
/// together carry the remainder. The report is advisory; the orchestrator
/// decides what to do with a Low bucket.
pub struct ReadinessScorer {
    field_weight: f32,
}

impl Default for ReadinessScorer {
    fn default() -> Self {
        Self { field_weight: 0.5 }
    }
}

impl ReadinessScorer {
    pub fn new(field_weight: f32) -> Self {
        Self {
            field_weight: field_weight.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(config: &MigrationConfig) -> Self {
        Self::new(config.field_weight)
    }

    /// Score a mapping. `source_catalog` supplies stage parentage so stage
    /// readiness is computed only within mapped pipelines.
    pub fn score(
        &self,
        mapping: &MigrationMapping,
        source_catalog: &[SchemaEntity],
    ) -> ReadinessReport {
        let field_readiness = resolved_ratio(&mapping.fields);
        let pipeline_readiness = resolved_ratio(&mapping.pipelines);

        let pipeline_translation = mapping.pipeline_translation();
        let mut stage_total = 0usize;
        let mut stage_resolved = 0usize;
        for entry in &mapping.stages {
            let Some(stage) = source_catalog
                .iter()
                .find(|entity| entity.kind == EntityKind::Stage && entity.id == entry.source_id)
            else {
                continue;
            };
            let in_mapped_pipeline = stage
                .parent_id
                .as_deref()
                .is_some_and(|parent| pipeline_translation.contains_key(parent));
            if in_mapped_pipeline {
                stage_total += 1;
                if entry.is_resolved() {
                    stage_resolved += 1;
                }
            }
        }
        let stage_readiness = ratio(stage_resolved, stage_total);

        let structural = (pipeline_readiness + stage_readiness) / 2.0;
        let overall = self.field_weight * field_readiness + (1.0 - self.field_weight) * structural;
        let level = ReadinessLevel::from_ratio(overall);

        let mut warnings = Vec::new();
        if pipeline_readiness < WARNING_RATIO {
            warnings.push(
                "many pipelines are not mapped - opportunities may fail to migrate".to_string(),
            );
        }
        if field_readiness < WARNING_RATIO {
            warnings
                .push("many custom fields are not mapped - field values may be dropped".to_string());
        }

        debug!(
            field_readiness,
            pipeline_readiness, stage_readiness, overall, "scored mapping"
        );
        ReadinessReport {
            field_readiness,
            pipeline_readiness,
            stage_readiness,
            overall,
            level,
            warnings,
        }
    }
}

fn resolved_ratio(entries: &[MappingEntry]) -> f32 {
    let resolved = entries.iter().filter(|entry| entry.is_resolved()).count();
    ratio(resolved, entries.len())
}

/// An empty component is vacuously ready: there is nothing to map, so it
/// cannot block a migration.
fn ratio(numerator: usize, denominator: usize) -> f32 {
    if denominator == 0 {
        1.0
    } else {
        numerator as f32 / denominator as f32
    }
}

#[cfg(test)]
mod tests {
    use crm_model::{FieldDataType, MatchMethod};

    use super::*;
    use crate::engine::MappingEngine;

    fn mapping_with(fields: Vec<MappingEntry>, pipelines: Vec<MappingEntry>) -> MigrationMapping {
        MigrationMapping {
            fields,
            pipelines,
            stages: Vec::new(),
        }
    }

    #[test]
    fn fully_mapped_schema_scores_high() {
        let mapping = mapping_with(
            vec![MappingEntry::resolved("f1", "F1", 1.0, MatchMethod::Exact)],
            vec![MappingEntry::resolved("p1", "P1", 1.0, MatchMethod::Exact)],
        );
        let report = ReadinessScorer::default().score(&mapping, &[]);
        assert_eq!(report.overall, 1.0);
        assert_eq!(report.level, ReadinessLevel::High);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn unmapped_pipelines_drag_the_score_down_and_warn() {
        let mapping = mapping_with(
            vec![MappingEntry::resolved("f1", "F1", 1.0, MatchMethod::Exact)],
            vec![
                MappingEntry::unresolved("p1"),
                MappingEntry::unresolved("p2"),
                MappingEntry::unresolved("p3"),
            ],
        );
        let report = ReadinessScorer::default().score(&mapping, &[]);
        // fields 1.0, structural (0.0 + 1.0) / 2 = 0.5 → overall 0.75
        assert!((report.overall - 0.75).abs() < 1e-6);
        assert_eq!(report.level, ReadinessLevel::Medium);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn resolving_an_entry_never_lowers_overall() {
        let before = mapping_with(
            vec![
                MappingEntry::resolved("f1", "F1", 1.0, MatchMethod::Exact),
                MappingEntry::unresolved("f2"),
            ],
            vec![MappingEntry::resolved("p1", "P1", 1.0, MatchMethod::Exact)],
        );
        let mut after = before.clone();
        after.fields[1] = MappingEntry::resolved("f2", "F2", 0.9, MatchMethod::Similarity);
        let scorer = ReadinessScorer::default();
        let report_before = scorer.score(&before, &[]);
        let report_after = scorer.score(&after, &[]);
        assert!(report_after.overall >= report_before.overall);
    }

    #[test]
    fn stage_readiness_counts_only_mapped_pipelines() {
        let source_catalog = vec![
            SchemaEntity::pipeline("p1", "Sales"),
            SchemaEntity::stage("s1", "Lead", "p1", 0),
            SchemaEntity::pipeline("p2", "Partner Referrals"),
            SchemaEntity::stage("s2", "Intake", "p2", 0),
        ];
        let mapping = MigrationMapping {
            fields: Vec::new(),
            pipelines: vec![
                MappingEntry::resolved("p1", "P1", 1.0, MatchMethod::Exact),
                MappingEntry::unresolved("p2"),
            ],
            stages: vec![
                MappingEntry::resolved("s1", "S1", 1.0, MatchMethod::Exact),
                MappingEntry::unresolved("s2"),
            ],
        };
        let report = ReadinessScorer::default().score(&mapping, &source_catalog);
        // s2 sits in an unmapped pipeline, so it is outside the stage
        // denominator entirely.
        assert_eq!(report.stage_readiness, 1.0);
    }

    #[test]
    fn alias_and_exact_matches_are_fully_ready() {
        let source = vec![
            SchemaEntity::field("f1", "Industry", FieldDataType::Text),
            SchemaEntity::field("f2", "Budget", FieldDataType::Numerical),
        ];
        let destination = vec![
            SchemaEntity::field("F1", "Business Industry", FieldDataType::Text),
            SchemaEntity::field("F2", "Budget", FieldDataType::Numerical),
        ];
        let mapping = MappingEngine::new(0.80).build(&source, &destination, &[], &[]);
        let report = ReadinessScorer::default().score(&mapping, &[]);
        assert_eq!(report.field_readiness, 1.0);
    }
}
