//! Mapping engine: resolves source schema entities against a destination.
//!
//! Resolution runs three passes per kind (exact, alias, similarity) and
//! leaves the remainder unresolved. Fields are matched across the whole
//! account; stages are matched only inside their pipeline's mapped
//! counterpart, and an unresolved pipeline short-circuits all of its
//! stages.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use rapidfuzz::distance::jaro_winkler::similarity as jaro_similarity;
use tracing::{debug, warn};

use crm_model::{
    EntityKind, MappingEntry, MatchMethod, MigrationConfig, MigrationMapping, SchemaEntity,
};

use crate::aliases::alias_match;
use crate::utils::normalize_text;

/// Confidence recorded for alias matches.
const ALIAS_CONFIDENCE: f32 = 0.95;

/// Engine for building a [`MigrationMapping`] from source and destination
/// schema entities.
pub struct MappingEngine {
    similarity_threshold: f32,
}

struct Candidate {
    score: f32,
    source_index: usize,
    destination_index: usize,
}

impl MappingEngine {
    pub fn new(similarity_threshold: f32) -> Self {
        Self {
            similarity_threshold,
        }
    }

    pub fn from_config(config: &MigrationConfig) -> Self {
        Self::new(config.similarity_threshold)
    }

    /// Build the full mapping: fields, then pipelines, then stages per
    /// mapped pipeline. The pipeline catalogs hold pipeline entities and
    /// their stage entities flattened, as the providers return them.
    pub fn build(
        &self,
        source_fields: &[SchemaEntity],
        destination_fields: &[SchemaEntity],
        source_catalog: &[SchemaEntity],
        destination_catalog: &[SchemaEntity],
    ) -> MigrationMapping {
        let fields = self.map_entities(
            &source_fields.iter().collect::<Vec<_>>(),
            &destination_fields.iter().collect::<Vec<_>>(),
            true,
        );

        let (source_pipelines, source_stages) = split_catalog(source_catalog);
        let (destination_pipelines, destination_stages) = split_catalog(destination_catalog);
        let pipelines = self.map_entities(&source_pipelines, &destination_pipelines, false);

        let mut stages = Vec::new();
        for (pipeline, entry) in source_pipelines.iter().zip(&pipelines) {
            let own_stages: Vec<&SchemaEntity> = source_stages
                .iter()
                .copied()
                .filter(|stage| stage.parent_id.as_deref() == Some(pipeline.id.as_str()))
                .collect();
            match entry.destination_id.as_deref() {
                Some(destination_pipeline) => {
                    let candidates: Vec<&SchemaEntity> = destination_stages
                        .iter()
                        .copied()
                        .filter(|stage| stage.parent_id.as_deref() == Some(destination_pipeline))
                        .collect();
                    stages.extend(self.map_entities(&own_stages, &candidates, false));
                }
                None => {
                    warn!(
                        pipeline = %pipeline.name,
                        "pipeline unresolved, its stages stay unresolved"
                    );
                    stages.extend(
                        own_stages
                            .iter()
                            .map(|stage| MappingEntry::unresolved(stage.id.clone())),
                    );
                }
            }
        }

        MigrationMapping {
            fields,
            pipelines,
            stages,
        }
    }

    /// Resolve one kind. Entries come back in source declaration order and
    /// each destination entity is consumed at most once.
    fn map_entities(
        &self,
        source: &[&SchemaEntity],
        destination: &[&SchemaEntity],
        check_type: bool,
    ) -> Vec<MappingEntry> {
        let mut resolved: Vec<Option<MappingEntry>> = source.iter().map(|_| None).collect();
        let mut consumed: BTreeSet<usize> = BTreeSet::new();

        // Pass 1: case-insensitive, whitespace-normalized name equality.
        for (source_index, entity) in source.iter().enumerate() {
            let name = normalize_text(&entity.name);
            for (destination_index, candidate) in destination.iter().enumerate() {
                if consumed.contains(&destination_index)
                    || (check_type && !types_compatible(entity, candidate))
                {
                    continue;
                }
                if normalize_text(&candidate.name) == name {
                    debug!(source = %entity.name, destination = %candidate.name, "exact match");
                    resolved[source_index] = Some(MappingEntry::resolved(
                        entity.id.clone(),
                        candidate.id.clone(),
                        1.0,
                        MatchMethod::Exact,
                    ));
                    consumed.insert(destination_index);
                    break;
                }
            }
        }

        // Pass 2: synonym table, symmetric by construction.
        for (source_index, entity) in source.iter().enumerate() {
            if resolved[source_index].is_some() {
                continue;
            }
            for (destination_index, candidate) in destination.iter().enumerate() {
                if consumed.contains(&destination_index)
                    || (check_type && !types_compatible(entity, candidate))
                {
                    continue;
                }
                if alias_match(entity.kind, &entity.name, &candidate.name) {
                    debug!(source = %entity.name, destination = %candidate.name, "alias match");
                    resolved[source_index] = Some(MappingEntry::resolved(
                        entity.id.clone(),
                        candidate.id.clone(),
                        ALIAS_CONFIDENCE,
                        MatchMethod::Alias,
                    ));
                    consumed.insert(destination_index);
                    break;
                }
            }
        }

        // Pass 3: greedy similarity, highest score first. The sort is
        // stable, so tied pairs resolve in source declaration order.
        let mut candidates = Vec::new();
        for (source_index, entity) in source.iter().enumerate() {
            if resolved[source_index].is_some() {
                continue;
            }
            let name = normalize_text(&entity.name);
            for (destination_index, candidate) in destination.iter().enumerate() {
                if consumed.contains(&destination_index)
                    || (check_type && !types_compatible(entity, candidate))
                {
                    continue;
                }
                let score =
                    jaro_similarity(name.chars(), normalize_text(&candidate.name).chars()) as f32;
                if score >= self.similarity_threshold {
                    candidates.push(Candidate {
                        score,
                        source_index,
                        destination_index,
                    });
                }
            }
        }
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        for candidate in candidates {
            if resolved[candidate.source_index].is_some()
                || consumed.contains(&candidate.destination_index)
            {
                continue;
            }
            let entity = source[candidate.source_index];
            let matched = destination[candidate.destination_index];
            debug!(
                source = %entity.name,
                destination = %matched.name,
                score = candidate.score,
                "similarity match"
            );
            resolved[candidate.source_index] = Some(MappingEntry::resolved(
                entity.id.clone(),
                matched.id.clone(),
                candidate.score,
                MatchMethod::Similarity,
            ));
            consumed.insert(candidate.destination_index);
        }

        resolved
            .into_iter()
            .zip(source)
            .map(|(entry, entity)| {
                entry.unwrap_or_else(|| {
                    debug!(source = %entity.name, "no match above threshold");
                    MappingEntry::unresolved(entity.id.clone())
                })
            })
            .collect()
    }
}

/// Fields must agree on data type to be mappable at all; other kinds carry
/// no type.
fn types_compatible(a: &SchemaEntity, b: &SchemaEntity) -> bool {
    match (&a.data_type, &b.data_type) {
        (Some(left), Some(right)) => left == right,
        _ => true,
    }
}

/// Partition a flattened pipeline catalog into pipelines and stages,
/// preserving declaration order.
fn split_catalog(catalog: &[SchemaEntity]) -> (Vec<&SchemaEntity>, Vec<&SchemaEntity>) {
    let pipelines = catalog
        .iter()
        .filter(|e| e.kind == EntityKind::Pipeline)
        .collect();
    let stages = catalog
        .iter()
        .filter(|e| e.kind == EntityKind::Stage)
        .collect();
    (pipelines, stages)
}
