//! Caller-gated creation of missing destination entities.
//!
//! For unresolved fields, and unresolved stages whose pipeline did map, the
//! missing entity is created in the destination and the entry updated in
//! place: `destination_id` set, `created_in_destination` set, `method` left
//! `Unresolved` so the audit trail distinguishes "matched" from "created".
//! Pipelines are never created, only stages within mapped pipelines;
//! pipeline structure is an account-level decision.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crm_client::{ApiFailure, CrmApi};
use crm_model::{
    EntityKind, FieldDataType, FieldDefinition, MigrationMapping, SchemaEntity, StageDefinition,
};

/// Create unresolved fields and stages in the destination.
///
/// Returns warnings for entities whose creation failed non-fatally; those
/// entries stay unresolved and downstream records referencing them are
/// skipped, not failed. A fatal failure (authorization) propagates.
pub fn materialize_missing(
    api: &dyn CrmApi,
    mapping: &mut MigrationMapping,
    source_fields: &[SchemaEntity],
    source_catalog: &[SchemaEntity],
) -> Result<Vec<String>, ApiFailure> {
    let mut warnings = Vec::new();

    let fields_by_id: BTreeMap<&str, &SchemaEntity> = source_fields
        .iter()
        .map(|entity| (entity.id.as_str(), entity))
        .collect();
    for entry in &mut mapping.fields {
        if entry.destination_id.is_some() {
            continue;
        }
        let Some(entity) = fields_by_id.get(entry.source_id.as_str()) else {
            continue;
        };
        let definition = FieldDefinition {
            name: entity.name.clone(),
            data_type: entity.data_type.clone().unwrap_or(FieldDataType::Text),
        };
        match api.create_field(&definition) {
            Ok(id) => {
                info!(field = %entity.name, %id, "created missing field in destination");
                entry.destination_id = Some(id);
                entry.created_in_destination = true;
            }
            Err(failure) if failure.is_fatal() => return Err(failure),
            Err(failure) => {
                warn!(field = %entity.name, %failure, "failed to create field");
                warnings.push(format!("could not create field '{}': {failure}", entity.name));
            }
        }
    }

    let pipeline_translation = mapping.pipeline_translation();
    let stages_by_id: BTreeMap<&str, &SchemaEntity> = source_catalog
        .iter()
        .filter(|entity| entity.kind == EntityKind::Stage)
        .map(|entity| (entity.id.as_str(), entity))
        .collect();
    for entry in &mut mapping.stages {
        if entry.destination_id.is_some() {
            continue;
        }
        let Some(entity) = stages_by_id.get(entry.source_id.as_str()) else {
            continue;
        };
        // A stage can only be created inside its pipeline's mapped
        // counterpart; stages of unresolved pipelines stay unresolved.
        let Some(destination_pipeline) = entity
            .parent_id
            .as_deref()
            .and_then(|parent| pipeline_translation.get(parent))
        else {
            continue;
        };
        let definition = StageDefinition {
            name: entity.name.clone(),
            position: entity.position.unwrap_or(0),
        };
        match api.create_stage(destination_pipeline, &definition) {
            Ok(id) => {
                info!(stage = %entity.name, %id, "created missing stage in destination");
                entry.destination_id = Some(id);
                entry.created_in_destination = true;
            }
            Err(failure) if failure.is_fatal() => return Err(failure),
            Err(failure) => {
                warn!(stage = %entity.name, %failure, "failed to create stage");
                warnings.push(format!("could not create stage '{}': {failure}", entity.name));
            }
        }
    }

    Ok(warnings)
}
