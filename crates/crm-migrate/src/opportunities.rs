//! Opportunity transfer through the resolved translation tables.
//!
//! Runs only after the contacts stage: an opportunity is attempted only
//! when its pipeline, stage, and contact all translate. A missing
//! translation is a skip with a recorded reason (nothing was attempted),
//! which is distinct from a create that failed.

use tracing::{error, info, warn};

use crm_client::{ApiFailure, CrmApi};
use crm_model::{
    CancelFlag, MigrationConfig, MigrationMapping, OpportunityOutcome, OpportunityPayload,
    OpportunityResults, ProgressUpdate, ContactTranslations, SkipReason, SourceOpportunity,
    StageCounters,
};

/// Result of the opportunities stage.
#[derive(Debug, Default)]
pub struct OpportunityMigrationOutcome {
    pub results: OpportunityResults,
    pub counters: StageCounters,
    pub failures: Vec<String>,
    pub cancelled: bool,
    pub fatal: Option<ApiFailure>,
}

/// Transfers opportunities into the destination account, one at a time.
pub struct OpportunityMigrator<'a> {
    destination: &'a dyn CrmApi,
    batch_size: usize,
}

impl<'a> OpportunityMigrator<'a> {
    pub fn new(destination: &'a dyn CrmApi, config: &MigrationConfig) -> Self {
        Self {
            destination,
            batch_size: config.batch_size.max(1),
        }
    }

    pub fn migrate(
        &self,
        opportunities: &[SourceOpportunity],
        mapping: &MigrationMapping,
        contacts: &ContactTranslations,
        progress: &dyn Fn(ProgressUpdate),
        cancel: &CancelFlag,
    ) -> OpportunityMigrationOutcome {
        let pipeline_translation = mapping.pipeline_translation();
        let stage_translation = mapping.stage_translation();
        let total = opportunities.len();
        let batch_count = total.div_ceil(self.batch_size);
        let mut outcome = OpportunityMigrationOutcome::default();
        let mut processed = 0usize;

        'batches: for (batch_index, batch) in opportunities.chunks(self.batch_size).enumerate() {
            if cancel.is_cancelled() {
                warn!(
                    "cancellation observed, stopping before opportunity batch {}",
                    batch_index + 1
                );
                outcome.cancelled = true;
                break;
            }
            progress(ProgressUpdate::new(
                "opportunities",
                processed,
                total,
                format!("processing batch {}/{batch_count}", batch_index + 1),
            ));
            for opportunity in batch {
                // Resolve every required translation before touching the
                // API; one missing id means nothing is attempted.
                let skip = if !pipeline_translation.contains_key(&opportunity.pipeline_id) {
                    Some(SkipReason::PipelineUnmapped)
                } else if !stage_translation.contains_key(&opportunity.stage_id) {
                    Some(SkipReason::StageUnmapped)
                } else if contacts.destination_of(&opportunity.contact_id).is_none() {
                    Some(SkipReason::ContactNotMigrated)
                } else {
                    None
                };
                if let Some(reason) = skip {
                    warn!(opportunity = %opportunity.id, %reason, "skipping opportunity");
                    outcome.counters.skipped += 1;
                    outcome
                        .results
                        .record(&opportunity.id, OpportunityOutcome::Skipped { reason });
                    processed += 1;
                    continue;
                }

                let payload = OpportunityPayload {
                    name: if opportunity.name.is_empty() {
                        "Migrated Opportunity".to_string()
                    } else {
                        opportunity.name.clone()
                    },
                    pipeline_id: pipeline_translation[&opportunity.pipeline_id].clone(),
                    stage_id: stage_translation[&opportunity.stage_id].clone(),
                    contact_id: contacts
                        .destination_of(&opportunity.contact_id)
                        .unwrap_or_default()
                        .to_string(),
                    value: opportunity.value,
                    status: if opportunity.status.is_empty() {
                        "open".to_string()
                    } else {
                        opportunity.status.clone()
                    },
                };
                outcome.counters.attempted += 1;
                match self.destination.create_opportunity(&payload) {
                    Ok(id) => {
                        info!(opportunity = %opportunity.id, destination = %id, "created opportunity");
                        outcome.counters.succeeded += 1;
                        outcome.results.record(
                            &opportunity.id,
                            OpportunityOutcome::Created { destination_id: id },
                        );
                    }
                    Err(failure) if failure.is_fatal() => {
                        outcome.counters.failed += 1;
                        outcome.fatal = Some(failure);
                        break 'batches;
                    }
                    Err(failure) => {
                        error!(opportunity = %opportunity.id, %failure, "opportunity creation failed");
                        outcome.counters.failed += 1;
                        outcome.results.record(
                            &opportunity.id,
                            OpportunityOutcome::Failed {
                                message: failure.to_string(),
                            },
                        );
                        outcome
                            .failures
                            .push(format!("opportunity {}: {failure}", opportunity.id));
                    }
                }
                processed += 1;
            }
        }

        progress(ProgressUpdate::new(
            "opportunities",
            processed,
            total,
            format!(
                "opportunities done: {} created, {} skipped, {} failed",
                outcome.counters.succeeded, outcome.counters.skipped, outcome.counters.failed
            ),
        ));
        outcome
    }
}

#[cfg(test)]
mod tests {
    use crm_client::MockCrmApi;
    use crm_model::{MappingEntry, MatchMethod};

    use super::*;

    fn opportunity(id: &str, pipeline: &str, stage: &str, contact: &str) -> SourceOpportunity {
        SourceOpportunity {
            id: id.to_string(),
            name: format!("Deal {id}"),
            pipeline_id: pipeline.to_string(),
            stage_id: stage.to_string(),
            contact_id: contact.to_string(),
            value: 1500.0,
            status: "open".to_string(),
            notes: None,
        }
    }

    fn full_mapping() -> MigrationMapping {
        MigrationMapping {
            fields: Vec::new(),
            pipelines: vec![MappingEntry::resolved("p1", "P1", 1.0, MatchMethod::Exact)],
            stages: vec![MappingEntry::resolved("s1", "S1", 1.0, MatchMethod::Exact)],
        }
    }

    fn translations() -> ContactTranslations {
        let mut table = ContactTranslations::new();
        table.record_created("c1", "M1");
        table
    }

    fn run(
        api: &MockCrmApi,
        opportunities: &[SourceOpportunity],
        mapping: &MigrationMapping,
        contacts: &ContactTranslations,
    ) -> OpportunityMigrationOutcome {
        let migrator = OpportunityMigrator::new(api, &MigrationConfig::default());
        migrator.migrate(opportunities, mapping, contacts, &|_| {}, &CancelFlag::new())
    }

    #[test]
    fn fully_translated_opportunity_is_created() {
        let api = MockCrmApi::new();
        let outcome = run(
            &api,
            &[opportunity("o1", "p1", "s1", "c1")],
            &full_mapping(),
            &translations(),
        );
        assert_eq!(outcome.counters.succeeded, 1);
        let created = api.created_opportunities();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].1.pipeline_id, "P1");
        assert_eq!(created[0].1.stage_id, "S1");
        assert_eq!(created[0].1.contact_id, "M1");
    }

    #[test]
    fn unmapped_stage_skips_with_reason() {
        let api = MockCrmApi::new();
        let mut mapping = full_mapping();
        mapping.stages = vec![MappingEntry::unresolved("s1")];
        let outcome = run(
            &api,
            &[opportunity("o1", "p1", "s1", "c1")],
            &mapping,
            &translations(),
        );
        assert_eq!(outcome.counters.skipped, 1);
        assert_eq!(outcome.counters.attempted, 0);
        assert_eq!(
            outcome.results.get("o1"),
            Some(&OpportunityOutcome::Skipped {
                reason: SkipReason::StageUnmapped
            })
        );
        assert!(api.created_opportunities().is_empty());
    }

    #[test]
    fn missing_contact_translation_skips() {
        let api = MockCrmApi::new();
        let outcome = run(
            &api,
            &[opportunity("o1", "p1", "s1", "c-unknown")],
            &full_mapping(),
            &translations(),
        );
        assert_eq!(
            outcome.results.get("o1"),
            Some(&OpportunityOutcome::Skipped {
                reason: SkipReason::ContactNotMigrated
            })
        );
    }

    #[test]
    fn unmapped_pipeline_takes_priority_over_other_reasons() {
        let api = MockCrmApi::new();
        let mut mapping = full_mapping();
        mapping.pipelines = vec![MappingEntry::unresolved("p1")];
        mapping.stages = vec![MappingEntry::unresolved("s1")];
        let outcome = run(
            &api,
            &[opportunity("o1", "p1", "s1", "c-unknown")],
            &mapping,
            &ContactTranslations::new(),
        );
        assert_eq!(
            outcome.results.get("o1"),
            Some(&OpportunityOutcome::Skipped {
                reason: SkipReason::PipelineUnmapped
            })
        );
    }

    #[test]
    fn blank_status_defaults_to_open() {
        let api = MockCrmApi::new();
        let mut source = opportunity("o1", "p1", "s1", "c1");
        source.status = String::new();
        let outcome = run(&api, &[source], &full_mapping(), &translations());
        assert_eq!(outcome.counters.succeeded, 1);
        assert_eq!(api.created_opportunities()[0].1.status, "open");
    }
}
