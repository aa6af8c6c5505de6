//! End-to-end orchestration against in-memory accounts.

use std::sync::{Arc, Mutex};

use crm_client::MockCrmApi;
use crm_core::MigrationOrchestrator;
use crm_model::{
    DedupKey, FieldDataType, MigrationConfig, OpportunityOutcome, ReadinessLevel, RunStage,
    SchemaEntity, SkipReason, SourceContact, SourceOpportunity,
};

fn source_schema() -> (Vec<SchemaEntity>, Vec<SchemaEntity>) {
    let fields = vec![
        SchemaEntity::field("f1", "Industry", FieldDataType::Text),
        SchemaEntity::field("f2", "Budget", FieldDataType::Numerical),
    ];
    let catalog = vec![
        SchemaEntity::pipeline("p1", "Sales"),
        SchemaEntity::stage("s1", "New Lead", "p1", 0),
        SchemaEntity::stage("s2", "Closed Won", "p1", 1),
    ];
    (fields, catalog)
}

fn destination_schema() -> (Vec<SchemaEntity>, Vec<SchemaEntity>) {
    let fields = vec![
        SchemaEntity::field("F1", "Business Industry", FieldDataType::Text),
        SchemaEntity::field("F2", "Budget", FieldDataType::Numerical),
    ];
    let catalog = vec![
        SchemaEntity::pipeline("P1", "Sales"),
        SchemaEntity::stage("S1", "Lead", "P1", 0),
        SchemaEntity::stage("S2", "Won", "P1", 1),
    ];
    (fields, catalog)
}

fn contact(id: &str, email: &str) -> SourceContact {
    SourceContact {
        id: id.to_string(),
        first_name: "Test".to_string(),
        last_name: id.to_uppercase(),
        email: Some(email.to_string()),
        ..SourceContact::default()
    }
}

fn opportunity(id: &str, stage: &str, contact: &str) -> SourceOpportunity {
    SourceOpportunity {
        id: id.to_string(),
        name: format!("Deal {id}"),
        pipeline_id: "p1".to_string(),
        stage_id: stage.to_string(),
        contact_id: contact.to_string(),
        value: 2500.0,
        status: "open".to_string(),
        notes: None,
    }
}

#[test]
fn full_happy_path_reaches_completed() {
    let (source_fields, source_catalog) = source_schema();
    let (destination_fields, destination_catalog) = destination_schema();
    let source = Arc::new(
        MockCrmApi::new()
            .with_fields(source_fields)
            .with_pipelines(source_catalog)
            .with_contacts(vec![
                contact("c1", "dup@example.com"),
                contact("c2", "fresh1@example.com"),
                contact("c3", "fresh2@example.com"),
            ])
            .with_opportunities(vec![opportunity("o1", "s2", "c1")]),
    );
    let destination = Arc::new(
        MockCrmApi::new()
            .with_fields(destination_fields)
            .with_pipelines(destination_catalog)
            .with_existing_contact(DedupKey::from_email("dup@example.com").unwrap(), "M-existing"),
    );

    let seen_stages: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen_stages);
    let orchestrator = MigrationOrchestrator::new(
        source,
        Arc::clone(&destination) as Arc<dyn crm_client::CrmApi>,
        MigrationConfig::default(),
    )
    .with_progress(Box::new(move |update| {
        sink.lock().unwrap().push(update.stage);
    }));

    let run = orchestrator.run("run-test");

    assert_eq!(run.stage, RunStage::Completed);
    assert!(run.failure.is_none());
    assert_eq!(run.readiness.as_ref().unwrap().level, ReadinessLevel::High);

    // One reused id, two created ids, three translation entries.
    assert_eq!(run.contact_translations.len(), 3);
    assert_eq!(run.contact_translations.reused_count(), 1);
    assert_eq!(
        run.contact_translations.destination_of("c1"),
        Some("M-existing")
    );
    assert_eq!(destination.created_contacts().len(), 2);

    // The opportunity landed with fully translated ids.
    assert_eq!(run.opportunities.succeeded, 1);
    let created = destination.created_opportunities();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].1.pipeline_id, "P1");
    assert_eq!(created[0].1.stage_id, "S2");
    assert_eq!(created[0].1.contact_id, "M-existing");

    // Every stage of the machine reported progress, in order.
    let stages = seen_stages.lock().unwrap();
    let expected = [
        "mapping fields",
        "mapping pipelines",
        "scoring",
        "migrating contacts",
        "migrating opportunities",
        "completed",
    ];
    let mut last_index = 0;
    for stage in expected {
        let found = stages[last_index..]
            .iter()
            .position(|s| s == stage)
            .unwrap_or_else(|| panic!("stage '{stage}' never reported"));
        last_index += found + 1;
    }
}

#[test]
fn unauthorized_destination_fails_the_run() {
    let (source_fields, source_catalog) = source_schema();
    let source = Arc::new(
        MockCrmApi::new()
            .with_fields(source_fields)
            .with_pipelines(source_catalog),
    );
    let destination = Arc::new(MockCrmApi::new().with_unauthorized());

    let run = MigrationOrchestrator::new(source, destination, MigrationConfig::default())
        .run("run-unauthorized");

    assert_eq!(run.stage, RunStage::Failed);
    let failure = run.failure.unwrap();
    assert!(failure.contains("unauthorized"), "failure was: {failure}");
    // Nothing was attempted.
    assert_eq!(run.contacts.attempted, 0);
    assert_eq!(run.opportunities.attempted, 0);
}

#[test]
fn low_readiness_halts_in_scoring_without_acknowledgment() {
    let (source_fields, source_catalog) = source_schema();
    let source = Arc::new(
        MockCrmApi::new()
            .with_fields(source_fields)
            .with_pipelines(source_catalog)
            .with_contacts(vec![contact("c1", "someone@example.com")]),
    );
    // Empty destination schema: nothing can map.
    let destination = Arc::new(MockCrmApi::new());

    let run = MigrationOrchestrator::new(
        source,
        Arc::clone(&destination) as Arc<dyn crm_client::CrmApi>,
        MigrationConfig::default(),
    )
    .run("run-low");

    assert_eq!(run.stage, RunStage::Scoring);
    assert!(run.failure.is_none());
    assert_eq!(run.readiness.as_ref().unwrap().level, ReadinessLevel::Low);
    // No record mutation happened.
    assert_eq!(run.contacts.attempted, 0);
    assert!(destination.created_contacts().is_empty());
}

#[test]
fn acknowledged_low_readiness_proceeds_and_skips_unmapped() {
    let (source_fields, source_catalog) = source_schema();
    let source = Arc::new(
        MockCrmApi::new()
            .with_fields(source_fields)
            .with_pipelines(source_catalog)
            .with_contacts(vec![contact("c1", "someone@example.com")])
            .with_opportunities(vec![opportunity("o1", "s1", "c1")]),
    );
    // Destination has the pipeline but none of its stages, so the
    // opportunity must be skipped with "stage unmapped" and the run must
    // still complete.
    let destination = Arc::new(
        MockCrmApi::new().with_pipelines(vec![SchemaEntity::pipeline("P1", "Sales")]),
    );

    let config = MigrationConfig::default().with_acknowledge_low_readiness(true);
    let run = MigrationOrchestrator::new(source, destination, config).run("run-ack");

    assert_eq!(run.stage, RunStage::Completed);
    assert_eq!(run.contacts.succeeded, 1);
    assert_eq!(run.opportunities.skipped, 1);
    assert_eq!(
        run.opportunity_results.get("o1"),
        Some(&OpportunityOutcome::Skipped {
            reason: SkipReason::StageUnmapped
        })
    );
}

#[test]
fn auto_create_materializes_missing_fields_and_stages() {
    let (source_fields, source_catalog) = source_schema();
    let source = Arc::new(
        MockCrmApi::new()
            .with_fields(source_fields)
            .with_pipelines(source_catalog)
            .with_opportunities(vec![opportunity("o1", "s1", "c-none")]),
    );
    // Pipeline maps, but fields and stages are missing in the destination.
    let destination = Arc::new(
        MockCrmApi::new().with_pipelines(vec![SchemaEntity::pipeline("P1", "Sales")]),
    );

    let config = MigrationConfig::default()
        .with_auto_create_missing(true)
        .with_acknowledge_low_readiness(true);
    let run = MigrationOrchestrator::new(
        source,
        Arc::clone(&destination) as Arc<dyn crm_client::CrmApi>,
        config,
    )
    .run("run-create");

    assert_eq!(run.stage, RunStage::Completed);
    assert_eq!(destination.created_fields().len(), 2);
    assert_eq!(destination.created_stages().len(), 2);
    // Materialized stages feed the translation tables, so the opportunity
    // is no longer blocked by the stage, only by its unmigrated contact.
    assert_eq!(
        run.opportunity_results.get("o1"),
        Some(&OpportunityOutcome::Skipped {
            reason: SkipReason::ContactNotMigrated
        })
    );
    assert!(
        run.mapping
            .fields
            .iter()
            .all(|entry| entry.created_in_destination && entry.destination_id.is_some())
    );
}
