pub mod config;
pub mod entity;
pub mod mapping;
pub mod progress;
pub mod record;
pub mod run;

pub use config::MigrationConfig;
pub use entity::{EntityKind, FieldDataType, SchemaEntity};
pub use mapping::{
    MappingEntry, MatchMethod, MigrationMapping, ReadinessLevel, ReadinessReport,
};
pub use progress::{CancelFlag, ProgressCallback, ProgressUpdate};
pub use record::{
    ContactPayload, ContactTranslation, ContactTranslations, CustomFieldValue, DedupKey,
    FieldDefinition, OpportunityOutcome, OpportunityPayload, OpportunityResults, SkipReason,
    SourceContact, SourceOpportunity, StageDefinition,
};
pub use run::{MigrationRun, RunStage, StageCounters};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_serializes() {
        let mut run = MigrationRun::new("run-1");
        run.stage = RunStage::Completed;
        run.contacts.attempted = 3;
        run.contacts.succeeded = 3;
        let json = serde_json::to_string(&run).expect("serialize run");
        let round: MigrationRun = serde_json::from_str(&json).expect("deserialize run");
        assert_eq!(round.stage, RunStage::Completed);
        assert_eq!(round.contacts.succeeded, 3);
    }

    #[test]
    fn skip_reason_display_strings() {
        assert_eq!(SkipReason::PipelineUnmapped.to_string(), "pipeline unmapped");
        assert_eq!(SkipReason::StageUnmapped.to_string(), "stage unmapped");
        assert_eq!(
            SkipReason::ContactNotMigrated.to_string(),
            "contact not migrated"
        );
    }
}
