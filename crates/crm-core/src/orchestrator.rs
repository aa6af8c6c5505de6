//! The migration state machine.
//!
//! Drives one run through
//! `Pending → MappingFields → MappingPipelines → Scoring →
//! MigratingContacts → MigratingOpportunities → Completed`, with `Failed`
//! reachable from any state on a fatal error. Ordering is load-bearing:
//! fields resolve before contacts (custom-field translation), pipelines and
//! stages before opportunities, contacts before opportunities.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crm_client::CrmApi;
use crm_map::{MappingEngine, ReadinessScorer, materialize_missing};
use crm_migrate::{ContactMigrator, OpportunityMigrator};
use crm_model::{
    CancelFlag, MigrationConfig, MigrationRun, ProgressCallback, ProgressUpdate, ReadinessLevel,
    RunStage,
};

use crate::error::FatalError;

/// Coordinates one migration between a source and a destination account.
///
/// Each run is a fresh instance; independent runs share nothing and may
/// execute concurrently against different destination accounts.
pub struct MigrationOrchestrator {
    source: Arc<dyn CrmApi>,
    destination: Arc<dyn CrmApi>,
    config: MigrationConfig,
    progress: Option<ProgressCallback>,
    cancel: CancelFlag,
}

impl MigrationOrchestrator {
    pub fn new(
        source: Arc<dyn CrmApi>,
        destination: Arc<dyn CrmApi>,
        config: MigrationConfig,
    ) -> Self {
        Self {
            source,
            destination,
            config,
            progress: None,
            cancel: CancelFlag::new(),
        }
    }

    /// Attach a fire-and-continue progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Handle the caller can use to request cancellation between batches.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Execute the migration. Always returns the run; on a fatal error the
    /// run carries `stage = Failed` and the failure message.
    pub fn run(self, run_id: impl Into<String>) -> MigrationRun {
        let mut run = MigrationRun::new(run_id);
        run.started_at = Some(Utc::now().to_rfc3339());
        info!(run = %run.id, "starting migration run");
        if let Err(fatal) = self.drive(&mut run) {
            error!(run = %run.id, %fatal, "migration run failed");
            run.stage = RunStage::Failed;
            run.failure = Some(fatal.to_string());
            self.emit(&run, &format!("run failed: {fatal}"));
        }
        run.finished_at = Some(Utc::now().to_rfc3339());
        info!(run = %run.id, stage = %run.stage, "migration run finished");
        run
    }

    fn drive(&self, run: &mut MigrationRun) -> Result<(), FatalError> {
        self.transition(run, RunStage::MappingFields, "mapping custom fields");
        let source_fields = self
            .source
            .list_fields()
            .map_err(|e| FatalError::fetch("source", "custom fields", e))?;
        let destination_fields = self
            .destination
            .list_fields()
            .map_err(|e| FatalError::fetch("destination", "custom fields", e))?;

        self.transition(run, RunStage::MappingPipelines, "mapping pipelines and stages");
        let source_catalog = self
            .source
            .list_pipelines()
            .map_err(|e| FatalError::fetch("source", "pipelines", e))?;
        let destination_catalog = self
            .destination
            .list_pipelines()
            .map_err(|e| FatalError::fetch("destination", "pipelines", e))?;

        let engine = MappingEngine::from_config(&self.config);
        let mut mapping = engine.build(
            &source_fields,
            &destination_fields,
            &source_catalog,
            &destination_catalog,
        );
        if self.config.auto_create_missing {
            let warnings = materialize_missing(
                self.destination.as_ref(),
                &mut mapping,
                &source_fields,
                &source_catalog,
            )?;
            for warning in warnings {
                run.push_warning(warning);
            }
        }
        run.mapping = mapping;

        self.transition(run, RunStage::Scoring, "scoring mapping readiness");
        let report = ReadinessScorer::from_config(&self.config).score(&run.mapping, &source_catalog);
        for warning in &report.warnings {
            run.push_warning(warning.clone());
        }
        let level = report.level;
        run.readiness = Some(report);
        if level == ReadinessLevel::Low && !self.config.acknowledge_low_readiness {
            warn!(run = %run.id, "low readiness, halting before record migration");
            self.emit(
                run,
                "readiness is LOW; halting before any record is written. \
                 Re-run with low readiness acknowledged to proceed.",
            );
            return Ok(());
        }

        self.transition(run, RunStage::MigratingContacts, "migrating contacts");
        let contacts = self
            .source
            .list_contacts()
            .map_err(|e| FatalError::fetch("source", "contacts", e))?;
        let contact_migrator = ContactMigrator::new(self.destination.as_ref(), &self.config);
        let outcome = contact_migrator.migrate(
            &contacts,
            &run.mapping,
            &|update| self.forward(update),
            &self.cancel,
        );
        run.contacts = outcome.counters;
        run.contact_translations = outcome.translations;
        for warning in outcome.warnings {
            run.push_warning(warning);
        }
        for failure in outcome.failures {
            run.push_failure(failure);
        }
        if let Some(fatal) = outcome.fatal {
            return Err(fatal.into());
        }
        if outcome.cancelled {
            run.push_warning("run cancelled during contact migration".to_string());
            self.emit(run, "cancelled; no further batches will start");
            return Ok(());
        }

        self.transition(run, RunStage::MigratingOpportunities, "migrating opportunities");
        let opportunities = self
            .source
            .list_opportunities()
            .map_err(|e| FatalError::fetch("source", "opportunities", e))?;
        if !opportunities.is_empty() && run.mapping.pipeline_translation().is_empty() {
            return Err(FatalError::NoUsableMapping(
                "the source has opportunities but no pipeline could be mapped".to_string(),
            ));
        }
        let opportunity_migrator = OpportunityMigrator::new(self.destination.as_ref(), &self.config);
        let outcome = opportunity_migrator.migrate(
            &opportunities,
            &run.mapping,
            &run.contact_translations,
            &|update| self.forward(update),
            &self.cancel,
        );
        run.opportunities = outcome.counters;
        run.opportunity_results = outcome.results;
        for failure in outcome.failures {
            run.push_failure(failure);
        }
        if let Some(fatal) = outcome.fatal {
            return Err(fatal.into());
        }
        if outcome.cancelled {
            run.push_warning("run cancelled during opportunity migration".to_string());
            self.emit(run, "cancelled; no further batches will start");
            return Ok(());
        }

        self.transition(run, RunStage::Completed, "migration complete");
        Ok(())
    }

    fn transition(&self, run: &mut MigrationRun, stage: RunStage, message: &str) {
        info!(run = %run.id, %stage, "entering stage");
        run.stage = stage;
        self.emit(run, message);
    }

    fn emit(&self, run: &MigrationRun, message: &str) {
        self.forward(ProgressUpdate::new(
            run.stage.to_string(),
            run.contacts.attempted + run.opportunities.attempted,
            0,
            message,
        ));
    }

    fn forward(&self, update: ProgressUpdate) {
        if let Some(callback) = &self.progress {
            callback(update);
        }
    }
}
