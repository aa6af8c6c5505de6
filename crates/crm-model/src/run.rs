//! Top-level migration run state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::mapping::{MigrationMapping, ReadinessReport};
use crate::record::{ContactTranslations, OpportunityResults};

/// How many warning / failure messages a run keeps inline. Full detail
/// lives in the translation and result tables.
const MESSAGE_CAP: usize = 20;

/// Phase of the migration state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Pending,
    MappingFields,
    MappingPipelines,
    Scoring,
    MigratingContacts,
    MigratingOpportunities,
    Completed,
    Failed,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Pending => "pending",
            Self::MappingFields => "mapping fields",
            Self::MappingPipelines => "mapping pipelines",
            Self::Scoring => "scoring",
            Self::MigratingContacts => "migrating contacts",
            Self::MigratingOpportunities => "migrating opportunities",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(text)
    }
}

/// Per-stage record counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounters {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// The state object for one migration run.
///
/// Created when a migration starts, mutated only by the orchestrator, and
/// handed to the caller on completion or failure, including fatal failure,
/// where `stage` is [`RunStage::Failed`] and `failure` carries the message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRun {
    pub id: String,
    pub stage: RunStage,
    pub contacts: StageCounters,
    pub opportunities: StageCounters,
    /// RFC 3339 timestamps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    pub mapping: MigrationMapping,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness: Option<ReadinessReport>,
    pub contact_translations: ContactTranslations,
    pub opportunity_results: OpportunityResults,
    /// Bounded list of non-fatal warnings (dropped field values, unmapped
    /// pipelines, …).
    pub warnings: Vec<String>,
    /// Bounded list of the most recent record-level failure messages.
    pub recent_failures: Vec<String>,
    /// Fatal failure message, set only when `stage` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl MigrationRun {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            stage: RunStage::Pending,
            contacts: StageCounters::default(),
            opportunities: StageCounters::default(),
            started_at: None,
            finished_at: None,
            mapping: MigrationMapping::default(),
            readiness: None,
            contact_translations: ContactTranslations::new(),
            opportunity_results: OpportunityResults::new(),
            warnings: Vec::new(),
            recent_failures: Vec::new(),
            failure: None,
        }
    }

    /// Record a warning, keeping only the most recent [`MESSAGE_CAP`].
    pub fn push_warning(&mut self, message: impl Into<String>) {
        push_bounded(&mut self.warnings, message.into());
    }

    /// Record a record-level failure message, keeping only the most recent
    /// [`MESSAGE_CAP`].
    pub fn push_failure(&mut self, message: impl Into<String>) {
        push_bounded(&mut self.recent_failures, message.into());
    }
}

fn push_bounded(list: &mut Vec<String>, message: String) {
    if list.len() == MESSAGE_CAP {
        list.remove(0);
    }
    list.push(message);
}
