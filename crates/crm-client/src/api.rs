//! Data-provider contract between the migration core and an account.
//!
//! One implementation is bound to one account; the orchestrator holds two
//! (source and destination). Every method maps to API traffic and goes
//! through the rate-limited client in the production implementation.

use crm_model::{
    ContactPayload, DedupKey, FieldDefinition, OpportunityPayload, SchemaEntity, SourceContact,
    SourceOpportunity, StageDefinition,
};

use crate::error::Result;

/// Operations the migration core needs from a CRM account.
pub trait CrmApi: Send + Sync {
    /// Custom field definitions, contact and opportunity scopes combined.
    fn list_fields(&self) -> Result<Vec<SchemaEntity>>;

    /// Pipelines and their stages, flattened: pipeline entities followed by
    /// their stage entities (stages carry `parent_id`).
    fn list_pipelines(&self) -> Result<Vec<SchemaEntity>>;

    /// Every contact in the account.
    fn list_contacts(&self) -> Result<Vec<SourceContact>>;

    /// Every opportunity in the account.
    fn list_opportunities(&self) -> Result<Vec<SourceOpportunity>>;

    /// Look up an existing contact by normalized natural key.
    fn find_contact_by_key(&self, key: &DedupKey) -> Result<Option<String>>;

    /// Create a contact; returns the new id.
    fn create_contact(&self, payload: &ContactPayload) -> Result<String>;

    /// Create an opportunity; returns the new id.
    fn create_opportunity(&self, payload: &OpportunityPayload) -> Result<String>;

    /// Create a custom field definition; returns the new id.
    fn create_field(&self, definition: &FieldDefinition) -> Result<String>;

    /// Create a stage inside an existing pipeline; returns the new id.
    fn create_stage(&self, pipeline_id: &str, definition: &StageDefinition) -> Result<String>;
}
