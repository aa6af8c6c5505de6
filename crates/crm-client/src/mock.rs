//! In-memory `CrmApi` for tests.
//!
//! Plays both roles: as a source it serves pre-configured schema and
//! records; as a destination it registers created entities and answers
//! key lookups against both its seeded contacts and anything created
//! through it, which is what makes dedup idempotence observable in tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crm_model::{
    ContactPayload, DedupKey, FieldDefinition, OpportunityPayload, SchemaEntity, SourceContact,
    SourceOpportunity, StageDefinition,
};

use crate::api::CrmApi;
use crate::error::{ApiFailure, Result};

/// Scripted in-memory account.
#[derive(Default)]
pub struct MockCrmApi {
    fields: Vec<SchemaEntity>,
    pipelines: Vec<SchemaEntity>,
    contacts: Vec<SourceContact>,
    opportunities: Vec<SourceOpportunity>,
    /// Dedup key → existing destination contact id.
    known_keys: Mutex<HashMap<DedupKey, String>>,
    /// Emails whose `create_contact` calls fail with a scripted 422.
    failing_contact_emails: HashSet<String>,
    /// When set, every schema listing fails with `Unauthorized`.
    unauthorized: bool,
    created_contacts: Mutex<Vec<(String, ContactPayload)>>,
    created_opportunities: Mutex<Vec<(String, OpportunityPayload)>>,
    created_fields: Mutex<Vec<(String, FieldDefinition)>>,
    created_stages: Mutex<Vec<(String, String, StageDefinition)>>,
    next_id: Mutex<u64>,
}

impl MockCrmApi {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_fields(mut self, fields: Vec<SchemaEntity>) -> Self {
        self.fields = fields;
        self
    }

    #[must_use]
    pub fn with_pipelines(mut self, pipelines: Vec<SchemaEntity>) -> Self {
        self.pipelines = pipelines;
        self
    }

    #[must_use]
    pub fn with_contacts(mut self, contacts: Vec<SourceContact>) -> Self {
        self.contacts = contacts;
        self
    }

    #[must_use]
    pub fn with_opportunities(mut self, opportunities: Vec<SourceOpportunity>) -> Self {
        self.opportunities = opportunities;
        self
    }

    /// Seed an existing destination contact reachable by key lookup.
    #[must_use]
    pub fn with_existing_contact(self, key: DedupKey, id: impl Into<String>) -> Self {
        self.known_keys.lock().unwrap().insert(key, id.into());
        self
    }

    /// Script `create_contact` to fail for a payload with this email.
    #[must_use]
    pub fn with_failing_contact_email(mut self, email: impl Into<String>) -> Self {
        self.failing_contact_emails.insert(email.into());
        self
    }

    /// Script every schema listing to fail with `Unauthorized`.
    #[must_use]
    pub fn with_unauthorized(mut self) -> Self {
        self.unauthorized = true;
        self
    }

    fn assign_id(&self, prefix: &str) -> String {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        format!("{prefix}-{next}")
    }

    /// Payloads passed to `create_contact`, with their assigned ids.
    pub fn created_contacts(&self) -> Vec<(String, ContactPayload)> {
        self.created_contacts.lock().unwrap().clone()
    }

    pub fn created_opportunities(&self) -> Vec<(String, OpportunityPayload)> {
        self.created_opportunities.lock().unwrap().clone()
    }

    pub fn created_fields(&self) -> Vec<(String, FieldDefinition)> {
        self.created_fields.lock().unwrap().clone()
    }

    /// `(pipeline_id, stage_id, definition)` triples passed to `create_stage`.
    pub fn created_stages(&self) -> Vec<(String, String, StageDefinition)> {
        self.created_stages.lock().unwrap().clone()
    }
}

impl CrmApi for MockCrmApi {
    fn list_fields(&self) -> Result<Vec<SchemaEntity>> {
        if self.unauthorized {
            return Err(ApiFailure::Unauthorized);
        }
        Ok(self.fields.clone())
    }

    fn list_pipelines(&self) -> Result<Vec<SchemaEntity>> {
        if self.unauthorized {
            return Err(ApiFailure::Unauthorized);
        }
        Ok(self.pipelines.clone())
    }

    fn list_contacts(&self) -> Result<Vec<SourceContact>> {
        Ok(self.contacts.clone())
    }

    fn list_opportunities(&self) -> Result<Vec<SourceOpportunity>> {
        Ok(self.opportunities.clone())
    }

    fn find_contact_by_key(&self, key: &DedupKey) -> Result<Option<String>> {
        Ok(self.known_keys.lock().unwrap().get(key).cloned())
    }

    fn create_contact(&self, payload: &ContactPayload) -> Result<String> {
        if let Some(email) = payload.email.as_deref()
            && self.failing_contact_emails.contains(email)
        {
            return Err(ApiFailure::Invalid {
                status: 422,
                message: format!("scripted failure for {email}"),
            });
        }
        let id = self.assign_id("dest-contact");
        let mut known = self.known_keys.lock().unwrap();
        if let Some(key) = payload.email.as_deref().and_then(DedupKey::from_email) {
            known.insert(key, id.clone());
        }
        if let Some(key) = payload.phone.as_deref().and_then(DedupKey::from_phone) {
            known.insert(key, id.clone());
        }
        drop(known);
        self.created_contacts
            .lock()
            .unwrap()
            .push((id.clone(), payload.clone()));
        Ok(id)
    }

    fn create_opportunity(&self, payload: &OpportunityPayload) -> Result<String> {
        let id = self.assign_id("dest-opp");
        self.created_opportunities
            .lock()
            .unwrap()
            .push((id.clone(), payload.clone()));
        Ok(id)
    }

    fn create_field(&self, definition: &FieldDefinition) -> Result<String> {
        let id = self.assign_id("dest-field");
        self.created_fields
            .lock()
            .unwrap()
            .push((id.clone(), definition.clone()));
        Ok(id)
    }

    fn create_stage(&self, pipeline_id: &str, definition: &StageDefinition) -> Result<String> {
        let id = self.assign_id("dest-stage");
        self.created_stages.lock().unwrap().push((
            pipeline_id.to_string(),
            id.clone(),
            definition.clone(),
        ));
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_contacts_become_findable_by_key() {
        let api = MockCrmApi::new();
        let payload = ContactPayload {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: Some("jane@example.com".to_string()),
            ..ContactPayload::default()
        };
        let id = api.create_contact(&payload).unwrap();
        let key = DedupKey::from_email("jane@example.com").unwrap();
        assert_eq!(api.find_contact_by_key(&key).unwrap(), Some(id));
    }

    #[test]
    fn scripted_failure_matches_email() {
        let api = MockCrmApi::new().with_failing_contact_email("bad@example.com");
        let payload = ContactPayload {
            email: Some("bad@example.com".to_string()),
            ..ContactPayload::default()
        };
        assert!(matches!(
            api.create_contact(&payload),
            Err(ApiFailure::Invalid { status: 422, .. })
        ));
    }
}
