//! Contact transfer with dedup against the destination.

use std::collections::BTreeMap;

use tracing::{error, info, warn};

use crm_client::{ApiFailure, CrmApi};
use crm_model::{
    ContactPayload, ContactTranslations, CustomFieldValue, MigrationConfig, MigrationMapping,
    ProgressUpdate, CancelFlag, SourceContact, StageCounters,
};

use crate::dedup::{dedup_key, order_contacts};

/// Result of the contacts stage.
#[derive(Debug, Default)]
pub struct ContactMigrationOutcome {
    pub translations: ContactTranslations,
    pub counters: StageCounters,
    pub warnings: Vec<String>,
    pub failures: Vec<String>,
    /// True when a cancellation request stopped the stage between batches.
    pub cancelled: bool,
    /// Set when a fatal failure aborted the stage.
    pub fatal: Option<ApiFailure>,
}

enum Migrated {
    Reused(String),
    Created(String),
}

/// Transfers contacts into the destination account, one at a time.
pub struct ContactMigrator<'a> {
    destination: &'a dyn CrmApi,
    batch_size: usize,
}

impl<'a> ContactMigrator<'a> {
    pub fn new(destination: &'a dyn CrmApi, config: &MigrationConfig) -> Self {
        Self {
            destination,
            batch_size: config.batch_size.max(1),
        }
    }

    /// Migrate `contacts` using the finished `mapping` for custom-field
    /// translation. A single record failure never aborts the batch; only a
    /// fatal failure does.
    pub fn migrate(
        &self,
        contacts: &[SourceContact],
        mapping: &MigrationMapping,
        progress: &dyn Fn(ProgressUpdate),
        cancel: &CancelFlag,
    ) -> ContactMigrationOutcome {
        let field_translation = mapping.field_translation();
        let ordered = order_contacts(contacts);
        let total = ordered.len();
        let batch_count = total.div_ceil(self.batch_size);
        let mut outcome = ContactMigrationOutcome::default();
        let mut processed = 0usize;

        'batches: for (batch_index, batch) in ordered.chunks(self.batch_size).enumerate() {
            if cancel.is_cancelled() {
                warn!("cancellation observed, stopping before contact batch {}", batch_index + 1);
                outcome.cancelled = true;
                break;
            }
            progress(ProgressUpdate::new(
                "contacts",
                processed,
                total,
                format!("processing batch {}/{batch_count}", batch_index + 1),
            ));
            for contact in batch {
                outcome.counters.attempted += 1;
                match self.migrate_one(contact, &field_translation, &mut outcome.warnings) {
                    Ok(Migrated::Reused(id)) => {
                        info!(contact = %contact.id, destination = %id, "reused existing contact");
                        outcome.translations.record_reused(&contact.id, id);
                        outcome.counters.succeeded += 1;
                    }
                    Ok(Migrated::Created(id)) => {
                        info!(contact = %contact.id, destination = %id, "created contact");
                        outcome.translations.record_created(&contact.id, id);
                        outcome.counters.succeeded += 1;
                    }
                    Err(failure) if failure.is_fatal() => {
                        outcome.counters.failed += 1;
                        outcome.fatal = Some(failure);
                        break 'batches;
                    }
                    Err(failure) => {
                        error!(contact = %contact.id, %failure, "contact migration failed");
                        outcome.counters.failed += 1;
                        outcome
                            .failures
                            .push(format!("contact {}: {failure}", contact.id));
                    }
                }
                processed += 1;
            }
        }

        progress(ProgressUpdate::new(
            "contacts",
            processed,
            total,
            format!(
                "contacts done: {} migrated, {} failed",
                outcome.counters.succeeded, outcome.counters.failed
            ),
        ));
        outcome
    }

    fn migrate_one(
        &self,
        contact: &SourceContact,
        field_translation: &BTreeMap<String, String>,
        warnings: &mut Vec<String>,
    ) -> Result<Migrated, ApiFailure> {
        if let Some(key) = dedup_key(contact)
            && let Some(existing) = self.destination.find_contact_by_key(&key)?
        {
            return Ok(Migrated::Reused(existing));
        }
        let payload = build_payload(contact, field_translation, warnings);
        let id = self.destination.create_contact(&payload)?;
        Ok(Migrated::Created(id))
    }
}

/// Build the destination payload: source attributes plus custom-field
/// values translated through the field table. Values for unresolved fields
/// are dropped with a recorded warning, not a failure.
fn build_payload(
    contact: &SourceContact,
    field_translation: &BTreeMap<String, String>,
    warnings: &mut Vec<String>,
) -> ContactPayload {
    let mut custom_fields = Vec::new();
    for value in &contact.custom_fields {
        match field_translation.get(&value.field_id) {
            Some(destination_field) => custom_fields.push(CustomFieldValue {
                field_id: destination_field.clone(),
                value: value.value.clone(),
            }),
            None => {
                warn!(
                    contact = %contact.id,
                    field = %value.field_id,
                    "dropping value for unmapped field"
                );
                warnings.push(format!(
                    "contact {}: dropped value for unmapped field {}",
                    contact.id, value.field_id
                ));
            }
        }
    }
    ContactPayload {
        first_name: contact.first_name.clone(),
        last_name: contact.last_name.clone(),
        email: contact.email.clone(),
        phone: contact.phone.clone(),
        address: contact.address.clone(),
        city: contact.city.clone(),
        state: contact.state.clone(),
        postal_code: contact.postal_code.clone(),
        country: contact.country.clone(),
        custom_fields,
    }
}

#[cfg(test)]
mod tests {
    use crm_client::MockCrmApi;
    use crm_model::{DedupKey, MappingEntry, MatchMethod};

    use super::*;

    fn contact(id: &str, email: Option<&str>) -> SourceContact {
        SourceContact {
            id: id.to_string(),
            first_name: "Test".to_string(),
            last_name: id.to_uppercase(),
            email: email.map(str::to_string),
            ..SourceContact::default()
        }
    }

    fn mapping_with_field(source: &str, destination: &str) -> MigrationMapping {
        MigrationMapping {
            fields: vec![MappingEntry::resolved(
                source,
                destination,
                1.0,
                MatchMethod::Exact,
            )],
            ..MigrationMapping::default()
        }
    }

    fn run(
        api: &MockCrmApi,
        contacts: &[SourceContact],
        mapping: &MigrationMapping,
    ) -> ContactMigrationOutcome {
        let migrator = ContactMigrator::new(api, &MigrationConfig::default());
        migrator.migrate(contacts, mapping, &|_| {}, &CancelFlag::new())
    }

    #[test]
    fn one_reuse_two_creates_three_translations() {
        let api = MockCrmApi::new().with_existing_contact(
            DedupKey::from_email("shared@example.com").unwrap(),
            "M-existing",
        );
        let contacts = vec![
            contact("c1", Some("shared@example.com")),
            contact("c2", Some("new1@example.com")),
            contact("c3", Some("new2@example.com")),
        ];
        let outcome = run(&api, &contacts, &MigrationMapping::default());

        assert_eq!(outcome.counters.succeeded, 3);
        assert_eq!(outcome.translations.len(), 3);
        assert_eq!(outcome.translations.reused_count(), 1);
        assert_eq!(outcome.translations.destination_of("c1"), Some("M-existing"));
        assert_eq!(api.created_contacts().len(), 2);
    }

    #[test]
    fn migrating_the_same_contact_twice_is_idempotent() {
        let api = MockCrmApi::new();
        let contacts = vec![contact("c1", Some("once@example.com"))];

        let first = run(&api, &contacts, &MigrationMapping::default());
        let second = run(&api, &contacts, &MigrationMapping::default());

        // The mock registers created contacts by key, so the second pass
        // finds and reuses the first pass's contact.
        assert_eq!(api.created_contacts().len(), 1);
        assert_eq!(first.translations.reused_count(), 0);
        assert_eq!(second.translations.reused_count(), 1);
        assert_eq!(
            first.translations.destination_of("c1"),
            second.translations.destination_of("c1")
        );
    }

    #[test]
    fn unmapped_field_values_are_dropped_with_a_warning() {
        let api = MockCrmApi::new();
        let mut source = contact("c1", Some("fields@example.com"));
        source.custom_fields = vec![
            CustomFieldValue {
                field_id: "f-mapped".to_string(),
                value: "kept".to_string(),
            },
            CustomFieldValue {
                field_id: "f-unmapped".to_string(),
                value: "dropped".to_string(),
            },
        ];
        let mapping = mapping_with_field("f-mapped", "F-dest");
        let outcome = run(&api, &[source], &mapping);

        assert_eq!(outcome.counters.succeeded, 1);
        assert_eq!(outcome.warnings.len(), 1);
        let created = api.created_contacts();
        assert_eq!(created[0].1.custom_fields.len(), 1);
        assert_eq!(created[0].1.custom_fields[0].field_id, "F-dest");
    }

    #[test]
    fn a_failing_contact_does_not_stop_the_batch() {
        let api = MockCrmApi::new().with_failing_contact_email("bad@example.com");
        let contacts = vec![
            contact("c1", Some("bad@example.com")),
            contact("c2", Some("good@example.com")),
        ];
        let outcome = run(&api, &contacts, &MigrationMapping::default());

        assert_eq!(outcome.counters.attempted, 2);
        assert_eq!(outcome.counters.failed, 1);
        assert_eq!(outcome.counters.succeeded, 1);
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.translations.contains("c2"));
        assert!(!outcome.translations.contains("c1"));
    }

    #[test]
    fn cancellation_stops_before_the_next_batch() {
        let api = MockCrmApi::new();
        let contacts: Vec<SourceContact> = (0..5)
            .map(|i| SourceContact {
                id: format!("c{i}"),
                email: Some(format!("c{i}@example.com")),
                ..SourceContact::default()
            })
            .collect();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let migrator = ContactMigrator::new(&api, &MigrationConfig::default());
        let outcome = migrator.migrate(&contacts, &MigrationMapping::default(), &|_| {}, &cancel);

        assert!(outcome.cancelled);
        assert_eq!(outcome.counters.attempted, 0);
        assert!(api.created_contacts().is_empty());
    }
}
