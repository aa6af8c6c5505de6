//! Dedup keys and deterministic processing order for contacts.

use crm_model::{DedupKey, SourceContact};

/// The natural key used to deduplicate this contact against the
/// destination. Email is the primary key; phone is consulted only when the
/// contact carries no usable email, so a phone that happens to belong to a
/// different destination contact can never override an email identity.
pub fn dedup_key(contact: &SourceContact) -> Option<DedupKey> {
    if let Some(email) = contact.email.as_deref()
        && let Some(key) = DedupKey::from_email(email)
    {
        return Some(key);
    }
    contact.phone.as_deref().and_then(DedupKey::from_phone)
}

/// Deterministic processing order: contacts with an email first (cheaper,
/// more reliable dedup key), then phone-only records, each group in its
/// original order.
pub fn order_contacts(contacts: &[SourceContact]) -> Vec<&SourceContact> {
    let (with_email, without_email): (Vec<&SourceContact>, Vec<&SourceContact>) = contacts
        .iter()
        .partition(|contact| matches!(dedup_key(contact), Some(DedupKey::Email(_))));
    let mut ordered = with_email;
    ordered.extend(without_email);
    ordered
}
