//! Static synonym table for names that mean the same thing across accounts.
//!
//! Groups hold normalized spellings. Two names alias-match when they fall in
//! the same group, so the check is symmetric by construction.

use crm_model::EntityKind;

use crate::utils::normalize_text;

/// Common stage name variations seen across tenant accounts.
const STAGE_GROUPS: &[&[&str]] = &[
    &["lead", "new lead", "incoming lead", "fresh lead"],
    &["qualified", "qualified lead", "qualified prospect", "sql"],
    &["proposal", "proposal sent", "quote sent", "estimate"],
    &["negotiation", "negotiate", "discussing", "in negotiation"],
    &["closed won", "won", "closed", "deal won", "successful"],
    &["closed lost", "lost", "rejected", "declined", "failed"],
    &["follow up", "pending", "waiting"],
    &["demo", "demonstration", "presentation", "meeting scheduled"],
];

/// Common custom field name variations.
const FIELD_GROUPS: &[&[&str]] = &[
    &["industry", "business industry", "business type", "sector", "vertical"],
    &["company size", "employees", "team size", "staff count"],
    &["budget", "deal value", "project budget", "investment"],
    &["source", "lead source", "origin", "referral source"],
    &["priority", "importance", "urgency", "level"],
    &["notes", "comments", "description", "details"],
    &["website", "url", "domain", "web address"],
];

fn groups_for(kind: EntityKind) -> &'static [&'static [&'static str]] {
    match kind {
        EntityKind::Field => FIELD_GROUPS,
        // Pipelines have no curated synonyms; their names are too
        // account-specific to generalize.
        EntityKind::Pipeline => &[],
        EntityKind::Stage => STAGE_GROUPS,
    }
}

/// True when both names fall in the same synonym group for this kind.
pub fn alias_match(kind: EntityKind, a: &str, b: &str) -> bool {
    let a = normalize_text(a);
    let b = normalize_text(b);
    if a == b {
        return false; // equal names are the exact pass's business
    }
    groups_for(kind)
        .iter()
        .any(|group| group.contains(&a.as_str()) && group.contains(&b.as_str()))
}
