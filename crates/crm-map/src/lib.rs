//! Schema mapping between two CRM accounts.
//!
//! The [`MappingEngine`] resolves source custom fields, pipelines, and
//! stages against a destination account through exact, alias, and fuzzy
//! similarity passes; the [`ReadinessScorer`] reduces the result to one
//! interpretable report; [`materialize_missing`] optionally creates what
//! could not be matched.

mod aliases;
mod engine;
mod materialize;
mod readiness;
mod utils;

pub use aliases::alias_match;
pub use engine::MappingEngine;
pub use materialize::materialize_missing;
pub use readiness::ReadinessScorer;
pub use utils::normalize_text;
