//! Migration run configuration.

use serde::{Deserialize, Serialize};

/// Options recognized by the mapper, the client, and the record migrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Records per batch for progress reporting and cancellation checks.
    /// Batching never implies concurrent requests.
    pub batch_size: usize,
    /// Fixed pacing delay between consecutive API requests, in seconds.
    pub inter_request_delay_secs: f64,
    /// Maximum retries on HTTP 429 before giving up on a request.
    pub max_retries: u32,
    /// Maximum retries on HTTP 5xx before giving up on a request.
    pub server_error_retries: u32,
    /// Minimum similarity score for an automatic fuzzy match.
    pub similarity_threshold: f32,
    /// Create unresolved fields and stages in the destination on demand.
    pub auto_create_missing: bool,
    /// Weight of field readiness in the overall score; pipelines and stages
    /// together carry the remainder.
    pub field_weight: f32,
    /// Proceed past a Low readiness report without halting.
    pub acknowledge_low_readiness: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            inter_request_delay_secs: 0.2,
            max_retries: 3,
            server_error_retries: 2,
            similarity_threshold: 0.80,
            auto_create_missing: false,
            field_weight: 0.5,
            acknowledge_low_readiness: false,
        }
    }
}

impl MigrationConfig {
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn with_inter_request_delay_secs(mut self, secs: f64) -> Self {
        self.inter_request_delay_secs = secs.max(0.0);
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    #[must_use]
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn with_auto_create_missing(mut self, enable: bool) -> Self {
        self.auto_create_missing = enable;
        self
    }

    #[must_use]
    pub fn with_acknowledge_low_readiness(mut self, enable: bool) -> Self {
        self.acknowledge_low_readiness = enable;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = MigrationConfig::default();
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.max_retries, 3);
        assert!((config.similarity_threshold - 0.80).abs() < f32::EPSILON);
        assert!(!config.auto_create_missing);
    }

    #[test]
    fn builder_clamps_inputs() {
        let config = MigrationConfig::default()
            .with_batch_size(0)
            .with_similarity_threshold(1.5);
        assert_eq!(config.batch_size, 1);
        assert!((config.similarity_threshold - 1.0).abs() < f32::EPSILON);
    }
}
