//! Retry and backoff policy.

use std::time::Duration;

use crm_model::MigrationConfig;

/// Retry bounds and backoff schedule for one client.
///
/// Rate-limit (429) and server-error (5xx) retries are bounded separately;
/// both use the same exponential schedule: `base`, `2*base`, `4*base`, …
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_rate_limit_retries: u32,
    pub max_server_error_retries: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_rate_limit_retries: 3,
            max_server_error_retries: 2,
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &MigrationConfig) -> Self {
        Self {
            max_rate_limit_retries: config.max_retries,
            max_server_error_retries: config.server_error_retries,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (zero-based): `base * 2^retry`.
    #[must_use]
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        self.backoff_base.saturating_mul(1u32 << retry.min(16))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_one_second() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(0), Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(4));
    }

    #[test]
    fn from_config_takes_bounds() {
        let config = MigrationConfig::default().with_max_retries(5);
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_rate_limit_retries, 5);
        assert_eq!(policy.max_server_error_retries, 2);
    }
}
