//! Configuration for collaborator adapters

use crate::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration shared by the trend store and content index adapters
///
/// # Examples
///
/// ```
/// use trendmark_store::AdapterConfig;
///
/// let config = AdapterConfig::default();
/// assert_eq!(config.page_size, 500);
/// assert_eq!(config.per_client_concurrency, 4);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Half-life applied to trend records that carry none (seconds)
    /// Default: 6 hours
    pub default_half_life_secs: u64,

    /// Attempts per collaborator call, first try included
    /// Default: 3
    pub max_attempts: u32,

    /// First retry delay (milliseconds); doubles on every attempt
    /// Default: 50
    pub base_backoff_ms: u64,

    /// Upper bound for a single retry delay (milliseconds)
    /// Default: 1000
    pub max_backoff_ms: u64,

    /// Concurrent paged fetches allowed per client; excess fetches queue
    /// Default: 4
    pub per_client_concurrency: usize,

    /// Concurrent single-document reads allowed per client, independent of
    /// the paged-fetch cap
    /// Default: 4
    pub per_client_lookup_concurrency: usize,

    /// Documents fetched per page
    /// Default: 500
    pub page_size: usize,

    /// How long an unrecognized client key is answered from memory before the
    /// directory is read again (seconds); 0 disables
    /// Default: 30
    pub unknown_key_ttl_secs: u64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            default_half_life_secs: 6 * 3600,
            max_attempts: 3,
            base_backoff_ms: 50,
            max_backoff_ms: 1000,
            per_client_concurrency: 4,
            per_client_lookup_concurrency: 4,
            page_size: 500,
            unknown_key_ttl_secs: 30,
        }
    }
}

impl AdapterConfig {
    /// Retry policy derived from this configuration
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_backoff_ms),
            max_delay: Duration::from_millis(self.max_backoff_ms),
        }
    }

    /// Negative-cache lifetime for unknown client keys
    pub fn unknown_key_ttl(&self) -> Duration {
        Duration::from_secs(self.unknown_key_ttl_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.page_size == 0 {
            return Err("page_size must be greater than 0".to_string());
        }
        if self.per_client_concurrency == 0 {
            return Err("per_client_concurrency must be greater than 0".to_string());
        }
        if self.per_client_lookup_concurrency == 0 {
            return Err("per_client_lookup_concurrency must be greater than 0".to_string());
        }
        if self.default_half_life_secs == 0 {
            return Err("default_half_life_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AdapterConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let config = AdapterConfig {
            page_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AdapterConfig = serde_json::from_str(r#"{"page_size": 100}"#).unwrap();
        assert_eq!(config.page_size, 100);
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_retry_policy_never_zero_attempts() {
        let config = AdapterConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert_eq!(config.retry_policy().max_attempts, 1);
    }
}
