//! Configuration for the artifact cache

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Artifact cache configuration
///
/// # Examples
///
/// ```
/// use trendmark_cache::CacheConfig;
///
/// let config = CacheConfig::default();
/// assert_eq!(config.capacity, 10_000);
/// assert_eq!(config.grace_secs, 300);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached artifacts; least recently used are evicted
    /// Default: 10,000
    pub capacity: usize,

    /// How long an expired artifact may still be served while it is refilled (seconds)
    /// Default: 300
    pub grace_secs: u64,

    /// Deadline for background refills started by stale reads (seconds)
    /// Default: 30
    pub background_fill_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            grace_secs: 300,
            background_fill_secs: 30,
        }
    }
}

impl CacheConfig {
    /// Background refill deadline as a Duration
    pub fn background_fill_timeout(&self) -> Duration {
        Duration::from_secs(self.background_fill_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.capacity == 0 {
            return Err("capacity must be greater than 0".to_string());
        }
        if self.background_fill_secs == 0 {
            return Err("background_fill_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}
