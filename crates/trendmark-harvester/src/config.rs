//! Configuration for harvest cycles and the synthesis pipeline

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Harvest configuration
///
/// # Examples
///
/// ```
/// use trendmark_harvester::HarvestConfig;
///
/// let config = HarvestConfig::default();
/// assert_eq!(config.interval_secs, 300);
/// assert_eq!(config.expiry_multiplier, 2.0);
///
/// let config = HarvestConfig::aggressive();
/// assert_eq!(config.interval_secs, 60);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Time between harvest cycles (seconds); independent of trend half-lives
    /// Default: 300
    pub interval_secs: u64,

    /// A trend expires once its age exceeds `half_life × expiry_multiplier`
    /// Default: 2.0
    pub expiry_multiplier: f64,

    /// Deadline for one client's matching pass and for each priming fill (seconds)
    /// Default: 30
    pub fill_timeout_secs: u64,

    /// Deadline for reading trends and clients from the document store (seconds)
    /// Default: 10
    pub store_timeout_secs: u64,

    /// Clients matched concurrently within a cycle
    /// Default: 8
    pub max_concurrent_clients: usize,

    /// Recent matches kept per client for the match feed
    /// Default: 256
    pub recent_matches_per_client: usize,

    /// How long on-demand fills reuse the last active-trend snapshot (seconds)
    /// Default: 60
    pub trend_snapshot_ttl_secs: u64,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            expiry_multiplier: 2.0,
            fill_timeout_secs: 30,
            store_timeout_secs: 10,
            max_concurrent_clients: 8,
            recent_matches_per_client: 256,
            trend_snapshot_ttl_secs: 60,
        }
    }
}

impl HarvestConfig {
    /// Frequent cycles, for fast-moving trend categories
    pub fn aggressive() -> Self {
        Self {
            interval_secs: 60,
            trend_snapshot_ttl_secs: 15,
            ..Default::default()
        }
    }

    /// Infrequent cycles
    pub fn lenient() -> Self {
        Self {
            interval_secs: 1800,
            trend_snapshot_ttl_secs: 300,
            ..Default::default()
        }
    }

    /// Cycle interval as a Duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Fill and matching deadline as a Duration
    pub fn fill_timeout(&self) -> Duration {
        Duration::from_secs(self.fill_timeout_secs)
    }

    /// Document store deadline as a Duration
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.interval_secs == 0 {
            return Err("interval_secs must be greater than 0".to_string());
        }
        if !(self.expiry_multiplier > 0.0) {
            return Err("expiry_multiplier must be positive".to_string());
        }
        if self.fill_timeout_secs == 0 || self.store_timeout_secs == 0 {
            return Err("timeouts must be greater than 0".to_string());
        }
        if self.max_concurrent_clients == 0 {
            return Err("max_concurrent_clients must be greater than 0".to_string());
        }
        Ok(())
    }
}
