//! Configuration for relevance scoring

use serde::{Deserialize, Serialize};

/// Matcher configuration
///
/// # Examples
///
/// ```
/// use trendmark_matcher::MatcherConfig;
///
/// let config = MatcherConfig::default();
/// assert_eq!(config.threshold, 0.72);
///
/// let config = MatcherConfig::strict();
/// assert_eq!(config.threshold, 0.85);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Minimum composite score for a match (inclusive)
    /// Default: 0.72
    pub threshold: f64,

    /// Volume at which the volume weight saturates to 1.0
    /// Default: 10,000
    pub volume_saturation: u64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            threshold: 0.72,
            volume_saturation: 10_000,
        }
    }
}

impl MatcherConfig {
    /// Fewer, stronger matches
    pub fn strict() -> Self {
        Self {
            threshold: 0.85,
            ..Default::default()
        }
    }

    /// More matches, including weaker ones
    pub fn lenient() -> Self {
        Self {
            threshold: 0.6,
            ..Default::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(format!("threshold must be in (0, 1], got {}", self.threshold));
        }
        if self.volume_saturation == 0 {
            return Err("volume_saturation must be greater than 0".to_string());
        }
        Ok(())
    }
}
