//! Configuration for the synthesizer

use serde::{Deserialize, Serialize};

/// Synthesizer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesizerConfig {
    /// Trends expire after `half_life × expiry_multiplier`; stamped on every
    /// artifact as `trend_expires_at`
    /// Default: 2.0
    pub expiry_multiplier: f64,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            expiry_multiplier: 2.0,
        }
    }
}

impl SynthesizerConfig {
    /// Configuration with a specific expiry multiplier
    pub fn with_expiry_multiplier(expiry_multiplier: f64) -> Self {
        Self { expiry_multiplier }
    }
}
