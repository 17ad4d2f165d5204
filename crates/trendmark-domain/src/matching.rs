//! Matches and the synthesis jobs they trigger

use crate::ids::{CacheKey, ClientId, JobId, TrendId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A scored pairing of a trend with one client URL
///
/// Ephemeral: recomputed every harvest cycle and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    /// Matched trend
    pub trend_id: TrendId,

    /// Client owning the URL
    pub client_id: ClientId,

    /// Matched page
    pub url: String,

    /// Composite relevance in [0, 1]
    pub score: f64,

    /// When the score was computed (seconds since Unix epoch)
    pub matched_at: u64,
}

impl Match {
    /// Cache key for the matched page
    pub fn key(&self) -> CacheKey {
        CacheKey::new(self.client_id.clone(), self.url.clone())
    }
}

/// Why a synthesis job was started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobReason {
    /// A harvest cycle produced an above-threshold match
    HarvestedMatch,
    /// A delivery request found no usable artifact
    CacheMiss,
    /// The cached artifact was built from older content
    ContentChanged,
}

impl JobReason {
    /// Get the reason as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            JobReason::HarvestedMatch => "harvested-match",
            JobReason::CacheMiss => "cache-miss",
            JobReason::ContentChanged => "content-changed",
        }
    }
}

impl fmt::Display for JobReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transient unit of synthesis work; at most one in flight per cache key
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisJob {
    /// Job identifier (for logs)
    pub id: JobId,

    /// Target cache key
    pub key: CacheKey,

    /// Trend to synthesize for
    pub trend_id: TrendId,

    /// Trigger
    pub reason: JobReason,
}

impl SynthesisJob {
    /// Create a job with a fresh id
    pub fn new(key: CacheKey, trend_id: TrendId, reason: JobReason) -> Self {
        Self {
            id: JobId::new(),
            key,
            trend_id,
            reason,
        }
    }
}
