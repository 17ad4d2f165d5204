//! Trend module - time-decaying search-interest signals

use crate::fingerprint::{Fingerprint, FingerprintBuilder};
use crate::ids::TrendId;
use serde::{Deserialize, Serialize};

/// Raw trend record as written to the document store by the trend harvester
///
/// Shape: `{query, volume, timestamp, category}`; `half_life_secs` is optional and
/// falls back to the adapter's configured default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendRecord {
    /// Query text as observed (not normalized)
    pub query: String,

    /// Search-volume estimate
    pub volume: u64,

    /// Observation time (seconds since Unix epoch)
    pub timestamp: u64,

    /// Free-form category (e.g. "ecommerce", "news")
    pub category: String,

    /// Decay half-life in seconds
    #[serde(default)]
    pub half_life_secs: Option<u64>,
}

/// A normalized, immutable trend
///
/// Trends are never mutated: a later observation of the same normalized query
/// produces a new `Trend` that supersedes this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    /// Deterministic identifier
    pub id: TrendId,

    /// Normalized query text
    pub query: String,

    /// Search-volume estimate
    pub volume: u64,

    /// Normalized (lowercase) category
    pub category: String,

    /// Observation time (seconds since Unix epoch)
    pub observed_at: u64,

    /// Decay half-life in seconds
    pub half_life_secs: u64,
}

impl Trend {
    /// Build a trend from already-normalized parts, deriving its id
    pub fn new(
        query: impl Into<String>,
        volume: u64,
        category: impl Into<String>,
        observed_at: u64,
        half_life_secs: u64,
    ) -> Self {
        let query = query.into();
        let id = Self::derive_id(&query, observed_at);
        Self {
            id,
            query,
            volume,
            category: category.into(),
            observed_at,
            half_life_secs,
        }
    }

    fn derive_id(query: &str, observed_at: u64) -> TrendId {
        let digest = FingerprintBuilder::new("trend-id")
            .field("query", query)
            .number("observed_at", observed_at)
            .finish();
        TrendId::new(&digest.as_str()[..16])
    }

    /// Seconds elapsed since observation (zero if observed in the future)
    pub fn age_secs(&self, now: u64) -> u64 {
        now.saturating_sub(self.observed_at)
    }

    /// Time after which this trend no longer backs a valid artifact
    pub fn expires_at(&self, expiry_multiplier: f64) -> u64 {
        let lifetime = (self.half_life_secs as f64 * expiry_multiplier.max(0.0)).round() as u64;
        self.observed_at.saturating_add(lifetime)
    }

    /// A trend is expired once its age exceeds half-life × multiplier
    pub fn is_expired(&self, now: u64, expiry_multiplier: f64) -> bool {
        now > self.expires_at(expiry_multiplier)
    }

    /// Recency decay `exp(-Δt / half_life)`, in (0, 1]
    pub fn decay_factor(&self, now: u64) -> f64 {
        let age = self.age_secs(now) as f64;
        if self.half_life_secs == 0 {
            return if age == 0.0 { 1.0 } else { 0.0 };
        }
        (-age / self.half_life_secs as f64).exp()
    }

    /// Digest over every field that affects synthesized markup or validity
    pub fn fingerprint(&self) -> Fingerprint {
        FingerprintBuilder::new("trend")
            .field("query", &self.query)
            .field("category", &self.category)
            .number("volume", self.volume)
            .number("observed_at", self.observed_at)
            .number("half_life_secs", self.half_life_secs)
            .finish()
    }
}

/// Normalize query text: lowercase, punctuation to spaces, whitespace collapsed
///
/// # Examples
///
/// ```
/// use trendmark_domain::normalize_query;
///
/// assert_eq!(normalize_query("  Diwali   SALE!! "), "diwali sale");
/// ```
pub fn normalize_query(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: normalization is idempotent
        #[test]
        fn test_normalize_idempotent(raw in "[a-zA-Z0-9 !?.,_-]{0,64}") {
            let once = normalize_query(&raw);
            prop_assert_eq!(normalize_query(&once), once.clone());
        }

        /// Property: normalized text never has leading, trailing or doubled spaces
        #[test]
        fn test_normalize_whitespace(raw in "[a-zA-Z0-9 \t!?.,_-]{0,64}") {
            let normalized = normalize_query(&raw);
            prop_assert!(!normalized.starts_with(' '));
            prop_assert!(!normalized.ends_with(' '));
            prop_assert!(!normalized.contains("  "));
        }

        /// Property: decay stays within (0, 1] for positive half-lives
        #[test]
        fn test_decay_bounds(age in 0u64..10_000_000, half_life in 1u64..1_000_000) {
            let t = Trend::new("q", 1, "c", 0, half_life);
            let decay = t.decay_factor(age);
            prop_assert!(decay <= 1.0);
            prop_assert!(decay >= 0.0);
        }
    }
}
