//! Trendmark Matcher
//!
//! Scores the relevance of trends against a client's content corpus.
//!
//! # Overview
//!
//! For every (trend, document) pair the matcher computes a composite score
//! from three factors:
//!
//! | Factor | Formula | Range |
//! |--------|---------|-------|
//! | Similarity | `max(0, cosine(trend, document))` | [0, 1] |
//! | Volume weight | `min(1, volume / volume_saturation)` | [0, 1] |
//! | Recency decay | `exp(-Δt / half_life)` | (0, 1] |
//!
//! The product is clamped to [0, 1]; pairs at or above the threshold
//! (default 0.72) are matches. Per client only the best trend for each URL is
//! kept.
//!
//! Documents are read in pages through the
//! [`ContentIndexAdapter`](trendmark_store::ContentIndexAdapter), which caps
//! concurrent backend calls per client. A backend failure fails the client's
//! whole pass; the caller treats the client as degraded for the cycle.
//!
//! # Examples
//!
//! ```
//! use trendmark_domain::Trend;
//! use trendmark_matcher::{scoring, MatcherConfig};
//!
//! let trend = Trend::new("diwali sale", 50_000, "ecommerce", 0, 21_600);
//! let score = scoring::composite_score(0.9, &trend, 0, &MatcherConfig::default());
//! assert!((score - 0.9).abs() < 1e-6);
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod matcher;
pub mod scoring;

pub use config::MatcherConfig;
pub use error::MatchError;
pub use matcher::{ClientMatches, Matcher};
