//! Relevance scoring
//!
//! ```text
//! score = clamp(max(0, cosine) × min(1, volume / saturation) × exp(-Δt / half_life), 0, 1)
//! ```
//!
//! A document matches when `score >= threshold`. Ranking is by score, then
//! larger trend volume, then URL.

use crate::MatcherConfig;
use std::cmp::Ordering;
use trendmark_domain::{ContentDocument, Match, Trend};
use trendmark_store::embedding::cosine_similarity;

/// Volume weight `min(1, volume / saturation)`
pub fn volume_weight(volume: u64, saturation: u64) -> f64 {
    if saturation == 0 {
        return 1.0;
    }
    (volume as f64 / saturation as f64).min(1.0)
}

/// Composite relevance of a document for a trend, in [0, 1]
pub fn composite_score(
    cosine: f32,
    trend: &Trend,
    now: u64,
    config: &MatcherConfig,
) -> f64 {
    let similarity = f64::from(cosine.max(0.0));
    let weight = volume_weight(trend.volume, config.volume_saturation);
    let decay = trend.decay_factor(now);
    (similarity * weight * decay).clamp(0.0, 1.0)
}

/// Score one trend against a set of documents
///
/// Returns only matches at or above the threshold, best first; equal scores
/// are ordered by URL.
pub fn score(
    trend: &Trend,
    trend_embedding: &[f32],
    documents: &[ContentDocument],
    now: u64,
    config: &MatcherConfig,
) -> Vec<Match> {
    let mut matches: Vec<Match> = documents
        .iter()
        .filter_map(|doc| {
            let cosine = cosine_similarity(trend_embedding, &doc.embedding);
            let score = composite_score(cosine, trend, now, config);
            (score >= config.threshold).then(|| Match {
                trend_id: trend.id.clone(),
                client_id: doc.client_id.clone(),
                url: doc.url.clone(),
                score,
                matched_at: now,
            })
        })
        .collect();
    matches.sort_by(|a, b| rank(a, trend.volume, b, trend.volume));
    matches
}

/// Ranking order: higher score, then larger volume, then URL, then trend id
pub fn rank(a: &Match, a_volume: u64, b: &Match, b_volume: u64) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b_volume.cmp(&a_volume))
        .then_with(|| a.url.cmp(&b.url))
        .then_with(|| a.trend_id.as_str().cmp(b.trend_id.as_str()))
}
