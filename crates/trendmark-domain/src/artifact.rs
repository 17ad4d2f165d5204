//! Artifact module - versioned structured-data payloads

use crate::fingerprint::Fingerprint;
use crate::ids::{CacheKey, TrendId};
use serde::{Deserialize, Serialize};

/// schema.org type of a synthesized artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaType {
    /// `Offer` - a sale or promotion
    Offer,
    /// `Product` with an embedded offer
    Product,
    /// `Article`
    Article,
    /// `NewsArticle`
    NewsArticle,
    /// `Event`
    Event,
}

impl SchemaType {
    /// Short lowercase name (used in storage and logs)
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::Offer => "offer",
            SchemaType::Product => "product",
            SchemaType::Article => "article",
            SchemaType::NewsArticle => "news_article",
            SchemaType::Event => "event",
        }
    }

    /// The `@type` value emitted in JSON-LD
    pub fn schema_org_type(&self) -> &'static str {
        match self {
            SchemaType::Offer => "Offer",
            SchemaType::Product => "Product",
            SchemaType::Article => "Article",
            SchemaType::NewsArticle => "NewsArticle",
            SchemaType::Event => "Event",
        }
    }

    /// Parse a schema type from its short name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "offer" => Some(SchemaType::Offer),
            "product" => Some(SchemaType::Product),
            "article" => Some(SchemaType::Article),
            "news_article" => Some(SchemaType::NewsArticle),
            "event" => Some(SchemaType::Event),
            _ => None,
        }
    }
}

/// A cached structured-data artifact for one (client, URL)
///
/// `version` strictly increases on every regeneration of the same key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Cache key
    pub key: CacheKey,

    /// JSON-LD object
    pub payload: serde_json::Value,

    /// schema.org type of `payload`
    pub schema_type: SchemaType,

    /// Trend the artifact was synthesized for
    pub source_trend_id: TrendId,

    /// Synthesis time (seconds since Unix epoch)
    pub generated_at: u64,

    /// Fingerprint of the content document it was built from
    pub content_fingerprint: Fingerprint,

    /// Fingerprint of the source trend
    pub trend_fingerprint: Fingerprint,

    /// Monotonic version counter, starting at 1
    pub version: u64,

    /// When the source trend expires (seconds since Unix epoch)
    pub trend_expires_at: u64,
}

impl Artifact {
    /// True once the source trend has expired
    pub fn is_expired(&self, now: u64) -> bool {
        now > self.trend_expires_at
    }

    /// True if this artifact was built from exactly these inputs
    pub fn built_from(&self, content: &Fingerprint, trend: &Fingerprint) -> bool {
        &self.content_fingerprint == content && &self.trend_fingerprint == trend
    }
}
