//! Content documents produced by the crawler

use crate::fingerprint::{Fingerprint, FingerprintBuilder};
use crate::ids::{CacheKey, ClientId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Page kind, read from the crawler's `type` entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// A single product page
    Product,
    /// Editorial content
    Article,
    /// A dated event
    Event,
    /// Anything else (landing pages, sale pages, listings)
    Page,
}

impl DocumentKind {
    /// Get the kind name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Product => "product",
            DocumentKind::Article => "article",
            DocumentKind::Event => "event",
            DocumentKind::Page => "page",
        }
    }

    /// Parse a kind, falling back to [`DocumentKind::Page`]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "product" => DocumentKind::Product,
            "article" | "blog" | "news" | "post" => DocumentKind::Article,
            "event" => DocumentKind::Event,
            _ => DocumentKind::Page,
        }
    }
}

/// A crawled page of a client site
///
/// Owned by the crawler; the engine only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentDocument {
    /// Owning client
    pub client_id: ClientId,

    /// Page URL (or path)
    pub url: String,

    /// Extracted body text
    pub text: String,

    /// Extracted entities (e.g. `name`, `price`, `currency`, `headline`, `type`)
    #[serde(default)]
    pub entities: BTreeMap<String, String>,

    /// Embedding vector from the similarity backend
    #[serde(default)]
    pub embedding: Vec<f32>,

    /// Last crawl time (seconds since Unix epoch)
    pub last_crawled: u64,
}

impl ContentDocument {
    /// Cache key this document's artifact lives under
    pub fn key(&self) -> CacheKey {
        CacheKey::new(self.client_id.clone(), self.url.clone())
    }

    /// Page kind from the `type` entity
    pub fn kind(&self) -> DocumentKind {
        self.entities
            .get("type")
            .map(|t| DocumentKind::parse(t))
            .unwrap_or(DocumentKind::Page)
    }

    /// A trimmed, non-empty entity value
    pub fn entity(&self, name: &str) -> Option<&str> {
        self.entities
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Digest over URL, text and entities
    ///
    /// The embedding and crawl time are excluded: re-crawling identical content
    /// keeps the fingerprint stable.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut builder = FingerprintBuilder::new("content")
            .field("url", &self.url)
            .field("text", &self.text)
            .number("entities", self.entities.len() as u64);
        for (name, value) in &self.entities {
            builder = builder.field(name, value);
        }
        builder.finish()
    }
}
