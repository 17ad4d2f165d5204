//! Delivery of JSON-LD markup to client pages.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};
use trendmark_cache::CacheError;
use trendmark_domain::{Artifact, CacheKey, JobReason};
use trendmark_harvester::SynthesisPipeline;
use trendmark_store::AdapterError;

/// Errors that keep a request from being served at all
///
/// Synthesis failures are not errors here; they produce an empty
/// [`Delivery`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeliveryError {
    /// No client key supplied
    #[error("Missing client key")]
    MissingKey,

    /// No page URL supplied
    #[error("Missing url")]
    MissingUrl,

    /// The key does not belong to an active client
    #[error("Unknown client key")]
    UnknownClient,

    /// The client directory could not be read
    #[error("Client directory unavailable: {0}")]
    Directory(#[from] AdapterError),
}

/// Response body of the delivery endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    /// The JSON-LD object, or null when nothing could be synthesized
    pub schema: Option<Value>,
    /// True when served from cache without regeneration
    pub cached: bool,
    /// Artifact version, null with an empty schema
    pub version: Option<u64>,
}

impl Delivery {
    fn served(artifact: &Artifact, cached: bool) -> Self {
        Self {
            schema: Some(artifact.payload.clone()),
            cached,
            version: Some(artifact.version),
        }
    }

    fn empty() -> Self {
        Self {
            schema: None,
            cached: false,
            version: None,
        }
    }
}

/// Serves artifacts for (client key, URL) requests
pub struct DeliveryService {
    pipeline: Arc<SynthesisPipeline>,
    fill_timeout: Duration,
    fingerprint_timeout: Duration,
}

impl DeliveryService {
    /// Create a delivery service
    pub fn new(pipeline: Arc<SynthesisPipeline>, fill_timeout: Duration, fingerprint_timeout: Duration) -> Self {
        Self {
            pipeline,
            fill_timeout,
            fingerprint_timeout,
        }
    }

    /// The pipeline behind this service
    pub fn pipeline(&self) -> &Arc<SynthesisPipeline> {
        &self.pipeline
    }

    /// Serve the markup for `url` on the site identified by `client_key`
    ///
    /// A fresh hit is checked against the page's current content fingerprint
    /// and regenerated when the page changed. A stale hit inside the grace
    /// window is served while a background refill runs. A miss fills
    /// synchronously within the delivery deadline.
    pub async fn deliver(&self, client_key: &str, url: &str) -> Result<Delivery, DeliveryError> {
        if client_key.trim().is_empty() {
            return Err(DeliveryError::MissingKey);
        }
        if url.trim().is_empty() {
            return Err(DeliveryError::MissingUrl);
        }

        let deadline = Instant::now() + self.fill_timeout;
        let client = self
            .pipeline
            .trend_store()
            .resolve_client_key(client_key, deadline)
            .await?
            .ok_or(DeliveryError::UnknownClient)?;
        let key = CacheKey::new(client, url);

        let cache = self.pipeline.cache();
        let fresh = cache.peek(&key).filter(|a| !a.is_expired(cache.now()));
        let changed = match &fresh {
            Some(artifact) => self.content_changed(&key, artifact).await,
            None => false,
        };
        let reason = if changed {
            JobReason::ContentChanged
        } else {
            JobReason::CacheMiss
        };

        let deadline = Instant::now() + self.fill_timeout;
        match self.pipeline.fill_on_demand(key.clone(), reason, deadline).await {
            Ok(filled) => Ok(Delivery::served(&filled.artifact, filled.from_cache())),
            Err(e) => {
                if reason == JobReason::ContentChanged && matches!(e, CacheError::NotFound(_)) {
                    // The changed page no longer matches anything; stop serving its old markup
                    self.pipeline.cache().invalidate(&key);
                }
                warn!("No schema for {} ({}): {}", key, reason, e);
                Ok(Delivery::empty())
            }
        }
    }

    /// Whether the page changed since `artifact` was built
    ///
    /// An unreachable content index within the fingerprint deadline counts as
    /// unchanged; the cached artifact is served.
    async fn content_changed(&self, key: &CacheKey, artifact: &Artifact) -> bool {
        let deadline = Instant::now() + self.fingerprint_timeout;
        match self.pipeline.current_fingerprint(key, deadline).await {
            Ok(Some(current)) => current != artifact.content_fingerprint,
            Ok(None) => false,
            Err(e) => {
                debug!("Fingerprint check for {} skipped: {}", key, e);
                false
            }
        }
    }
}
