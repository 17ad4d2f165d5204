//! Content Index Adapter: embedded client content behind a per-client cap

use crate::{AdapterConfig, AdapterError, RetryPolicy};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{timeout_at, Instant};
use tracing::warn;
use trendmark_domain::traits::SimilarityBackend;
use trendmark_domain::{ClientId, ContentDocument, Fingerprint};

/// Which per-client limiter a backend call draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Lane {
    /// Paged corpus reads driven by the matcher
    Pages,
    /// Single-document reads for delivery and on-demand fills
    Lookups,
}

/// Exposes client content as embedded vectors
///
/// Paged fetches hold one of `per_client_concurrency` permits for their
/// client; single-document reads hold one of `per_client_lookup_concurrency`
/// permits from a separate pool. Callers beyond either cap queue until a
/// permit frees up or their deadline passes.
pub struct ContentIndexAdapter {
    backend: Arc<dyn SimilarityBackend>,
    config: AdapterConfig,
    retry: RetryPolicy,
    limits: Mutex<HashMap<(ClientId, Lane), Arc<Semaphore>>>,
}

impl ContentIndexAdapter {
    /// Create an adapter over a similarity backend
    pub fn new(backend: Arc<dyn SimilarityBackend>, config: AdapterConfig) -> Self {
        let retry = config.retry_policy();
        Self {
            backend,
            config,
            retry,
            limits: Mutex::new(HashMap::new()),
        }
    }

    /// Documents per page
    pub fn page_size(&self) -> usize {
        self.config.page_size.max(1)
    }

    fn capacity(&self, lane: Lane) -> usize {
        match lane {
            Lane::Pages => self.config.per_client_concurrency.max(1),
            Lane::Lookups => self.config.per_client_lookup_concurrency.max(1),
        }
    }

    fn limiter(&self, client: &ClientId, lane: Lane) -> Arc<Semaphore> {
        let capacity = self.capacity(lane);
        let mut limits = self.limits.lock().expect("limiter lock poisoned");
        limits
            .entry((client.clone(), lane))
            .or_insert_with(|| Arc::new(Semaphore::new(capacity)))
            .clone()
    }

    async fn permit(
        &self,
        client: &ClientId,
        lane: Lane,
        deadline: Instant,
    ) -> Result<OwnedSemaphorePermit, AdapterError> {
        let limiter = self.limiter(client, lane);
        match timeout_at(deadline, limiter.acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(AdapterError::Unavailable {
                attempts: 0,
                message: format!("limiter for client {} closed", client),
            }),
            Err(_) => Err(AdapterError::Timeout(format!(
                "waiting for backend capacity for client {}",
                client
            ))),
        }
    }

    /// Paged fetches currently holding a permit for `client`
    pub fn in_flight(&self, client: &ClientId) -> usize {
        self.capacity(Lane::Pages) - self.limiter(client, Lane::Pages).available_permits()
    }

    /// Embed a trend query
    pub async fn embed_query(&self, text: &str, deadline: Instant) -> Result<Vec<f32>, AdapterError> {
        self.retry
            .run("embed", deadline, || self.backend.embed(text))
            .await
    }

    /// Number of pages of content for a client
    pub async fn page_count(&self, client: &ClientId, deadline: Instant) -> Result<usize, AdapterError> {
        let _permit = self.permit(client, Lane::Pages, deadline).await?;
        let count = self
            .retry
            .run("document_count", deadline, || self.backend.document_count(client))
            .await?;
        Ok(count.div_ceil(self.page_size()))
    }

    /// Fetch one page of a client's documents
    ///
    /// Documents reported for a different client are dropped.
    pub async fn fetch_page(
        &self,
        client: &ClientId,
        page: usize,
        deadline: Instant,
    ) -> Result<Vec<ContentDocument>, AdapterError> {
        let _permit = self.permit(client, Lane::Pages, deadline).await?;
        let size = self.page_size();
        let mut documents = self
            .retry
            .run("documents", deadline, || {
                self.backend.documents(client, page * size, size)
            })
            .await?;
        let before = documents.len();
        documents.retain(|d| &d.client_id == client);
        if documents.len() != before {
            warn!(
                "Backend returned {} foreign documents for client {}",
                before - documents.len(),
                client
            );
        }
        Ok(documents)
    }

    /// Fetch a single document
    ///
    /// Draws from the lookup pool, so it does not queue behind paged fetches.
    pub async fn document(
        &self,
        client: &ClientId,
        url: &str,
        deadline: Instant,
    ) -> Result<Option<ContentDocument>, AdapterError> {
        let _permit = self.permit(client, Lane::Lookups, deadline).await?;
        self.retry
            .run("document", deadline, || self.backend.document(client, url))
            .await
    }

    /// Current content fingerprint of a page, if it is still indexed
    pub async fn current_fingerprint(
        &self,
        client: &ClientId,
        url: &str,
        deadline: Instant,
    ) -> Result<Option<Fingerprint>, AdapterError> {
        Ok(self
            .document(client, url, deadline)
            .await?
            .map(|d| d.fingerprint()))
    }
}
