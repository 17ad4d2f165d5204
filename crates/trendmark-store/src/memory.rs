//! In-memory collaborators
//!
//! Stand-ins for the external document store and similarity backend, used by
//! the test suites and by the bundled server when it runs from a seed file.
//! Both support outage injection so degraded-mode behaviour can be exercised.

use crate::embedding::{EmbeddingModel, HashingEmbedder};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use trendmark_domain::traits::{
    ClientRecord, CollaboratorError, DocumentStore, SimilarityBackend,
};
use trendmark_domain::{ClientId, ContentDocument, TrendRecord};

/// Seed data for the in-memory collaborators (JSON)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedData {
    /// Client records
    #[serde(default)]
    pub clients: Vec<ClientRecord>,

    /// Raw trend records
    #[serde(default)]
    pub trends: Vec<TrendRecord>,

    /// Content documents; an empty embedding is computed from the text
    #[serde(default)]
    pub documents: Vec<ContentDocument>,
}

impl SeedData {
    /// Load seed data from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read seed file: {}", e))?;
        serde_json::from_str(&contents).map_err(|e| format!("Failed to parse seed file: {}", e))
    }
}

/// In-memory [`DocumentStore`]
#[derive(Default)]
pub struct MemoryDocumentStore {
    trends: RwLock<Vec<TrendRecord>>,
    clients: RwLock<BTreeMap<ClientId, ClientRecord>>,
    unavailable: AtomicBool,
    client_reads: AtomicUsize,
}

impl MemoryDocumentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the seed's clients and trends
    pub fn from_seed(seed: &SeedData) -> Self {
        let store = Self::new();
        for client in &seed.clients {
            store.upsert_client(client.clone());
        }
        for trend in &seed.trends {
            store.push_trend(trend.clone());
        }
        store
    }

    /// Append a trend record
    pub fn push_trend(&self, record: TrendRecord) {
        self.trends.write().expect("trend lock poisoned").push(record);
    }

    /// Remove every trend record
    pub fn clear_trends(&self) {
        self.trends.write().expect("trend lock poisoned").clear();
    }

    /// Insert or replace a client record
    pub fn upsert_client(&self, client: ClientRecord) {
        self.clients
            .write()
            .expect("client lock poisoned")
            .insert(client.id.clone(), client);
    }

    /// Simulate an outage (`false`) or recovery (`true`)
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Number of client directory reads served so far
    pub fn client_reads(&self) -> usize {
        self.client_reads.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), CollaboratorError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable("document store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn trend_records(&self) -> Result<Vec<TrendRecord>, CollaboratorError> {
        self.check()?;
        Ok(self.trends.read().expect("trend lock poisoned").clone())
    }

    async fn clients(&self) -> Result<Vec<ClientRecord>, CollaboratorError> {
        self.check()?;
        self.client_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .clients
            .read()
            .expect("client lock poisoned")
            .values()
            .cloned()
            .collect())
    }
}

/// In-memory [`SimilarityBackend`]
///
/// Query embeddings come from explicit overrides first, then from a
/// [`HashingEmbedder`]. Per-client outages, artificial latency and peak
/// concurrency tracking support adapter and matcher tests.
pub struct MemorySimilarityBackend {
    documents: RwLock<BTreeMap<(ClientId, String), ContentDocument>>,
    query_embeddings: RwLock<HashMap<String, Vec<f32>>>,
    embedder: HashingEmbedder,
    failing: RwLock<HashSet<ClientId>>,
    embed_unavailable: AtomicBool,
    latency: Mutex<Duration>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl Default for MemorySimilarityBackend {
    fn default() -> Self {
        Self::with_embedder(HashingEmbedder::new(64))
    }
}

impl MemorySimilarityBackend {
    /// Create an empty backend with a 64-dimension hashing embedder
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty backend with a specific embedder
    pub fn with_embedder(embedder: HashingEmbedder) -> Self {
        Self {
            documents: RwLock::new(BTreeMap::new()),
            query_embeddings: RwLock::new(HashMap::new()),
            embedder,
            failing: RwLock::new(HashSet::new()),
            embed_unavailable: AtomicBool::new(false),
            latency: Mutex::new(Duration::ZERO),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Create a backend holding the seed's documents
    ///
    /// Documents without an embedding are embedded from their text.
    pub fn from_seed(seed: &SeedData, embedder: HashingEmbedder) -> Self {
        let backend = Self::with_embedder(embedder);
        for doc in &seed.documents {
            let mut doc = doc.clone();
            if doc.embedding.is_empty() {
                if let Ok(embedding) = backend.embedder.embed(&doc.text) {
                    doc.embedding = embedding;
                }
            }
            backend.upsert_document(doc);
        }
        backend
    }

    /// Insert or replace a document (a crawl)
    pub fn upsert_document(&self, doc: ContentDocument) {
        self.documents
            .write()
            .expect("document lock poisoned")
            .insert((doc.client_id.clone(), doc.url.clone()), doc);
    }

    /// Remove a document
    pub fn remove_document(&self, client: &ClientId, url: &str) {
        self.documents
            .write()
            .expect("document lock poisoned")
            .remove(&(client.clone(), url.to_string()));
    }

    /// Pin the embedding returned for a query text
    pub fn set_query_embedding(&self, text: impl Into<String>, embedding: Vec<f32>) {
        self.query_embeddings
            .write()
            .expect("embedding lock poisoned")
            .insert(text.into(), embedding);
    }

    /// Make every call for `client` fail as unavailable
    pub fn fail_client(&self, client: &ClientId) {
        self.failing.write().expect("failure lock poisoned").insert(client.clone());
    }

    /// Restore a failing client
    pub fn heal_client(&self, client: &ClientId) {
        self.failing.write().expect("failure lock poisoned").remove(client);
    }

    /// Simulate an embedding outage (`false`) or recovery (`true`)
    pub fn set_embed_available(&self, available: bool) {
        self.embed_unavailable.store(!available, Ordering::SeqCst);
    }

    /// Delay every document call
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().expect("latency lock poisoned") = latency;
    }

    /// Highest number of concurrent document calls observed
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn check_client(&self, client: &ClientId) -> Result<(), CollaboratorError> {
        if self.failing.read().expect("failure lock poisoned").contains(client) {
            return Err(CollaboratorError::Unavailable(format!(
                "similarity backend unavailable for client {}",
                client
            )));
        }
        Ok(())
    }

    async fn tracked<T>(&self, f: impl FnOnce() -> T) -> T {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let latency = *self.latency.lock().expect("latency lock poisoned");
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let value = f();
        self.active.fetch_sub(1, Ordering::SeqCst);
        value
    }
}

#[async_trait]
impl SimilarityBackend for MemorySimilarityBackend {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CollaboratorError> {
        if self.embed_unavailable.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable("embedding service offline".to_string()));
        }
        if let Some(embedding) = self
            .query_embeddings
            .read()
            .expect("embedding lock poisoned")
            .get(text)
        {
            return Ok(embedding.clone());
        }
        self.embedder
            .embed(text)
            .map_err(|e| CollaboratorError::Rejected(e.to_string()))
    }

    async fn document_count(&self, client: &ClientId) -> Result<usize, CollaboratorError> {
        self.check_client(client)?;
        let documents = self.documents.read().expect("document lock poisoned");
        Ok(documents.keys().filter(|(c, _)| c == client).count())
    }

    async fn documents(
        &self,
        client: &ClientId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ContentDocument>, CollaboratorError> {
        self.check_client(client)?;
        let page = self
            .tracked(|| {
                let documents = self.documents.read().expect("document lock poisoned");
                documents
                    .values()
                    .filter(|d| &d.client_id == client)
                    .skip(offset)
                    .take(limit)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .await;
        Ok(page)
    }

    async fn document(
        &self,
        client: &ClientId,
        url: &str,
    ) -> Result<Option<ContentDocument>, CollaboratorError> {
        self.check_client(client)?;
        let documents = self.documents.read().expect("document lock poisoned");
        Ok(documents.get(&(client.clone(), url.to_string())).cloned())
    }
}

/// Convenience: both in-memory collaborators built from one seed
pub fn from_seed(
    seed: &SeedData,
    embedder: HashingEmbedder,
) -> (Arc<MemoryDocumentStore>, Arc<MemorySimilarityBackend>) {
    (
        Arc::new(MemoryDocumentStore::from_seed(seed)),
        Arc::new(MemorySimilarityBackend::from_seed(seed, embedder)),
    )
}
