//! Per-client matching pass

use crate::scoring::{self, rank};
use crate::{MatchError, MatcherConfig};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::debug;
use trendmark_domain::{ClientId, ContentDocument, Match, Trend, TrendId};
use trendmark_store::ContentIndexAdapter;

/// Outcome of matching one client
#[derive(Debug, Clone, Default)]
pub struct ClientMatches {
    /// Best match per URL, best first
    pub matches: Vec<Match>,

    /// The matched documents, by URL
    pub documents: HashMap<String, ContentDocument>,
}

/// Scores trends against client content
///
/// Trend embeddings are cached by trend id for the lifetime of the trend;
/// call [`retain_embeddings`](Matcher::retain_embeddings) each cycle to drop
/// the ones that are no longer active.
pub struct Matcher {
    config: MatcherConfig,
    index: Arc<ContentIndexAdapter>,
    embeddings: Mutex<HashMap<TrendId, Arc<Vec<f32>>>>,
}

type Embedded = Arc<Vec<(Trend, Arc<Vec<f32>>)>>;

impl Matcher {
    /// Create a matcher over a content index
    pub fn new(index: Arc<ContentIndexAdapter>, config: MatcherConfig) -> Self {
        Self {
            config,
            index,
            embeddings: Mutex::new(HashMap::new()),
        }
    }

    /// Matcher configuration
    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Score one trend against documents (see [`scoring::score`])
    pub fn score(
        &self,
        trend: &Trend,
        trend_embedding: &[f32],
        documents: &[ContentDocument],
        now: u64,
    ) -> Vec<Match> {
        scoring::score(trend, trend_embedding, documents, now, &self.config)
    }

    /// Embedding of a trend's query, computed once per trend
    pub async fn trend_embedding(
        &self,
        trend: &Trend,
        deadline: Instant,
    ) -> Result<Arc<Vec<f32>>, MatchError> {
        if let Some(cached) = self
            .embeddings
            .lock()
            .expect("embedding cache lock poisoned")
            .get(&trend.id)
        {
            return Ok(cached.clone());
        }

        let embedding = Arc::new(self.index.embed_query(&trend.query, deadline).await?);
        self.embeddings
            .lock()
            .expect("embedding cache lock poisoned")
            .insert(trend.id.clone(), embedding.clone());
        Ok(embedding)
    }

    /// Drop cached embeddings of trends not in `active`
    pub fn retain_embeddings(&self, active: &[Trend]) {
        let mut embeddings = self.embeddings.lock().expect("embedding cache lock poisoned");
        embeddings.retain(|id, _| active.iter().any(|t| &t.id == id));
    }

    /// Number of cached trend embeddings
    pub fn cached_embeddings(&self) -> usize {
        self.embeddings.lock().expect("embedding cache lock poisoned").len()
    }

    async fn embed_all(&self, trends: &[Trend], deadline: Instant) -> Result<Embedded, MatchError> {
        let mut embedded = Vec::with_capacity(trends.len());
        for trend in trends {
            let embedding = self.trend_embedding(trend, deadline).await?;
            embedded.push((trend.clone(), embedding));
        }
        Ok(Arc::new(embedded))
    }

    /// Run the full matching pass for one client
    ///
    /// Pages are fetched concurrently; the content index's per-client cap
    /// bounds how many are in flight. Any failed page fails the whole pass so
    /// a partial view never drives invalidation.
    pub async fn match_client(
        &self,
        client: &ClientId,
        trends: &[Trend],
        now: u64,
        deadline: Instant,
    ) -> Result<ClientMatches, MatchError> {
        if trends.is_empty() {
            return Ok(ClientMatches::default());
        }

        let embedded = self.embed_all(trends, deadline).await?;
        let pages = self.index.page_count(client, deadline).await?;

        let mut tasks = JoinSet::new();
        for page in 0..pages {
            let index = self.index.clone();
            let client = client.clone();
            let embedded = embedded.clone();
            let config = self.config.clone();
            tasks.spawn(async move {
                let documents = index.fetch_page(&client, page, deadline).await?;
                Ok::<_, MatchError>(best_in_page(&embedded, documents, now, &config))
            });
        }

        let mut best: HashMap<String, (Match, u64, ContentDocument)> = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            let page = joined.map_err(|e| MatchError::Worker(e.to_string()))??;
            for (candidate, volume, doc) in page {
                merge_best(&mut best, candidate, volume, doc);
            }
        }

        let mut ranked: Vec<(Match, u64, ContentDocument)> = best.into_values().collect();
        ranked.sort_by(|a, b| rank(&a.0, a.1, &b.0, b.1));

        let mut result = ClientMatches::default();
        for (m, _, doc) in ranked {
            result.documents.insert(doc.url.clone(), doc);
            result.matches.push(m);
        }
        debug!(
            "Client {}: {} trends over {} pages, {} matched URLs",
            client,
            trends.len(),
            pages,
            result.matches.len()
        );
        Ok(result)
    }

    /// Best above-threshold trend for a single document
    pub async fn best_for_document(
        &self,
        trends: &[Trend],
        document: &ContentDocument,
        now: u64,
        deadline: Instant,
    ) -> Result<Option<Match>, MatchError> {
        let embedded = self.embed_all(trends, deadline).await?;
        let page = best_in_page(&embedded, vec![document.clone()], now, &self.config);
        Ok(page.into_iter().next().map(|(m, _, _)| m))
    }
}

/// Best match per document across all trends
fn best_in_page(
    embedded: &[(Trend, Arc<Vec<f32>>)],
    documents: Vec<ContentDocument>,
    now: u64,
    config: &MatcherConfig,
) -> Vec<(Match, u64, ContentDocument)> {
    let mut best: HashMap<String, (Match, u64)> = HashMap::new();
    for (trend, embedding) in embedded {
        for m in scoring::score(trend, embedding, &documents, now, config) {
            match best.get(&m.url) {
                Some((current, volume)) if rank(&m, trend.volume, current, *volume) != Ordering::Less => {}
                _ => {
                    best.insert(m.url.clone(), (m, trend.volume));
                }
            }
        }
    }

    documents
        .into_iter()
        .filter_map(|doc| best.remove(&doc.url).map(|(m, volume)| (m, volume, doc)))
        .collect()
}

fn merge_best(
    best: &mut HashMap<String, (Match, u64, ContentDocument)>,
    candidate: Match,
    volume: u64,
    doc: ContentDocument,
) {
    match best.get(&candidate.url) {
        Some((current, current_volume, _))
            if rank(&candidate, volume, current, *current_volume) != Ordering::Less => {}
        _ => {
            best.insert(candidate.url.clone(), (candidate, volume, doc));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use trendmark_store::memory::MemorySimilarityBackend;
    use trendmark_store::AdapterConfig;

    const NOW: u64 = 1_000_000;

    fn doc(url: &str, embedding: Vec<f32>) -> ContentDocument {
        ContentDocument {
            client_id: ClientId::new("clientA"),
            url: url.to_string(),
            text: url.to_string(),
            entities: BTreeMap::new(),
            embedding,
            last_crawled: 0,
        }
    }

    fn setup(page_size: usize) -> (Arc<MemorySimilarityBackend>, Matcher) {
        let backend = Arc::new(MemorySimilarityBackend::new());
        let config = AdapterConfig {
            page_size,
            per_client_concurrency: 2,
            base_backoff_ms: 1,
            max_backoff_ms: 2,
            ..Default::default()
        };
        let index = Arc::new(ContentIndexAdapter::new(backend.clone(), config));
        (backend, Matcher::new(index, MatcherConfig::default()))
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(2)
    }

    #[tokio::test]
    async fn test_best_trend_per_url_across_pages() {
        let (backend, matcher) = setup(2);
        backend.set_query_embedding("diwali sale", vec![1.0, 0.0]);
        backend.set_query_embedding("holi colours", vec![0.0, 1.0]);
        backend.upsert_document(doc("/a", vec![1.0, 0.0]));
        backend.upsert_document(doc("/b", vec![0.8, 0.6]));
        backend.upsert_document(doc("/c", vec![0.0, 1.0]));
        backend.upsert_document(doc("/d", vec![-1.0, 0.0]));
        backend.upsert_document(doc("/e", vec![0.6, 0.8]));

        let diwali = Trend::new("diwali sale", 50_000, "ecommerce", NOW, 21_600);
        let holi = Trend::new("holi colours", 50_000, "ecommerce", NOW, 21_600);

        let result = matcher
            .match_client(&ClientId::new("clientA"), &[diwali.clone(), holi.clone()], NOW, deadline())
            .await
            .unwrap();

        let summary: Vec<_> = result
            .matches
            .iter()
            .map(|m| (m.url.as_str(), m.trend_id.clone()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("/a", diwali.id.clone()),
                ("/c", holi.id.clone()),
                ("/b", diwali.id.clone()),
                ("/e", holi.id.clone()),
            ]
        );
        assert_eq!(result.documents.len(), 4);
        assert!(result.documents.contains_key("/e"));
        assert_eq!(matcher.cached_embeddings(), 2);
    }

    #[tokio::test]
    async fn test_backend_failure_fails_the_pass() {
        let (backend, matcher) = setup(10);
        backend.upsert_document(doc("/a", vec![1.0, 0.0]));
        backend.fail_client(&ClientId::new("clientA"));
        let trend = Trend::new("diwali sale", 50_000, "ecommerce", NOW, 21_600);

        let result = matcher
            .match_client(&ClientId::new("clientA"), &[trend], NOW, deadline())
            .await;
        assert!(matches!(result, Err(MatchError::Adapter(_))));
    }

    #[tokio::test]
    async fn test_best_for_document_and_retain() {
        let (backend, matcher) = setup(10);
        backend.set_query_embedding("diwali sale", vec![1.0, 0.0]);
        backend.set_query_embedding("holi colours", vec![0.0, 1.0]);
        let diwali = Trend::new("diwali sale", 50_000, "ecommerce", NOW, 21_600);
        let holi = Trend::new("holi colours", 50_000, "ecommerce", NOW, 21_600);

        let best = matcher
            .best_for_document(&[diwali.clone(), holi.clone()], &doc("/x", vec![0.1, 0.99]), NOW, deadline())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(best.trend_id, holi.id);

        let none = matcher
            .best_for_document(&[diwali.clone()], &doc("/x", vec![0.0, 1.0]), NOW, deadline())
            .await
            .unwrap();
        assert!(none.is_none());

        matcher.retain_embeddings(&[diwali]);
        assert_eq!(matcher.cached_embeddings(), 1);
    }
}
