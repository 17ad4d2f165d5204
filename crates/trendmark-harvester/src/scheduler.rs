//! Harvest scheduler: periodic matching and cache priming

use crate::{
    ClientReport, CycleReport, HarvestConfig, HarvestError, HarvestMetrics, PrimeOutcome,
    RecentMatches, SynthesisPipeline,
};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{interval, Instant, MissedTickBehavior};
use trendmark_domain::{ClientId, Trend, TrendId};

/// Runs harvest cycles on a schedule
///
/// Each cycle reads the active trends once, matches every active client
/// against them (a bounded number of clients at a time), primes the cache
/// for the best match per page, and invalidates artifacts whose trend has
/// expired without a replacement match. A client whose collaborators fail is
/// reported as degraded and picked up again on the next cycle.
///
/// # Examples
///
/// ```no_run
/// # use std::sync::Arc;
/// # use trendmark_harvester::{HarvestScheduler, SynthesisPipeline};
/// # async fn demo(pipeline: Arc<SynthesisPipeline>) -> Result<(), Box<dyn std::error::Error>> {
/// let scheduler = HarvestScheduler::new(pipeline);
///
/// // Run until Ctrl+C
/// scheduler.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct HarvestScheduler {
    pipeline: Arc<SynthesisPipeline>,
    config: HarvestConfig,
    recent: Arc<RecentMatches>,
    metrics: Mutex<HarvestMetrics>,
    cycle_lock: tokio::sync::Mutex<()>,
}

impl HarvestScheduler {
    /// Create a scheduler using the pipeline's harvest configuration
    pub fn new(pipeline: Arc<SynthesisPipeline>) -> Self {
        let config = pipeline.config().clone();
        let recent = Arc::new(RecentMatches::new(config.recent_matches_per_client));
        Self {
            pipeline,
            config,
            recent,
            metrics: Mutex::new(HarvestMetrics::new()),
            cycle_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// The pipeline this scheduler drives
    pub fn pipeline(&self) -> &Arc<SynthesisPipeline> {
        &self.pipeline
    }

    /// Recent-match feed
    pub fn recent(&self) -> Arc<RecentMatches> {
        self.recent.clone()
    }

    /// Snapshot of the cumulative metrics
    pub fn metrics(&self) -> HarvestMetrics {
        self.metrics.lock().expect("harvest metrics lock poisoned").clone()
    }

    /// Run one cycle, optionally for a single client
    ///
    /// Cycles never overlap; a call made while another cycle runs waits for
    /// it and then runs its own. Re-running with unchanged inputs primes
    /// nothing new.
    pub async fn run_once(&self, client_filter: Option<&ClientId>) -> Result<CycleReport, HarvestError> {
        let _cycle = self.cycle_lock.lock().await;
        let result = self.cycle(client_filter).await;

        let mut metrics = self.metrics.lock().expect("harvest metrics lock poisoned");
        match &result {
            Ok(report) => metrics.record_cycle(report),
            Err(_) => metrics.record_failure(),
        }
        result
    }

    /// Run cycles every `interval_secs` until Ctrl+C
    pub async fn run(&self) -> Result<(), HarvestError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run cycles every `interval_secs` until `shutdown` completes
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), HarvestError>
    where
        F: Future<Output = ()>,
    {
        self.config.validate().map_err(HarvestError::Config)?;
        let mut ticker = interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!("Harvest scheduler started (interval: {:?})", self.config.interval());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tracing::debug!("Starting harvest cycle");
                    if let Err(e) = self.run_once(None).await {
                        tracing::error!("Harvest cycle failed: {}", e);
                    }
                }
                _ = &mut shutdown => {
                    tracing::info!("Shutdown signal received, stopping harvest scheduler");
                    break;
                }
            }
        }

        tracing::info!("Harvest scheduler stopped. Final metrics:\n{}", self.metrics().summary());
        Ok(())
    }

    /// Run a fixed number of cycles back to back
    ///
    /// Stops at the first cycle that fails as a whole.
    pub async fn run_cycles(&self, cycles: usize) -> Result<Vec<CycleReport>, HarvestError> {
        let mut reports = Vec::with_capacity(cycles);
        for cycle in 0..cycles {
            tracing::debug!("Starting harvest cycle {}/{}", cycle + 1, cycles);
            match self.run_once(None).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    tracing::error!("Harvest cycle {}/{} failed: {}", cycle + 1, cycles, e);
                    return Err(e);
                }
            }
        }
        tracing::info!(
            "Harvest finished {} cycles. Final metrics:\n{}",
            cycles,
            self.metrics().summary()
        );
        Ok(reports)
    }

    async fn cycle(&self, client_filter: Option<&ClientId>) -> Result<CycleReport, HarvestError> {
        let started = Instant::now();
        let started_at = self.pipeline.now();
        let store_deadline = started + self.config.store_timeout();

        let trends = self.pipeline.refresh_trends(store_deadline).await?;
        self.pipeline.matcher().retain_embeddings(&trends);

        let mut clients = self
            .pipeline
            .trend_store()
            .active_clients(store_deadline)
            .await?;
        if let Some(filter) = client_filter {
            if !clients.contains(filter) {
                return Err(HarvestError::UnknownClient(filter.to_string()));
            }
            clients.retain(|c| c == filter);
        }

        let by_id: Arc<HashMap<TrendId, Trend>> =
            Arc::new(trends.iter().map(|t| (t.id.clone(), t.clone())).collect());
        let limit = Arc::new(Semaphore::new(self.config.max_concurrent_clients));
        let mut tasks = JoinSet::new();
        for client in clients {
            let pipeline = self.pipeline.clone();
            let recent = self.recent.clone();
            let by_id = by_id.clone();
            let limit = limit.clone();
            tasks.spawn(async move {
                let _permit = limit
                    .acquire_owned()
                    .await
                    .map_err(|e| HarvestError::Worker(e.to_string()))?;
                Ok::<_, HarvestError>(harvest_client(&pipeline, &recent, client, &by_id).await)
            });
        }

        let mut reports = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let report = joined.map_err(|e| HarvestError::Worker(e.to_string()))??;
            reports.push(report);
        }
        reports.sort_by(|a, b| a.client_id.cmp(&b.client_id));

        let purged = self.pipeline.cache().purge_expired();
        let report = CycleReport {
            started_at,
            active_trends: trends.len(),
            clients: reports,
            purged,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        tracing::info!(
            "Harvest cycle: {} trends, {} clients, {} matches, {} primed, {} invalidated, {} degraded, {} purged ({} ms)",
            report.active_trends,
            report.clients.len(),
            report.matches(),
            report.primed(),
            report.invalidated(),
            report.degraded().len(),
            report.purged,
            report.duration_ms
        );
        Ok(report)
    }
}

/// Match, prime and invalidate for one client
async fn harvest_client(
    pipeline: &SynthesisPipeline,
    recent: &RecentMatches,
    client: ClientId,
    trends: &HashMap<TrendId, Trend>,
) -> ClientReport {
    let config = pipeline.config();
    let active: Vec<Trend> = trends.values().cloned().collect();
    let now = pipeline.now();
    let deadline = Instant::now() + config.fill_timeout();

    let mut found = match pipeline.matcher().match_client(&client, &active, now, deadline).await {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!("Client {} degraded this cycle: {}", client, e);
            return ClientReport::degraded(client, e.to_string());
        }
    };

    let mut report = ClientReport::new(client.clone());
    report.matches = found.matches.len();
    recent.record(&client, &found.matches);

    let mut matched_urls = HashSet::new();
    for matched in found.matches.iter() {
        matched_urls.insert(matched.url.clone());
        let (Some(trend), Some(document)) = (
            trends.get(&matched.trend_id),
            found.documents.remove(&matched.url),
        ) else {
            report.failed += 1;
            continue;
        };

        let fill_deadline = Instant::now() + config.fill_timeout();
        match pipeline
            .prime(matched.clone(), trend.clone(), document, fill_deadline)
            .await
        {
            Ok(PrimeOutcome::Primed(_)) => report.primed += 1,
            Ok(PrimeOutcome::Unchanged(_)) => report.unchanged += 1,
            Err(e) => {
                tracing::warn!("Priming {} failed: {}", matched.key(), e);
                report.failed += 1;
            }
        }
    }

    let cache = pipeline.cache();
    for key in cache.keys_for_client(&client) {
        if matched_urls.contains(&key.url) {
            continue;
        }
        let Some(artifact) = cache.peek(&key) else {
            continue;
        };
        if !trends.contains_key(&artifact.source_trend_id) && cache.invalidate(&key).is_some() {
            tracing::debug!("Invalidated {} (trend {} expired)", key, artifact.source_trend_id);
            report.invalidated += 1;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use trendmark_cache::{ArtifactCache, CacheConfig};
    use trendmark_domain::{ClientRecord, ContentDocument, ManualClock, TrendRecord};
    use trendmark_matcher::{Matcher, MatcherConfig};
    use trendmark_store::memory::{MemoryDocumentStore, MemorySimilarityBackend};
    use trendmark_store::{AdapterConfig, ContentIndexAdapter, TrendStoreAdapter};
    use trendmark_synthesizer::{Synthesizer, SynthesizerConfig};

    const NOW: u64 = 1_700_000_000;

    fn scheduler() -> (HarvestScheduler, Arc<MemoryDocumentStore>) {
        let store = Arc::new(MemoryDocumentStore::new());
        store.upsert_client(ClientRecord {
            id: ClientId::new("clientA"),
            key: "pk_a".to_string(),
            active: true,
        });
        store.push_trend(TrendRecord {
            query: "diwali sale".to_string(),
            volume: 50_000,
            timestamp: NOW,
            category: "ecommerce".to_string(),
            half_life_secs: None,
        });

        let backend = Arc::new(MemorySimilarityBackend::new());
        backend.set_query_embedding("diwali sale", vec![1.0, 0.0]);
        backend.upsert_document(ContentDocument {
            client_id: ClientId::new("clientA"),
            url: "/sale".to_string(),
            text: "Diwali sale".to_string(),
            entities: BTreeMap::from([
                ("name".to_string(), "Diwali Sale".to_string()),
                ("price".to_string(), "499".to_string()),
                ("currency".to_string(), "INR".to_string()),
            ]),
            embedding: vec![1.0, 0.0],
            last_crawled: NOW,
        });

        let clock = Arc::new(ManualClock::new(NOW));
        let adapter = AdapterConfig::default();
        let index = Arc::new(ContentIndexAdapter::new(backend, adapter.clone()));
        let pipeline = SynthesisPipeline::new(
            Arc::new(TrendStoreAdapter::new(store.clone(), adapter)),
            index.clone(),
            Arc::new(Matcher::new(index, MatcherConfig::default())),
            Arc::new(Synthesizer::new(SynthesizerConfig::default())),
            ArtifactCache::new(CacheConfig::default(), clock.clone()),
            clock,
            HarvestConfig::default(),
        );
        (HarvestScheduler::new(Arc::new(pipeline)), store)
    }

    #[tokio::test]
    async fn test_run_cycles_records_metrics() {
        let (scheduler, _) = scheduler();
        let reports = scheduler.run_cycles(2).await.unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].primed(), 1);
        assert_eq!(reports[1].primed(), 0);

        let metrics = scheduler.metrics();
        assert_eq!(metrics.cycles, 2);
        assert_eq!(metrics.unchanged, 1);
        assert_eq!(metrics.last_cycle_at, Some(NOW));
        assert_eq!(scheduler.recent().len(&ClientId::new("clientA")), 2);
    }

    #[tokio::test]
    async fn test_unknown_client_filter() {
        let (scheduler, _) = scheduler();
        let err = scheduler
            .run_once(Some(&ClientId::new("nobody")))
            .await
            .unwrap_err();
        assert_eq!(err, HarvestError::UnknownClient("nobody".to_string()));
    }

    #[tokio::test]
    async fn test_store_outage_fails_cycle() {
        let (scheduler, store) = scheduler();
        store.set_available(false);
        assert!(matches!(scheduler.run_once(None).await, Err(HarvestError::Adapter(_))));
        assert_eq!(scheduler.metrics().failed_cycles, 1);
        assert_eq!(scheduler.metrics().cycles, 0);
    }

    #[tokio::test]
    async fn test_run_until_stops_on_shutdown() {
        let (scheduler, _) = scheduler();
        scheduler.run_until(async {}).await.unwrap();
    }
}
