//! Synthesis pipeline: the fill functions behind the artifact cache

use crate::HarvestConfig;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use tokio::time::Instant;
use tracing::{debug, warn};
use trendmark_cache::{ArtifactCache, CacheError, FillContext, Filled};
use trendmark_domain::{
    Artifact, CacheKey, Clock, ContentDocument, Fingerprint, JobReason, Match, SynthesisJob, Trend,
};
use trendmark_matcher::{MatchError, Matcher};
use trendmark_store::{AdapterError, ContentIndexAdapter, TrendStoreAdapter};
use trendmark_synthesizer::{SynthesisError, SynthesisInput, Synthesizer};

type FillFuture = Pin<Box<dyn Future<Output = Result<Artifact, CacheError>> + Send>>;

/// What priming a match did to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimeOutcome {
    /// The cached artifact was already built from these inputs
    Unchanged(u64),
    /// A new version was committed
    Primed(u64),
}

struct TrendSnapshot {
    fetched_at: u64,
    trends: Arc<Vec<Trend>>,
}

/// Wires adapters, matcher, synthesizer and cache together
///
/// Used by the harvest scheduler to prime artifacts for matches, and by the
/// delivery path to synthesize on demand. All cache writes go through
/// single-flight fills built here.
pub struct SynthesisPipeline {
    trends: Arc<TrendStoreAdapter>,
    index: Arc<ContentIndexAdapter>,
    matcher: Arc<Matcher>,
    synthesizer: Arc<Synthesizer>,
    cache: ArtifactCache,
    clock: Arc<dyn Clock>,
    config: HarvestConfig,
    snapshot: RwLock<Option<TrendSnapshot>>,
}

impl SynthesisPipeline {
    /// Assemble a pipeline
    pub fn new(
        trends: Arc<TrendStoreAdapter>,
        index: Arc<ContentIndexAdapter>,
        matcher: Arc<Matcher>,
        synthesizer: Arc<Synthesizer>,
        cache: ArtifactCache,
        clock: Arc<dyn Clock>,
        config: HarvestConfig,
    ) -> Self {
        Self {
            trends,
            index,
            matcher,
            synthesizer,
            cache,
            clock,
            config,
            snapshot: RwLock::new(None),
        }
    }

    /// The artifact cache
    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// The trend store adapter
    pub fn trend_store(&self) -> &TrendStoreAdapter {
        &self.trends
    }

    /// The content index adapter
    pub fn content_index(&self) -> &ContentIndexAdapter {
        &self.index
    }

    /// The matcher
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Pipeline configuration
    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Current time
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Re-read active trends from the store and replace the snapshot
    pub async fn refresh_trends(&self, deadline: Instant) -> Result<Arc<Vec<Trend>>, AdapterError> {
        let now = self.now();
        let trends = Arc::new(
            self.trends
                .active_trends(now, self.config.expiry_multiplier, deadline)
                .await?,
        );
        *self.snapshot.write().expect("trend snapshot lock poisoned") = Some(TrendSnapshot {
            fetched_at: now,
            trends: trends.clone(),
        });
        Ok(trends)
    }

    /// Active trends, from the snapshot while it is recent enough
    pub async fn active_trends(&self, deadline: Instant) -> Result<Arc<Vec<Trend>>, AdapterError> {
        let now = self.now();
        let cached = {
            let snapshot = self.snapshot.read().expect("trend snapshot lock poisoned");
            snapshot
                .as_ref()
                .filter(|s| now.saturating_sub(s.fetched_at) < self.config.trend_snapshot_ttl_secs)
                .map(|s| s.trends.clone())
        };
        let trends = match cached {
            Some(trends) => trends,
            None => return self.refresh_trends(deadline).await,
        };
        if trends.iter().any(|t| t.is_expired(now, self.config.expiry_multiplier)) {
            let active: Vec<Trend> = trends
                .iter()
                .filter(|t| !t.is_expired(now, self.config.expiry_multiplier))
                .cloned()
                .collect();
            return Ok(Arc::new(active));
        }
        Ok(trends)
    }

    /// Current content fingerprint of a page
    pub async fn current_fingerprint(
        &self,
        key: &CacheKey,
        deadline: Instant,
    ) -> Result<Option<Fingerprint>, AdapterError> {
        self.index.current_fingerprint(&key.client_id, &key.url, deadline).await
    }

    /// Make sure the cache holds an artifact for a harvested match
    ///
    /// Skips the fill when the cached artifact was built from the same
    /// content and trend fingerprints.
    pub async fn prime(
        &self,
        matched: Match,
        trend: Trend,
        document: ContentDocument,
        deadline: Instant,
    ) -> Result<PrimeOutcome, CacheError> {
        let key = matched.key();
        let content_fp = document.fingerprint();
        let trend_fp = trend.fingerprint();

        let before = self.cache.peek(&key);
        if let Some(current) = &before {
            if current.built_from(&content_fp, &trend_fp) {
                return Ok(PrimeOutcome::Unchanged(current.version));
            }
        }

        let fill = self.harvested_fill(matched, trend, document);
        let filled = self.cache.refresh(key, deadline, fill).await?;
        let version = filled.artifact.version;
        match before {
            Some(previous) if previous.version == version => Ok(PrimeOutcome::Unchanged(version)),
            _ => Ok(PrimeOutcome::Primed(version)),
        }
    }

    /// Serve a key on demand
    ///
    /// [`JobReason::ContentChanged`] forces regeneration; any other reason
    /// serves from cache and fills on a miss.
    pub async fn fill_on_demand(
        self: &Arc<Self>,
        key: CacheKey,
        reason: JobReason,
        deadline: Instant,
    ) -> Result<Filled, CacheError> {
        let fill = self.on_demand_fill(key.clone(), reason, deadline);
        match reason {
            JobReason::ContentChanged => self.cache.refresh(key, deadline, fill).await,
            _ => self.cache.get_or_fill(key, deadline, fill).await,
        }
    }

    fn harvested_fill(
        &self,
        matched: Match,
        trend: Trend,
        document: ContentDocument,
    ) -> impl FnOnce(FillContext) -> std::future::Ready<Result<Artifact, CacheError>> + Send + 'static {
        let synthesizer = self.synthesizer.clone();
        let clock = self.clock.clone();
        move |ctx: FillContext| {
            let job = SynthesisJob::new(matched.key(), trend.id.clone(), JobReason::HarvestedMatch);
            std::future::ready(run_job(&synthesizer, &job, &matched, &trend, &document, &ctx, clock.now()))
        }
    }

    fn on_demand_fill(
        self: &Arc<Self>,
        key: CacheKey,
        reason: JobReason,
        deadline: Instant,
    ) -> impl FnOnce(FillContext) -> FillFuture + Send + 'static {
        let pipeline = self.clone();
        move |ctx: FillContext| -> FillFuture {
            Box::pin(async move {
                let document = pipeline
                    .index
                    .document(&key.client_id, &key.url, deadline)
                    .await
                    .map_err(adapter_error)?
                    .ok_or_else(|| CacheError::NotFound(format!("no content indexed for {}", key)))?;

                let trends = pipeline.active_trends(deadline).await.map_err(adapter_error)?;
                let now = pipeline.now();
                let matched = pipeline
                    .matcher
                    .best_for_document(&trends, &document, now, deadline)
                    .await
                    .map_err(match_error)?
                    .ok_or_else(|| CacheError::NotFound(format!("no active trend matches {}", key)))?;
                let trend = trends
                    .iter()
                    .find(|t| t.id == matched.trend_id)
                    .cloned()
                    .ok_or_else(|| CacheError::NotFound(format!("trend {} vanished", matched.trend_id)))?;

                let job = SynthesisJob::new(key.clone(), trend.id.clone(), reason);
                run_job(&pipeline.synthesizer, &job, &matched, &trend, &document, &ctx, now)
            })
        }
    }
}

fn run_job(
    synthesizer: &Synthesizer,
    job: &SynthesisJob,
    matched: &Match,
    trend: &Trend,
    document: &ContentDocument,
    ctx: &FillContext,
    now: u64,
) -> Result<Artifact, CacheError> {
    let input = SynthesisInput {
        job,
        matched,
        trend,
        document,
    };
    match synthesizer.synthesize(input, ctx.previous.as_deref(), ctx.last_version, now) {
        Ok(artifact) => {
            debug!("Job {} ({}) for {} produced v{}", job.id, job.reason, job.key, artifact.version);
            Ok(artifact)
        }
        Err(e) => {
            warn!("Dropping job {} ({}) for {}: {}", job.id, job.reason, job.key, e);
            Err(synthesis_error(e))
        }
    }
}

fn synthesis_error(e: SynthesisError) -> CacheError {
    CacheError::Rejected(e.to_string())
}

fn adapter_error(e: AdapterError) -> CacheError {
    match e {
        AdapterError::Timeout(_) => CacheError::Timeout,
        other => CacheError::Unavailable(other.to_string()),
    }
}

fn match_error(e: MatchError) -> CacheError {
    match e {
        MatchError::Adapter(inner) => adapter_error(inner),
        other => CacheError::Unavailable(other.to_string()),
    }
}
