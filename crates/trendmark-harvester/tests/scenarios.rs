//! End-to-end harvest behaviour over in-memory collaborators

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use trendmark_cache::{ArtifactCache, CacheConfig, CacheError, Lookup, Origin};
use trendmark_domain::traits::MatchFeed;
use trendmark_domain::{
    CacheKey, ClientId, ClientRecord, ContentDocument, JobReason, ManualClock, SchemaType,
    TrendRecord,
};
use trendmark_harvester::{ClientStatus, HarvestConfig, HarvestScheduler, SynthesisPipeline};
use trendmark_matcher::{Matcher, MatcherConfig};
use trendmark_store::memory::{MemoryDocumentStore, MemorySimilarityBackend};
use trendmark_store::{AdapterConfig, ContentIndexAdapter, TrendStoreAdapter};
use trendmark_synthesizer::{Synthesizer, SynthesizerConfig};

const NOW: u64 = 1_700_000_000;
const HALF_LIFE: u64 = 21_600;

struct Harness {
    clock: ManualClock,
    store: Arc<MemoryDocumentStore>,
    backend: Arc<MemorySimilarityBackend>,
    pipeline: Arc<SynthesisPipeline>,
    scheduler: HarvestScheduler,
}

impl Harness {
    fn new(clients: &[&str]) -> Self {
        let clock = ManualClock::new(NOW);
        let store = Arc::new(MemoryDocumentStore::new());
        for id in clients {
            store.upsert_client(ClientRecord {
                id: ClientId::new(*id),
                key: format!("pk_{}", id),
                active: true,
            });
        }
        let backend = Arc::new(MemorySimilarityBackend::new());
        backend.set_query_embedding("diwali sale", vec![1.0, 0.0]);

        let adapter = AdapterConfig {
            base_backoff_ms: 5,
            max_backoff_ms: 20,
            ..AdapterConfig::default()
        };
        let index = Arc::new(ContentIndexAdapter::new(backend.clone(), adapter.clone()));
        let clock_handle = Arc::new(clock.clone());
        let pipeline = Arc::new(SynthesisPipeline::new(
            Arc::new(TrendStoreAdapter::new(store.clone(), adapter)),
            index.clone(),
            Arc::new(Matcher::new(index, MatcherConfig::default())),
            Arc::new(Synthesizer::new(SynthesizerConfig::default())),
            ArtifactCache::new(CacheConfig::default(), clock_handle.clone()),
            clock_handle,
            HarvestConfig::default(),
        ));
        let scheduler = HarvestScheduler::new(pipeline.clone());
        Self {
            clock,
            store,
            backend,
            pipeline,
            scheduler,
        }
    }

    fn diwali_trend(&self) {
        self.store.push_trend(TrendRecord {
            query: "Diwali Sale".to_string(),
            volume: 50_000,
            timestamp: self.clock_now(),
            category: "ecommerce".to_string(),
            half_life_secs: Some(HALF_LIFE),
        });
    }

    fn sale_page(&self, client: &str, text: &str, entities: &[(&str, &str)]) {
        self.backend.upsert_document(ContentDocument {
            client_id: ClientId::new(client),
            url: "/sale".to_string(),
            text: text.to_string(),
            entities: entities
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            embedding: vec![0.9, 0.19f32.sqrt()],
            last_crawled: self.clock_now(),
        });
    }

    fn clock_now(&self) -> u64 {
        use trendmark_domain::Clock;
        self.clock.now()
    }

    fn cache(&self) -> &ArtifactCache {
        self.pipeline.cache()
    }
}

fn offer_entities() -> Vec<(&'static str, &'static str)> {
    vec![("name", "Diwali Sale"), ("price", "499"), ("currency", "INR")]
}

fn sale_key(client: &str) -> CacheKey {
    CacheKey::new(ClientId::new(client), "/sale")
}

fn deadline() -> Instant {
    Instant::now() + Duration::from_secs(5)
}

#[tokio::test]
async fn test_matching_trend_primes_offer_at_version_one() {
    let harness = Harness::new(&["clientA"]);
    harness.diwali_trend();
    harness.sale_page("clientA", "Diwali sale on lamps", &offer_entities());

    let report = harness.scheduler.run_once(None).await.unwrap();
    assert_eq!(report.active_trends, 1);
    assert_eq!(report.matches(), 1);
    assert_eq!(report.primed(), 1);

    let artifact = harness.cache().get(&sale_key("clientA")).unwrap();
    assert_eq!(artifact.schema_type, SchemaType::Offer);
    assert_eq!(artifact.version, 1);
    assert_eq!(artifact.payload["@type"], "Offer");
    assert_eq!(artifact.payload["price"], "499");

    let recent = harness.scheduler.recent().recent(&ClientId::new("clientA"), 10);
    assert_eq!(recent.len(), 1);
    assert!((recent[0].score - 0.9).abs() < 1e-4);
}

#[tokio::test]
async fn test_unchanged_inputs_keep_version() {
    let harness = Harness::new(&["clientA"]);
    harness.diwali_trend();
    harness.sale_page("clientA", "Diwali sale on lamps", &offer_entities());

    harness.scheduler.run_once(None).await.unwrap();
    harness.clock.advance(300);
    let second = harness.scheduler.run_once(None).await.unwrap();

    let client = second.client(&ClientId::new("clientA")).unwrap();
    assert_eq!(client.primed, 0);
    assert_eq!(client.unchanged, 1);
    assert_eq!(harness.cache().get(&sale_key("clientA")).unwrap().version, 1);
    assert_eq!(harness.cache().stats().fills, 1);
}

#[tokio::test]
async fn test_expired_trend_invalidates_then_serves_on_demand() {
    let harness = Harness::new(&["clientA"]);
    harness.diwali_trend();
    harness.sale_page("clientA", "Diwali sale on lamps", &offer_entities());
    harness.scheduler.run_once(None).await.unwrap();

    // Past half-life x multiplier, no replacement trend
    harness.clock.advance(2 * HALF_LIFE + 1);
    let report = harness.scheduler.run_once(None).await.unwrap();
    assert_eq!(report.active_trends, 0);
    assert_eq!(report.invalidated(), 1);
    assert_eq!(harness.cache().lookup(&sale_key("clientA")), Lookup::Miss);

    // Nothing relevant to synthesize from
    let err = harness
        .pipeline
        .fill_on_demand(sale_key("clientA"), JobReason::CacheMiss, deadline())
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::NotFound(_)));

    // A fresh trend arrives: the on-demand fill continues the version sequence
    harness.diwali_trend();
    harness.pipeline.refresh_trends(deadline()).await.unwrap();
    let filled = harness
        .pipeline
        .fill_on_demand(sale_key("clientA"), JobReason::CacheMiss, deadline())
        .await
        .unwrap();
    assert_eq!(filled.origin, Origin::Synthesized);
    assert_eq!(filled.artifact.version, 2);
}

#[tokio::test]
async fn test_failing_client_does_not_affect_others() {
    let harness = Harness::new(&["clientA", "clientB"]);
    harness.diwali_trend();
    harness.sale_page("clientA", "Diwali sale on lamps", &offer_entities());
    harness.sale_page("clientB", "Diwali sale on sweets", &offer_entities());
    harness.backend.fail_client(&ClientId::new("clientB"));

    let first = harness.scheduler.run_once(None).await.unwrap();
    let a = first.client(&ClientId::new("clientA")).unwrap();
    let b = first.client(&ClientId::new("clientB")).unwrap();
    assert_eq!(a.status, ClientStatus::Ok);
    assert_eq!(a.primed, 1);
    assert!(b.is_degraded());
    assert_eq!(first.degraded(), vec![&ClientId::new("clientB")]);
    assert!(harness.cache().get(&sale_key("clientB")).is_none());

    harness.backend.heal_client(&ClientId::new("clientB"));
    let second = harness.scheduler.run_once(None).await.unwrap();
    assert_eq!(second.client(&ClientId::new("clientA")).unwrap().unchanged, 1);
    assert_eq!(second.client(&ClientId::new("clientB")).unwrap().primed, 1);
    assert_eq!(harness.cache().get(&sale_key("clientA")).unwrap().version, 1);
    assert_eq!(harness.cache().get(&sale_key("clientB")).unwrap().version, 1);
    assert_eq!(harness.scheduler.metrics().degraded_clients, 1);
}

#[tokio::test]
async fn test_incomplete_page_is_never_cached() {
    let harness = Harness::new(&["clientA"]);
    harness.diwali_trend();
    harness.sale_page("clientA", "Diwali sale on lamps", &[("name", "Diwali Sale")]);

    let report = harness.scheduler.run_once(None).await.unwrap();
    let client = report.client(&ClientId::new("clientA")).unwrap();
    assert_eq!(client.matches, 1);
    assert_eq!(client.failed, 1);
    assert!(harness.cache().is_empty());
    assert_eq!(harness.scheduler.metrics().failed_jobs, 1);
}

#[tokio::test]
async fn test_client_filter_limits_cycle() {
    let harness = Harness::new(&["clientA", "clientB"]);
    harness.diwali_trend();
    harness.sale_page("clientA", "Diwali sale on lamps", &offer_entities());
    harness.sale_page("clientB", "Diwali sale on sweets", &offer_entities());

    let report = harness
        .scheduler
        .run_once(Some(&ClientId::new("clientB")))
        .await
        .unwrap();
    assert_eq!(report.clients.len(), 1);
    assert!(harness.cache().get(&sale_key("clientA")).is_none());
    assert!(harness.cache().get(&sale_key("clientB")).is_some());
}

#[tokio::test]
async fn test_changed_content_regenerates_on_demand() {
    let harness = Harness::new(&["clientA"]);
    harness.diwali_trend();
    harness.sale_page("clientA", "Diwali sale on lamps", &offer_entities());
    harness.scheduler.run_once(None).await.unwrap();

    harness.sale_page("clientA", "Diwali sale on lamps and sweets", &offer_entities());
    let filled = harness
        .pipeline
        .fill_on_demand(sale_key("clientA"), JobReason::ContentChanged, deadline())
        .await
        .unwrap();
    assert_eq!(filled.artifact.version, 2);
    assert!(!filled.from_cache());
}
