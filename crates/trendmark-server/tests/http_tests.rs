//! HTTP tests for the server
//!
//! Drive the axum router in-process against in-memory collaborators.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower::ServiceExt; // for oneshot
use trendmark_domain::traits::ArtifactArchive;
use trendmark_domain::{CacheKey, ClientId, ClientRecord, ContentDocument, ManualClock, TrendRecord};
use trendmark_harvester::CycleReport;
use trendmark_server::config::ServerConfig;
use trendmark_server::delivery::Delivery;
use trendmark_server::handlers::{create_router, AppState, HealthCheckResponse, RecentResponse};
use trendmark_server::{build_state, Collaborators};
use trendmark_store::memory::{MemoryDocumentStore, MemorySimilarityBackend};
use trendmark_store::SqliteArtifactArchive;

const NOW: u64 = 1_700_000_000;

struct TestApp {
    state: AppState,
    clock: ManualClock,
    backend: Arc<MemorySimilarityBackend>,
}

impl TestApp {
    fn new() -> Self {
        Self::with_archive(None)
    }

    fn with_archive(archive: Option<Arc<dyn ArtifactArchive>>) -> Self {
        let store = Arc::new(MemoryDocumentStore::new());
        store.upsert_client(ClientRecord {
            id: ClientId::new("clientA"),
            key: "pk_live_a".to_string(),
            active: true,
        });
        store.upsert_client(ClientRecord {
            id: ClientId::new("clientOld"),
            key: "pk_live_old".to_string(),
            active: false,
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
        let clock = ManualClock::new(NOW);
        let collaborators = Collaborators {
            store,
            backend: backend.clone(),
            archive,
        };
        let state = build_state(
            &ServerConfig::default_test_config(),
            collaborators,
            Arc::new(clock.clone()),
        )
        .unwrap();
        let app = Self {
            state,
            clock,
            backend,
        };
        app.crawl("/sale", "Diwali sale on lamps", vec![0.9, 0.19f32.sqrt()]);
        app.crawl("/about", "About our family business", vec![0.0, 1.0]);
        app
    }

    fn crawl(&self, url: &str, text: &str, embedding: Vec<f32>) {
        self.backend.upsert_document(ContentDocument {
            client_id: ClientId::new("clientA"),
            url: url.to_string(),
            text: text.to_string(),
            entities: BTreeMap::from([
                ("name".to_string(), "Diwali Sale".to_string()),
                ("price".to_string(), "499".to_string()),
                ("currency".to_string(), "INR".to_string()),
            ]),
            embedding,
            last_crawled: NOW,
        });
    }

    fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    async fn get(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    async fn schema(&self, url: &str) -> Delivery {
        let (status, body) = self
            .get(&format!("/schema?clientKey=pk_live_a&url={}", url))
            .await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_slice(&body).unwrap()
    }

    async fn trigger(&self, body: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method("POST")
            .uri("/harvest/trigger")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }
}

#[tokio::test]
async fn test_recrawl_regenerates_once_then_serves_cached() {
    let app = TestApp::new();
    let (status, body) = app.trigger("{}").await;
    assert_eq!(status, StatusCode::OK);
    let report: CycleReport = serde_json::from_slice(&body).unwrap();
    assert_eq!(report.primed(), 1);

    let first = app.schema("/sale").await;
    assert!(first.cached);
    assert_eq!(first.version, Some(1));
    assert_eq!(first.schema.unwrap()["@type"], "Offer");

    app.crawl("/sale", "Diwali sale on lamps, now with sweets", vec![0.9, 0.19f32.sqrt()]);

    let changed = app.schema("/sale").await;
    assert!(!changed.cached);
    assert_eq!(changed.version, Some(2));

    let again = app.schema("/sale").await;
    assert!(again.cached);
    assert_eq!(again.version, Some(2));
}

#[tokio::test]
async fn test_miss_synthesizes_on_demand() {
    let app = TestApp::new();

    let first = app.schema("/sale").await;
    assert!(!first.cached);
    assert_eq!(first.version, Some(1));

    let second = app.schema("/sale").await;
    assert!(second.cached);
    assert_eq!(second.version, Some(1));
}

#[tokio::test]
async fn test_unmatched_page_gets_null_schema() {
    let app = TestApp::new();
    let (status, body) = app.get("/schema?clientKey=pk_live_a&url=/about").await;
    assert_eq!(status, StatusCode::OK);

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["schema"], Value::Null);
    assert_eq!(json["version"], Value::Null);
    assert_eq!(json["cached"], false);
}

#[tokio::test]
async fn test_unknown_page_gets_null_schema() {
    let app = TestApp::new();
    let delivery = app.schema("/missing").await;
    assert_eq!(delivery.schema, None);
}

#[tokio::test]
async fn test_client_key_errors() {
    let app = TestApp::new();

    let (status, body) = app.get("/schema?url=/sale").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json.get("schema").is_none());

    let (status, _) = app.get("/schema?clientKey=pk_nope&url=/sale").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/schema?clientKey=pk_live_old&url=/sale").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/schema?clientKey=pk_live_a").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stale_artifact_served_within_grace() {
    let app = TestApp::new();
    app.trigger("").await;

    // Default half-life 6h, multiplier 2: the trend expires after 12h
    app.clock.advance(2 * 21_600 + 10);
    let stale = app.schema("/sale").await;
    assert!(stale.cached);
    assert_eq!(stale.version, Some(1));

    // Past the grace window the artifact is gone and nothing replaces it
    app.clock.advance(300);
    let gone = app.schema("/sale").await;
    assert_eq!(gone.schema, None);
    assert!(!gone.cached);
}

#[tokio::test]
async fn test_trigger_filters_and_rejects_unknown_clients() {
    let app = TestApp::new();

    let (status, body) = app.trigger(r#"{"client_id": "clientA"}"#).await;
    assert_eq!(status, StatusCode::OK);
    let report: CycleReport = serde_json::from_slice(&body).unwrap();
    assert_eq!(report.clients.len(), 1);

    let (status, _) = app.trigger(r#"{"client_id": "clientZ"}"#).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Repeating the trigger is harmless
    let (status, body) = app.trigger("").await;
    assert_eq!(status, StatusCode::OK);
    let report: CycleReport = serde_json::from_slice(&body).unwrap();
    assert_eq!(report.primed(), 0);
}

#[tokio::test]
async fn test_recent_matches_and_health() {
    let app = TestApp::new();
    app.trigger("").await;

    let (status, body) = app.get("/matches/recent?clientId=clientA&limit=5").await;
    assert_eq!(status, StatusCode::OK);
    let recent: RecentResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(recent.matches.len(), 1);
    assert_eq!(recent.matches[0].url, "/sale");

    app.schema("/sale").await;

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    let health: HealthCheckResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.cache_entries, 1);
    assert_eq!(health.cache.hits, 1);
    assert_eq!(health.harvest.cycles, 1);
}

#[tokio::test]
async fn test_archive_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("artifacts.db");

    let first = TestApp::with_archive(Some(Arc::new(SqliteArtifactArchive::open(&path).unwrap())));
    assert_eq!(first.schema("/sale").await.version, Some(1));
    first.crawl("/sale", "Diwali sale on lamps, now with sweets", vec![0.9, 0.19f32.sqrt()]);
    assert_eq!(first.schema("/sale").await.version, Some(2));

    // Archive writes are asynchronous
    let archive = SqliteArtifactArchive::open(&path).unwrap();
    let key = CacheKey::new(ClientId::new("clientA"), "/sale");
    for _ in 0..50 {
        if archive.load(&key).unwrap().map(|a| a.version) == Some(2) {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    // A fresh process with changed content continues at version 3
    let second = TestApp::with_archive(Some(Arc::new(archive)));
    second.crawl("/sale", "Diwali sale, last day", vec![0.9, 0.19f32.sqrt()]);
    let delivery = second.schema("/sale").await;
    assert_eq!(delivery.version, Some(3));
    assert!(!delivery.cached);
}
