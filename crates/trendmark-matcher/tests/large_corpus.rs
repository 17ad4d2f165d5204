//! Matching over a large paged corpus

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use trendmark_domain::{ClientId, ContentDocument, Trend};
use trendmark_matcher::{Matcher, MatcherConfig};
use trendmark_store::memory::MemorySimilarityBackend;
use trendmark_store::{AdapterConfig, ContentIndexAdapter};

const NOW: u64 = 1_700_000_000;

fn document(client: &str, i: usize) -> ContentDocument {
    // Every tenth page is on-topic
    let embedding = if i % 10 == 0 { vec![1.0, 0.0] } else { vec![0.0, 1.0] };
    ContentDocument {
        client_id: ClientId::new(client),
        url: format!("/p/{:05}", i),
        text: format!("page {}", i),
        entities: BTreeMap::new(),
        embedding,
        last_crawled: NOW,
    }
}

#[tokio::test]
async fn test_twenty_thousand_documents_respect_concurrency_cap() {
    let backend = Arc::new(MemorySimilarityBackend::new());
    backend.set_query_embedding("diwali sale", vec![1.0, 0.0]);
    for i in 0..20_000 {
        backend.upsert_document(document("clientA", i));
    }
    backend.set_latency(Duration::from_millis(2));

    let adapter_config = AdapterConfig {
        page_size: 500,
        per_client_concurrency: 4,
        ..Default::default()
    };
    let index = Arc::new(ContentIndexAdapter::new(backend.clone(), adapter_config));
    let matcher = Matcher::new(index, MatcherConfig::default());
    let trend = Trend::new("diwali sale", 50_000, "ecommerce", NOW, 21_600);

    let result = matcher
        .match_client(
            &ClientId::new("clientA"),
            &[trend],
            NOW,
            Instant::now() + Duration::from_secs(30),
        )
        .await
        .unwrap();

    assert_eq!(result.matches.len(), 2_000);
    assert_eq!(result.matches[0].url, "/p/00000");
    assert!(backend.peak_concurrency() <= 4);
}

#[tokio::test]
async fn test_clients_are_matched_independently() {
    let backend = Arc::new(MemorySimilarityBackend::new());
    backend.set_query_embedding("diwali sale", vec![1.0, 0.0]);
    for i in 0..50 {
        backend.upsert_document(document("clientA", i));
        backend.upsert_document(document("clientB", i));
    }
    backend.fail_client(&ClientId::new("clientB"));

    let index = Arc::new(ContentIndexAdapter::new(
        backend.clone(),
        AdapterConfig {
            page_size: 10,
            base_backoff_ms: 1,
            max_backoff_ms: 2,
            ..Default::default()
        },
    ));
    let matcher = Arc::new(Matcher::new(index, MatcherConfig::default()));
    let trends = vec![Trend::new("diwali sale", 50_000, "ecommerce", NOW, 21_600)];
    let deadline = Instant::now() + Duration::from_secs(5);

    let client_a = ClientId::new("clientA");
    let client_b = ClientId::new("clientB");
    let (a, b) = tokio::join!(
        matcher.match_client(&client_a, &trends, NOW, deadline),
        matcher.match_client(&client_b, &trends, NOW, deadline),
    );
    assert_eq!(a.unwrap().matches.len(), 5);
    assert!(b.is_err());

    backend.heal_client(&ClientId::new("clientB"));
    let b = matcher
        .match_client(&ClientId::new("clientB"), &trends, NOW, deadline)
        .await
        .unwrap();
    assert_eq!(b.matches.len(), 5);
}
