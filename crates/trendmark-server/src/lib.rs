//! Trendmark Server
//!
//! HTTP surface of the engine: schema delivery, harvest trigger, the
//! recent-match feed and health. The harvest scheduler runs in the same
//! process and both stop on Ctrl+C.
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | `GET` | `/schema?clientKey=&url=` | JSON-LD for a page: `{schema, cached, version}` |
//! | `POST` | `/harvest/trigger` | Run one cycle now, optionally `{"client_id": ".."}` |
//! | `GET` | `/matches/recent?clientId=&limit=` | Latest matches for a client |
//! | `GET` | `/health` | Liveness, cache and harvest counters |

#![warn(missing_docs)]

pub mod config;
pub mod delivery;
pub mod handlers;

use config::{ConfigError, ServerConfig};
use delivery::DeliveryService;
use handlers::{create_router, AppState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use trendmark_cache::ArtifactCache;
use trendmark_domain::traits::{ArtifactArchive, CollaboratorError, DocumentStore, SimilarityBackend};
use trendmark_domain::{Clock, SystemClock};
use trendmark_harvester::{HarvestScheduler, SynthesisPipeline};
use trendmark_matcher::Matcher;
use trendmark_store::embedding::HashingEmbedder;
use trendmark_store::memory::{self, SeedData};
use trendmark_store::{ContentIndexAdapter, SqliteArtifactArchive, TrendStoreAdapter};
use trendmark_synthesizer::{Synthesizer, SynthesizerConfig};

/// Server error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Seed data could not be loaded
    #[error("Seed error: {0}")]
    Seed(String),

    /// Artifact archive could not be opened
    #[error("Archive error: {0}")]
    Archive(#[from] CollaboratorError),

    /// Server binding error
    #[error("Failed to bind server: {0}")]
    Bind(#[from] std::io::Error),

    /// Server error
    #[error("Server error: {0}")]
    Server(String),
}

/// Collaborators the engine runs against
pub struct Collaborators {
    /// Trend and client records
    pub store: Arc<dyn DocumentStore>,
    /// Content documents and embeddings
    pub backend: Arc<dyn SimilarityBackend>,
    /// Durable artifact storage, if any
    pub archive: Option<Arc<dyn ArtifactArchive>>,
}

impl Collaborators {
    /// In-memory collaborators from the configured seed, plus the archive
    pub fn from_config(config: &ServerConfig) -> Result<Self, ServerError> {
        let seed = match &config.seed_path {
            Some(path) => SeedData::from_file(path).map_err(ServerError::Seed)?,
            None => SeedData::default(),
        };
        let (store, backend) = memory::from_seed(&seed, HashingEmbedder::new(config.embedding_dimension));
        let archive = match &config.archive_path {
            Some(path) => Some(Arc::new(SqliteArtifactArchive::open(path)?) as Arc<dyn ArtifactArchive>),
            None => None,
        };
        info!(
            "Collaborators: {} clients, {} trends, {} documents, archive {}",
            seed.clients.len(),
            seed.trends.len(),
            seed.documents.len(),
            if archive.is_some() { "on" } else { "off" }
        );
        Ok(Self {
            store,
            backend,
            archive,
        })
    }
}

/// Wire the engine and return the HTTP state
pub fn build_state(
    config: &ServerConfig,
    collaborators: Collaborators,
    clock: Arc<dyn Clock>,
) -> Result<AppState, ServerError> {
    config.validate()?;

    let trends = Arc::new(TrendStoreAdapter::new(collaborators.store, config.adapter.clone()));
    let index = Arc::new(ContentIndexAdapter::new(collaborators.backend, config.adapter.clone()));
    let matcher = Arc::new(Matcher::new(index.clone(), config.matcher.clone()));
    let synthesizer = Arc::new(Synthesizer::new(SynthesizerConfig::with_expiry_multiplier(
        config.harvest.expiry_multiplier,
    )));
    let cache = match collaborators.archive {
        Some(archive) => ArtifactCache::with_archive(config.cache.clone(), clock.clone(), archive),
        None => ArtifactCache::new(config.cache.clone(), clock.clone()),
    };

    let pipeline = Arc::new(SynthesisPipeline::new(
        trends,
        index,
        matcher,
        synthesizer,
        cache,
        clock,
        config.harvest.clone(),
    ));
    let delivery = Arc::new(DeliveryService::new(
        pipeline.clone(),
        config.delivery_timeout(),
        config.fingerprint_timeout(),
    ));
    let scheduler = Arc::new(HarvestScheduler::new(pipeline));

    Ok(AppState {
        delivery,
        scheduler,
    })
}

/// Start the HTTP server and the harvest scheduler
///
/// Runs until Ctrl+C, then stops both.
pub async fn start_server(config: ServerConfig) -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Trendmark server");
    info!("Bind address: {}", config.bind_addr());
    info!(
        "Harvest interval: {}s, relevance threshold: {}",
        config.harvest.interval_secs, config.matcher.threshold
    );

    let collaborators = Collaborators::from_config(&config)?;
    let state = build_state(&config, collaborators, Arc::new(SystemClock))?;

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let scheduler = state.scheduler.clone();
    let harvest = tokio::spawn(async move {
        let stopped = async move {
            let _ = shutdown_rx.changed().await;
        };
        if let Err(e) = scheduler.run_until(stopped).await {
            warn!("Harvest scheduler exited: {}", e);
        }
    });

    let app = create_router(state);
    let listener = TcpListener::bind(&config.bind_addr()).await?;
    info!("Server listening on {}", config.bind_addr());

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await
        .map_err(|e| ServerError::Server(e.to_string()));

    let _ = shutdown_tx.send(true);
    if let Err(e) = harvest.await {
        warn!("Harvest task failed: {}", e);
    }
    served
}

#[cfg(test)]
mod tests {
    use super::*;
    use trendmark_domain::ManualClock;

    #[test]
    fn test_build_state_from_test_config() {
        let config = ServerConfig::default_test_config();
        let collaborators = Collaborators::from_config(&config).unwrap();
        let state = build_state(&config, collaborators, Arc::new(ManualClock::new(0))).unwrap();
        assert!(state.delivery.pipeline().cache().is_empty());
        assert_eq!(state.scheduler.metrics().cycles, 0);
    }

    #[test]
    fn test_missing_seed_file() {
        let mut config = ServerConfig::default_test_config();
        config.seed_path = Some("does/not/exist.json".into());
        assert!(matches!(
            Collaborators::from_config(&config),
            Err(ServerError::Seed(_))
        ));
    }
}
