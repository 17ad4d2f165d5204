//! HTTP request handlers.
//!
//! Delivery, harvest trigger, recent-match feed and health endpoints using axum.

use crate::delivery::{Delivery, DeliveryError, DeliveryService};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router as AxumRouter,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use trendmark_cache::CacheStatsSnapshot;
use trendmark_domain::traits::MatchFeed;
use trendmark_domain::{ClientId, Match};
use trendmark_harvester::{CycleReport, HarvestError, HarvestMetrics, HarvestScheduler};

/// Default number of matches returned by the recent-match feed
pub const DEFAULT_RECENT_LIMIT: usize = 20;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Delivery service
    pub delivery: Arc<DeliveryService>,
    /// Harvest scheduler (trigger, metrics, recent matches)
    pub scheduler: Arc<HarvestScheduler>,
}

/// Query of `GET /schema`
#[derive(Debug, Deserialize)]
pub struct SchemaQuery {
    /// Public client key
    #[serde(rename = "clientKey")]
    pub client_key: Option<String>,
    /// Page URL
    pub url: Option<String>,
}

/// Body of `POST /harvest/trigger`
#[derive(Debug, Default, Deserialize)]
pub struct TriggerRequest {
    /// Restrict the cycle to one client
    #[serde(default)]
    pub client_id: Option<String>,
}

/// Query of `GET /matches/recent`
#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    /// Client id
    #[serde(rename = "clientId")]
    pub client_id: String,
    /// Maximum number of matches
    pub limit: Option<usize>,
}

/// Response of `GET /matches/recent`
#[derive(Debug, Serialize, Deserialize)]
pub struct RecentResponse {
    /// Client id
    pub client_id: ClientId,
    /// Latest matches, newest cycle first
    pub matches: Vec<Match>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// Overall health status
    pub status: String,
    /// Artifacts currently cached
    pub cache_entries: usize,
    /// Cache counters
    pub cache: CacheStatsSnapshot,
    /// Harvest counters
    pub harvest: HarvestMetrics,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// Delivery request could not be served
    Delivery(DeliveryError),
    /// Harvest cycle could not run
    Harvest(HarvestError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Delivery(DeliveryError::MissingKey | DeliveryError::MissingUrl) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Delivery(DeliveryError::UnknownClient) => StatusCode::UNAUTHORIZED,
            AppError::Delivery(DeliveryError::Directory(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Harvest(HarvestError::UnknownClient(_)) => StatusCode::NOT_FOUND,
            AppError::Harvest(HarvestError::Adapter(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Harvest(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match self {
            AppError::Delivery(e) => e.to_string(),
            AppError::Harvest(e) => e.to_string(),
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

impl From<DeliveryError> for AppError {
    fn from(e: DeliveryError) -> Self {
        AppError::Delivery(e)
    }
}

impl From<HarvestError> for AppError {
    fn from(e: HarvestError) -> Self {
        AppError::Harvest(e)
    }
}

/// GET /schema - JSON-LD for a client page
async fn get_schema(
    State(state): State<AppState>,
    Query(query): Query<SchemaQuery>,
) -> Result<Json<Delivery>, AppError> {
    let client_key = query.client_key.ok_or(DeliveryError::MissingKey)?;
    let url = query.url.ok_or(DeliveryError::MissingUrl)?;
    let delivery = state.delivery.deliver(&client_key, &url).await?;
    Ok(Json(delivery))
}

/// POST /harvest/trigger - Run one harvest cycle now
async fn trigger_harvest(
    State(state): State<AppState>,
    request: Option<Json<TriggerRequest>>,
) -> Result<Json<CycleReport>, AppError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let filter = request.client_id.map(ClientId::new);
    let report = state.scheduler.run_once(filter.as_ref()).await?;
    Ok(Json(report))
}

/// GET /matches/recent - Latest matches for a client
async fn recent_matches(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Json<RecentResponse> {
    let client_id = ClientId::new(query.client_id);
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    let matches = state.scheduler.recent().recent(&client_id, limit);
    Json(RecentResponse { client_id, matches })
}

/// GET /health - Liveness and counters
async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    let cache = state.delivery.pipeline().cache();
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        cache_entries: cache.len(),
        cache: cache.stats(),
        harvest: state.scheduler.metrics(),
    })
}

/// Create the axum router with all routes
pub fn create_router(state: AppState) -> AxumRouter {
    AxumRouter::new()
        .route("/schema", get(get_schema))
        .route("/harvest/trigger", post(trigger_harvest))
        .route("/matches/recent", get(recent_matches))
        .route("/health", get(health_check))
        .with_state(state)
}
