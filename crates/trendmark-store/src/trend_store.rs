//! Trend Store Adapter: normalization, deduplication and client lookup

use crate::{AdapterConfig, AdapterError, RetryPolicy};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, warn};
use trendmark_domain::traits::{ClientRecord, DocumentStore};
use trendmark_domain::{normalize_query, ClientId, Trend, TrendRecord};

/// Reads trends and clients from the external document store
///
/// Trend records are normalized (query text, category) and deduplicated by
/// normalized query: a later observation supersedes an earlier one. Client
/// records are cached in a directory refreshed on every [`active_clients`]
/// call and on unknown keys. A key that is still unknown after a refresh is
/// remembered for `unknown_key_ttl_secs` and answered without touching the
/// store.
///
/// [`active_clients`]: TrendStoreAdapter::active_clients
pub struct TrendStoreAdapter {
    store: Arc<dyn DocumentStore>,
    config: AdapterConfig,
    retry: RetryPolicy,
    directory: RwLock<HashMap<String, ClientRecord>>,
    unknown_keys: Mutex<HashMap<String, Instant>>,
}

/// Upper bound on remembered unknown keys
const MAX_UNKNOWN_KEYS: usize = 10_000;

impl TrendStoreAdapter {
    /// Create an adapter over a document store
    pub fn new(store: Arc<dyn DocumentStore>, config: AdapterConfig) -> Self {
        let retry = config.retry_policy();
        Self {
            store,
            config,
            retry,
            directory: RwLock::new(HashMap::new()),
            unknown_keys: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch, normalize and deduplicate all stored trends
    ///
    /// Records with an empty normalized query are dropped. The result is sorted
    /// by query for deterministic processing.
    pub async fn fetch_trends(&self, deadline: Instant) -> Result<Vec<Trend>, AdapterError> {
        let records = self
            .retry
            .run("trend_records", deadline, || self.store.trend_records())
            .await?;

        let total = records.len();
        let mut latest: HashMap<String, Trend> = HashMap::new();
        for record in records {
            let trend = match self.normalize(record) {
                Ok(trend) => trend,
                Err(e) => {
                    warn!("Skipping trend record: {}", e);
                    continue;
                }
            };
            match latest.get(&trend.query) {
                Some(existing) if !supersedes(&trend, existing) => {}
                _ => {
                    latest.insert(trend.query.clone(), trend);
                }
            }
        }

        let mut trends: Vec<Trend> = latest.into_values().collect();
        trends.sort_by(|a, b| a.query.cmp(&b.query));
        debug!("Normalized {} trend records into {} trends", total, trends.len());
        Ok(trends)
    }

    /// Trends that have not expired at `now`
    pub async fn active_trends(
        &self,
        now: u64,
        expiry_multiplier: f64,
        deadline: Instant,
    ) -> Result<Vec<Trend>, AdapterError> {
        let mut trends = self.fetch_trends(deadline).await?;
        trends.retain(|t| !t.is_expired(now, expiry_multiplier));
        Ok(trends)
    }

    /// Normalize one raw record into a trend
    pub fn normalize(&self, record: TrendRecord) -> Result<Trend, AdapterError> {
        let query = normalize_query(&record.query);
        if query.is_empty() {
            return Err(AdapterError::InvalidRecord(format!(
                "query '{}' is empty after normalization",
                record.query
            )));
        }
        let category = record.category.trim().to_lowercase();
        let half_life = record
            .half_life_secs
            .filter(|h| *h > 0)
            .unwrap_or(self.config.default_half_life_secs);
        Ok(Trend::new(query, record.volume, category, record.timestamp, half_life))
    }

    /// Refresh the client directory and return the active client ids
    pub async fn active_clients(&self, deadline: Instant) -> Result<Vec<ClientId>, AdapterError> {
        let records = self.refresh_directory(deadline).await?;
        let mut ids: Vec<ClientId> = records
            .into_iter()
            .filter(|c| c.active)
            .map(|c| c.id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Resolve a public client key to an active client id
    ///
    /// Unknown keys trigger one directory refresh before giving up, unless the
    /// same key was already refused within `unknown_key_ttl_secs`.
    pub async fn resolve_client_key(
        &self,
        key: &str,
        deadline: Instant,
    ) -> Result<Option<ClientId>, AdapterError> {
        if let Some(id) = self.lookup_key(key) {
            return Ok(Some(id));
        }
        if self.recently_refused(key) {
            debug!("Client key refused from memory");
            return Ok(None);
        }
        self.refresh_directory(deadline).await?;
        let resolved = self.lookup_key(key);
        if resolved.is_none() {
            self.remember_refused(key);
        }
        Ok(resolved)
    }

    fn recently_refused(&self, key: &str) -> bool {
        let unknown = self.unknown_keys.lock().expect("unknown key lock poisoned");
        unknown
            .get(key)
            .is_some_and(|expires| Instant::now() < *expires)
    }

    fn remember_refused(&self, key: &str) {
        let ttl = self.config.unknown_key_ttl();
        if ttl.is_zero() {
            return;
        }
        let now = Instant::now();
        let mut unknown = self.unknown_keys.lock().expect("unknown key lock poisoned");
        if unknown.len() >= MAX_UNKNOWN_KEYS {
            unknown.retain(|_, expires| now < *expires);
            if unknown.len() >= MAX_UNKNOWN_KEYS {
                unknown.clear();
            }
        }
        unknown.insert(key.to_string(), now + ttl);
    }

    fn lookup_key(&self, key: &str) -> Option<ClientId> {
        let directory = self.directory.read().expect("client directory lock poisoned");
        directory
            .get(key)
            .filter(|c| c.active)
            .map(|c| c.id.clone())
    }

    async fn refresh_directory(&self, deadline: Instant) -> Result<Vec<ClientRecord>, AdapterError> {
        let records = self
            .retry
            .run("clients", deadline, || self.store.clients())
            .await?;
        let mut directory = self.directory.write().expect("client directory lock poisoned");
        *directory = records
            .iter()
            .map(|c| (c.key.clone(), c.clone()))
            .collect();
        Ok(records)
    }
}

/// Later observations win; equal timestamps keep the larger volume
fn supersedes(candidate: &Trend, existing: &Trend) -> bool {
    (candidate.observed_at, candidate.volume) > (existing.observed_at, existing.volume)
}
