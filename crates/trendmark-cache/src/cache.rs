//! Single-flight artifact cache

use crate::lru::LruIndex;
use crate::stats::{CacheStats, CacheStatsSnapshot};
use crate::{CacheConfig, CacheError};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};
use trendmark_domain::traits::ArtifactArchive;
use trendmark_domain::{Artifact, CacheKey, ClientId, Clock};

type FillResult = Result<Arc<Artifact>, CacheError>;

/// State handed to a fill function
#[derive(Debug, Clone, Default)]
pub struct FillContext {
    /// The artifact currently authoritative for the key, if any (possibly
    /// expired, possibly loaded from the archive)
    pub previous: Option<Arc<Artifact>>,

    /// Highest version ever issued for the key
    pub last_version: u64,
}

/// Result of a non-blocking lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Unexpired artifact
    Fresh(Arc<Artifact>),
    /// Expired, but still inside the grace window
    Stale(Arc<Artifact>),
    /// Nothing servable
    Miss,
}

/// Where a [`Filled`] artifact came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Fresh cache hit
    Cached,
    /// Stale hit inside the grace window; a background refill was started
    Stale,
    /// This caller's fill produced it
    Synthesized,
    /// Another caller's in-flight fill produced it
    Joined,
}

/// Artifact returned by [`ArtifactCache::get_or_fill`] and [`ArtifactCache::refresh`]
#[derive(Debug, Clone)]
pub struct Filled {
    /// The artifact
    pub artifact: Arc<Artifact>,
    /// How it was obtained
    pub origin: Origin,
}

impl Filled {
    /// True for fresh and stale hits
    pub fn from_cache(&self) -> bool {
        matches!(self.origin, Origin::Cached | Origin::Stale)
    }
}

struct State {
    entries: HashMap<CacheKey, Arc<Artifact>>,
    lru: LruIndex<CacheKey>,
    inflight: HashMap<CacheKey, watch::Receiver<Option<FillResult>>>,
    // Last version of keys no longer held (evicted or invalidated)
    floors: HashMap<CacheKey, u64>,
}

struct CacheInner {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    archive: Option<Arc<dyn ArtifactArchive>>,
    state: Mutex<State>,
    stats: CacheStats,
}

enum Attach {
    Ready(Arc<Artifact>),
    Wait(watch::Receiver<Option<FillResult>>, bool),
}

/// Cache of artifacts keyed by (client, URL)
///
/// - **Single-flight**: at most one fill runs per key. Fills run in spawned
///   tasks; concurrent callers attach to the running fill and all receive its
///   result or error.
/// - **Monotonic**: a commit only replaces an entry with a higher version, and
///   keys that were evicted or invalidated remember their last version.
/// - **Deadlines**: a fill that misses its deadline writes nothing and every
///   waiter gets [`CacheError::Timeout`]. A waiter with a shorter deadline than
///   the fill gives up on its own without cancelling the fill.
/// - **Stale-while-revalidate**: expired artifacts are served for
///   `grace_secs` while one background refill runs.
///
/// Cloning is cheap; clones share the same cache.
#[derive(Clone)]
pub struct ArtifactCache {
    inner: Arc<CacheInner>,
}

impl ArtifactCache {
    /// Create an in-memory cache
    pub fn new(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self::build(config, clock, None)
    }

    /// Create a cache that writes committed artifacts through to an archive
    ///
    /// On a miss the archive is consulted for the previous artifact, so
    /// versions stay monotonic across restarts.
    pub fn with_archive(
        config: CacheConfig,
        clock: Arc<dyn Clock>,
        archive: Arc<dyn ArtifactArchive>,
    ) -> Self {
        Self::build(config, clock, Some(archive))
    }

    fn build(config: CacheConfig, clock: Arc<dyn Clock>, archive: Option<Arc<dyn ArtifactArchive>>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                config,
                clock,
                archive,
                state: Mutex::new(State {
                    entries: HashMap::new(),
                    lru: LruIndex::new(),
                    inflight: HashMap::new(),
                    floors: HashMap::new(),
                }),
                stats: CacheStats::default(),
            }),
        }
    }

    /// Cache configuration
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Current time from the cache's clock
    pub fn now(&self) -> u64 {
        self.inner.clock.now()
    }

    /// Servable artifact for a key (fresh or within grace)
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Artifact>> {
        match self.lookup(key) {
            Lookup::Fresh(artifact) | Lookup::Stale(artifact) => Some(artifact),
            Lookup::Miss => None,
        }
    }

    /// Classify the cached artifact for a key
    pub fn lookup(&self, key: &CacheKey) -> Lookup {
        let now = self.now();
        let mut state = self.inner.lock();
        let lookup = match state.entries.get(key).cloned() {
            Some(artifact) if !artifact.is_expired(now) => Lookup::Fresh(artifact),
            Some(artifact) if now <= artifact.trend_expires_at.saturating_add(self.inner.config.grace_secs) => {
                Lookup::Stale(artifact)
            }
            _ => Lookup::Miss,
        };
        match &lookup {
            Lookup::Fresh(_) => {
                state.lru.touch(key);
                CacheStats::bump(&self.inner.stats.hits);
            }
            Lookup::Stale(_) => {
                state.lru.touch(key);
                CacheStats::bump(&self.inner.stats.stale_hits);
            }
            Lookup::Miss => CacheStats::bump(&self.inner.stats.misses),
        }
        lookup
    }

    /// The held artifact for a key, regardless of expiry, without touching recency
    pub fn peek(&self, key: &CacheKey) -> Option<Arc<Artifact>> {
        self.inner.lock().entries.get(key).cloned()
    }

    /// Serve from cache or fill
    ///
    /// - fresh hit: returned as [`Origin::Cached`]
    /// - stale hit: returned as [`Origin::Stale`] and a background refill runs
    /// - miss: waits for a fill (this caller's, or one already in flight)
    pub async fn get_or_fill<F, Fut>(
        &self,
        key: CacheKey,
        deadline: Instant,
        fill: F,
    ) -> Result<Filled, CacheError>
    where
        F: FnOnce(FillContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Artifact, CacheError>> + Send + 'static,
    {
        match self.lookup(&key) {
            Lookup::Fresh(artifact) => {
                return Ok(Filled {
                    artifact,
                    origin: Origin::Cached,
                })
            }
            Lookup::Stale(artifact) => {
                let background = Instant::now() + self.inner.config.background_fill_timeout();
                debug!("Serving stale {} v{}, refilling", key, artifact.version);
                let _ = self.attach(key, background, fill, true);
                return Ok(Filled {
                    artifact,
                    origin: Origin::Stale,
                });
            }
            Lookup::Miss => {}
        }
        self.fill_and_wait(key, deadline, fill, false).await
    }

    /// Regenerate a key even if a fresh artifact is cached
    ///
    /// Joins a fill already in flight instead of starting a second one.
    pub async fn refresh<F, Fut>(
        &self,
        key: CacheKey,
        deadline: Instant,
        fill: F,
    ) -> Result<Filled, CacheError>
    where
        F: FnOnce(FillContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Artifact, CacheError>> + Send + 'static,
    {
        self.fill_and_wait(key, deadline, fill, true).await
    }

    async fn fill_and_wait<F, Fut>(
        &self,
        key: CacheKey,
        deadline: Instant,
        fill: F,
        force: bool,
    ) -> Result<Filled, CacheError>
    where
        F: FnOnce(FillContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Artifact, CacheError>> + Send + 'static,
    {
        let (receiver, leader) = match self.attach(key, deadline, fill, force) {
            Attach::Ready(artifact) => {
                return Ok(Filled {
                    artifact,
                    origin: Origin::Cached,
                })
            }
            Attach::Wait(receiver, leader) => (receiver, leader),
        };

        let artifact = match timeout_at(deadline, wait(receiver)).await {
            Ok(result) => result?,
            Err(_) => return Err(CacheError::Timeout),
        };
        Ok(Filled {
            artifact,
            origin: if leader { Origin::Synthesized } else { Origin::Joined },
        })
    }

    /// Attach to the key's in-flight fill or start one
    fn attach<F, Fut>(&self, key: CacheKey, deadline: Instant, fill: F, force: bool) -> Attach
    where
        F: FnOnce(FillContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Artifact, CacheError>> + Send + 'static,
    {
        let now = self.now();
        let mut state = self.inner.lock();

        if let Some(receiver) = state.inflight.get(&key) {
            CacheStats::bump(&self.inner.stats.joined);
            return Attach::Wait(receiver.clone(), false);
        }

        // A fill may have committed between the caller's lookup and now
        if !force {
            if let Some(artifact) = state.entries.get(&key) {
                if !artifact.is_expired(now) {
                    return Attach::Ready(artifact.clone());
                }
            }
        }

        let (sender, receiver) = watch::channel(None);
        state.inflight.insert(key.clone(), receiver.clone());
        drop(state);
        CacheStats::bump(&self.inner.stats.fills);

        let inner = self.inner.clone();
        tokio::spawn(async move {
            let guard = InflightGuard {
                inner: inner.clone(),
                key: key.clone(),
            };
            let context = inner.fill_context(&key).await;

            let outcome = match timeout_at(deadline, fill(context)).await {
                Err(_) => {
                    CacheStats::bump(&inner.stats.timeouts);
                    warn!("Fill for {} timed out", key);
                    Err(CacheError::Timeout)
                }
                Ok(Err(e)) => {
                    CacheStats::bump(&inner.stats.failures);
                    debug!("Fill for {} failed: {}", key, e);
                    Err(e)
                }
                Ok(Ok(artifact)) => inner.commit(artifact).await,
            };

            drop(guard);
            let _ = sender.send(Some(outcome));
        });

        Attach::Wait(receiver, true)
    }

    /// Store an artifact directly
    ///
    /// Returns the artifact authoritative afterwards: `artifact` if it was
    /// newer, otherwise the one already held.
    pub async fn put(&self, artifact: Artifact) -> Result<Arc<Artifact>, CacheError> {
        self.inner.commit(artifact).await
    }

    /// Drop a key, remembering its version so later fills continue from it
    ///
    /// The archive keeps its copy.
    pub fn invalidate(&self, key: &CacheKey) -> Option<Arc<Artifact>> {
        let mut state = self.inner.lock();
        let removed = state.entries.remove(key);
        if let Some(artifact) = &removed {
            state.lru.remove(key);
            state.set_floor(key, artifact.version);
            debug!("Invalidated {} at v{}", key, artifact.version);
        }
        removed
    }

    /// Drop every artifact past its grace window; returns how many
    pub fn purge_expired(&self) -> usize {
        let now = self.now();
        let grace = self.inner.config.grace_secs;
        let mut state = self.inner.lock();
        let expired: Vec<(CacheKey, u64)> = state
            .entries
            .iter()
            .filter(|(_, a)| now > a.trend_expires_at.saturating_add(grace))
            .map(|(k, a)| (k.clone(), a.version))
            .collect();
        for (key, version) in &expired {
            state.entries.remove(key);
            state.lru.remove(key);
            state.set_floor(key, *version);
        }
        expired.len()
    }

    /// Cached keys belonging to a client, sorted by URL
    pub fn keys_for_client(&self, client: &ClientId) -> Vec<CacheKey> {
        let state = self.inner.lock();
        let mut keys: Vec<CacheKey> = state
            .entries
            .keys()
            .filter(|k| &k.client_id == client)
            .cloned()
            .collect();
        keys.sort_by(|a, b| a.url.cmp(&b.url));
        keys
    }

    /// Highest version issued for a key that this cache knows of
    pub fn last_version(&self, key: &CacheKey) -> u64 {
        self.inner.lock().last_version(key)
    }

    /// True if a fill is running for the key
    pub fn is_filling(&self, key: &CacheKey) -> bool {
        self.inner.lock().inflight.contains_key(key)
    }

    /// Number of cached artifacts
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// True if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counter snapshot
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.inner.stats.snapshot()
    }
}

impl State {
    fn last_version(&self, key: &CacheKey) -> u64 {
        let held = self.entries.get(key).map(|a| a.version).unwrap_or(0);
        held.max(self.floors.get(key).copied().unwrap_or(0))
    }

    fn set_floor(&mut self, key: &CacheKey, version: u64) {
        let floor = self.floors.entry(key.clone()).or_insert(0);
        *floor = (*floor).max(version);
    }
}

impl CacheInner {
    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("cache state lock poisoned")
    }

    async fn fill_context(&self, key: &CacheKey) -> FillContext {
        let (previous, known) = {
            let state = self.lock();
            (state.entries.get(key).cloned(), state.last_version(key))
        };
        if previous.is_some() {
            return FillContext {
                previous,
                last_version: known,
            };
        }

        let archived = match &self.archive {
            Some(archive) => {
                let archive = archive.clone();
                let lookup_key = key.clone();
                match tokio::task::spawn_blocking(move || archive.load(&lookup_key)).await {
                    Ok(Ok(found)) => found.map(Arc::new),
                    Ok(Err(e)) => {
                        warn!("Archive lookup for {} failed: {}", key, e);
                        None
                    }
                    Err(e) => {
                        warn!("Archive lookup for {} panicked: {}", key, e);
                        None
                    }
                }
            }
            None => None,
        };
        // An archive copy older than what this cache has seen is not authoritative
        let archived = archived.filter(|a| a.version >= known);
        let last_version = archived.as_ref().map(|a| a.version).unwrap_or(0).max(known);
        FillContext {
            previous: archived,
            last_version,
        }
    }

    /// Apply the monotonic commit rule and write through to the archive
    ///
    /// An artifact not newer than the held one leaves the entry untouched and
    /// the held one is returned. An artifact for an absent key is refused if
    /// it is older than the version the key last had.
    async fn commit(&self, artifact: Artifact) -> Result<Arc<Artifact>, CacheError> {
        let key = artifact.key.clone();
        let (committed, evicted) = {
            let mut state = self.lock();
            match state.entries.get(&key).cloned() {
                Some(current) if artifact.version <= current.version => {
                    debug!("Kept {} v{}; offered v{}", key, current.version, artifact.version);
                    return Ok(current);
                }
                Some(_) => {}
                None => {
                    let floor = state.floors.get(&key).copied().unwrap_or(0);
                    if artifact.version < floor {
                        return Err(CacheError::Rejected(format!(
                            "{} v{} is older than v{}",
                            key, artifact.version, floor
                        )));
                    }
                }
            }

            let artifact = Arc::new(artifact);
            state.entries.insert(key.clone(), artifact.clone());
            state.floors.remove(&key);
            state.lru.touch(&key);

            let mut evicted = Vec::new();
            while state.entries.len() > self.config.capacity {
                let Some(oldest) = state.lru.pop_oldest() else {
                    break;
                };
                if let Some(old) = state.entries.remove(&oldest) {
                    state.set_floor(&oldest, old.version);
                    evicted.push(oldest);
                }
            }
            (artifact, evicted)
        };

        for old in &evicted {
            CacheStats::bump(&self.stats.evictions);
            debug!("Evicted {}", old);
        }

        if let Some(archive) = &self.archive {
            let archive = archive.clone();
            let to_save = committed.clone();
            match tokio::task::spawn_blocking(move || archive.save(&to_save)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Archive write for {} failed: {}", key, e),
                Err(e) => warn!("Archive write for {} panicked: {}", key, e),
            }
        }
        debug!("Committed {} v{}", key, committed.version);
        Ok(committed)
    }
}

/// Removes the in-flight marker when a fill task ends, even by panic
struct InflightGuard {
    inner: Arc<CacheInner>,
    key: CacheKey,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        if let Ok(mut state) = self.inner.state.lock() {
            state.inflight.remove(&self.key);
        }
    }
}

async fn wait(mut receiver: watch::Receiver<Option<FillResult>>) -> FillResult {
    match receiver.wait_for(Option::is_some).await {
        Ok(value) => value.clone().unwrap_or(Err(CacheError::Aborted)),
        Err(_) => Err(CacheError::Aborted),
    }
}
