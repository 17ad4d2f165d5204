//! Trendmark Artifact Cache
//!
//! Low-latency store of synthesized artifacts keyed by (client, URL), and the
//! only shared mutable resource of the engine.
//!
//! # Guarantees
//!
//! | Property | Mechanism |
//! |----------|-----------|
//! | One regeneration per key at a time | in-flight map of `watch` channels; fills run in spawned tasks |
//! | Versions never go backwards | commit only replaces with a higher version; evicted and invalidated keys keep a version floor |
//! | No half-written entries | a fill's result is committed under one lock, or not at all |
//! | Bounded size | LRU eviction at `capacity` |
//! | Expiry | artifacts expire with their source trend; stale ones are served for `grace_secs` while refilling |
//!
//! With an [`ArtifactArchive`](trendmark_domain::traits::ArtifactArchive)
//! attached, commits are written through and cold misses consult the archive
//! for the previous artifact.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use trendmark_cache::{ArtifactCache, CacheConfig, CacheError, FillContext};
//! use trendmark_domain::{CacheKey, ClientId, SystemClock};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let cache = ArtifactCache::new(CacheConfig::default(), Arc::new(SystemClock));
//! let key = CacheKey::new(ClientId::new("clientA"), "/sale");
//! let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
//!
//! let result = cache
//!     .get_or_fill(key, deadline, |_ctx: FillContext| async {
//!         Err(CacheError::NotFound("no matching trend".into()))
//!     })
//!     .await;
//! assert!(matches!(result, Err(CacheError::NotFound(_))));
//! assert!(cache.is_empty());
//! # }
//! ```

#![warn(missing_docs)]

mod cache;
mod config;
mod error;
mod lru;
mod stats;

pub use cache::{ArtifactCache, FillContext, Filled, Lookup, Origin};
pub use config::CacheConfig;
pub use error::CacheError;
pub use stats::{CacheStats, CacheStatsSnapshot};
