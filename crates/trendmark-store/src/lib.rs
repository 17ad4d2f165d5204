//! Trendmark Storage Layer
//!
//! Adapters between the engine and its external collaborators.
//!
//! # Architecture
//!
//! - [`TrendStoreAdapter`]: normalizes and deduplicates trend records from a
//!   [`DocumentStore`](trendmark_domain::traits::DocumentStore), and resolves client keys
//! - [`ContentIndexAdapter`]: paged, per-client rate-limited access to embedded content
//!   through a [`SimilarityBackend`](trendmark_domain::traits::SimilarityBackend)
//! - [`memory`]: in-memory collaborators used by tests and by the bundled server
//! - [`SqliteArtifactArchive`]: durable artifact storage
//! - [`embedding`]: deterministic hashing embedder for seed data
//!
//! Every adapter call takes a deadline and retries transient failures with
//! exponential backoff (see [`RetryPolicy`]).
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use trendmark_store::{AdapterConfig, TrendStoreAdapter};
//! use trendmark_store::memory::MemoryDocumentStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryDocumentStore::new());
//! let adapter = TrendStoreAdapter::new(store, AdapterConfig::default());
//! let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(1);
//! let trends = adapter.fetch_trends(deadline).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod archive;
mod config;
mod content_index;
pub mod embedding;
mod error;
pub mod memory;
mod retry;
mod trend_store;

pub use archive::SqliteArtifactArchive;
pub use config::AdapterConfig;
pub use content_index::ContentIndexAdapter;
pub use error::AdapterError;
pub use retry::RetryPolicy;
pub use trend_store::TrendStoreAdapter;
