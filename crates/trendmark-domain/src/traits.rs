//! Trait definitions for external collaborators
//!
//! These traits define the boundaries between the engine and the systems it
//! depends on. Implementations live in `trendmark-store` (in-memory and SQLite)
//! or in deployment-specific crates.

use crate::{Artifact, CacheKey, ClientId, ContentDocument, Match, TrendRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by a collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollaboratorError {
    /// The collaborator could not be reached; the call may be retried
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    /// The collaborator rejected the request; retrying will not help
    #[error("Request rejected: {0}")]
    Rejected(String),
}

impl CollaboratorError {
    /// Whether a retry could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, CollaboratorError::Unavailable(_))
    }
}

/// A client record from the document store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    /// Client identifier
    pub id: ClientId,

    /// Public key embedded in the delivery snippet
    pub key: String,

    /// Inactive clients are skipped by the harvest cycle
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Durable store holding trend and client records
///
/// The engine only reads from it; trend records are appended by the external
/// trend harvester and client records by onboarding.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All trend records currently stored (superseded records included)
    async fn trend_records(&self) -> Result<Vec<TrendRecord>, CollaboratorError>;

    /// All client records
    async fn clients(&self) -> Result<Vec<ClientRecord>, CollaboratorError>;
}

/// Embedding and nearest-neighbour backend
///
/// The narrow contract the matcher depends on: text in, vectors out, plus
/// paged access to each client's embedded content.
#[async_trait]
pub trait SimilarityBackend: Send + Sync {
    /// Embed free text (a trend query) into the content vector space
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CollaboratorError>;

    /// Number of content documents indexed for a client
    async fn document_count(&self, client: &ClientId) -> Result<usize, CollaboratorError>;

    /// A page of a client's documents, in a stable order
    async fn documents(
        &self,
        client: &ClientId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ContentDocument>, CollaboratorError>;

    /// A single document by URL
    async fn document(
        &self,
        client: &ClientId,
        url: &str,
    ) -> Result<Option<ContentDocument>, CollaboratorError>;
}

/// Durable channel for artifacts, so the cache survives restarts
///
/// Implementations must never replace a stored artifact with a lower version.
pub trait ArtifactArchive: Send + Sync {
    /// Load the stored artifact for a key
    fn load(&self, key: &CacheKey) -> Result<Option<Artifact>, CollaboratorError>;

    /// Store an artifact if its version is newer than the stored one
    fn save(&self, artifact: &Artifact) -> Result<(), CollaboratorError>;
}

/// Read-only view of recent matches, consumed by downstream content-strategy analysis
pub trait MatchFeed: Send + Sync {
    /// Most recent matches for a client, newest first
    fn recent(&self, client: &ClientId, limit: usize) -> Vec<Match>;
}
