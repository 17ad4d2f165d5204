//! Error types for matching

use thiserror::Error;
use trendmark_store::AdapterError;

/// Errors that can occur while matching a client
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    /// A collaborator call failed; the client is degraded for this cycle
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// A page-scoring task failed to complete
    #[error("Worker error: {0}")]
    Worker(String),
}
