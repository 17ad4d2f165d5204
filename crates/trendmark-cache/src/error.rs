//! Error types for cache fills

use thiserror::Error;

/// Outcome of a failed fill, broadcast to every attached waiter
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    /// The fill (or this waiter) ran past its deadline; nothing was written
    #[error("Fill timed out")]
    Timeout,

    /// There is nothing to synthesize for the key
    #[error("Not found: {0}")]
    NotFound(String),

    /// Synthesis rejected the inputs (incomplete data, failed validation)
    #[error("Fill rejected: {0}")]
    Rejected(String),

    /// A collaborator needed by the fill was unavailable
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    /// The fill task ended without reporting a result
    #[error("Fill aborted")]
    Aborted,
}
