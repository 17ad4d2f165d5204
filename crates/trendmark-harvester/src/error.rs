//! Error types for harvest cycles

use thiserror::Error;
use trendmark_store::AdapterError;

/// Errors that abort a whole harvest cycle
///
/// Failures scoped to one client degrade that client only and are reported
/// in the [`CycleReport`](crate::CycleReport) instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HarvestError {
    /// The trend store or client directory could not be read
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// A client filter named a client that is not active
    #[error("Unknown or inactive client: {0}")]
    UnknownClient(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Worker error (tokio runtime issues)
    #[error("Worker error: {0}")]
    Worker(String),
}
