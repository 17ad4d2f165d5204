//! Error types for adapter operations

use thiserror::Error;
use trendmark_domain::traits::CollaboratorError;

/// Errors that can occur while talking to an external collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    /// Collaborator unreachable after all retries
    #[error("Adapter unavailable after {attempts} attempt(s): {message}")]
    Unavailable {
        /// Attempts made
        attempts: u32,
        /// Last error reported
        message: String,
    },

    /// Deadline expired before the collaborator answered
    #[error("Adapter call timed out: {0}")]
    Timeout(String),

    /// Collaborator rejected the request
    #[error("Adapter request rejected: {0}")]
    Rejected(String),

    /// Record failed validation during normalization
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl AdapterError {
    pub(crate) fn from_collaborator(error: CollaboratorError, attempts: u32) -> Self {
        match error {
            CollaboratorError::Unavailable(message) => AdapterError::Unavailable { attempts, message },
            CollaboratorError::Rejected(message) => AdapterError::Rejected(message),
        }
    }
}
