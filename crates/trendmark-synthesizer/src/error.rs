//! Error types for schema synthesis

use thiserror::Error;

/// Errors that can occur during synthesis
///
/// Every variant means no artifact was produced; the job is dropped and the
/// cache is left untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SynthesisError {
    /// The document lacks entities required by the chosen schema type
    #[error("Incomplete data for {schema_type}: missing {}", missing.join(", "))]
    IncompleteData {
        /// schema.org type that was chosen
        schema_type: String,
        /// Missing or blank entity names
        missing: Vec<String>,
    },

    /// The built payload failed structural validation
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Job, match, trend and document do not describe the same thing
    #[error("Inconsistent input: {0}")]
    Inconsistent(String),
}
