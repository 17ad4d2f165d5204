//! Trendmark Domain Layer
//!
//! Core model and collaborator contracts for the trend-aware schema engine.
//! Every other crate in the workspace depends on this one; it holds no
//! infrastructure and performs no I/O.
//!
//! ## Key Concepts
//!
//! - **Trend**: a time-decaying search-interest signal (query, volume, category)
//! - **ContentDocument**: a crawled page of a client site, with its embedding
//! - **Match**: a scored pairing of a trend with a client URL
//! - **Artifact**: the versioned structured-data payload served for a (client, URL)
//! - **Fingerprint**: a digest used to decide whether regeneration is necessary
//!
//! ## Architecture
//!
//! External collaborators (document store, similarity backend, artifact archive)
//! are expressed as traits in [`traits`]; implementations live in `trendmark-store`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod artifact;
pub mod clock;
pub mod content;
pub mod fingerprint;
pub mod ids;
pub mod matching;
pub mod traits;
pub mod trend;

// Re-exports for convenience
pub use artifact::{Artifact, SchemaType};
pub use clock::{Clock, ManualClock, SystemClock};
pub use content::{ContentDocument, DocumentKind};
pub use fingerprint::{Fingerprint, FingerprintBuilder};
pub use ids::{CacheKey, ClientId, JobId, TrendId};
pub use matching::{JobReason, Match, SynthesisJob};
pub use traits::ClientRecord;
pub use trend::{normalize_query, Trend, TrendRecord};
