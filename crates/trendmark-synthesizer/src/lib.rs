//! Trendmark Schema Synthesizer
//!
//! Turns a match into a schema.org JSON-LD artifact.
//!
//! # Pipeline
//!
//! 1. **Decide** the schema type from the trend category and document kind
//!    ([`decision`])
//! 2. **Build** the payload from the document's extracted entities; missing
//!    required entities fail with [`SynthesisError::IncompleteData`]
//!    ([`builder`])
//! 3. **Validate** the payload structurally; any violation fails with
//!    [`SynthesisError::Validation`] ([`validator`])
//! 4. **Stamp** fingerprints, version and trend expiry
//!
//! A partial artifact is never produced. If the previous artifact was built
//! from identical inputs it is returned as is, so repeated jobs do not bump
//! versions.
//!
//! # Examples
//!
//! ```
//! use std::collections::BTreeMap;
//! use trendmark_domain::{ClientId, ContentDocument, JobReason, Match, SynthesisJob, Trend};
//! use trendmark_synthesizer::{SynthesisInput, Synthesizer};
//!
//! let trend = Trend::new("diwali sale", 50_000, "ecommerce", 0, 21_600);
//! let document = ContentDocument {
//!     client_id: ClientId::new("clientA"),
//!     url: "/sale".into(),
//!     text: "Diwali sale".into(),
//!     entities: BTreeMap::from([
//!         ("name".to_string(), "Diwali Sale".to_string()),
//!         ("price".to_string(), "499".to_string()),
//!         ("currency".to_string(), "INR".to_string()),
//!     ]),
//!     embedding: vec![],
//!     last_crawled: 0,
//! };
//! let matched = Match {
//!     trend_id: trend.id.clone(),
//!     client_id: document.client_id.clone(),
//!     url: document.url.clone(),
//!     score: 0.9,
//!     matched_at: 0,
//! };
//! let job = SynthesisJob::new(document.key(), trend.id.clone(), JobReason::HarvestedMatch);
//!
//! let input = SynthesisInput { job: &job, matched: &matched, trend: &trend, document: &document };
//! let artifact = Synthesizer::default_config().synthesize(input, None, 0, 0).unwrap();
//! assert_eq!(artifact.version, 1);
//! assert_eq!(artifact.payload["@type"], "Offer");
//! ```

#![warn(missing_docs)]

pub mod builder;
mod config;
pub mod decision;
mod error;
mod synthesizer;
pub mod validator;

pub use config::SynthesizerConfig;
pub use error::SynthesisError;
pub use synthesizer::{SynthesisInput, Synthesizer};
