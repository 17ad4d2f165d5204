//! Trendmark Harvester
//!
//! Periodic trend harvesting and the synthesis pipeline shared with the
//! delivery path.
//!
//! # Overview
//!
//! A harvest cycle:
//! - **Reads active trends** once from the trend store (expired trends are dropped)
//! - **Matches clients** concurrently, bounded by `max_concurrent_clients`
//! - **Primes the cache** with one artifact per matched page, skipping pages
//!   whose artifact was already built from the same fingerprints
//! - **Invalidates** cached artifacts whose trend expired without a replacement match
//! - **Purges** artifacts past their grace window
//!
//! A failing collaborator degrades the affected client for that cycle only;
//! it is retried on the next one.
//!
//! # Job reasons
//!
//! | Reason | Trigger | Cache operation |
//! |--------|---------|-----------------|
//! | `harvested-match` | Harvest cycle | forced refresh, skipped when unchanged |
//! | `cache-miss` | Delivery miss | `get_or_fill` |
//! | `content-changed` | Delivery fingerprint mismatch | forced refresh |
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use trendmark_harvester::{HarvestScheduler, SynthesisPipeline};
//!
//! # async fn demo(pipeline: Arc<SynthesisPipeline>) -> Result<(), Box<dyn std::error::Error>> {
//! let scheduler = HarvestScheduler::new(pipeline);
//!
//! // One cycle, for one client
//! let report = scheduler.run_once(Some(&"clientA".into())).await?;
//! println!("{} primed", report.primed());
//!
//! // Or three cycles back to back
//! scheduler.run_cycles(3).await?;
//! println!("{}", scheduler.metrics().summary());
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! ```
//! use trendmark_harvester::HarvestConfig;
//!
//! // Default: 5 minute cycles, trends expire after 2 half-lives
//! let config = HarvestConfig::default();
//!
//! // Aggressive: 1 minute cycles
//! let config = HarvestConfig::aggressive();
//!
//! // Lenient: 30 minute cycles
//! let config = HarvestConfig::lenient();
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod metrics;
mod pipeline;
mod recent;
mod scheduler;

pub use config::HarvestConfig;
pub use error::HarvestError;
pub use metrics::{ClientReport, ClientStatus, CycleReport, HarvestMetrics};
pub use pipeline::{PrimeOutcome, SynthesisPipeline};
pub use recent::RecentMatches;
pub use scheduler::HarvestScheduler;
