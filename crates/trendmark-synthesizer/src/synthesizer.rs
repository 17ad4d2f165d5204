//! Artifact synthesis

use crate::builder::build_payload;
use crate::decision::choose_schema;
use crate::validator::validate;
use crate::{SynthesisError, SynthesizerConfig};
use tracing::debug;
use trendmark_domain::{Artifact, ContentDocument, Match, SynthesisJob, Trend};

/// Everything a job needs, resolved by the caller
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    /// The job being executed
    pub job: &'a SynthesisJob,
    /// The match that triggered it
    pub matched: &'a Match,
    /// The matched trend
    pub trend: &'a Trend,
    /// The matched page
    pub document: &'a ContentDocument,
}

/// Turns matches into validated, versioned artifacts
pub struct Synthesizer {
    config: SynthesizerConfig,
}

impl Synthesizer {
    /// Create a synthesizer
    pub fn new(config: SynthesizerConfig) -> Self {
        Self { config }
    }

    /// Create a synthesizer with default configuration
    pub fn default_config() -> Self {
        Self::new(SynthesizerConfig::default())
    }

    /// Synthesizer configuration
    pub fn config(&self) -> &SynthesizerConfig {
        &self.config
    }

    /// Synthesize the artifact for a job
    ///
    /// `previous` is the artifact currently authoritative for the key (if
    /// any) and `last_version` the highest version ever issued for it. When
    /// `previous` was built from the same content and trend fingerprints it is
    /// returned unchanged; otherwise the new artifact gets the next version.
    pub fn synthesize(
        &self,
        input: SynthesisInput<'_>,
        previous: Option<&Artifact>,
        last_version: u64,
        now: u64,
    ) -> Result<Artifact, SynthesisError> {
        check_consistency(&input)?;

        let SynthesisInput {
            job,
            trend,
            document,
            ..
        } = input;
        let content_fingerprint = document.fingerprint();
        let trend_fingerprint = trend.fingerprint();

        if let Some(previous) = previous {
            if previous.built_from(&content_fingerprint, &trend_fingerprint) {
                debug!("{} unchanged at v{} ({})", job.key, previous.version, job.reason);
                return Ok(previous.clone());
            }
        }

        let schema_type = choose_schema(&trend.category, document.kind());
        let payload = build_payload(schema_type, trend, document)?;
        validate(schema_type, &payload).map_err(|violations| {
            SynthesisError::Validation(
                violations
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;

        let base = previous.map(|p| p.version).unwrap_or(0).max(last_version);
        let artifact = Artifact {
            key: job.key.clone(),
            payload,
            schema_type,
            source_trend_id: trend.id.clone(),
            generated_at: now,
            content_fingerprint,
            trend_fingerprint,
            version: base + 1,
            trend_expires_at: trend.expires_at(self.config.expiry_multiplier),
        };
        debug!(
            "Synthesized {} v{} as {} ({})",
            job.key,
            artifact.version,
            schema_type.schema_org_type(),
            job.reason
        );
        Ok(artifact)
    }
}

fn check_consistency(input: &SynthesisInput<'_>) -> Result<(), SynthesisError> {
    let SynthesisInput {
        job,
        matched,
        trend,
        document,
    } = input;

    if document.key() != job.key {
        return Err(SynthesisError::Inconsistent(format!(
            "document {} does not belong to job {}",
            document.key(),
            job.key
        )));
    }
    if matched.key() != job.key {
        return Err(SynthesisError::Inconsistent(format!(
            "match {} does not belong to job {}",
            matched.key(),
            job.key
        )));
    }
    if matched.trend_id != trend.id || job.trend_id != trend.id {
        return Err(SynthesisError::Inconsistent(format!(
            "trend {} does not match job trend {}",
            trend.id, job.trend_id
        )));
    }
    Ok(())
}
