//! Change-detection digests over content and trend state

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A SHA-256 digest, hex encoded
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already computed hex digest (storage layer deserialization)
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Hex representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Incremental builder for a [`Fingerprint`]
///
/// Every field is written with its name and a length prefix, so
/// `("ab", "c")` and `("a", "bc")` never collide.
///
/// # Examples
///
/// ```
/// use trendmark_domain::FingerprintBuilder;
///
/// let a = FingerprintBuilder::new("trend").field("query", "diwali sale").finish();
/// let b = FingerprintBuilder::new("trend").field("query", "diwali sale").finish();
/// assert_eq!(a, b);
/// ```
pub struct FingerprintBuilder {
    hasher: Sha256,
}

impl FingerprintBuilder {
    /// Start a digest in the given domain (e.g. "trend", "content")
    pub fn new(domain: &str) -> Self {
        let mut builder = Self {
            hasher: Sha256::new(),
        };
        builder.write(domain.as_bytes());
        builder
    }

    fn write(&mut self, bytes: &[u8]) {
        self.hasher.update((bytes.len() as u64).to_be_bytes());
        self.hasher.update(bytes);
    }

    /// Add a named string field
    pub fn field(mut self, name: &str, value: &str) -> Self {
        self.write(name.as_bytes());
        self.write(value.as_bytes());
        self
    }

    /// Add a named integer field
    pub fn number(mut self, name: &str, value: u64) -> Self {
        self.write(name.as_bytes());
        self.write(&value.to_be_bytes());
        self
    }

    /// Finish and hex-encode the digest
    pub fn finish(self) -> Fingerprint {
        Fingerprint(hex::encode(self.hasher.finalize()))
    }
}
