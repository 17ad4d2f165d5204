//! Configuration file parsing for the server.
//!
//! One TOML file carries the bind address, the collaborator wiring (seed data,
//! artifact archive), delivery deadlines and one table per engine component.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use trendmark_cache::CacheConfig;
use trendmark_harvester::HarvestConfig;
use trendmark_matcher::MatcherConfig;
use trendmark_store::AdapterConfig;

/// Server configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required configuration field: {0}")]
    MissingField(String),

    /// A section failed validation
    #[error("Invalid [{section}] configuration: {message}")]
    Invalid {
        /// Offending section
        section: &'static str,
        /// What is wrong
        message: String,
    },
}

/// Server configuration loaded from TOML
///
/// ```toml
/// bind_address = "127.0.0.1"
/// bind_port = 8080
/// seed_path = "data/seed.json"
///
/// [matcher]
/// threshold = 0.72
///
/// [harvest]
/// interval_secs = 300
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1")
    pub bind_address: String,

    /// Bind port (e.g., 8080)
    pub bind_port: u16,

    /// JSON seed for the in-memory document store and similarity backend
    #[serde(default)]
    pub seed_path: Option<PathBuf>,

    /// SQLite file for durable artifacts; in-memory only when absent
    #[serde(default)]
    pub archive_path: Option<PathBuf>,

    /// Deadline for an on-demand fill at the delivery endpoint (default: 2000)
    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout_ms: u64,

    /// Deadline for the content fingerprint check on a fresh hit (default: 250)
    #[serde(default = "default_fingerprint_timeout")]
    pub fingerprint_timeout_ms: u64,

    /// Dimension of the built-in hashing embedder (default: 64)
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,

    /// Matcher settings
    #[serde(default)]
    pub matcher: MatcherConfig,

    /// Artifact cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Harvest scheduler settings
    #[serde(default)]
    pub harvest: HarvestConfig,

    /// Collaborator adapter settings
    #[serde(default)]
    pub adapter: AdapterConfig,
}

fn default_delivery_timeout() -> u64 {
    2000
}

fn default_fingerprint_timeout() -> u64 {
    250
}

fn default_embedding_dimension() -> usize {
    64
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: ServerConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration for testing
    pub fn default_test_config() -> Self {
        ServerConfig {
            bind_address: "127.0.0.1".to_string(),
            bind_port: 8080,
            seed_path: None,
            archive_path: None,
            delivery_timeout_ms: default_delivery_timeout(),
            fingerprint_timeout_ms: default_fingerprint_timeout(),
            embedding_dimension: default_embedding_dimension(),
            matcher: MatcherConfig::default(),
            cache: CacheConfig::default(),
            harvest: HarvestConfig::default(),
            adapter: AdapterConfig::default(),
        }
    }

    /// Get the full bind address (address:port)
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }

    /// On-demand fill deadline as a Duration
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    /// Fingerprint check deadline as a Duration
    pub fn fingerprint_timeout(&self) -> Duration {
        Duration::from_millis(self.fingerprint_timeout_ms)
    }

    /// Check required fields and every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.is_empty() {
            return Err(ConfigError::MissingField("bind_address".to_string()));
        }
        if self.delivery_timeout_ms == 0 || self.fingerprint_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                section: "server",
                message: "timeouts must be greater than 0".to_string(),
            });
        }
        if self.embedding_dimension == 0 {
            return Err(ConfigError::Invalid {
                section: "server",
                message: "embedding_dimension must be greater than 0".to_string(),
            });
        }

        self.matcher.validate().map_err(invalid("matcher"))?;
        self.cache.validate().map_err(invalid("cache"))?;
        self.harvest.validate().map_err(invalid("harvest"))?;
        self.adapter.validate().map_err(invalid("adapter"))?;
        Ok(())
    }
}

fn invalid(section: &'static str) -> impl Fn(String) -> ConfigError {
    move |message| ConfigError::Invalid { section, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default_test_config();
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.delivery_timeout(), Duration::from_secs(2));
        assert_eq!(config.matcher.threshold, 0.72);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            bind_address = "0.0.0.0"
            bind_port = 9000
            seed_path = "data/seed.json"
            delivery_timeout_ms = 500

            [matcher]
            threshold = 0.8

            [cache]
            capacity = 100
            grace_secs = 60

            [harvest]
            interval_secs = 60
        "#;

        let config: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.bind_port, 9000);
        assert_eq!(config.seed_path, Some(PathBuf::from("data/seed.json")));
        assert_eq!(config.delivery_timeout_ms, 500);
        assert_eq!(config.fingerprint_timeout_ms, 250);
        assert_eq!(config.matcher.threshold, 0.8);
        assert_eq!(config.matcher.volume_saturation, 10_000);
        assert_eq!(config.cache.capacity, 100);
        assert_eq!(config.harvest.interval_secs, 60);
        assert_eq!(config.harvest.expiry_multiplier, 2.0);
        assert!(config.archive_path.is_none());
    }

    #[test]
    fn test_from_file_validates_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        std::fs::write(
            &path,
            "bind_address = \"127.0.0.1\"\nbind_port = 8080\n\n[matcher]\nthreshold = 1.5\n",
        )
        .unwrap();

        match ServerConfig::from_file(&path) {
            Err(ConfigError::Invalid { section, .. }) => assert_eq!(section, "matcher"),
            other => panic!("expected invalid matcher section, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_bind_port_is_parse_error() {
        let result: Result<ServerConfig, _> = toml::from_str("bind_address = \"127.0.0.1\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_bundled_config_and_seed_load() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
        let config = ServerConfig::from_file(root.join("config/trendmark.toml")).unwrap();
        assert_eq!(config.harvest.interval_secs, 300);
        assert_eq!(config.adapter.page_size, 500);

        let seed = trendmark_store::memory::SeedData::from_file(root.join("data/seed.json")).unwrap();
        assert_eq!(seed.clients.len(), 2);
        assert!(seed.documents.iter().all(|d| d.embedding.is_empty()));
    }
}
