//! Trendmark server binary
//!
//! Starts the delivery endpoint and the harvest scheduler.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use trendmark_server::{config::ServerConfig, start_server};

/// Trend-aware schema synthesis and delivery
#[derive(Debug, Parser)]
#[command(name = "trendmark-server")]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "TRENDMARK_CONFIG")]
    config: Option<PathBuf>,

    /// JSON seed file (overrides `seed_path`)
    #[arg(short, long)]
    seed: Option<PathBuf>,

    /// SQLite artifact archive (overrides `archive_path`)
    #[arg(short, long)]
    archive: Option<PathBuf>,

    /// Port to bind (overrides `bind_port`)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => {
            eprintln!("Warning: No config file specified, using default test configuration");
            eprintln!("Usage: trendmark-server --config <path-to-config.toml>");
            ServerConfig::default_test_config()
        }
    };
    if let Some(seed) = cli.seed {
        config.seed_path = Some(seed);
    }
    if let Some(archive) = cli.archive {
        config.archive_path = Some(archive);
    }
    if let Some(port) = cli.port {
        config.bind_port = port;
    }

    start_server(config).await?;
    Ok(())
}
