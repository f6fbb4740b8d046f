use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gaea::{
    store::MemoryStore,
    web::{self, WebServerConfig},
    ConfigLoader, EngineBuilder,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "gaea world server")]
struct Cli {
    /// Path to the configuration YAML file
    #[arg(long, default_value = "config/gaea.yaml")]
    config: PathBuf,

    /// Override the listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,

    /// Generate and seed the world before accepting requests
    #[arg(long)]
    reset: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigLoader::new(".").load(&cli.config)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let server = WebServerConfig {
        host: cli.host.unwrap_or_else(|| config.server.host.clone()),
        port: cli.port.unwrap_or(config.server.port),
    };
    let reset_on_start = cli.reset || config.server.reset_on_start;

    let engine = Arc::new(EngineBuilder::new(Arc::new(MemoryStore::new()), config).build());
    if reset_on_start {
        let summary = engine
            .reset()
            .await
            .context("initial world generation failed")?;
        info!(
            tiles = summary.tiles,
            players = summary.players,
            "world ready"
        );
    }

    web::run(server, engine).await
}
