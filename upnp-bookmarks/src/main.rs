mod cli;
mod config;
mod store;

use anyhow::{Context, Result};
use clap::Parser;
use crate::cli::Cli;
use crate::config::{Config, DEFAULT_CONFIG_PATH};
use crate::store::db::BookmarkDb;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("upnp_bookmarks=info"))
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_or_default(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("Failed to load config from {}", DEFAULT_CONFIG_PATH))?,
    };

    let db = BookmarkDb::open(&config.store.db_path)?;
    tracing::debug!("Opened bookmark store at {:?}", config.store.db_path);

    cli::run(cli.command, &db, &config)
}
