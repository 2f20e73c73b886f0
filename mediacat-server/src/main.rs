//! mediacat-server - media catalog service
//!
//! Startup: load configuration, bring the catalog database up to date
//! (database, schema, imports), then serve the HTTP API.

use anyhow::{Context, Result};
use clap::Parser;
use mediacat_common::bootstrap::{bootstrap, BatchOutcome, ImportSources};
use mediacat_common::config::{load_config, DEFAULT_CONFIG_FILE};
use mediacat_common::db::mysql_store::MySqlCatalogStore;
use mediacat_server::{build_router, cors_layer, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Command-line arguments for mediacat-server
#[derive(Parser, Debug)]
#[command(name = "mediacat-server")]
#[command(about = "Media catalog service backed by MySQL")]
#[command(version)]
struct Args {
    /// Configuration file (JSON, or TOML with a .toml extension)
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, env = "MEDIACAT_CONFIG")]
    config: PathBuf,

    /// Skip the format and media imports
    #[arg(long)]
    skip_import: bool,

    /// Format records file (overrides formats_file)
    #[arg(long)]
    formats: Option<PathBuf>,

    /// Media records file (overrides media_file)
    #[arg(long)]
    media: Option<PathBuf>,
}

fn log_batch(label: &str, outcome: &BatchOutcome) {
    match outcome {
        BatchOutcome::Completed { stats } => info!(
            "{} import: {} processed, {} inserted, {} duplicates",
            label, stats.processed, stats.inserted, stats.duplicates
        ),
        BatchOutcome::Skipped { reason } => info!("{} import skipped: {}", label, reason),
        BatchOutcome::Failed { error } => warn!("{} import failed: {}", label, error),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    info!(
        "Starting mediacat-server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    info!(
        "Configuration loaded: database {} on {}:{}",
        config.db_name, config.db_host, config.db_port
    );

    let mut sources = ImportSources::from_config(&config);
    if let Some(formats) = args.formats {
        sources.formats_file = formats;
    }
    if let Some(media) = args.media {
        sources.media_file = media;
    }
    let imports = (!args.skip_import).then_some(&sources);

    let catalog = bootstrap(&config, imports)
        .await
        .context("Catalog bootstrap failed")?;
    log_batch("Format", &catalog.report.imports.formats);
    log_batch("Media", &catalog.report.imports.media);

    let state = AppState::new(Arc::new(MySqlCatalogStore::new(catalog.pool)));
    let app = build_router(state, cors_layer(&config.allowed_origins)?);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("mediacat-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
