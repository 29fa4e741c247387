//! shelfscan-id - Product Identification Microservice
//!
//! **Module Identity:**
//! - Name: shelfscan-id
//! - Default port: 8080
//!
//! Accepts shelf photos (or precomputed vision signals) and answers with a
//! normalized product record.

use anyhow::{Context, Result};
use clap::Parser;
use shelfscan_common::config::ConfigPathResolver;
use shelfscan_common::logging::init_tracing;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use shelfscan_id::clients::Collaborators;
use shelfscan_id::config::ServiceConfig;
use shelfscan_id::db::{init_database_pool, SqliteProductStore};
use shelfscan_id::{AppState, Pipeline};

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "shelfscan-id", version, about = "Product identification service")]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "SHELFSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database file (overrides config)
    #[arg(short, long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Step 1: Resolve and load configuration
    let resolver = ConfigPathResolver::new("shelfscan-id");
    let config_path = resolver.resolve(args.config.as_deref());
    let config = ServiceConfig::load(config_path.as_deref())
        .context("Failed to load configuration")?;

    // Step 2: Logging
    init_tracing(&config.logging).context("Failed to initialize logging")?;

    info!("Starting shelfscan-id (Product Identification) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Step 3: Open or create database
    let db_path = config.resolve_database_path(args.database.as_deref());
    info!("Database: {}", db_path.display());
    let db_pool = init_database_pool(&db_path)
        .await
        .context("Failed to open database")?;
    info!("Database connection established");

    // Step 4: Collaborators and pipeline
    let collaborators =
        Collaborators::from_config(&config).context("Failed to build collaborator clients")?;
    let store = Arc::new(SqliteProductStore::new(db_pool));
    let pipeline = Pipeline::new(config.pipeline_config(), collaborators, store);

    let state = AppState::new(Arc::new(pipeline));
    let app = shelfscan_id::build_router(state);

    // Step 5: Serve until Ctrl-C
    let port = args.port.unwrap_or(config.port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shelfscan-id stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
