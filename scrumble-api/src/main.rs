//! scrumble-api - matchup and vote service backed by SQLite

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scrumble_api::{build_router, db, AppState};
use scrumble_common::config::{load_server_config, resolve_database_path, ADMIN_KEY_ENV, DEFAULT_PORT};

#[derive(Parser, Debug)]
#[command(name = "scrumble-api")]
#[command(about = "Scrumble matchup API")]
#[command(version)]
struct Args {
    /// Server config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database file (overrides SCRUMBLE_DB and the config file)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Listen address
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_server_config(args.config.as_deref()).context("Failed to load config")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting scrumble-api v{}", env!("CARGO_PKG_VERSION"));

    let db_path = resolve_database_path(args.database.as_deref(), &config);
    info!("Database path: {}", db_path.display());
    let pool = db::connect(&db_path).await?;

    let admin_key = std::env::var(ADMIN_KEY_ENV)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| config.admin_key.clone());
    if admin_key.is_none() {
        warn!("No admin key configured ({}), admin endpoints will refuse requests", ADMIN_KEY_ENV);
    }

    let app = build_router(AppState::new(pool, admin_key));

    let port = args.port.or(config.port).unwrap_or(DEFAULT_PORT);
    let addr: SocketAddr = format!("{}:{}", args.bind, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", args.bind, port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("scrumble-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("scrumble-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
    }
}
