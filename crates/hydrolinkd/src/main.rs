//! # hydrolinkd
//!
//! Hydrolink broker daemon — wires settings, storage, auth, and the
//! WebSocket server together and runs until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hydrolink_auth::JwtVerifier;
use hydrolink_broker::{BrokerConfig, BrokerServer};
use hydrolink_settings::{HydrolinkSettings, loader};
use hydrolink_store::{SqliteDeviceRegistry, SqliteHistoryStore, StoreConfig};

/// Hydrolink telemetry broker.
#[derive(Parser, Debug)]
#[command(name = "hydrolinkd", about = "Hydrolink telemetry broker")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings; 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the `SQLite` database (overrides settings).
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Path to the settings file (default `~/.hydrolink/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,
}

fn ensure_parent_dir(path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

/// Fold CLI overrides into loaded settings.
fn apply_cli_overrides(settings: &mut HydrolinkSettings, args: &Cli) {
    if let Some(ref host) = args.host {
        settings.server.host.clone_from(host);
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    if let Some(ref db_path) = args.db_path {
        settings.database.path = db_path.to_string_lossy().into_owned();
    }
}

fn broker_config(settings: &HydrolinkSettings) -> BrokerConfig {
    BrokerConfig {
        host: settings.server.host.clone(),
        port: settings.server.port,
        max_connections: settings.server.max_connections,
        heartbeat_interval_secs: settings.server.heartbeat_interval_secs,
        heartbeat_timeout_secs: settings.server.heartbeat_timeout_secs,
        max_message_size: settings.server.max_message_size,
        history_replay_limit: settings.server.history_replay_limit,
        send_queue_size: settings.server.send_queue_size,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args
        .config
        .clone()
        .unwrap_or_else(loader::settings_path);
    let mut settings = loader::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings: {}", settings_path.display()))?;
    apply_cli_overrides(&mut settings, &args);

    // RUST_LOG wins over the settings file.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.logging.level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let Some(jwt_secret) = settings.auth.jwt_secret.clone() else {
        bail!(
            "no JWT secret configured: set auth.jwtSecret in {} or HYDROLINK_JWT_SECRET",
            settings_path.display()
        );
    };

    let db_path = PathBuf::from(&settings.database.path);
    ensure_parent_dir(&db_path)?;
    let store_config = StoreConfig {
        pool_size: settings.database.pool_size,
        busy_timeout_ms: settings.database.busy_timeout_ms,
    };
    let pool = hydrolink_store::open_file(&settings.database.path, &store_config)
        .context("Failed to open database")?;
    {
        let conn = pool.get().context("Failed to get DB connection")?;
        let applied =
            hydrolink_store::run_migrations(&conn).context("Failed to run migrations")?;
        let version = hydrolink_store::migrations::current_version(&conn)
            .context("Failed to read schema version")?;
        tracing::info!(applied, version, path = %db_path.display(), "database ready");
    }

    let devices = Arc::new(SqliteDeviceRegistry::new(pool.clone()));
    let history = Arc::new(SqliteHistoryStore::new(pool));
    let verifier = Arc::new(JwtVerifier::new(&jwt_secret));

    let server = BrokerServer::new(broker_config(&settings), devices, history, verifier);
    let handle = server.listen().await.context("Failed to bind server")?;

    tracing::info!("hydrolinkd listening on http://{}", handle.addr);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown().shutdown();
    let _ = handle.task.await;

    tracing::info!("Shutdown complete");
    Ok(())
}
