//! Catalog Server - product catalog with Basic authentication and RBAC

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;
mod seed;

use catalog_api::{AppState, RoutePolicy, create_router};
use catalog_auth::{
    AuthService, DatabaseAuditSink, LockoutPolicy, LoginAttemptTracker, PasswordHasher,
    spawn_attempt_sweeper,
};
use catalog_db::Database;
use config::{Config, LoggingConfig};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Catalog Server - product catalog with Basic authentication and RBAC
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", env = "CATALOG_CONFIG")]
    config: String,

    /// Bind address
    #[arg(long, env = "CATALOG_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "CATALOG_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args.config)?;

    // Initialize logging
    init_logging(&config.logging);

    info!("Starting Catalog Server v{}", env!("CARGO_PKG_VERSION"));

    // Install the Prometheus recorder before any metric is touched
    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install metrics recorder")?;

    // Initialize database
    if let Some(parent) = Path::new(&config.database.path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let db_path = format!("sqlite:{}?mode=rwc", config.database.path);
    let db = Database::new(&db_path).await?;

    // Authentication
    let tracker = Arc::new(LoginAttemptTracker::new(LockoutPolicy::new(
        config.auth.max_attempts,
        config.auth.lockout_secs,
    )));
    let auth = AuthService::new(
        Arc::new(db.clone()),
        Arc::new(DatabaseAuditSink::new(db.clone())),
        PasswordHasher::with_iterations(config.auth.pbkdf2_iterations),
        tracker.clone(),
    );

    if config.auth.seed_default_users {
        seed::seed_defaults(&db, &auth).await?;
    }

    let sweeper = spawn_attempt_sweeper(tracker, config.auth.sweep_interval_secs);

    // Create application state
    let state = AppState::new(
        db,
        auth,
        RoutePolicy::new(config.auth.browse_prefixes.clone()),
        &config.auth.realm,
    );

    // Create router
    let app = create_router(state, Some(Arc::new(metrics_handle)))
        .layer(TraceLayer::new_for_http());

    // Determine bind address
    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind_addr, port))?;

    info!("Listening on {}", addr);
    info!(
        "Lockout policy: {} attempts, {} seconds",
        config.auth.max_attempts, config.auth.lockout_secs
    );

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("Server stopped");
    Ok(())
}

/// Initialize logging
fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for CTRL+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
