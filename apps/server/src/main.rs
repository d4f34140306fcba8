//! Levelog demo server entry point

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use levelog_core::{global, install_panic_hook, spawn_rotation_timer, LoggerConfig};
use levelog_http::AccessLog;
use levelog_server::{build_router, init_tracing, open_database, AppState, ServerSettings};
use levelog_sql::{SqlLogger, SqlLoggerConfig};

/// How often quiet streams are checked for rotation and retention.
const MAINTENANCE_PERIOD: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for development)
    dotenvy::dotenv().ok();

    let config = LoggerConfig::from_env().context("Invalid logging configuration")?;
    let log_dir = config.directory().to_path_buf();

    // Keep the guard alive for the entire program - dropping it shuts logging down
    let _log_guard = levelog_core::init(config).context("Failed to initialize logging")?;
    install_panic_hook();

    let logger = global::logger().context("Logger missing after init")?;
    init_tracing(logger.clone());
    let maintenance = spawn_rotation_timer(logger.clone(), MAINTENANCE_PERIOD);

    let settings = ServerSettings::from_env()?;
    info!(
        "Starting levelog-server v{} (logs: {})",
        env!("CARGO_PKG_VERSION"),
        log_dir.display()
    );

    let query_logger = SqlLogger::new(logger.clone(), SqlLoggerConfig::default());
    let db = open_database(&settings.database, Arc::new(query_logger))?;
    let access = AccessLog::new(logger);
    let app = build_router(AppState::new(db), access.clone());

    let listener = tokio::net::TcpListener::bind(settings.addr)
        .await
        .with_context(|| format!("Failed to bind {}", settings.addr))?;
    info!("Listening on {}", settings.addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Shutting down");
    maintenance.abort();
    access.settle().await;
    global::shutdown().context("Failed to flush logs")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
