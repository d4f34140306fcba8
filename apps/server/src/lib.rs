//! Levelog demo server
//!
//! Small axum + SQLite service wired through the logging stack:
//! correlation and access-log middleware, traced queries, and `tracing`
//! events bridged into the per-severity files.

use anyhow::{Context, Result};
use axum::{middleware, routing::get, Router};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use levelog_core::{LevelogLayer, LogContext, Logger};
use levelog_http::{access_log_middleware, correlation_middleware, AccessLog};
use levelog_sql::{QueryLogger, TracedConnection};

mod routes;

const DEFAULT_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_DATABASE: &str = "./data/levelog.db";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);";

/// Process settings outside the logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub database: PathBuf,
}

impl ServerSettings {
    /// Read `LEVELOG_ADDR` and `LEVELOG_DB`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let addr = lookup("LEVELOG_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid LEVELOG_ADDR: {}", addr))?;
        let database = lookup("LEVELOG_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE));
        Ok(Self { addr, database })
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<TracedConnection>>,
}

impl AppState {
    pub fn new(db: TracedConnection) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }
}

/// Install the global `tracing` subscriber.
///
/// - Every event (subject to `RUST_LOG`) goes through the logger's files
/// - Console: compact output of the logger's own diagnostics, which the
///   bridge layer leaves out
pub fn init_tracing(logger: Logger) {
    use tracing_subscriber::{
        filter::filter_fn, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    };

    // RUST_LOG takes precedence
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,levelog_core=debug,levelog_sql=debug,levelog_server=debug")
    });

    let console_layer = fmt::layer()
        .with_ansi(true)
        .compact()
        .with_target(true)
        .with_filter(filter_fn(|meta| meta.target().starts_with("levelog_core")));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(LevelogLayer::new(logger))
        .init();
}

/// Open the database and apply the schema.
pub fn open_database(path: &Path, query_logger: Arc<dyn QueryLogger>) -> Result<TracedConnection> {
    let db = TracedConnection::open(path, query_logger)
        .with_context(|| format!("Failed to open database at {:?}", path))?;
    db.execute_batch(&LogContext::new(), SCHEMA)
        .context("Failed to apply schema")?;
    debug!("Database ready at {:?}", path);
    Ok(db)
}

/// In-memory database with the schema applied (for testing).
pub fn open_database_in_memory(query_logger: Arc<dyn QueryLogger>) -> Result<TracedConnection> {
    let db = TracedConnection::open_in_memory(query_logger)?;
    db.execute_batch(&LogContext::new(), SCHEMA)
        .context("Failed to apply schema")?;
    Ok(db)
}

/// All routes behind the correlation and access-log middleware.
pub fn build_router(state: AppState, access: AccessLog) -> Router {
    info!("Building router");
    Router::new()
        .route("/health", get(routes::health))
        .route("/items", axum::routing::post(routes::create_item))
        .route("/items/{id}", get(routes::get_item))
        .route("/fail", get(routes::fail))
        .with_state(state)
        .layer(middleware::from_fn_with_state(access, access_log_middleware))
        .layer(middleware::from_fn(correlation_middleware))
}
