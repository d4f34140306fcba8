//! HTTP access logging middleware
//!
//! One record per request, written after the handler returns:
//! - handler recorded errors: one error record per error, in the error stream
//! - otherwise: one info record in the access stream
//!
//! Every record of a request carries the same request fields. Records are
//! written on the blocking pool once the response has been handed back, so
//! file I/O and rotation never hold up the response.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio_util::task::TaskTracker;
use tracing::debug;

use levelog_core::{Channel, Entry, Field, LogContext, Logger, Severity};

use crate::errors::HandlerErrors;

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";

/// Shared state of [`access_log_middleware`].
#[derive(Debug, Clone)]
pub struct AccessLog {
    logger: Logger,
    pending: TaskTracker,
}

impl AccessLog {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            pending: TaskTracker::new(),
        }
    }

    /// Use the global logger. `None` (with a stderr diagnostic) if it is not
    /// installed.
    pub fn from_global() -> Option<Self> {
        match levelog_core::global::logger() {
            Some(logger) => Some(Self::new(logger)),
            None => {
                eprintln!("levelog: logger not initialized, access logging disabled");
                None
            }
        }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Wait until the records of every finished request are written.
    ///
    /// Call before flushing or shutting the logger down.
    pub async fn settle(&self) {
        self.pending.close();
        self.pending.wait().await;
        self.pending.reopen();
    }

    /// Write the records for one request on the blocking pool. Records of
    /// one request keep their order.
    fn record_detached(&self, ctx: LogContext, summary: RequestSummary, errors: Option<HandlerErrors>) {
        let access = self.clone();
        self.pending.spawn_blocking(move || {
            access.record(&ctx, &summary, errors.as_ref());
        });
    }

    /// Write the records for one finished request.
    pub fn record(&self, ctx: &LogContext, summary: &RequestSummary, errors: Option<&HandlerErrors>) {
        let fields = summary.fields();

        match errors.filter(|e| !e.is_empty()) {
            Some(errors) => {
                for error in errors.iter() {
                    self.logger.emit(
                        ctx,
                        Entry::new(Severity::Error, "request failed")
                            .fields(fields.iter().cloned())
                            .error(error),
                    );
                }
            }
            None => {
                self.logger.emit(
                    ctx,
                    Entry::new(Severity::Info, "request")
                        .channel(Channel::Access)
                        .fields(fields),
                );
            }
        }
    }
}

/// What is known about a request once its response exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSummary {
    pub status: u16,
    pub method: String,
    pub path: String,
    pub query: String,
    pub client_ip: String,
    pub user_agent: String,
    pub elapsed: Duration,
}

impl RequestSummary {
    fn fields(&self) -> Vec<Field> {
        vec![
            Field::new("status", self.status),
            Field::new("method", &self.method),
            Field::new("path", &self.path),
            Field::new("query", &self.query),
            Field::new("ip", &self.client_ip),
            Field::new("user_agent", &self.user_agent),
            Field::new("elapsed", self.elapsed),
        ]
    }
}

/// Client address: first `X-Forwarded-For` entry, then `X-Real-IP`, then the
/// peer address from `ConnectInfo`. `-` when none is known.
pub fn client_ip<B>(request: &axum::http::Request<B>) -> String {
    let headers = request.headers();

    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real_ip = headers
        .get(REAL_IP)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Access logging middleware.
///
/// Install inside [`crate::correlation_middleware`] so records carry the
/// request's correlation token.
pub async fn access_log_middleware(
    State(access): State<AccessLog>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let ctx = request
        .extensions()
        .get::<LogContext>()
        .cloned()
        .unwrap_or_default();

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let query = request.uri().query().unwrap_or_default().to_string();
    let ip = client_ip(&request);
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let mut response = next.run(request).await;
    let errors = response.extensions_mut().remove::<HandlerErrors>();

    let summary = RequestSummary {
        status: response.status().as_u16(),
        method,
        path,
        query,
        client_ip: ip,
        user_agent,
        elapsed: start.elapsed(),
    };
    debug!(
        status = summary.status,
        path = %summary.path,
        "Request finished in {:?}",
        summary.elapsed
    );
    access.record_detached(ctx, summary, errors);

    response
}
