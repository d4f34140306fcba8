//! Request correlation
//!
//! Gives every inbound request a [`LogContext`] carrying a fresh correlation
//! token and stores it in the request extensions, where the access-log
//! middleware and handlers pick it up.

use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;
use tracing::{info_span, Instrument};

use levelog_core::LogContext;

/// Attach a correlation token to the request.
///
/// A context already carrying a token (inserted by an outer layer) is kept
/// as is. The handler runs inside a `request` span with a `trace_id` field,
/// so `tracing` events it emits are correlated too.
pub async fn correlation_middleware(mut request: Request, next: Next) -> Response {
    let ctx = match request.extensions().get::<LogContext>() {
        Some(ctx) if ctx.token().is_some() => ctx.clone(),
        _ => LogContext::new().with_new_token(),
    };

    let span = info_span!(
        "request",
        trace_id = %ctx.token().map(|t| t.as_str()).unwrap_or_default(),
        method = %request.method(),
        path = %request.uri().path(),
    );

    request.extensions_mut().insert(ctx);
    next.run(request).instrument(span).await
}

/// Extractor for the request's [`LogContext`].
///
/// Yields an empty context when the correlation middleware is not installed.
#[derive(Debug, Clone, Default)]
pub struct RequestContext(pub LogContext);

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts.extensions.get::<LogContext>().cloned().unwrap_or_default(),
        ))
    }
}
