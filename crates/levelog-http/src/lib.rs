//! Levelog HTTP
//!
//! axum middleware for request logging:
//! - Correlation token per request
//! - Access records after the handler returns
//! - Handler error recording

pub mod access;
pub mod correlation;
pub mod errors;

pub use access::{access_log_middleware, client_ip, AccessLog, RequestSummary};
pub use correlation::{correlation_middleware, RequestContext};
pub use errors::{record_error, HandlerError, HandlerErrors};
