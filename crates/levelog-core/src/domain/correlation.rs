//! Correlation Context - request correlation tokens
//!
//! A [`CorrelationToken`] is generated once per inbound unit of work and
//! carried by value inside a [`LogContext`]. Nothing here is global: code
//! that wants the token must be handed the context.

use std::fmt;
use std::sync::Arc;

/// Opaque identifier linking every record produced for one unit of work.
///
/// Cloning shares the same underlying string; the value is never mutated
/// after creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationToken(Arc<str>);

impl CorrelationToken {
    /// Generate a fresh random token (UUID v4).
    pub fn new() -> Self {
        Self(Arc::from(uuid::Uuid::new_v4().to_string()))
    }

    /// Wrap an existing identifier, e.g. one issued by an upstream layer.
    pub fn from_string(value: impl Into<String>) -> Self {
        Self(Arc::from(value.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Logical context handle threaded through a unit of work.
///
/// An empty context is valid: records logged with it simply carry no token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogContext {
    token: Option<CorrelationToken>,
}

impl LogContext {
    /// A context with no token attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a context carrying `token`. The receiver is left untouched.
    pub fn attach(&self, token: CorrelationToken) -> Self {
        Self { token: Some(token) }
    }

    /// Derive a context carrying a freshly generated token.
    pub fn with_new_token(&self) -> Self {
        self.attach(CorrelationToken::new())
    }

    pub fn token(&self) -> Option<&CorrelationToken> {
        self.token.as_ref()
    }
}

/// Generate a new token.
pub fn new_token() -> CorrelationToken {
    CorrelationToken::new()
}

/// Return a derived context carrying `token`.
pub fn attach(ctx: &LogContext, token: CorrelationToken) -> LogContext {
    ctx.attach(token)
}

/// Look up the token carried by `ctx`, if any.
pub fn lookup(ctx: &LogContext) -> Option<&CorrelationToken> {
    ctx.token()
}
