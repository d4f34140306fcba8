//! The logging interface a query layer calls into

use std::sync::Arc;
use std::time::Instant;

use levelog_core::{FieldValue, LogContext};

use crate::error::QueryError;

/// Verbosity a query layer may request from its logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueryLogMode {
    Silent,
    Error,
    Warn,
    Info,
}

/// Logger plugged into a query execution layer.
pub trait QueryLogger: Send + Sync {
    /// Derive a logger for `mode`. Implementations may ignore the mode.
    fn set_mode(&self, mode: QueryLogMode) -> Arc<dyn QueryLogger>;

    /// Leveled message; `template` uses `{}` placeholders filled from `args`.
    fn info(&self, ctx: &LogContext, template: &str, args: &[FieldValue]);

    fn warn(&self, ctx: &LogContext, template: &str, args: &[FieldValue]);

    fn error(&self, ctx: &LogContext, template: &str, args: &[FieldValue]);

    /// Report one executed query.
    ///
    /// `result` yields the executed SQL and the affected row count; it is only
    /// invoked when a record will actually be written.
    fn trace(
        &self,
        ctx: &LogContext,
        begin: Instant,
        result: &dyn Fn() -> (String, i64),
        err: Option<&QueryError>,
    );
}
