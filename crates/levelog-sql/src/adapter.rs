//! Query logging adapter
//!
//! [`SqlLogger`] turns query outcomes into records in the `sql` stream:
//!
//! | outcome                          | record                        |
//! |----------------------------------|-------------------------------|
//! | error (not a suppressed miss)    | error `query failed` + caller |
//! | elapsed above the slow threshold | warn `slow query` + caller    |
//! | anything else                    | debug `query executed`        |
//!
//! Records below the logger's minimum severity cost neither the SQL text nor
//! a stack capture.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use levelog_core::caller::{capture_caller, FrameFilter, DEFAULT_MAX_DEPTH};
use levelog_core::domain::duration_serde;
use levelog_core::{format_template, CallerLocation, Channel, Entry, FieldValue, LogContext, Logger, Severity};

use crate::contract::{QueryLogMode, QueryLogger};
use crate::error::QueryError;

pub const DEFAULT_SLOW_THRESHOLD: Duration = Duration::from_millis(200);

/// Frames above the capture point that are never the caller.
pub const DEFAULT_CALLER_SKIP: usize = 2;

/// Settings of [`SqlLogger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlLoggerConfig {
    /// Successful queries slower than this are logged at warn. Zero disables
    /// slow classification.
    #[serde(with = "duration_serde")]
    pub slow_threshold: Duration,
    /// Treat "record not found" as a successful query.
    pub ignore_record_not_found: bool,
    /// Leave caller attribution out of records.
    pub skip_caller_lookup: bool,
    pub caller_skip: usize,
    pub max_depth: usize,
    /// Source path fragments of the query layer.
    pub library_paths: Vec<String>,
    /// Symbol prefixes of the query layer.
    pub library_symbols: Vec<String>,
}

impl Default for SqlLoggerConfig {
    fn default() -> Self {
        Self {
            slow_threshold: DEFAULT_SLOW_THRESHOLD,
            ignore_record_not_found: true,
            skip_caller_lookup: false,
            caller_skip: DEFAULT_CALLER_SKIP,
            max_depth: DEFAULT_MAX_DEPTH,
            library_paths: vec!["levelog-sql/src/".into(), "/rusqlite-".into()],
            library_symbols: vec!["levelog_sql::".into(), "rusqlite::".into()],
        }
    }
}

impl SqlLoggerConfig {
    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    pub fn with_ignore_record_not_found(mut self, ignore: bool) -> Self {
        self.ignore_record_not_found = ignore;
        self
    }

    pub fn with_skip_caller_lookup(mut self, skip: bool) -> Self {
        self.skip_caller_lookup = skip;
        self
    }

    /// Also treat frames from `fragment` as query layer code.
    pub fn with_library_path(mut self, fragment: impl Into<String>) -> Self {
        self.library_paths.push(fragment.into());
        self
    }

    fn frame_filter(&self) -> FrameFilter {
        FrameFilter::runtime()
            .with_paths(self.library_paths.iter().cloned())
            .with_symbol_prefixes(self.library_symbols.iter().cloned())
    }
}

/// How a finished query is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    Ok,
    Slow,
    /// A suppressed "record not found" within the slow threshold.
    NotFound,
    Error,
}

impl QueryOutcome {
    pub fn severity(&self) -> Severity {
        match self {
            Self::Error => Severity::Error,
            Self::Slow => Severity::Warn,
            Self::Ok | Self::NotFound => Severity::Debug,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Error => "query failed",
            Self::Slow => "slow query",
            Self::Ok | Self::NotFound => "query executed",
        }
    }
}

/// Classify a finished query. A suppressed miss is judged like a success
/// for the slow check.
pub fn classify(
    err: Option<&QueryError>,
    elapsed: Duration,
    slow_threshold: Duration,
    ignore_not_found: bool,
) -> QueryOutcome {
    let suppressed = match err {
        Some(e) if e.is_not_found() && ignore_not_found => true,
        Some(_) => return QueryOutcome::Error,
        None => false,
    };

    if !slow_threshold.is_zero() && elapsed > slow_threshold {
        QueryOutcome::Slow
    } else if suppressed {
        QueryOutcome::NotFound
    } else {
        QueryOutcome::Ok
    }
}

/// [`QueryLogger`] writing to the `sql` stream of a [`Logger`].
#[derive(Debug, Clone)]
pub struct SqlLogger {
    logger: Logger,
    config: Arc<SqlLoggerConfig>,
    filter: Arc<FrameFilter>,
}

impl SqlLogger {
    pub fn new(logger: Logger, config: SqlLoggerConfig) -> Self {
        let filter = config.frame_filter();
        Self {
            logger,
            config: Arc::new(config),
            filter: Arc::new(filter),
        }
    }

    /// Adapter over the global logger. `None` (with a stderr diagnostic) if
    /// it is not installed.
    pub fn from_global(config: SqlLoggerConfig) -> Option<Self> {
        match levelog_core::global::logger() {
            Some(logger) => Some(Self::new(logger, config)),
            None => {
                eprintln!("levelog: logger not initialized, query logging disabled");
                None
            }
        }
    }

    pub fn config(&self) -> &SqlLoggerConfig {
        &self.config
    }

    fn caller(&self) -> Option<CallerLocation> {
        if self.config.skip_caller_lookup {
            return None;
        }
        Some(capture_caller(
            self.config.caller_skip,
            self.config.max_depth,
            &self.filter,
        ))
    }

    fn message(&self, ctx: &LogContext, severity: Severity, template: &str, args: &[FieldValue]) {
        if !self.logger.should_emit(severity) {
            return;
        }
        let caller = if severity >= Severity::Warn {
            self.caller()
        } else {
            None
        };
        self.logger.emit(
            ctx,
            Entry::new(severity, format_template(template, args))
                .channel(Channel::Sql)
                .caller(caller),
        );
    }
}

impl QueryLogger for SqlLogger {
    fn set_mode(&self, mode: QueryLogMode) -> Arc<dyn QueryLogger> {
        debug!(?mode, "Query log mode ignored, severity follows query outcome");
        Arc::new(self.clone())
    }

    fn info(&self, ctx: &LogContext, template: &str, args: &[FieldValue]) {
        self.message(ctx, Severity::Info, template, args);
    }

    fn warn(&self, ctx: &LogContext, template: &str, args: &[FieldValue]) {
        self.message(ctx, Severity::Warn, template, args);
    }

    fn error(&self, ctx: &LogContext, template: &str, args: &[FieldValue]) {
        self.message(ctx, Severity::Error, template, args);
    }

    fn trace(
        &self,
        ctx: &LogContext,
        begin: Instant,
        result: &dyn Fn() -> (String, i64),
        err: Option<&QueryError>,
    ) {
        let elapsed = begin.elapsed();
        let outcome = classify(
            err,
            elapsed,
            self.config.slow_threshold,
            self.config.ignore_record_not_found,
        );
        let severity = outcome.severity();
        if !self.logger.should_emit(severity) {
            return;
        }

        let (sql, rows) = result();
        let mut entry = Entry::new(severity, outcome.message())
            .channel(Channel::Sql)
            .field("sql", sql)
            .field("rows", rows)
            .field("elapsed", elapsed);

        match outcome {
            QueryOutcome::Error => {
                entry = entry.caller(self.caller());
                if let Some(err) = err {
                    entry = entry.error(err.to_string());
                }
            }
            QueryOutcome::Slow => {
                entry = entry
                    .field("threshold", self.config.slow_threshold)
                    .caller(self.caller());
            }
            QueryOutcome::NotFound => entry = entry.field("not_found", true),
            QueryOutcome::Ok => {}
        }

        self.logger.emit(ctx, entry);
    }
}
