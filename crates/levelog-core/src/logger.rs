//! Core logger
//!
//! [`Logger`] is a cheap, cloneable handle. All clones share one router and
//! one console worker; a clone made with [`Logger::with_fields`] additionally
//! carries pre-bound fields.

use parking_lot::Mutex;
use std::borrow::Cow;
use std::io::Write;
use std::panic::Location;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};

use crate::domain::{
    CallerLocation, Field, FieldValue, LogContext, LogRecord, LoggerConfig, OutputFormat, Severity,
};
use crate::error::Result;
use crate::service::{Channel, LevelRouter, SharedClock, SystemClock};

/// A record description handed to [`Logger::emit`] by adapters that pick
/// their own stream and caller location.
#[derive(Debug, Clone)]
pub struct Entry {
    severity: Severity,
    channel: Option<Channel>,
    message: String,
    fields: Vec<Field>,
    caller: Option<CallerLocation>,
    error: Option<String>,
}

impl Entry {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            channel: None,
            message: message.into(),
            fields: Vec::new(),
            caller: None,
            error: None,
        }
    }

    /// Send to an auxiliary stream instead of the severity's own stream.
    ///
    /// `Channel::Level(_)` always resolves to the entry's own severity.
    pub fn channel(mut self, channel: Channel) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn field(mut self, key: impl Into<Cow<'static, str>>, value: impl Into<FieldValue>) -> Self {
        self.fields.push(Field::new(key, value));
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn caller(mut self, caller: Option<CallerLocation>) -> Self {
        self.caller = caller;
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    fn resolved_channel(&self) -> Channel {
        match self.channel {
            Some(Channel::Level(_)) | None => Channel::Level(self.severity),
            Some(other) => other,
        }
    }
}

struct Inner {
    router: LevelRouter,
    clock: SharedClock,
    format: OutputFormat,
    console: Option<NonBlocking>,
    console_guard: Mutex<Option<WorkerGuard>>,
    closed: AtomicBool,
    closed_reported: AtomicBool,
    write_failure_reported: AtomicBool,
    dropped: AtomicU64,
}

/// Handle to the structured logger.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<Inner>,
    fields: Arc<[Field]>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("min_severity", &self.inner.router.min_severity())
            .field("format", &self.inner.format)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Builder for [`Logger`] with test and embedding overrides.
pub struct LoggerBuilder {
    config: LoggerConfig,
    clock: Option<SharedClock>,
    console_writer: Option<Box<dyn Write + Send>>,
}

impl LoggerBuilder {
    /// Use `clock` for timestamps and rotation decisions.
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Send the console duplicate to `writer` instead of stdout. Only used
    /// when the config enables console output.
    pub fn console_writer<W: Write + Send + 'static>(mut self, writer: W) -> Self {
        self.console_writer = Some(Box::new(writer));
        self
    }

    /// Validate the config, check the directory is writable and build every writer.
    pub fn build(self) -> Result<Logger> {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let router = LevelRouter::new(&self.config, clock.clone())?;

        let (console, guard) = if self.config.console {
            let target: Box<dyn Write + Send> = self
                .console_writer
                .unwrap_or_else(|| Box::new(std::io::stdout()));
            let (writer, guard) = NonBlockingBuilder::default()
                .lossy(false)
                .thread_name("levelog-console")
                .finish(target);
            (Some(writer), Some(guard))
        } else {
            (None, None)
        };

        Ok(Logger {
            inner: Arc::new(Inner {
                router,
                clock,
                format: self.config.format,
                console,
                console_guard: Mutex::new(guard),
                closed: AtomicBool::new(false),
                closed_reported: AtomicBool::new(false),
                write_failure_reported: AtomicBool::new(false),
                dropped: AtomicU64::new(0),
            }),
            fields: Arc::from(Vec::new()),
        })
    }
}

impl Logger {
    /// Build a logger from `config`. Fails if the log directory is unusable.
    pub fn new(config: LoggerConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: LoggerConfig) -> LoggerBuilder {
        LoggerBuilder {
            config,
            clock: None,
            console_writer: None,
        }
    }

    /// A handle that prepends `fields` to every record it logs.
    pub fn with_fields(&self, fields: impl IntoIterator<Item = Field>) -> Self {
        let merged: Vec<Field> = self.fields.iter().cloned().chain(fields).collect();
        Self {
            inner: self.inner.clone(),
            fields: Arc::from(merged),
        }
    }

    pub fn min_severity(&self) -> Severity {
        self.inner.router.min_severity()
    }

    /// Whether a record at `severity` would currently be written.
    pub fn should_emit(&self, severity: Severity) -> bool {
        !self.is_closed() && self.inner.router.should_emit(severity)
    }

    pub fn format(&self) -> OutputFormat {
        self.inner.format
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Records lost because a write failed twice.
    pub fn dropped_records(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Path of the file currently open for `channel`.
    pub fn current_path(&self, channel: Channel) -> Option<PathBuf> {
        self.inner.router.channel(channel).current_path()
    }

    /// Log `message` at `severity`.
    ///
    /// Warn and above also record the caller's source location.
    #[track_caller]
    pub fn log<I>(&self, ctx: &LogContext, severity: Severity, message: &str, fields: I)
    where
        I: IntoIterator<Item = Field>,
    {
        if !self.accepts(severity) {
            return;
        }
        let caller = caller_for(severity, Location::caller());
        self.dispatch(ctx, Channel::Level(severity), severity, message, fields, caller, None);
    }

    /// Log `message` with an attached error.
    #[track_caller]
    pub fn log_err<E, I>(&self, ctx: &LogContext, severity: Severity, message: &str, err: &E, fields: I)
    where
        E: std::fmt::Display + ?Sized,
        I: IntoIterator<Item = Field>,
    {
        if !self.accepts(severity) {
            return;
        }
        let caller = caller_for(severity, Location::caller());
        self.dispatch(
            ctx,
            Channel::Level(severity),
            severity,
            message,
            fields,
            caller,
            Some(err.to_string()),
        );
    }

    #[track_caller]
    pub fn debug<I: IntoIterator<Item = Field>>(&self, ctx: &LogContext, message: &str, fields: I) {
        self.log(ctx, Severity::Debug, message, fields);
    }

    #[track_caller]
    pub fn info<I: IntoIterator<Item = Field>>(&self, ctx: &LogContext, message: &str, fields: I) {
        self.log(ctx, Severity::Info, message, fields);
    }

    #[track_caller]
    pub fn warn<I: IntoIterator<Item = Field>>(&self, ctx: &LogContext, message: &str, fields: I) {
        self.log(ctx, Severity::Warn, message, fields);
    }

    #[track_caller]
    pub fn error<I: IntoIterator<Item = Field>>(&self, ctx: &LogContext, message: &str, fields: I) {
        self.log(ctx, Severity::Error, message, fields);
    }

    /// Log at fatal severity and flush. Does not terminate the process.
    #[track_caller]
    pub fn fatal<I: IntoIterator<Item = Field>>(&self, ctx: &LogContext, message: &str, fields: I) {
        self.log(ctx, Severity::Fatal, message, fields);
        let _ = self.flush();
    }

    /// Write a prepared entry. Used by the HTTP and SQL adapters.
    pub fn emit(&self, ctx: &LogContext, entry: Entry) {
        if !self.accepts(entry.severity) {
            return;
        }
        let channel = entry.resolved_channel();
        self.dispatch(
            ctx,
            channel,
            entry.severity,
            &entry.message,
            entry.fields,
            entry.caller,
            entry.error,
        );
    }

    /// Block until every buffered byte is on disk. Safe to call repeatedly.
    pub fn flush(&self) -> Result<()> {
        self.inner.router.flush_all()?;
        Ok(())
    }

    /// Flush and close. Later log calls print one stderr diagnostic and are
    /// discarded. Idempotent.
    pub fn shutdown(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let result = self.flush();
        // Dropping the guard drains the console worker
        drop(self.inner.console_guard.lock().take());
        result
    }

    /// Rotate every stream whose boundary has passed.
    pub fn rotate(&self) -> Result<usize> {
        Ok(self.inner.router.rotate_all()?)
    }

    /// Remove files past the retention window.
    pub fn purge(&self) -> Result<usize> {
        Ok(self.inner.router.purge_all()?)
    }

    fn accepts(&self, severity: Severity) -> bool {
        if self.is_closed() {
            if !self.inner.closed_reported.swap(true, Ordering::Relaxed) {
                eprintln!("levelog: logger already shut down, dropping {} record", severity);
            }
            return false;
        }
        self.inner.router.should_emit(severity)
    }

    #[allow(clippy::too_many_arguments)]
    fn dispatch<I>(
        &self,
        ctx: &LogContext,
        channel: Channel,
        severity: Severity,
        message: &str,
        fields: I,
        caller: Option<CallerLocation>,
        error: Option<String>,
    ) where
        I: IntoIterator<Item = Field>,
    {
        let record = LogRecord::new(self.inner.clock.now(), severity, message)
            .with_fields(self.fields.iter().cloned().chain(fields))
            .with_token(ctx.token().cloned())
            .with_caller(caller)
            .with_error(error);
        self.write_record(channel, &record);
    }

    fn write_record(&self, channel: Channel, record: &LogRecord) {
        let line = record.encode(self.inner.format);

        // The file is picked from the record's timestamp, not a second clock reading
        let writer = self.inner.router.channel(channel);
        if let Err(e) = writer.write_at(record.timestamp(), &line) {
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            if !self.inner.write_failure_reported.swap(true, Ordering::Relaxed) {
                eprintln!(
                    "levelog: dropping record for {} stream after retry: {}",
                    writer.policy().base_name,
                    e
                );
            }
        }

        if let Some(console) = &self.inner.console {
            let mut console = console.clone();
            let _ = console.write_all(&line);
        }
    }
}

fn caller_for(severity: Severity, location: &Location<'_>) -> Option<CallerLocation> {
    (severity >= Severity::Warn).then(|| CallerLocation::from_location(location))
}
