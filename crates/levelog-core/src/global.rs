//! Process-wide logger
//!
//! An explicit singleton: [`init`] installs it, [`shutdown`] removes it, and
//! nothing re-initializes it implicitly. The free logging functions are safe
//! to call at any time; with no logger installed they print a diagnostic to
//! stderr and return.
//!
//! Each install gets a generation number. A [`LoggerGuard`] only shuts down
//! the install it was issued for.

use parking_lot::RwLock;
use std::backtrace::Backtrace;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::domain::{CallerLocation, Field, LogContext, LoggerConfig, Severity};
use crate::error::{LogError, Result};
use crate::logger::{Entry, Logger, LoggerBuilder};

struct Installed {
    generation: u64,
    logger: Logger,
}

static GLOBAL: RwLock<Option<Installed>> = parking_lot::const_rwlock(None);
static GENERATION: AtomicU64 = AtomicU64::new(0);
static UNINIT_REPORTED: AtomicBool = AtomicBool::new(false);

/// Shuts the global logger down when dropped. Hold it for the life of `main`.
///
/// A guard outliving an explicit [`shutdown`] does nothing when dropped,
/// even if another logger was installed since.
#[must_use = "dropping the guard shuts the logger down"]
#[derive(Debug)]
pub struct LoggerGuard {
    generation: u64,
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        let logger = {
            let mut slot = GLOBAL.write();
            match slot.as_ref() {
                Some(installed) if installed.generation == self.generation => slot.take(),
                _ => None,
            }
        };
        if let Some(installed) = logger {
            if let Err(e) = installed.logger.shutdown() {
                eprintln!("levelog: shutdown failed: {}", e);
            }
        }
    }
}

/// Install the global logger built from `config`.
pub fn init(config: LoggerConfig) -> Result<LoggerGuard> {
    init_with(Logger::builder(config))
}

/// Install the global logger from a prepared builder.
pub fn init_with(builder: LoggerBuilder) -> Result<LoggerGuard> {
    let mut slot = GLOBAL.write();
    if slot.is_some() {
        return Err(LogError::AlreadyInitialized);
    }
    let logger = builder.build()?;
    let generation = GENERATION.fetch_add(1, Ordering::Relaxed) + 1;
    *slot = Some(Installed { generation, logger });
    UNINIT_REPORTED.store(false, Ordering::Relaxed);
    Ok(LoggerGuard { generation })
}

/// A handle to the global logger, if installed.
pub fn logger() -> Option<Logger> {
    GLOBAL.read().as_ref().map(|installed| installed.logger.clone())
}

pub fn is_initialized() -> bool {
    GLOBAL.read().is_some()
}

/// Flush and uninstall the global logger. Idempotent.
pub fn shutdown() -> Result<()> {
    let installed = GLOBAL.write().take();
    match installed {
        Some(installed) => installed.logger.shutdown(),
        None => Ok(()),
    }
}

/// Flush the global logger, if installed.
pub fn flush() -> Result<()> {
    match logger() {
        Some(logger) => logger.flush(),
        None => Ok(()),
    }
}

#[track_caller]
pub fn log<I>(ctx: &LogContext, severity: Severity, message: &str, fields: I)
where
    I: IntoIterator<Item = Field>,
{
    match logger() {
        Some(logger) => logger.log(ctx, severity, message, fields),
        None => report_uninitialized(severity),
    }
}

#[track_caller]
pub fn debug<I: IntoIterator<Item = Field>>(ctx: &LogContext, message: &str, fields: I) {
    log(ctx, Severity::Debug, message, fields);
}

#[track_caller]
pub fn info<I: IntoIterator<Item = Field>>(ctx: &LogContext, message: &str, fields: I) {
    log(ctx, Severity::Info, message, fields);
}

#[track_caller]
pub fn warn<I: IntoIterator<Item = Field>>(ctx: &LogContext, message: &str, fields: I) {
    log(ctx, Severity::Warn, message, fields);
}

#[track_caller]
pub fn error<I: IntoIterator<Item = Field>>(ctx: &LogContext, message: &str, fields: I) {
    log(ctx, Severity::Error, message, fields);
}

/// Log at fatal severity and flush. The process keeps running.
#[track_caller]
pub fn fatal<I: IntoIterator<Item = Field>>(ctx: &LogContext, message: &str, fields: I) {
    match logger() {
        Some(logger) => logger.fatal(ctx, message, fields),
        None => report_uninitialized(Severity::Fatal),
    }
}

fn report_uninitialized(severity: Severity) {
    if !UNINIT_REPORTED.swap(true, Ordering::Relaxed) {
        eprintln!("levelog: logger not initialized, dropping {} record", severity);
    }
}

/// Log panics at fatal severity with a backtrace, then run the previous hook.
pub fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if let Some(logger) = logger() {
            let payload = info
                .payload()
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| info.payload().downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            let thread = std::thread::current();

            logger.emit(
                &LogContext::new(),
                Entry::new(Severity::Fatal, "panic recovered")
                    .caller(info.location().map(CallerLocation::from_location))
                    .field("thread", thread.name().unwrap_or("<unnamed>"))
                    .field("stack", Backtrace::force_capture().to_string())
                    .error(payload),
            );
            let _ = logger.flush();
        }
        previous(info);
    }));
}
