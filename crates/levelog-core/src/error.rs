//! Error types for logger construction and configuration

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to whoever initializes the logger.
///
/// Once a logger is running, write failures are never reported through this
/// type; they are retried once and then dropped.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to create log directory {path:?}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("log directory {path:?} is not writable: {source}")]
    DirectoryUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("logger is already initialized")]
    AlreadyInitialized,

    #[error("invalid logger configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = LogError> = std::result::Result<T, E>;
