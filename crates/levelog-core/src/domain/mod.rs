//! Domain types and value objects
//!
//! - Severity ordering
//! - Log records, structured fields and their line encodings
//! - Logger configuration and rotation policy
//! - Correlation tokens and the context that carries them

pub mod config;
pub mod correlation;
pub mod record;
mod severity;

pub use config::{
    duration_serde, format_duration, parse_duration, LoggerConfig, RotationPolicy,
    DEFAULT_RETENTION, DEFAULT_ROTATION_INTERVAL,
};
pub use correlation::{CorrelationToken, LogContext};
pub use record::{CallerLocation, Field, FieldValue, LogRecord, OutputFormat};
pub use severity::Severity;
