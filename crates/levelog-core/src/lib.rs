//! # Levelog Core Library
//!
//! Structured, leveled logging into one rotating file per severity.
//!
//! ## Modules
//!
//! - `domain` - Severities, records, correlation tokens and configuration
//! - `service` - Rotating writers and the level router
//! - `logger` - The logger handle
//! - `global` - Process-wide singleton and free logging functions
//! - `caller` - Call stack attribution for adapters
//! - `template` - `{}` message templates
//! - `layer` - Bridge from `tracing` events
//! - `maintenance` - Scheduled rotation and retention

pub mod caller;
pub mod domain;
pub mod error;
pub mod global;
pub mod layer;
pub mod logger;
pub mod maintenance;
pub mod service;
pub mod template;

// Re-export commonly used types
pub use domain::*;
pub use domain::correlation::{attach, lookup, new_token};
pub use error::{LogError, Result};
pub use service::*;

pub use caller::{attribute, capture_caller, CallFrame, FrameFilter, DEFAULT_MAX_DEPTH};
pub use global::{init, init_with, install_panic_hook, is_initialized, LoggerGuard};
pub use layer::LevelogLayer;
pub use logger::{Entry, Logger, LoggerBuilder};
pub use maintenance::spawn_rotation_timer;
pub use template::format_template;
