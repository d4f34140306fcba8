//! Levelog SQL
//!
//! Query logging for SQLite.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 Application                  │
//! ├──────────────────────────────────────────────┤
//! │   TracedConnection (rusqlite wrapper)        │
//! ├──────────────────────────────────────────────┤
//! │   QueryLogger trait                          │
//! ├──────────────────────────────────────────────┤
//! │   SqlLogger -> sql stream of the Logger      │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use levelog_sql::{SqlLogger, SqlLoggerConfig, TracedConnection};
//! use std::sync::Arc;
//!
//! let adapter = SqlLogger::new(logger, SqlLoggerConfig::default());
//! let db = TracedConnection::open(&path, Arc::new(adapter))?;
//! db.execute(&ctx, "DELETE FROM sessions WHERE expired = 1", [])?;
//! ```

mod adapter;
mod connection;
mod contract;
mod error;

pub use adapter::{
    classify, QueryOutcome, SqlLogger, SqlLoggerConfig, DEFAULT_CALLER_SKIP,
    DEFAULT_SLOW_THRESHOLD,
};
pub use connection::TracedConnection;
pub use contract::{QueryLogMode, QueryLogger};
pub use error::QueryError;
