//! Stream services
//!
//! Rotating file writers and the router that assigns them to severities.

pub mod router;
pub mod writer;

pub use router::{Channel, LevelRouter};
pub use writer::{ensure_log_dir, Clock, ManualClock, RotatingWriter, SharedClock, SystemClock};
