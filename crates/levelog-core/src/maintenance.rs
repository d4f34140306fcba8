//! Periodic rotation and retention
//!
//! Writers rotate lazily on the first write past a boundary. The timer covers
//! quiet streams so their files are closed and purged on schedule.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::logger::Logger;

/// Rotate and purge every `period` until the logger shuts down.
pub fn spawn_rotation_timer(logger: Logger, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if logger.is_closed() {
                debug!("Logger closed, stopping rotation timer");
                break;
            }

            match logger.rotate() {
                Ok(0) => {}
                Ok(n) => debug!("Rotated {} log streams", n),
                Err(e) => warn!("Scheduled log rotation failed: {}", e),
            }
            match logger.purge() {
                Ok(0) => {}
                Ok(n) => debug!("Purged {} expired log files", n),
                Err(e) => warn!("Scheduled log purge failed: {}", e),
            }
        }
    })
}
