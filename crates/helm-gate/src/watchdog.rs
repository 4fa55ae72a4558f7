//! # Lock Watchdog
//!
//! Polls the [`EmergencyLock`] at a fixed interval and, on observing it
//! engaged, hands the process to a [`Terminator`]. This is the primary
//! enforcement path: a locked process must not stay up serving requests.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::lock::EmergencyLock;

/// Process exit code used when the gateway terminates on a lock.
pub const LOCKED_EXIT_CODE: i32 = 3;

/// Default watchdog poll interval.
pub const DEFAULT_WATCHDOG_INTERVAL: Duration = Duration::from_secs(1);

/// Ends the host process (or, in tests, records that it would have).
pub trait Terminator: Send + Sync + std::fmt::Debug {
    fn terminate(&self, reason: &str);
}

/// Exits the process with [`LOCKED_EXIT_CODE`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessTerminator;

impl Terminator for ProcessTerminator {
    fn terminate(&self, reason: &str) {
        tracing::error!(reason, exit_code = LOCKED_EXIT_CODE, "license gateway locked; exiting");
        std::process::exit(LOCKED_EXIT_CODE);
    }
}

/// Counts terminations instead of exiting.
#[cfg(any(test, feature = "test-seams"))]
#[derive(Debug, Default)]
pub struct RecordingTerminator {
    reasons: parking_lot::Mutex<Vec<String>>,
}

#[cfg(any(test, feature = "test-seams"))]
impl RecordingTerminator {
    pub fn calls(&self) -> usize {
        self.reasons.lock().len()
    }

    pub fn last_reason(&self) -> Option<String> {
        self.reasons.lock().last().cloned()
    }
}

#[cfg(any(test, feature = "test-seams"))]
impl Terminator for RecordingTerminator {
    fn terminate(&self, reason: &str) {
        self.reasons.lock().push(reason.to_string());
    }
}

/// Spawn the watchdog. The task calls `terminator` exactly once, the first
/// time it sees the lock engaged, and then ends.
pub fn spawn_watchdog(
    lock: EmergencyLock,
    terminator: Arc<dyn Terminator>,
    poll_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Some(record) = lock.record() {
                tracing::error!(
                    reason = %record.reason,
                    engaged_at = %record.engaged_at,
                    "watchdog observed emergency lock"
                );
                terminator.terminate(&record.reason);
                break;
            }
        }
    })
}
