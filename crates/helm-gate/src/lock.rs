//! # Emergency Lock
//!
//! The single fail-closed switch for the host process. Every fatal license
//! condition, and any collaborator that detects tampering or a policy
//! breach, routes here.
//!
//! ## Invariants
//!
//! - One-way: `false → true` only. No public API clears it.
//! - First writer wins: the first reason and time are kept.
//! - A reader that observes `is_engaged() == true` also observes the
//!   committed [`LockRecord`] (Release store after the record is written,
//!   Acquire load on read).
//! - `is_engaged()` is a single atomic load and never blocks.
//!
//! Lock state lives in this object, not in the process environment, so
//! independent instances can coexist in one test binary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use helm_core::Timestamp;
use parking_lot::Mutex;

use crate::watchdog::Terminator;

/// Why and when the lock engaged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRecord {
    pub reason: String,
    pub engaged_at: Timestamp,
}

/// Process-wide fail-closed flag. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct EmergencyLock {
    inner: Arc<LockInner>,
}

struct LockInner {
    engaged: AtomicBool,
    record: Mutex<Option<LockRecord>>,
    direct_exit: Option<DirectExit>,
}

struct DirectExit {
    terminator: Arc<dyn Terminator>,
    delay: Duration,
}

impl EmergencyLock {
    /// A lock whose only enforcement path is the watchdog.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A lock that additionally calls `terminator` from a detached thread
    /// `delay` after engagement. Used in production so that termination
    /// does not depend on the async runtime staying healthy.
    pub fn with_direct_exit(terminator: Arc<dyn Terminator>, delay: Duration) -> Self {
        Self::build(Some(DirectExit { terminator, delay }))
    }

    fn build(direct_exit: Option<DirectExit>) -> Self {
        Self {
            inner: Arc::new(LockInner {
                engaged: AtomicBool::new(false),
                record: Mutex::new(None),
                direct_exit,
            }),
        }
    }

    /// Engage the lock. Returns `true` if this call engaged it, `false` if
    /// it was already engaged (the original reason is kept).
    pub fn engage(&self, reason: &str) -> bool {
        let record = {
            let mut slot = self.inner.record.lock();
            if self.inner.engaged.load(Ordering::Acquire) {
                drop(slot);
                tracing::warn!(reason, "emergency lock already engaged");
                return false;
            }
            let record = LockRecord {
                reason: reason.to_string(),
                engaged_at: Timestamp::now(),
            };
            *slot = Some(record.clone());
            self.inner.engaged.store(true, Ordering::Release);
            record
        };

        tracing::error!(
            reason = %record.reason,
            engaged_at = %record.engaged_at,
            "emergency lock engaged; restart required"
        );

        if let Some(direct) = &self.inner.direct_exit {
            let terminator = Arc::clone(&direct.terminator);
            let delay = direct.delay;
            let reason = record.reason;
            let spawned = std::thread::Builder::new()
                .name("helm-direct-exit".to_string())
                .spawn(move || {
                    std::thread::sleep(delay);
                    terminator.terminate(&reason);
                });
            if let Err(e) = spawned {
                tracing::error!(error = %e, "failed to spawn direct-exit thread");
            }
        }
        true
    }

    /// Whether the lock is engaged.
    pub fn is_engaged(&self) -> bool {
        self.inner.engaged.load(Ordering::Acquire)
    }

    /// The engagement record, if engaged.
    pub fn record(&self) -> Option<LockRecord> {
        if !self.is_engaged() {
            return None;
        }
        self.inner.record.lock().clone()
    }

    /// Whether a direct-exit path is configured.
    pub fn has_direct_exit(&self) -> bool {
        self.inner.direct_exit.is_some()
    }
}

impl Default for EmergencyLock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EmergencyLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmergencyLock")
            .field("engaged", &self.is_engaged())
            .field("direct_exit", &self.has_direct_exit())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watchdog::RecordingTerminator;

    #[test]
    fn starts_disengaged() {
        let lock = EmergencyLock::new();
        assert!(!lock.is_engaged());
        assert!(lock.record().is_none());
    }

    #[test]
    fn first_reason_wins() {
        let lock = EmergencyLock::new();
        assert!(lock.engage("signature invalid"));
        assert!(!lock.engage("node limit exceeded"));
        assert!(lock.is_engaged());
        assert_eq!(lock.record().unwrap().reason, "signature invalid");
    }

    #[test]
    fn clones_share_state() {
        let lock = EmergencyLock::new();
        let clone = lock.clone();
        clone.engage("tamper detected");
        assert!(lock.is_engaged());
    }

    #[test]
    fn independent_instances_do_not_leak() {
        let a = EmergencyLock::new();
        let b = EmergencyLock::new();
        a.engage("a");
        assert!(!b.is_engaged());
    }

    #[test]
    fn concurrent_engage_has_one_winner() {
        let lock = EmergencyLock::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let lock = lock.clone();
                std::thread::spawn(move || lock.engage(&format!("reason {i}")))
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert!(lock.record().unwrap().reason.starts_with("reason "));
    }

    #[test]
    fn direct_exit_fires_once_after_delay() {
        let terminator = Arc::new(RecordingTerminator::default());
        let lock = EmergencyLock::with_direct_exit(terminator.clone(), Duration::from_millis(20));
        lock.engage("production breach");
        lock.engage("second");

        for _ in 0..100 {
            if terminator.calls() > 0 {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(terminator.calls(), 1);
        assert_eq!(terminator.last_reason().as_deref(), Some("production breach"));
    }
}
