//! # Check-In Scheduler
//!
//! Periodic attestation of continued entitlement. Started by the license
//! manager when a license becomes active; there is no way for an ordinary
//! caller to stop it.
//!
//! Each tick:
//!
//! 1. Ends the loop if the lock is already engaged.
//! 2. Engages the lock if the license has expired.
//! 3. Performs one check-in. Success records `last_success`. Failure
//!    engages the lock and ends the loop. There are no retries.
//!
//! The first tick fires immediately on start.
//!
//! Fatal outcomes go to a [`LockSink`]. The license manager supplies one
//! that also moves its gate to `LOCKED`.

use std::sync::Arc;
use std::time::Duration;

use helm_attest::{Attestor, CheckInRequest};
use helm_core::{Clock, LicenseId, Timestamp};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::lock::EmergencyLock;

/// Outcome history of check-ins for the current process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckInStatus {
    pub attempts: u64,
    pub successes: u64,
    pub last_success: Option<Timestamp>,
    pub last_failure: Option<CheckInFailure>,
}

/// The most recent failed check-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInFailure {
    pub at: Timestamp,
    pub error: String,
}

impl CheckInStatus {
    /// True when there has been no successful check-in within `max_age` of
    /// `now`, including when there has never been one.
    pub fn is_stale(&self, now: Timestamp, max_age: chrono::Duration) -> bool {
        match self.last_success {
            None => true,
            Some(at) => now.since(&at) > max_age,
        }
    }
}

/// Receives the scheduler's fatal outcomes.
pub trait LockSink: Send + Sync + std::fmt::Debug {
    fn is_engaged(&self) -> bool;
    fn engage(&self, reason: &str);
}

impl LockSink for EmergencyLock {
    fn is_engaged(&self) -> bool {
        EmergencyLock::is_engaged(self)
    }

    fn engage(&self, reason: &str) {
        EmergencyLock::engage(self, reason);
    }
}

/// Everything one scheduler run needs.
#[derive(Debug, Clone)]
pub struct CheckInTask {
    pub attestor: Arc<dyn Attestor>,
    pub credential: LicenseId,
    pub request: CheckInRequest,
    pub interval: Duration,
    pub expires_at: Timestamp,
    pub clock: Arc<dyn Clock>,
    pub lock: Arc<dyn LockSink>,
    pub status: Arc<Mutex<CheckInStatus>>,
}

/// Handle to a running check-in loop. Dropping it aborts the loop.
#[derive(Debug)]
pub struct CheckInScheduler {
    task: Option<JoinHandle<()>>,
}

impl CheckInScheduler {
    /// Spawn the loop on the current tokio runtime.
    pub fn start(task: CheckInTask) -> Self {
        tracing::info!(
            license_id = %task.credential,
            interval_secs = task.interval.as_secs(),
            "check-in scheduler started"
        );
        Self {
            task: Some(tokio::spawn(run(task))),
        }
    }

    /// Whether the loop is still running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the loop. No tick runs after this returns.
    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            // A cancelled or already-finished task; either way it is done.
            let _ = task.await;
            tracing::debug!("check-in scheduler stopped");
        }
    }
}

impl Drop for CheckInScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(task: CheckInTask) {
    let mut ticker = tokio::time::interval(task.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if task.lock.is_engaged() {
            tracing::debug!("lock engaged; check-in loop exiting");
            break;
        }

        let now = task.clock.now();
        if now >= task.expires_at {
            tracing::error!(
                license_id = %task.credential,
                expires_at = %task.expires_at,
                "license expired while active"
            );
            task.lock.engage("license expired");
            break;
        }

        task.status.lock().attempts += 1;
        match task.attestor.check_in(&task.credential, &task.request).await {
            Ok(()) => {
                let at = task.clock.now();
                {
                    let mut status = task.status.lock();
                    status.successes += 1;
                    status.last_success = Some(at);
                }
                tracing::debug!(license_id = %task.credential, at = %at, "check-in succeeded");
            }
            Err(e) => {
                tracing::error!(license_id = %task.credential, error = %e, "check-in failed");
                task.status.lock().last_failure = Some(CheckInFailure {
                    at: now,
                    error: e.to_string(),
                });
                task.lock.engage(&format!("check-in failed: {e}"));
                break;
            }
        }
    }
}
