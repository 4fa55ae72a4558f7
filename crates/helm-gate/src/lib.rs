//! # helm-gate: License Gateway Runtime
//!
//! Assembles the leaf crates into a running gateway:
//!
//! - **Manager** (`manager.rs`): `LicenseManager`, the only entry point
//!   hosts call. Validates a license, activates it, answers
//!   `can_execute_skill` and `update_node_count`, and routes every failure
//!   to the emergency lock.
//!
//! - **Lock** (`lock.rs`): `EmergencyLock`, the one-way fail-closed switch.
//!
//! - **Watchdog** (`watchdog.rs`): polls the lock and terminates the
//!   process when it is engaged.
//!
//! - **Scheduler** (`scheduler.rs`): periodic check-in owned by the
//!   manager. One failure locks.
//!
//! - **Metrics** (`metrics.rs`): feeds host gauges to the stability
//!   monitor. Lock escalation is opt-in.
//!
//! - **Config** (`config.rs`): `GatewayConfig` from `HELM_*` variables.
//!
//! ## Crate Policy
//!
//! - Lock state lives in an explicit shared object, never in the process
//!   environment.
//! - `stop_check_in` and the recording terminator exist only under
//!   `cfg(test)` or the `test-seams` feature.

pub mod config;
pub mod lock;
pub mod manager;
pub mod metrics;
pub mod scheduler;
pub mod watchdog;

// ─── Runtime re-exports ─────────────────────────────────────────────

pub use config::{Environment, GatewayConfig, GatewayConfigError, DIRECT_EXIT_DELAY};
pub use lock::{EmergencyLock, LockRecord};
pub use manager::{
    CheckInSettings, GateStatus, LicenseManager, LicenseManagerBuilder, LicenseSource,
    NotLicensed, ReloadOutcome,
};
pub use metrics::{
    spawn_stability_loop, HostMetrics, MetricsSource, StabilityLoopConfig, SystemMetrics,
    DEFAULT_STABILITY_INTERVAL,
};
pub use scheduler::{CheckInFailure, CheckInScheduler, CheckInStatus, CheckInTask, LockSink};
#[cfg(any(test, feature = "test-seams"))]
pub use watchdog::RecordingTerminator;
pub use watchdog::{
    spawn_watchdog, ProcessTerminator, Terminator, DEFAULT_WATCHDOG_INTERVAL, LOCKED_EXIT_CODE,
};
