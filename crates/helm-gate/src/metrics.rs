//! # Stability Sampling
//!
//! Feeds host gauges into the [`StabilityMonitor`] on a fixed interval.
//! [`SystemMetrics`] reads memory and CPU from the operating system and
//! takes connection and request figures from the [`HostMetrics`] the host
//! process reports into. The loop turns that into a [`StabilitySample`]
//! each tick.
//!
//! Severity changes are logged. The emergency lock is engaged on
//! `shutdown` severity only when [`StabilityLoopConfig::escalate_on_shutdown`]
//! is set.

use std::sync::Arc;
use std::time::Duration;

use helm_state::{Severity, StabilityMonitor, StabilitySample};
use parking_lot::Mutex;
use sysinfo::System;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::lock::EmergencyLock;

/// Default stability sampling interval.
pub const DEFAULT_STABILITY_INTERVAL: Duration = Duration::from_secs(30);

/// Produces one sample per call.
pub trait MetricsSource: Send + Sync + std::fmt::Debug {
    fn sample(&self) -> StabilitySample;
}

/// Gauges reported by the host process.
///
/// Memory, CPU, and connection count are last-value gauges. Request
/// outcomes accumulate over a window that resets on each [`sample`].
///
/// [`sample`]: MetricsSource::sample
#[derive(Debug, Default)]
pub struct HostMetrics {
    inner: Mutex<HostGauges>,
}

#[derive(Debug, Default)]
struct HostGauges {
    memory_usage: f64,
    cpu_usage: f64,
    active_connections: u64,
    requests: u64,
    errors: u64,
    total_response: Duration,
}

impl HostMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Memory in use, percent.
    pub fn set_memory_usage(&self, percent: f64) {
        self.inner.lock().memory_usage = percent;
    }

    /// CPU in use, percent.
    pub fn set_cpu_usage(&self, percent: f64) {
        self.inner.lock().cpu_usage = percent;
    }

    pub fn set_active_connections(&self, count: u64) {
        self.inner.lock().active_connections = count;
    }

    /// Record one completed request.
    pub fn record_request(&self, elapsed: Duration, ok: bool) {
        let mut g = self.inner.lock();
        g.requests += 1;
        if !ok {
            g.errors += 1;
        }
        g.total_response += elapsed;
    }
}

impl MetricsSource for HostMetrics {
    fn sample(&self) -> StabilitySample {
        let mut g = self.inner.lock();
        let (error_rate, response_time_ms) = if g.requests == 0 {
            (0.0, 0.0)
        } else {
            let n = g.requests as f64;
            (
                g.errors as f64 / n * 100.0,
                g.total_response.as_secs_f64() * 1000.0 / n,
            )
        };
        let sample = StabilitySample {
            memory_usage: g.memory_usage,
            cpu_usage: g.cpu_usage,
            active_connections: g.active_connections,
            error_rate,
            response_time_ms,
        };
        g.requests = 0;
        g.errors = 0;
        g.total_response = Duration::ZERO;
        sample
    }
}

/// Operating-system memory and CPU, merged with a [`HostMetrics`] window.
///
/// CPU usage is measured between consecutive samples, so the first sample
/// after construction reads the CPU as idle.
pub struct SystemMetrics {
    system: Mutex<System>,
    host: Arc<HostMetrics>,
}

impl SystemMetrics {
    pub fn new(host: Arc<HostMetrics>) -> Self {
        let mut system = System::new();
        system.refresh_memory();
        system.refresh_cpu();
        Self {
            system: Mutex::new(system),
            host,
        }
    }

    /// Where the host records connections and request outcomes.
    pub fn host(&self) -> &Arc<HostMetrics> {
        &self.host
    }
}

impl MetricsSource for SystemMetrics {
    fn sample(&self) -> StabilitySample {
        let (memory_usage, cpu_usage) = {
            let mut system = self.system.lock();
            system.refresh_memory();
            system.refresh_cpu();
            let total = system.total_memory();
            let memory = if total == 0 {
                0.0
            } else {
                system.used_memory() as f64 / total as f64 * 100.0
            };
            (memory, f64::from(system.global_cpu_info().cpu_usage()))
        };
        StabilitySample {
            memory_usage,
            cpu_usage,
            ..self.host.sample()
        }
    }
}

impl std::fmt::Debug for SystemMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemMetrics")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

/// Stability loop settings.
#[derive(Debug, Clone, Copy)]
pub struct StabilityLoopConfig {
    pub interval: Duration,
    /// Engage the emergency lock when severity reaches `shutdown`.
    pub escalate_on_shutdown: bool,
}

impl Default for StabilityLoopConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_STABILITY_INTERVAL,
            escalate_on_shutdown: false,
        }
    }
}

/// Spawn the sampling loop. Ends when the monitor is shut down or, with
/// escalation on, after it engages the lock.
pub fn spawn_stability_loop(
    monitor: Arc<Mutex<StabilityMonitor>>,
    source: Arc<dyn MetricsSource>,
    lock: EmergencyLock,
    config: StabilityLoopConfig,
) -> JoinHandle<()> {
    monitor.lock().start();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;

            let sample = source.sample();
            let change = {
                let mut m = monitor.lock();
                if m.is_shut_down() {
                    break;
                }
                m.check(&sample)
            };

            let Some(change) = change else { continue };
            if !change.changed() {
                continue;
            }

            match change.current {
                Severity::Shutdown => tracing::error!(
                    previous = %change.previous,
                    memory = sample.memory_usage,
                    cpu = sample.cpu_usage,
                    error_rate = sample.error_rate,
                    "stability severity reached shutdown"
                ),
                _ if change.worsened() => tracing::warn!(
                    previous = %change.previous,
                    current = %change.current,
                    "stability severity worsened"
                ),
                _ => tracing::info!(
                    previous = %change.previous,
                    current = %change.current,
                    "stability severity improved"
                ),
            }

            if change.current == Severity::Shutdown && config.escalate_on_shutdown {
                lock.engage("stability severity reached shutdown");
                break;
            }
        }
    })
}
