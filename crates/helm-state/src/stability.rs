//! # Stability Severity
//!
//! Classifies a resource sample on the ordered scale
//! `normal < degraded < minimal < safe < shutdown`.
//!
//! Classification is stateless: each sample is judged on its own against
//! fixed thresholds, with no smoothing or dwell time. Noisy gauges can make
//! the severity flap between adjacent levels from one tick to the next.
//!
//! The monitor does not engage the emergency lock. Escalation is wired up
//! by the runtime, and only when the host opts in.

use serde::{Deserialize, Serialize};

/// Ordered health severity.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Normal,
    Degraded,
    Minimal,
    Safe,
    Shutdown,
}

impl Severity {
    /// True only for `normal` and `degraded`.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Normal | Self::Degraded)
    }

    /// True for everything except `shutdown`.
    pub fn is_operational(&self) -> bool {
        !matches!(self, Self::Shutdown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Degraded => "degraded",
            Self::Minimal => "minimal",
            Self::Safe => "safe",
            Self::Shutdown => "shutdown",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reading of the host's gauges.
///
/// `memory_usage`, `cpu_usage`, and `error_rate` are percentages in
/// `0..=100`. NaN gauges never trip a threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StabilitySample {
    pub memory_usage: f64,
    pub cpu_usage: f64,
    pub active_connections: u64,
    pub error_rate: f64,
    pub response_time_ms: f64,
}

/// Strict (`>`) upper bounds for each severity level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StabilityThresholds {
    pub shutdown_memory: f64,
    pub shutdown_cpu: f64,
    pub shutdown_error_rate: f64,
    pub safe_memory: f64,
    pub safe_cpu: f64,
    pub safe_error_rate: f64,
    pub minimal_memory: f64,
    pub minimal_cpu: f64,
    pub minimal_response_time_ms: f64,
    pub degraded_memory: f64,
    pub degraded_cpu: f64,
}

impl Default for StabilityThresholds {
    fn default() -> Self {
        Self {
            shutdown_memory: 95.0,
            shutdown_cpu: 95.0,
            shutdown_error_rate: 10.0,
            safe_memory: 80.0,
            safe_cpu: 85.0,
            safe_error_rate: 5.0,
            minimal_memory: 60.0,
            minimal_cpu: 70.0,
            minimal_response_time_ms: 5000.0,
            degraded_memory: 40.0,
            degraded_cpu: 50.0,
        }
    }
}

/// Classify one sample. First matching level from the top wins.
pub fn classify(sample: &StabilitySample, t: &StabilityThresholds) -> Severity {
    if sample.memory_usage > t.shutdown_memory
        || sample.cpu_usage > t.shutdown_cpu
        || sample.error_rate > t.shutdown_error_rate
    {
        Severity::Shutdown
    } else if sample.memory_usage > t.safe_memory
        || sample.cpu_usage > t.safe_cpu
        || sample.error_rate > t.safe_error_rate
    {
        Severity::Safe
    } else if sample.memory_usage > t.minimal_memory
        || sample.cpu_usage > t.minimal_cpu
        || sample.response_time_ms > t.minimal_response_time_ms
    {
        Severity::Minimal
    } else if sample.memory_usage > t.degraded_memory || sample.cpu_usage > t.degraded_cpu {
        Severity::Degraded
    } else {
        Severity::Normal
    }
}

/// Outcome of one monitoring tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeverityChange {
    pub previous: Severity,
    pub current: Severity,
}

impl SeverityChange {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }

    pub fn worsened(&self) -> bool {
        self.current > self.previous
    }
}

/// Retains the severity of the latest sample while monitoring is on.
#[derive(Debug, Clone, Default)]
pub struct StabilityMonitor {
    thresholds: StabilityThresholds,
    monitoring: bool,
    closed: bool,
    current: Severity,
    last_sample: Option<StabilitySample>,
}

impl StabilityMonitor {
    pub fn new(thresholds: StabilityThresholds) -> Self {
        Self {
            thresholds,
            ..Self::default()
        }
    }

    /// Begin accepting samples. Has no effect after `shutdown()`.
    pub fn start(&mut self) {
        if !self.closed {
            self.monitoring = true;
        }
    }

    /// Stop accepting samples. The current severity is kept.
    pub fn stop(&mut self) {
        self.monitoring = false;
    }

    /// Stop permanently.
    pub fn shutdown(&mut self) {
        self.monitoring = false;
        self.closed = true;
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    /// Whether `shutdown()` has been called.
    pub fn is_shut_down(&self) -> bool {
        self.closed
    }

    /// Classify `sample` and retain the result. Returns `None` without
    /// touching state when not monitoring.
    pub fn check(&mut self, sample: &StabilitySample) -> Option<SeverityChange> {
        if !self.monitoring {
            return None;
        }
        let previous = self.current;
        self.current = classify(sample, &self.thresholds);
        self.last_sample = Some(*sample);
        Some(SeverityChange {
            previous,
            current: self.current,
        })
    }

    pub fn current(&self) -> Severity {
        self.current
    }

    pub fn last_sample(&self) -> Option<&StabilitySample> {
        self.last_sample.as_ref()
    }

    pub fn thresholds(&self) -> &StabilityThresholds {
        &self.thresholds
    }

    pub fn is_healthy(&self) -> bool {
        self.current.is_healthy()
    }

    pub fn is_operational(&self) -> bool {
        self.current.is_operational()
    }
}
