//! # Classify CLI: stability severity for one sample.
//!
//! ```bash
//! helm classify --memory 72 --cpu 40 --response-time-ms 1200
//! ```

use anyhow::Result;
use clap::Args;

use helm_state::{classify, Severity, StabilitySample, StabilityThresholds};

/// Arguments for `helm classify`. Percentages are `0..=100`.
#[derive(Args, Debug, Default)]
pub struct ClassifyArgs {
    /// Memory in use, percent.
    #[arg(long, default_value_t = 0.0)]
    pub memory: f64,

    /// CPU in use, percent.
    #[arg(long, default_value_t = 0.0)]
    pub cpu: f64,

    /// Failed requests, percent.
    #[arg(long, default_value_t = 0.0)]
    pub error_rate: f64,

    /// Mean response time, milliseconds.
    #[arg(long, default_value_t = 0.0)]
    pub response_time_ms: f64,

    /// Open connections.
    #[arg(long, default_value_t = 0)]
    pub connections: u64,
}

impl ClassifyArgs {
    pub fn sample(&self) -> StabilitySample {
        StabilitySample {
            memory_usage: self.memory,
            cpu_usage: self.cpu,
            active_connections: self.connections,
            error_rate: self.error_rate,
            response_time_ms: self.response_time_ms,
        }
    }
}

/// Execute `helm classify`.
pub fn run_classify(args: &ClassifyArgs) -> Result<u8> {
    let severity = severity_of(args);
    println!(
        "{severity} healthy={} operational={}",
        severity.is_healthy(),
        severity.is_operational()
    );
    Ok(0)
}

pub fn severity_of(args: &ClassifyArgs) -> Severity {
    classify(&args.sample(), &StabilityThresholds::default())
}
