//! Check-in configuration.
//!
//! Check-in is enabled by setting `HELM_ATTESTATION_URL`. Without it the
//! gateway runs license-file-only (offline enterprise deployments).

use std::time::Duration;

use helm_core::NodeId;
use url::Url;

/// Default check-in interval: 30 minutes.
pub const DEFAULT_INTERVAL_SECS: u64 = 30 * 60;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Where and how often to check in.
#[derive(Debug, Clone)]
pub struct AttestationConfig {
    /// Attestation endpoint; the request is a `POST` to this exact URL.
    pub endpoint: Url,
    pub interval_secs: u64,
    pub timeout_secs: u64,
    /// Identity reported for this node.
    pub node_id: NodeId,
    /// Software version reported on check-in.
    pub version: String,
}

impl AttestationConfig {
    /// Configuration with default interval and timeout and a random node id.
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            interval_secs: DEFAULT_INTERVAL_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            node_id: NodeId::generate(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Returns `Ok(None)` when `HELM_ATTESTATION_URL` is unset.
    ///
    /// Variables:
    /// - `HELM_ATTESTATION_URL` (optional)
    /// - `HELM_CHECKIN_INTERVAL_SECS` (default: 1800)
    /// - `HELM_CHECKIN_TIMEOUT_SECS` (default: 10)
    /// - `HELM_NODE_ID` (default: random UUID v4)
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env()`](Self::from_env) with an explicit variable
    /// source.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>, ConfigError> {
        let Some(raw_url) = lookup("HELM_ATTESTATION_URL") else {
            return Ok(None);
        };
        let endpoint = Url::parse(raw_url.trim()).map_err(|e| {
            ConfigError::InvalidUrl("HELM_ATTESTATION_URL".to_string(), e.to_string())
        })?;

        let mut config = Self::new(endpoint);
        config.interval_secs =
            env_positive(&lookup, "HELM_CHECKIN_INTERVAL_SECS", DEFAULT_INTERVAL_SECS)?;
        config.timeout_secs =
            env_positive(&lookup, "HELM_CHECKIN_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        if let Some(raw) = lookup("HELM_NODE_ID") {
            config.node_id = NodeId::new(&raw).map_err(|e| {
                ConfigError::InvalidValue("HELM_NODE_ID".to_string(), e.to_string())
            })?;
        }
        Ok(Some(config))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Read a positive integer, falling back to `default` when unset.
pub fn env_positive(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidValue(
            var.to_string(),
            "must be positive".to_string(),
        )),
        Ok(n) => Ok(n),
        Err(e) => Err(ConfigError::InvalidValue(var.to_string(), e.to_string())),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}
