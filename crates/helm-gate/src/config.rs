//! Gateway configuration.
//!
//! Loaded from environment variables. The CLI layers its flags on top.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `HELM_PUBLIC_KEY` | required |
//! | `HELM_LICENSE_FILE` | none |
//! | `HELM_ENV` | `development` |
//! | `HELM_WATCHDOG_INTERVAL_MS` | 1000 |
//! | `HELM_STABILITY_INTERVAL_SECS` | 30 |
//!
//! Check-in variables are read by [`AttestationConfig::from_lookup`].

use std::path::PathBuf;
use std::time::Duration;

use helm_attest::{env_positive, AttestationConfig};
use helm_crypto::Ed25519PublicKey;
use thiserror::Error;

/// Delay before the direct-exit path terminates a locked production process.
pub const DIRECT_EXIT_DELAY: Duration = Duration::from_secs(5);

/// Deployment environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Whether a lock should also terminate the process directly.
    pub fn direct_exit(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = GatewayConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(GatewayConfigError::InvalidValue(
                "HELM_ENV".to_string(),
                format!("unknown environment {other:?}"),
            )),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to assemble a running gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Key that license signatures are verified against.
    pub public_key: Ed25519PublicKey,
    /// Enterprise license file.
    pub license_file: Option<PathBuf>,
    /// `None` disables check-in.
    pub attestation: Option<AttestationConfig>,
    pub environment: Environment,
    pub watchdog_interval: Duration,
    pub stability_interval: Duration,
}

impl GatewayConfig {
    /// Defaults for everything but the key.
    pub fn new(public_key: Ed25519PublicKey) -> Self {
        Self {
            public_key,
            license_file: None,
            attestation: None,
            environment: Environment::default(),
            watchdog_interval: crate::watchdog::DEFAULT_WATCHDOG_INTERVAL,
            stability_interval: crate::metrics::DEFAULT_STABILITY_INTERVAL,
        }
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self, GatewayConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env()`](Self::from_env) with an explicit variable
    /// source.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, GatewayConfigError> {
        let raw_key = lookup("HELM_PUBLIC_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or(GatewayConfigError::MissingPublicKey)?;
        let public_key = Ed25519PublicKey::parse(raw_key.trim())
            .map_err(|e| GatewayConfigError::InvalidPublicKey(e.to_string()))?;

        let mut config = Self::new(public_key);
        config.license_file = lookup("HELM_LICENSE_FILE")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        config.attestation = AttestationConfig::from_lookup(&lookup)?;
        if let Some(raw) = lookup("HELM_ENV") {
            config.environment = raw.parse()?;
        }
        config.watchdog_interval = Duration::from_millis(env_positive(
            &lookup,
            "HELM_WATCHDOG_INTERVAL_MS",
            1000,
        )?);
        config.stability_interval = Duration::from_secs(env_positive(
            &lookup,
            "HELM_STABILITY_INTERVAL_SECS",
            30,
        )?);
        Ok(config)
    }
}

/// Gateway configuration errors.
#[derive(Error, Debug)]
pub enum GatewayConfigError {
    #[error("HELM_PUBLIC_KEY is not set")]
    MissingPublicKey,
    #[error("invalid HELM_PUBLIC_KEY: {0}")]
    InvalidPublicKey(String),
    #[error(transparent)]
    Env(#[from] helm_attest::ConfigError),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}
