//! # Run CLI: the gateway runtime.
//!
//! Builds the gateway from `HELM_*` variables and flags, validates the
//! license, then keeps the watchdog, check-in, and stability loops running
//! until Ctrl-C. On Unix, `SIGHUP` reloads the license file.
//!
//! ```bash
//! HELM_PUBLIC_KEY=<hex> helm run --license /etc/helm/license.json --nodes 3
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use parking_lot::Mutex;

use helm_crypto::Ed25519Verifier;
use helm_gate::{
    spawn_stability_loop, spawn_watchdog, CheckInSettings, EmergencyLock, GatewayConfig,
    GatewayConfigError, HostMetrics, LicenseManager, LicenseSource, ProcessTerminator,
    StabilityLoopConfig, SystemMetrics, Terminator, DIRECT_EXIT_DELAY, LOCKED_EXIT_CODE,
};
use helm_state::{StabilityMonitor, StabilityThresholds};

/// Arguments for `helm run`. Flags override the matching variables.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// License file. Overrides `HELM_LICENSE_FILE`.
    #[arg(long)]
    pub license: Option<PathBuf>,

    /// Ed25519 public key, hex or base64. Overrides `HELM_PUBLIC_KEY`.
    #[arg(long)]
    pub public_key: Option<String>,

    /// Nodes in use at startup.
    #[arg(long, default_value_t = 1)]
    pub nodes: u64,

    /// Engage the emergency lock when stability severity reaches shutdown.
    #[arg(long)]
    pub escalate_on_shutdown: bool,
}

/// Execute `helm run`.
pub fn run_gateway(args: &RunArgs) -> Result<u8> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let config =
        gateway_config(args, |var| std::env::var(var).ok()).context("invalid configuration")?;
    runtime.block_on(serve(args, config))
}

/// Gateway configuration from `env` with `args` layered on top.
pub fn gateway_config(
    args: &RunArgs,
    env: impl Fn(&str) -> Option<String>,
) -> Result<GatewayConfig, GatewayConfigError> {
    GatewayConfig::from_lookup(|var| match var {
        "HELM_PUBLIC_KEY" if args.public_key.is_some() => args.public_key.clone(),
        "HELM_LICENSE_FILE" if args.license.is_some() => {
            args.license.as_ref().map(|p| p.display().to_string())
        }
        _ => env(var),
    })
}

async fn serve(args: &RunArgs, config: GatewayConfig) -> Result<u8> {
    let license_file = config
        .license_file
        .clone()
        .context("no license file: pass --license or set HELM_LICENSE_FILE")?;

    let terminator: Arc<dyn Terminator> = Arc::new(ProcessTerminator);
    let lock = if config.environment.direct_exit() {
        EmergencyLock::with_direct_exit(Arc::clone(&terminator), DIRECT_EXIT_DELAY)
    } else {
        EmergencyLock::new()
    };
    let watchdog = spawn_watchdog(lock.clone(), terminator, config.watchdog_interval);

    let mut builder = LicenseManager::builder(Arc::new(Ed25519Verifier::new(
        config.public_key.clone(),
    )))
    .lock(lock.clone());
    if let Some(attestation) = &config.attestation {
        let settings = CheckInSettings::from_config(attestation)
            .context("failed to build attestation client")?;
        builder = builder.check_in(settings);
    }
    let manager = builder.build();

    tracing::info!(
        environment = %config.environment,
        license = %license_file.display(),
        check_in = config.attestation.is_some(),
        "starting license gateway"
    );

    manager.update_node_count(args.nodes)?;
    if let Err(e) = manager.initialize(LicenseSource::File(license_file)).await {
        // Exit with the locked code ourselves rather than waiting on the watchdog.
        watchdog.abort();
        eprintln!("license rejected: {e}");
        return Ok(LOCKED_EXIT_CODE as u8);
    }
    println!("{}", manager.status());

    let monitor = Arc::new(Mutex::new(StabilityMonitor::new(
        StabilityThresholds::default(),
    )));
    let stability = spawn_stability_loop(
        Arc::clone(&monitor),
        Arc::new(SystemMetrics::new(Arc::new(HostMetrics::new()))),
        lock.clone(),
        StabilityLoopConfig {
            interval: config.stability_interval,
            escalate_on_shutdown: args.escalate_on_shutdown,
        },
    );

    wait_for_shutdown(&manager).await?;

    monitor.lock().shutdown();
    stability.abort();
    manager.shutdown().await;
    watchdog.abort();
    println!("{}", manager.status());

    if lock.is_engaged() {
        return Ok(LOCKED_EXIT_CODE as u8);
    }
    Ok(0)
}

#[cfg(unix)]
async fn wait_for_shutdown(manager: &LicenseManager) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;
    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.context("failed to listen for Ctrl-C")?;
                tracing::info!("shutdown requested");
                return Ok(());
            }
            _ = hangup.recv() => match manager.reload().await {
                Ok(outcome) => tracing::info!(?outcome, "license reload"),
                Err(e) => tracing::error!(error = %e, "license reload failed"),
            },
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_manager: &LicenseManager) -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    tracing::info!("shutdown requested");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use helm_crypto::Ed25519KeyPair;
    use helm_gate::Environment;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn key(seed: u8) -> String {
        Ed25519KeyPair::from_seed(&[seed; 32]).public_key().to_hex()
    }

    #[test]
    fn flags_override_environment() {
        let args = RunArgs {
            license: Some(PathBuf::from("/tmp/flag.json")),
            public_key: Some(key(1)),
            ..RunArgs::default()
        };
        let env_key = key(2);
        let config = gateway_config(
            &args,
            env(&[
                ("HELM_PUBLIC_KEY", env_key.as_str()),
                ("HELM_LICENSE_FILE", "/tmp/env.json"),
                ("HELM_ENV", "production"),
            ]),
        )
        .unwrap();
        assert_eq!(config.public_key.to_hex(), key(1));
        assert_eq!(config.license_file, Some(PathBuf::from("/tmp/flag.json")));
        assert_eq!(config.environment, Environment::Production);
    }

    #[test]
    fn environment_used_without_flags() {
        let env_key = key(2);
        let config = gateway_config(
            &RunArgs::default(),
            env(&[
                ("HELM_PUBLIC_KEY", env_key.as_str()),
                ("HELM_LICENSE_FILE", "/tmp/env.json"),
            ]),
        )
        .unwrap();
        assert_eq!(config.public_key.to_hex(), env_key);
        assert_eq!(config.license_file, Some(PathBuf::from("/tmp/env.json")));
    }

    #[test]
    fn missing_key_is_reported() {
        let err = gateway_config(&RunArgs::default(), env(&[])).unwrap_err();
        assert!(matches!(err, GatewayConfigError::MissingPublicKey));
    }

    #[tokio::test]
    async fn serve_without_license_file_is_an_error() {
        let config = gateway_config(
            &RunArgs::default(),
            env(&[("HELM_PUBLIC_KEY", key(3).as_str())]),
        )
        .unwrap();
        let err = serve(&RunArgs::default(), config).await.unwrap_err();
        assert!(err.to_string().contains("no license file"));
    }

    #[tokio::test]
    async fn serve_rejects_bad_license_with_locked_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("license.json");
        std::fs::write(&file, "{}").unwrap();

        let args = RunArgs {
            license: Some(file),
            public_key: Some(key(4)),
            ..RunArgs::default()
        };
        let config = gateway_config(&args, env(&[])).unwrap();
        assert_eq!(serve(&args, config).await.unwrap(), LOCKED_EXIT_CODE as u8);
    }
}
