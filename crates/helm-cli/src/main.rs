//! # helm CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use helm_cli::classify::{run_classify, ClassifyArgs};
use helm_cli::run::{run_gateway, RunArgs};
use helm_cli::verify::{run_verify, VerifyArgs};

/// Helm license gateway.
///
/// Verifies signed licenses, runs the fail-closed gateway runtime, and
/// classifies host stability samples.
#[derive(Parser, Debug)]
#[command(name = "helm", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a license file offline.
    Verify(VerifyArgs),

    /// Run the license gateway until Ctrl-C.
    Run(RunArgs),

    /// Classify one stability sample.
    Classify(ClassifyArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    tracing::debug!("helm CLI starting");

    let result = match cli.command {
        Commands::Verify(args) => run_verify(&args),
        Commands::Run(args) => run_gateway(&args),
        Commands::Classify(args) => run_classify(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

/// `RUST_LOG` wins when set; otherwise verbosity picks the level.
fn init_tracing(verbose: u8, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn cli_parse_verify() {
        let cli = Cli::try_parse_from([
            "helm",
            "verify",
            "--license",
            "license.json",
            "--public-key",
            "abcd",
            "--skill",
            "chat",
            "--skill",
            "search",
        ])
        .unwrap();
        if let Commands::Verify(args) = cli.command {
            assert_eq!(args.license, PathBuf::from("license.json"));
            assert_eq!(args.public_key, "abcd");
            assert_eq!(args.skills, vec!["chat", "search"]);
            assert!(args.nodes.is_none());
        } else {
            panic!("expected verify");
        }
    }

    #[test]
    fn cli_parse_run_defaults() {
        let cli = Cli::try_parse_from(["helm", "run"]).unwrap();
        if let Commands::Run(args) = cli.command {
            assert!(args.license.is_none());
            assert_eq!(args.nodes, 1);
            assert!(!args.escalate_on_shutdown);
        } else {
            panic!("expected run");
        }
    }

    #[test]
    fn cli_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "helm",
            "-vv",
            "run",
            "--license",
            "/etc/helm/license.json",
            "--nodes",
            "4",
            "--escalate-on-shutdown",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        if let Commands::Run(args) = cli.command {
            assert_eq!(args.nodes, 4);
            assert!(args.escalate_on_shutdown);
        } else {
            panic!("expected run");
        }
    }

    #[test]
    fn cli_parse_classify() {
        let cli =
            Cli::try_parse_from(["helm", "--log-json", "classify", "--cpu", "96.5"]).unwrap();
        assert!(cli.log_json);
        if let Commands::Classify(args) = cli.command {
            assert_eq!(args.cpu, 96.5);
            assert_eq!(args.memory, 0.0);
        } else {
            panic!("expected classify");
        }
    }

    #[test]
    fn cli_verify_requires_license() {
        assert!(Cli::try_parse_from(["helm", "verify", "--public-key", "abcd"]).is_err());
    }
}
