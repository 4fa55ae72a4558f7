//! # helm-cli: CLI for the Helm License Gateway
//!
//! Provides the `helm` command-line interface.
//!
//! ## Subcommands
//!
//! - `helm verify`: Offline license validation and skill decisions.
//! - `helm run`: Run the gateway runtime until Ctrl-C.
//! - `helm classify`: Stability severity for a single sample.
//!
//! ```bash
//! helm verify --license license.json --public-key <hex> --skill chat
//! HELM_PUBLIC_KEY=<hex> helm run --license license.json --nodes 3
//! helm classify --cpu 96
//! ```
//!
//! ## Exit codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | success |
//! | 1 | error |
//! | 2 | license invalid (`verify`) |
//! | 3 | gateway locked (`run`) |

pub mod classify;
pub mod run;
pub mod verify;

/// Exit code for a license that failed validation.
pub const EXIT_INVALID: u8 = 2;
