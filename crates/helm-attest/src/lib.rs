//! # helm-attest: License Check-In Client
//!
//! A running gateway periodically proves to the license server that it is
//! still entitled to run. This crate owns that conversation:
//!
//! - **`CheckInRequest`**: the JSON body `{nodeId, version, tier, org}`.
//! - **`Attestor`**: object-safe seam the scheduler calls each tick.
//! - **`HttpAttestor`**: reqwest implementation. `POST` to the configured
//!   endpoint with `Authorization: Bearer <license id>`. Any 2xx is success;
//!   any other status, transport error, or timeout is a failure.
//!
//! Retries are deliberately absent. One failure is reported as one failure.

pub mod client;
pub mod config;
pub mod error;

pub use client::{Attestor, BoxFuture, CheckInRequest, HttpAttestor};
pub use config::{env_positive, AttestationConfig, ConfigError};
pub use error::CheckInError;
