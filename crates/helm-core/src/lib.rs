//! # helm-core: Foundational Types for the Helm License Gateway
//!
//! Leaf crate of the workspace. Defines the primitives every other crate
//! builds on:
//!
//! 1. **`CanonicalBytes` newtype.** Every byte sequence that is signed or
//!    fingerprinted flows through `CanonicalBytes::new()` (RFC 8785 JCS).
//!    Signing or verifying raw `serde_json::to_vec()` output is not possible
//!    through the public API.
//!
//! 2. **UTC-only timestamps.** `Timestamp` is UTC with seconds precision, so
//!    expiry comparisons and log output are deterministic.
//!
//! 3. **`Clock` seam.** Expiry checks read time through an injected clock.
//!    `SystemClock` in production, `ManualClock` under `cfg(test)` or the
//!    `test-seams` feature.
//!
//! 4. **Identifier newtypes.** `LicenseId`, `SkillId`, `NodeId` are validated
//!    at construction. No bare strings cross crate boundaries.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `helm-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod clock;
pub mod error;
pub mod fingerprint;
pub mod identity;
pub mod temporal;

pub use canonical::CanonicalBytes;
#[cfg(any(test, feature = "test-seams"))]
pub use clock::ManualClock;
pub use clock::{Clock, SystemClock};
pub use error::{CanonicalizationError, CryptoError, ValidationError};
pub use fingerprint::{sha256_fingerprint, LicenseFingerprint};
pub use identity::{LicenseId, NodeId, SkillId, SKILL_WILDCARD};
pub use temporal::Timestamp;
