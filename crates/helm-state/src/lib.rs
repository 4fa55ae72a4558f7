//! # helm-state: License Records and State Machines
//!
//! - **License** (`license.rs`): the wire `LicenseDocument`, the validated
//!   `LicenseRecord`, tiers, skill allowlists, and the `LicenseError`
//!   taxonomy. A record exists only after signature and expiry checks pass.
//!
//! - **Gate** (`gate.rs`): `Uninitialized → Validating → Active → Locked`.
//!   `Locked` is terminal for the process lifetime.
//!
//! - **Stability** (`stability.rs`): stateless severity classification of
//!   resource samples on the ordered scale
//!   `normal < degraded < minimal < safe < shutdown`, and the
//!   `StabilityMonitor` that retains the current severity.
//!
//! Nothing in this crate performs I/O or reads the wall clock. Time is
//! always passed in by the caller.

pub mod gate;
pub mod license;
pub mod stability;

// ─── License re-exports ─────────────────────────────────────────────

pub use license::{
    LicenseDocument, LicenseError, LicenseRecord, SignedPayload, SkillAllowlist, Tier,
};

// ─── Gate re-exports ────────────────────────────────────────────────

pub use gate::{GateMachine, GateState, GateTransitionError, GateTransitionRecord};

// ─── Stability re-exports ───────────────────────────────────────────

pub use stability::{
    classify, Severity, SeverityChange, StabilityMonitor, StabilitySample, StabilityThresholds,
};
