//! # Gate State Machine
//!
//! ```text
//! Uninitialized ──▶ Validating ──▶ Active
//!        │              │   ▲         │
//!        │              │   └─────────┤ (re-initialize)
//!        ▼              ▼             ▼
//!      Locked ◀──────────────────── Locked (terminal)
//! ```
//!
//! Every failure routes to `Locked`. There is no edge out of `Locked`; the
//! only recovery is a new process.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use helm_core::Timestamp;

/// Lifecycle state of the license gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateState {
    /// No license has been presented yet.
    #[default]
    Uninitialized,
    /// A license is being verified.
    Validating,
    /// A validated license is in force.
    Active,
    /// Fail-closed (terminal).
    Locked,
}

impl GateState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Locked)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for GateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Uninitialized => "UNINITIALIZED",
            Self::Validating => "VALIDATING",
            Self::Active => "ACTIVE",
            Self::Locked => "LOCKED",
        };
        f.write_str(s)
    }
}

/// Rejected gate transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateTransitionError {
    #[error("invalid gate transition: {from} -> {to}")]
    InvalidTransition { from: GateState, to: GateState },

    #[error("gate is in terminal state {state}")]
    TerminalState { state: GateState },
}

/// One entry of the transition log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateTransitionRecord {
    pub from_state: GateState,
    pub to_state: GateState,
    pub timestamp: Timestamp,
    pub reason: String,
}

/// The gate's current state plus its transition history.
#[derive(Debug, Clone, Default)]
pub struct GateMachine {
    state: GateState,
    transitions: Vec<GateTransitionRecord>,
}

impl GateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Ordered log of all transitions.
    pub fn transitions(&self) -> &[GateTransitionRecord] {
        &self.transitions
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn is_locked(&self) -> bool {
        self.state.is_terminal()
    }

    /// UNINITIALIZED or ACTIVE → VALIDATING.
    pub fn begin_validation(
        &mut self,
        at: Timestamp,
        reason: &str,
    ) -> Result<(), GateTransitionError> {
        self.require_state(
            &[GateState::Uninitialized, GateState::Active],
            GateState::Validating,
        )?;
        self.do_transition(GateState::Validating, at, reason);
        Ok(())
    }

    /// VALIDATING → ACTIVE.
    pub fn activate(&mut self, at: Timestamp, reason: &str) -> Result<(), GateTransitionError> {
        self.require_state(&[GateState::Validating], GateState::Active)?;
        self.do_transition(GateState::Active, at, reason);
        Ok(())
    }

    /// Any non-terminal state → LOCKED.
    pub fn lock(&mut self, at: Timestamp, reason: &str) -> Result<(), GateTransitionError> {
        if self.state.is_terminal() {
            return Err(GateTransitionError::TerminalState { state: self.state });
        }
        self.do_transition(GateState::Locked, at, reason);
        Ok(())
    }

    fn require_state(
        &self,
        allowed: &[GateState],
        target: GateState,
    ) -> Result<(), GateTransitionError> {
        if self.state.is_terminal() {
            return Err(GateTransitionError::TerminalState { state: self.state });
        }
        if !allowed.contains(&self.state) {
            return Err(GateTransitionError::InvalidTransition {
                from: self.state,
                to: target,
            });
        }
        Ok(())
    }

    fn do_transition(&mut self, to: GateState, at: Timestamp, reason: &str) {
        self.transitions.push(GateTransitionRecord {
            from_state: self.state,
            to_state: to,
            timestamp: at,
            reason: reason.to_string(),
        });
        self.state = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> Timestamp {
        Timestamp::parse("2026-10-17T12:00:00Z").unwrap()
    }

    fn active() -> GateMachine {
        let mut gate = GateMachine::new();
        gate.begin_validation(at(), "initialize").unwrap();
        gate.activate(at(), "license L1 accepted").unwrap();
        gate
    }

    #[test]
    fn test_happy_path() {
        let gate = active();
        assert_eq!(gate.state(), GateState::Active);
        assert!(gate.is_active());
        assert_eq!(gate.transitions().len(), 2);
        assert_eq!(gate.transitions()[1].reason, "license L1 accepted");
    }

    #[test]
    fn test_revalidation_from_active() {
        let mut gate = active();
        gate.begin_validation(at(), "reload").unwrap();
        assert_eq!(gate.state(), GateState::Validating);
        gate.activate(at(), "reloaded").unwrap();
        assert!(gate.is_active());
    }

    #[test]
    fn test_cannot_activate_without_validation() {
        let mut gate = GateMachine::new();
        assert_eq!(
            gate.activate(at(), "skip"),
            Err(GateTransitionError::InvalidTransition {
                from: GateState::Uninitialized,
                to: GateState::Active,
            })
        );
    }

    #[test]
    fn test_lock_from_every_live_state() {
        let mut fresh = GateMachine::new();
        fresh.lock(at(), "tamper").unwrap();
        assert!(fresh.is_locked());

        let mut validating = GateMachine::new();
        validating.begin_validation(at(), "initialize").unwrap();
        validating.lock(at(), "bad signature").unwrap();
        assert!(validating.is_locked());

        let mut live = active();
        live.lock(at(), "node limit").unwrap();
        assert!(live.is_locked());
    }

    #[test]
    fn test_locked_is_terminal() {
        let mut gate = active();
        gate.lock(at(), "check-in failed").unwrap();
        let terminal = GateTransitionError::TerminalState {
            state: GateState::Locked,
        };
        assert_eq!(gate.begin_validation(at(), "retry"), Err(terminal.clone()));
        assert_eq!(gate.activate(at(), "retry"), Err(terminal.clone()));
        assert_eq!(gate.lock(at(), "again"), Err(terminal));
        assert_eq!(gate.transitions().len(), 3);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(GateState::Uninitialized.to_string(), "UNINITIALIZED");
        assert_eq!(GateState::Validating.to_string(), "VALIDATING");
        assert_eq!(GateState::Active.to_string(), "ACTIVE");
        assert_eq!(GateState::Locked.to_string(), "LOCKED");
    }
}
