//! # helm-crypto: License Signature Primitives
//!
//! - **Ed25519** keys and signatures. Public keys travel as hex or base64,
//!   signatures as base64.
//! - **SignatureVerifier**, the seam the license manager verifies through.
//!   Verification is a pure boolean: malformed input is a failed
//!   verification, never a panic or an error.
//!
//! Signing and verification only accept `CanonicalBytes`, so a payload
//! cannot be signed in one byte layout and verified in another.

pub mod ed25519;
pub mod verifier;

pub use ed25519::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
pub use verifier::{Ed25519Verifier, SignatureVerifier};
