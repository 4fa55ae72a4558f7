//! # Error Types: Leaf Error Hierarchy
//!
//! Errors raised by the foundational types. Higher crates wrap these into
//! their own taxonomies; the license-level taxonomy lives in `helm-state`.

use thiserror::Error;

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Error in cryptographic key or signature handling.
///
/// Verification itself reports a boolean; these errors only describe
/// malformed key or signature material.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Signature bytes could not be decoded.
    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    /// Key parsing failed.
    #[error("key error: {0}")]
    KeyError(String),
}

/// A value failed construction-time validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// An identifier was empty after trimming.
    #[error("{kind} must not be empty")]
    EmptyIdentifier {
        /// Identifier kind, e.g. `license id`.
        kind: &'static str,
    },

    /// A timestamp string could not be parsed.
    #[error("invalid timestamp {input:?}: {reason}")]
    InvalidTimestamp {
        /// The rejected input.
        input: String,
        /// Parser message.
        reason: String,
    },
}
