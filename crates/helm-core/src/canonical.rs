//! # Canonical License Bytes
//!
//! `CanonicalBytes` is the one byte form the gateway signs, verifies, and
//! fingerprints. Issuer and gateway must agree on it byte for byte, so it is
//! produced by RFC 8785 (JCS): keys sorted by code unit, no insignificant
//! whitespace, one spelling per value.
//!
//! Non-integer numbers are refused before serialization. JCS renders them
//! through ECMAScript number formatting, which issuers in other languages
//! reproduce inconsistently, and no license field needs one.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// JCS bytes of a float-free JSON value. Construct with [`CanonicalBytes::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Serialize `value` to JSON, refuse any fractional number, then emit
    /// JCS bytes.
    ///
    /// # Errors
    ///
    /// `FloatRejected` for the first fractional number found in document
    /// order, `SerializationFailed` if `value` cannot be represented as JSON.
    pub fn new(value: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let tree = serde_json::to_value(value)?;
        if let Some(f) = first_fraction(&tree) {
            return Err(CanonicalizationError::FloatRejected(f));
        }
        Ok(Self(serde_jcs::to_vec(&tree)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Depth-first search for a number that is neither `i64` nor `u64`.
fn first_fraction(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) if !(n.is_i64() || n.is_u64()) => n.as_f64(),
        Value::Array(items) => items.iter().find_map(first_fraction),
        Value::Object(fields) => fields.values().find_map(first_fraction),
        _ => None,
    }
}
