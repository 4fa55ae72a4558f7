//! # License Fingerprints
//!
//! A SHA-256 digest over the canonical form of a license document. Used in
//! audit logs to identify exactly which document was accepted, and to
//! detect whether an enterprise license file changed between reloads.
//!
//! The digest can only be computed from `CanonicalBytes`, so two documents
//! that differ only in key order or whitespace share a fingerprint.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;

/// SHA-256 digest of a canonical license document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LicenseFingerprint(pub [u8; 32]);

impl LicenseFingerprint {
    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// First eight hex characters, for log lines.
    pub fn short(&self) -> String {
        self.0.iter().take(4).map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for LicenseFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sha256:{}", self.to_hex())
    }
}

/// Compute the SHA-256 fingerprint of canonical bytes.
pub fn sha256_fingerprint(data: &CanonicalBytes) -> LicenseFingerprint {
    let hash = Sha256::digest(data.as_bytes());
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hash);
    LicenseFingerprint(bytes)
}
