//! # Signature Verifier Seam
//!
//! The license manager never touches key material directly. It is handed a
//! [`SignatureVerifier`] at construction, which keeps the verification
//! algorithm swappable and lets tests substitute a fixed-answer verifier.

use std::fmt;

use helm_core::CanonicalBytes;

use crate::ed25519::{verify_base64, Ed25519PublicKey};

/// Verifies a detached base64 signature over canonical payload bytes.
///
/// Implementations must be pure: no I/O, no side effects, and malformed
/// signatures return `false`.
pub trait SignatureVerifier: Send + Sync + fmt::Debug {
    fn verify(&self, payload: &CanonicalBytes, signature_b64: &str) -> bool;
}

/// Ed25519 verification against one configured public key.
#[derive(Debug, Clone)]
pub struct Ed25519Verifier {
    public_key: Ed25519PublicKey,
}

impl Ed25519Verifier {
    pub fn new(public_key: Ed25519PublicKey) -> Self {
        Self { public_key }
    }

    pub fn public_key(&self) -> &Ed25519PublicKey {
        &self.public_key
    }
}

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, payload: &CanonicalBytes, signature_b64: &str) -> bool {
        verify_base64(payload, signature_b64, &self.public_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Ed25519KeyPair;
    use proptest::prelude::*;

    fn payload(org: &str) -> CanonicalBytes {
        CanonicalBytes::new(&serde_json::json!({
            "expiresAt": "2027-06-30T00:00:00Z",
            "licenseId": "L1",
            "organization": org,
        }))
        .unwrap()
    }

    #[test]
    fn verifier_accepts_issuer_signature() {
        let issuer = Ed25519KeyPair::from_seed(&[3u8; 32]);
        let verifier = Ed25519Verifier::new(issuer.public_key());
        let data = payload("Acme");
        assert!(verifier.verify(&data, &issuer.sign(&data).to_base64()));
    }

    #[test]
    fn verifier_rejects_other_issuer() {
        let issuer = Ed25519KeyPair::from_seed(&[3u8; 32]);
        let forger = Ed25519KeyPair::from_seed(&[4u8; 32]);
        let verifier = Ed25519Verifier::new(issuer.public_key());
        let data = payload("Acme");
        assert!(!verifier.verify(&data, &forger.sign(&data).to_base64()));
    }

    #[test]
    fn verifier_is_usable_as_trait_object() {
        let issuer = Ed25519KeyPair::from_seed(&[5u8; 32]);
        let verifier: Box<dyn SignatureVerifier> =
            Box::new(Ed25519Verifier::new(issuer.public_key()));
        let data = payload("Acme");
        assert!(verifier.verify(&data, &issuer.sign(&data).to_base64()));
    }

    proptest! {
        #[test]
        fn arbitrary_signature_strings_never_verify(sig in ".{0,120}") {
            let issuer = Ed25519KeyPair::from_seed(&[6u8; 32]);
            let verifier = Ed25519Verifier::new(issuer.public_key());
            prop_assert!(!verifier.verify(&payload("Acme"), &sig));
        }

        #[test]
        fn signature_binds_organization(org in "[A-Za-z ]{1,24}") {
            let issuer = Ed25519KeyPair::from_seed(&[6u8; 32]);
            let verifier = Ed25519Verifier::new(issuer.public_key());
            let sig = issuer.sign(&payload(&org)).to_base64();
            prop_assert!(verifier.verify(&payload(&org), &sig));
            let other = format!("{org}x");
            prop_assert!(!verifier.verify(&payload(&other), &sig));
        }
    }
}
