//! # Ed25519 License Keys
//!
//! Issuers publish the verification key as 64 hex characters or as base64,
//! and put the signature in the license as base64. Both forms are accepted
//! on input; keys render as hex, signatures as base64.
//!
//! Only [`CanonicalBytes`] can be signed or verified. The signing half is
//! here to mint fixtures and for operators issuing their own licenses; its
//! `Debug` output never shows the seed.

use std::fmt;

use base64::prelude::*;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use helm_core::{CanonicalBytes, CryptoError};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Public half of a license issuing key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Ed25519PublicKey([u8; 32]);

/// Detached signature over a license's canonical payload.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Ed25519Signature([u8; 64]);

/// License issuing key.
pub struct Ed25519KeyPair(SigningKey);

impl Ed25519PublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Accepts 64 hex digits or base64, surrounding whitespace ignored.
    pub fn parse(encoded: &str) -> Result<Self, CryptoError> {
        let encoded = encoded.trim();
        let bytes = if encoded.len() == 64 && encoded.bytes().all(|b| b.is_ascii_hexdigit()) {
            decode_hex(encoded)
        } else {
            BASE64_STANDARD
                .decode(encoded)
                .map_err(|e| CryptoError::KeyError(format!("neither hex nor base64: {e}")))?
        };
        fixed(bytes)
            .map(Self)
            .map_err(|len| CryptoError::KeyError(format!("expected 32 key bytes, got {len}")))
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(self.0)
    }

    /// `false` for a bad point, a malformed signature or a mismatch.
    pub fn verify(&self, data: &CanonicalBytes, signature: &Ed25519Signature) -> bool {
        VerifyingKey::from_bytes(&self.0)
            .map(|vk| {
                vk.verify(
                    data.as_bytes(),
                    &ed25519_dalek::Signature::from_bytes(&signature.0),
                )
                .is_ok()
            })
            .unwrap_or(false)
    }
}

impl Ed25519Signature {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = BASE64_STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;
        fixed(bytes).map(Self).map_err(|len| {
            CryptoError::MalformedSignature(format!("expected 64 signature bytes, got {len}"))
        })
    }

    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(self.0)
    }
}

impl Ed25519KeyPair {
    pub fn generate() -> Self {
        Self(SigningKey::generate(&mut rand::rngs::OsRng))
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self(SigningKey::from_bytes(seed))
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.0.verifying_key().to_bytes())
    }

    pub fn sign(&self, data: &CanonicalBytes) -> Ed25519Signature {
        Ed25519Signature(self.0.sign(data.as_bytes()).to_bytes())
    }
}

/// Verify a base64 signature string. Undecodable input verifies as `false`.
pub fn verify_base64(
    data: &CanonicalBytes,
    signature_b64: &str,
    public_key: &Ed25519PublicKey,
) -> bool {
    Ed25519Signature::from_base64(signature_b64)
        .map(|sig| public_key.verify(data, &sig))
        .unwrap_or(false)
}

/// Caller has checked `hex` is ASCII hex digits of even length.
fn decode_hex(hex: &str) -> Vec<u8> {
    hex.as_bytes()
        .chunks_exact(2)
        .map(|pair| (nibble(pair[0]) << 4) | nibble(pair[1]))
        .collect()
}

fn nibble(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        _ => c - b'A' + 10,
    }
}

/// `Err` carries the actual length.
fn fixed<const N: usize>(bytes: Vec<u8>) -> Result<[u8; N], usize> {
    bytes.try_into().map_err(|v: Vec<u8>| v.len())
}

impl fmt::Display for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519PublicKey({}..)", &self.to_hex()[..8])
    }
}

impl fmt::Display for Ed25519Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Signature({}..)", &self.to_base64()[..8])
    }
}

impl fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ed25519KeyPair")
            .field(&self.public_key())
            .finish()
    }
}

impl Serialize for Ed25519PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ed25519PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(de::Error::custom)
    }
}

impl Serialize for Ed25519Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ed25519Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_base64(&raw).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> Ed25519KeyPair {
        Ed25519KeyPair::from_seed(&[21u8; 32])
    }

    fn signed_fields(license_id: &str) -> CanonicalBytes {
        CanonicalBytes::new(&serde_json::json!({
            "expires": "2027-01-01T00:00:00Z",
            "license_id": license_id,
            "org": "Acme",
        }))
        .unwrap()
    }

    #[test]
    fn issuer_signature_verifies_as_base64() {
        let data = signed_fields("L1");
        let sig = issuer().sign(&data);
        assert!(issuer().public_key().verify(&data, &sig));
        assert!(verify_base64(&data, &sig.to_base64(), &issuer().public_key()));
    }

    #[test]
    fn other_key_and_other_payload_fail() {
        let data = signed_fields("L1");
        let sig = issuer().sign(&data);
        let stranger = Ed25519KeyPair::generate().public_key();
        assert!(!stranger.verify(&data, &sig));
        assert!(!issuer().public_key().verify(&signed_fields("L2"), &sig));
    }

    #[test]
    fn single_flipped_bit_fails() {
        let data = signed_fields("L1");
        let mut raw = *issuer().sign(&data).as_bytes();
        raw[63] ^= 0x80;
        assert!(!issuer()
            .public_key()
            .verify(&data, &Ed25519Signature::from_bytes(raw)));
    }

    #[test]
    fn undecodable_signatures_verify_false() {
        let data = signed_fields("L1");
        let pk = issuer().public_key();
        let too_long = BASE64_STANDARD.encode([7u8; 65]);
        for sig in ["", "%%%", "c2hvcnQ=", too_long.as_str()] {
            assert!(!verify_base64(&data, sig, &pk), "accepted {sig:?}");
        }
    }

    #[test]
    fn off_curve_key_verifies_false() {
        let data = signed_fields("L1");
        let sig = issuer().sign(&data);
        let mut raw = [0xffu8; 32];
        raw[31] = 0x7f;
        assert!(!Ed25519PublicKey::from_bytes(raw).verify(&data, &sig));
    }

    #[test]
    fn seeded_signing_is_deterministic() {
        let data = signed_fields("L9");
        assert_eq!(issuer().sign(&data), issuer().sign(&data));
    }

    #[test]
    fn public_key_parses_hex_either_case_and_base64() {
        let pk = issuer().public_key();
        assert_eq!(Ed25519PublicKey::parse(&pk.to_hex()).unwrap(), pk);
        assert_eq!(
            Ed25519PublicKey::parse(&pk.to_hex().to_uppercase()).unwrap(),
            pk
        );
        assert_eq!(Ed25519PublicKey::parse(&pk.to_base64()).unwrap(), pk);
        assert_eq!(
            Ed25519PublicKey::parse(&format!("\t{}\n", pk.to_hex())).unwrap(),
            pk
        );
    }

    #[test]
    fn public_key_rejects_wrong_shapes() {
        let not_hex = "g".repeat(64);
        let too_short = BASE64_STANDARD.encode([1u8; 31]);
        for bad in ["", "zz", not_hex.as_str(), too_short.as_str()] {
            assert!(Ed25519PublicKey::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn serde_uses_hex_keys_and_base64_signatures() {
        let pk = issuer().public_key();
        let sig = issuer().sign(&signed_fields("L1"));
        assert_eq!(
            serde_json::to_string(&pk).unwrap(),
            format!("\"{}\"", pk.to_hex())
        );
        let back: Ed25519Signature =
            serde_json::from_str(&serde_json::to_string(&sig).unwrap()).unwrap();
        assert_eq!(back, sig);
        let from_b64: Ed25519PublicKey =
            serde_json::from_value(serde_json::json!(pk.to_base64())).unwrap();
        assert_eq!(from_b64, pk);
    }

    #[test]
    fn key_pair_debug_shows_only_public_half() {
        let shown = format!("{:?}", issuer());
        assert!(shown.starts_with("Ed25519KeyPair(Ed25519PublicKey("));
        assert!(!shown.contains(&hex_of(&[21u8; 32])));
    }

    fn hex_of(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}
