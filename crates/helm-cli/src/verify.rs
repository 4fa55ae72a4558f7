//! # Verify CLI: offline license validation.
//!
//! Checks a license file against a public key without starting the
//! gateway: signature, expiry, shape, and optionally a node count. Prints a
//! summary and one decision per `--skill`.
//!
//! ```bash
//! helm verify --license license.json --public-key <hex> --skill chat --skill admin_reset
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use helm_core::Timestamp;
use helm_crypto::{Ed25519PublicKey, Ed25519Verifier};
use helm_state::{LicenseDocument, LicenseError, LicenseRecord};

use crate::EXIT_INVALID;

/// Arguments for `helm verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// License file to check.
    #[arg(long)]
    pub license: PathBuf,

    /// Ed25519 public key, hex or base64.
    #[arg(long, env = "HELM_PUBLIC_KEY", hide_env_values = true)]
    pub public_key: String,

    /// Skill to report a decision for. Repeatable.
    #[arg(long = "skill")]
    pub skills: Vec<String>,

    /// Node count to check against the license ceiling.
    #[arg(long)]
    pub nodes: Option<u64>,
}

/// Execute `helm verify`.
pub fn run_verify(args: &VerifyArgs) -> Result<u8> {
    let key = Ed25519PublicKey::parse(args.public_key.trim())
        .map_err(|e| anyhow::anyhow!("invalid public key: {e}"))?;
    let json = std::fs::read_to_string(&args.license)
        .with_context(|| format!("failed to read license: {}", args.license.display()))?;

    let record = match verify_license(&json, &key, Timestamp::now(), args.nodes) {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(license = %args.license.display(), error = %e, "license rejected");
            println!("INVALID: {e}");
            return Ok(EXIT_INVALID);
        }
    };

    println!("VALID");
    for line in summary(&record) {
        println!("  {line}");
    }
    for skill in &args.skills {
        let decision = if record.allows_skill(skill) {
            "allowed"
        } else {
            "denied"
        };
        println!("  skill {skill}: {decision}");
    }
    Ok(0)
}

/// Validate license JSON against `key` at `now`, then the node count if
/// given.
pub fn verify_license(
    json: &str,
    key: &Ed25519PublicKey,
    now: Timestamp,
    nodes: Option<u64>,
) -> Result<LicenseRecord, LicenseError> {
    let doc = LicenseDocument::from_json(json)?;
    let record = LicenseRecord::validate(&doc, &Ed25519Verifier::new(key.clone()), now)?;
    if let Some(nodes) = nodes {
        record.check_node_count(nodes)?;
    }
    Ok(record)
}

/// Human-readable summary lines for a validated record.
pub fn summary(record: &LicenseRecord) -> Vec<String> {
    vec![
        format!("license:     {}", record.id()),
        format!("org:         {}", record.organization()),
        format!("tier:        {}", record.tier().as_str()),
        format!("skills:      {}", record.skills()),
        format!("max nodes:   {}", record.max_nodes()),
        format!("expires:     {}", record.expires_at()),
        format!("fingerprint: {}", record.fingerprint()),
        "unsigned:    tier, skills_allowed, max_nodes".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use helm_crypto::Ed25519KeyPair;
    use helm_state::Tier;

    fn keys() -> Ed25519KeyPair {
        Ed25519KeyPair::from_seed(&[11u8; 32])
    }

    fn now() -> Timestamp {
        Timestamp::parse("2026-10-17T12:00:00Z").unwrap()
    }

    fn license_json(signer: &Ed25519KeyPair, expires: &str) -> String {
        let mut doc = LicenseDocument {
            license_id: "L1".to_string(),
            org: "Acme".to_string(),
            tier: Tier::Enterprise,
            skills_allowed: vec!["chat".to_string()],
            max_nodes: Some(5),
            expires: expires.to_string(),
            signature: String::new(),
        };
        doc.signature = signer.sign(&doc.signed_payload().unwrap()).to_base64();
        serde_json::to_string(&doc).unwrap()
    }

    fn args(license: PathBuf, key: String) -> VerifyArgs {
        VerifyArgs {
            license,
            public_key: key,
            skills: vec!["chat".to_string(), "admin_reset".to_string()],
            nodes: Some(3),
        }
    }

    #[test]
    fn valid_license_verifies() {
        let json = license_json(&keys(), "2027-10-17T12:00:00Z");
        let record = verify_license(&json, &keys().public_key(), now(), Some(5)).unwrap();
        assert_eq!(record.id().as_str(), "L1");
        assert!(record.allows_skill("chat"));
        assert!(!record.allows_skill("admin_reset"));
    }

    #[test]
    fn node_count_over_ceiling_is_invalid() {
        let json = license_json(&keys(), "2027-10-17T12:00:00Z");
        let err = verify_license(&json, &keys().public_key(), now(), Some(6)).unwrap_err();
        assert!(matches!(err, LicenseError::NodeLimitExceeded { .. }));
    }

    #[test]
    fn summary_flags_unsigned_fields() {
        let json = license_json(&keys(), "2027-10-17T12:00:00Z");
        let record = verify_license(&json, &keys().public_key(), now(), None).unwrap();
        let lines = summary(&record);
        assert!(lines.iter().any(|l| l.starts_with("unsigned:")));
        assert!(lines.iter().any(|l| l.contains("sha256:")));
    }

    #[test]
    fn run_verify_exit_codes() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.json");
        let expired = dir.path().join("expired.json");
        let forged = dir.path().join("forged.json");
        std::fs::write(&good, license_json(&keys(), "2999-01-01T00:00:00Z")).unwrap();
        std::fs::write(&expired, license_json(&keys(), "2000-01-01T00:00:00Z")).unwrap();
        let rogue = Ed25519KeyPair::from_seed(&[12u8; 32]);
        std::fs::write(&forged, license_json(&rogue, "2999-01-01T00:00:00Z")).unwrap();

        let key = keys().public_key().to_hex();
        assert_eq!(run_verify(&args(good, key.clone())).unwrap(), 0);
        assert_eq!(run_verify(&args(expired, key.clone())).unwrap(), EXIT_INVALID);
        assert_eq!(run_verify(&args(forged, key)).unwrap(), EXIT_INVALID);
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let key = keys().public_key().to_hex();
        assert!(run_verify(&args(dir.path().join("missing.json"), key)).is_err());
    }

    #[test]
    fn bad_key_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("license.json");
        std::fs::write(&file, license_json(&keys(), "2999-01-01T00:00:00Z")).unwrap();
        assert!(run_verify(&args(file, "zz".to_string())).is_err());
    }
}
