//! # License Documents and Validated Records
//!
//! A license arrives as a [`LicenseDocument`], the JSON object pushed by a
//! hosted control plane or read from an enterprise license file. It is
//! untrusted until [`LicenseRecord::validate()`] has verified the issuer's
//! signature and checked expiry. Only then are tier, skills, and node
//! ceiling readable, through the record.
//!
//! ## Signed Payload
//!
//! The issuer signs the JCS canonical form of
//!
//! ```text
//! {"expiresAt": <expires>, "licenseId": <license_id>, "organization": <org>}
//! ```
//!
//! where `expiresAt` is the `expires` string exactly as issued.
//!
//! ## Unsigned Fields
//!
//! `tier`, `skills_allowed`, and `max_nodes` are not covered by the
//! signature. Anyone able to edit the document can change them without
//! invalidating it. They are trusted on read; integrity for them must come
//! from the delivery channel or from server-side re-derivation keyed on the
//! license id.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use helm_core::{
    sha256_fingerprint, CanonicalBytes, LicenseFingerprint, LicenseId, SkillId, Timestamp,
    ValidationError,
};
use helm_crypto::SignatureVerifier;

// ─── Tier ────────────────────────────────────────────────────────────

/// Commercial tier, ordered `free < pro < enterprise`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Pro,
    Enterprise,
}

impl Tier {
    /// Node ceiling used when the document carries no `max_nodes`.
    pub fn default_max_nodes(&self) -> u64 {
        match self {
            Self::Free => 1,
            Self::Pro => 5,
            Self::Enterprise => 100,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Skill allowlist ─────────────────────────────────────────────────

/// The set of skills a license permits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillAllowlist {
    /// The allowlist contained the wildcard token `*`.
    All,
    /// Exactly these skills.
    Only(BTreeSet<SkillId>),
}

impl SkillAllowlist {
    /// Build from raw allowlist entries. A `*` anywhere wins.
    pub fn from_entries<S: AsRef<str>>(entries: &[S]) -> Result<Self, ValidationError> {
        let mut skills = BTreeSet::new();
        for entry in entries {
            let skill = SkillId::new(entry)?;
            if skill.is_wildcard() {
                return Ok(Self::All);
            }
            skills.insert(skill);
        }
        Ok(Self::Only(skills))
    }

    /// Whether `skill` is permitted. Blank skill ids never are.
    pub fn allows(&self, skill: &str) -> bool {
        let Ok(skill) = SkillId::new(skill) else {
            return false;
        };
        match self {
            Self::All => true,
            Self::Only(skills) => skills.contains(&skill),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl std::fmt::Display for SkillAllowlist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str(helm_core::SKILL_WILDCARD),
            Self::Only(skills) => {
                let names: Vec<&str> = skills.iter().map(SkillId::as_str).collect();
                f.write_str(&names.join(","))
            }
        }
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Why a license could not be accepted, or why an accepted one stopped
/// being honored. Every variant is fatal to the gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LicenseError {
    /// The detached signature does not verify against the configured key.
    #[error("license signature is invalid")]
    SignatureInvalid,

    /// `now` is at or after the license expiry.
    #[error("license expired at {expires_at}")]
    Expired {
        /// The expiry instant from the document.
        expires_at: Timestamp,
    },

    /// More nodes in use than the license permits.
    #[error("node limit exceeded: {current} nodes in use, {max} licensed")]
    NodeLimitExceeded {
        /// Reported node count.
        current: u64,
        /// License ceiling.
        max: u64,
    },

    /// Attestation with the license server failed.
    #[error("license check-in failed: {0}")]
    CheckInFailure(String),

    /// The license could not be read or parsed.
    #[error("malformed license source: {0}")]
    MalformedSource(String),

    /// The gateway is locked; a process restart is required.
    #[error("license gateway is locked")]
    Locked,
}

// ─── Wire document ───────────────────────────────────────────────────

/// A license as issued. Untrusted until validated.
///
/// Field names follow the issued form; camelCase aliases are accepted for
/// documents produced by JavaScript issuers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseDocument {
    #[serde(alias = "licenseId")]
    pub license_id: String,
    #[serde(alias = "organization")]
    pub org: String,
    pub tier: Tier,
    #[serde(alias = "allowedSkills", default)]
    pub skills_allowed: Vec<String>,
    #[serde(alias = "maxNodes", default, skip_serializing_if = "Option::is_none")]
    pub max_nodes: Option<u64>,
    #[serde(alias = "expiresAt")]
    pub expires: String,
    pub signature: String,
}

/// The signed subset of a license document.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPayload<'a> {
    pub expires_at: &'a str,
    pub license_id: &'a str,
    pub organization: &'a str,
}

impl LicenseDocument {
    /// Parse a JSON license document.
    pub fn from_json(json: &str) -> Result<Self, LicenseError> {
        serde_json::from_str(json)
            .map_err(|e| LicenseError::MalformedSource(format!("invalid license JSON: {e}")))
    }

    /// The fields covered by the signature.
    pub fn signed_fields(&self) -> SignedPayload<'_> {
        SignedPayload {
            expires_at: &self.expires,
            license_id: &self.license_id,
            organization: &self.org,
        }
    }

    /// Canonical bytes of the signed subset.
    pub fn signed_payload(&self) -> Result<CanonicalBytes, LicenseError> {
        CanonicalBytes::new(&self.signed_fields())
            .map_err(|e| LicenseError::MalformedSource(e.to_string()))
    }

    /// Fingerprint of the whole document, signature included.
    pub fn fingerprint(&self) -> Result<LicenseFingerprint, LicenseError> {
        let canonical =
            CanonicalBytes::new(self).map_err(|e| LicenseError::MalformedSource(e.to_string()))?;
        Ok(sha256_fingerprint(&canonical))
    }
}

// ─── Validated record ────────────────────────────────────────────────

/// A license whose signature verified and which had not expired at
/// validation time.
///
/// Fields are private and there is no `Deserialize`; the only constructor
/// is [`LicenseRecord::validate()`].
///
/// `tier()`, `skills()`, and `max_nodes()` return unsigned data. See the
/// module documentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseRecord {
    id: LicenseId,
    organization: String,
    tier: Tier,
    skills: SkillAllowlist,
    max_nodes: u64,
    expires_at: Timestamp,
    fingerprint: LicenseFingerprint,
}

impl LicenseRecord {
    /// Validate a document: signature first, then expiry, then shape.
    ///
    /// # Errors
    ///
    /// - `SignatureInvalid` if the verifier rejects the signature.
    /// - `Expired` if `now >= expires`.
    /// - `MalformedSource` for an unparseable expiry, empty license id,
    ///   blank skill entry, or `max_nodes` of zero.
    pub fn validate(
        doc: &LicenseDocument,
        verifier: &dyn SignatureVerifier,
        now: Timestamp,
    ) -> Result<Self, LicenseError> {
        let payload = doc.signed_payload()?;
        if !verifier.verify(&payload, &doc.signature) {
            return Err(LicenseError::SignatureInvalid);
        }

        let expires_at = Timestamp::parse(&doc.expires)
            .map_err(|e| LicenseError::MalformedSource(e.to_string()))?;
        if now >= expires_at {
            return Err(LicenseError::Expired { expires_at });
        }

        let id = LicenseId::new(&doc.license_id)
            .map_err(|e| LicenseError::MalformedSource(e.to_string()))?;
        let max_nodes = match doc.max_nodes {
            Some(0) => {
                return Err(LicenseError::MalformedSource(
                    "max_nodes must be a positive integer".to_string(),
                ))
            }
            Some(n) => n,
            None => doc.tier.default_max_nodes(),
        };
        let skills = SkillAllowlist::from_entries(&doc.skills_allowed)
            .map_err(|e| LicenseError::MalformedSource(e.to_string()))?;

        Ok(Self {
            id,
            organization: doc.org.clone(),
            tier: doc.tier,
            skills,
            max_nodes,
            expires_at,
            fingerprint: doc.fingerprint()?,
        })
    }

    pub fn id(&self) -> &LicenseId {
        &self.id
    }

    /// Display name only; never used for authorization.
    pub fn organization(&self) -> &str {
        &self.organization
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn skills(&self) -> &SkillAllowlist {
        &self.skills
    }

    pub fn max_nodes(&self) -> u64 {
        self.max_nodes
    }

    pub fn expires_at(&self) -> Timestamp {
        self.expires_at
    }

    pub fn fingerprint(&self) -> LicenseFingerprint {
        self.fingerprint
    }

    /// Whether the license is expired at `now`. Expiry is inclusive.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Whether the allowlist permits `skill`.
    pub fn allows_skill(&self, skill: &str) -> bool {
        self.skills.allows(skill)
    }

    /// Fails when `current` exceeds the node ceiling. Equal is allowed.
    pub fn check_node_count(&self, current: u64) -> Result<(), LicenseError> {
        if current > self.max_nodes {
            return Err(LicenseError::NodeLimitExceeded {
                current,
                max: self.max_nodes,
            });
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
