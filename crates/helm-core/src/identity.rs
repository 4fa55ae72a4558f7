//! # Identifier Newtypes
//!
//! Newtype wrappers for the identifiers the gateway handles. A `SkillId`
//! cannot be passed where a `LicenseId` is expected, and none of them can be
//! empty.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Allowlist token that grants every skill.
pub const SKILL_WILDCARD: &str = "*";

/// Opaque license identifier, unique per issuance. Also the bearer
/// credential on check-in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LicenseId(String);

/// Identifier of a gated skill, e.g. `chat` or `admin_reset`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SkillId(String);

/// Identifier of this execution node, reported on check-in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

macro_rules! string_identifier {
    ($ty:ident, $kind:literal) => {
        impl $ty {
            /// Validate and wrap. Surrounding whitespace is trimmed.
            pub fn new(value: impl AsRef<str>) -> Result<Self, ValidationError> {
                let trimmed = value.as_ref().trim();
                if trimmed.is_empty() {
                    return Err(ValidationError::EmptyIdentifier { kind: $kind });
                }
                Ok(Self(trimmed.to_string()))
            }

            /// Borrow the identifier text.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $ty {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.0
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_identifier!(LicenseId, "license id");
string_identifier!(SkillId, "skill id");
string_identifier!(NodeId, "node id");

impl SkillId {
    /// Whether this is the wildcard token.
    pub fn is_wildcard(&self) -> bool {
        self.0 == SKILL_WILDCARD
    }
}

impl NodeId {
    /// Generate a random node identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}
