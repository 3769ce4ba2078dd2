//! Strongly-typed identifiers shared by the session and tenant stores.
//!
//! Identifiers are issued by the backend and are opaque strings (`"tenant-1"`,
//! `"42"`, a UUID, ...). Equality is exact string match.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Identifier of a tenant (organization / customer boundary).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

/// Identifier of a user (the authenticated principal).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

macro_rules! impl_string_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Build an identifier from a backend-issued value.
            ///
            /// Surrounding whitespace is trimmed; an empty result is rejected.
            pub fn parse(value: impl AsRef<str>) -> CoreResult<Self> {
                let trimmed = value.as_ref().trim();
                if trimmed.is_empty() {
                    return Err(CoreError::invalid_id(format!("{}: empty", $name)));
                }
                Ok(Self(trimmed.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $t {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

impl_string_newtype!(TenantId, "TenantId");
impl_string_newtype!(UserId, "UserId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_trims_whitespace() {
        let id = TenantId::parse("  tenant-1 ").unwrap();
        assert_eq!(id.as_str(), "tenant-1");
    }

    #[test]
    fn empty_identifier_is_rejected() {
        let err = UserId::parse("   ").unwrap_err();
        assert_eq!(err, CoreError::InvalidId("UserId: empty".to_string()));
    }

    #[test]
    fn serde_is_transparent() {
        let id: TenantId = serde_json::from_str("\"acme\"").unwrap();
        assert_eq!(id, "acme".parse().unwrap());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"acme\"");
    }
}
