//! Firewall profile identifiers.
//!
//! # Responsibility
//! - Name the native store partitions that hold one fragment per rule.
//!
//! # Invariants
//! - `Profile` ordering is stable and used for deterministic iteration.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Native store partition a rule fragment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Host is joined to a managed domain network.
    Domain,
    /// Trusted home or office network.
    Private,
    /// Untrusted network.
    Public,
}

impl Profile {
    /// All profiles in canonical iteration order.
    pub const ALL: [Profile; 3] = [Profile::Domain, Profile::Private, Profile::Public];

    /// Stable string id used in logs and wire shapes.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::Private => "private",
            Self::Public => "public",
        }
    }

    /// Parses a profile name case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "domain" => Some(Self::Domain),
            "private" | "standard" => Some(Self::Private),
            "public" => Some(Self::Public),
            _ => None,
        }
    }
}

impl Display for Profile {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::Profile;

    #[test]
    fn parse_accepts_legacy_standard_alias() {
        assert_eq!(Profile::parse(" Standard "), Some(Profile::Private));
        assert_eq!(Profile::parse("DOMAIN"), Some(Profile::Domain));
        assert_eq!(Profile::parse("guest"), None);
    }

    #[test]
    fn all_is_sorted() {
        let mut sorted = Profile::ALL;
        sorted.sort();
        assert_eq!(sorted, Profile::ALL);
    }
}
