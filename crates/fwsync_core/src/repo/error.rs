//! Error type shared by collection proxies and the rule set.

use crate::model::key::CompositeKey;
use crate::model::profile::Profile;
use crate::model::rule::RuleKind;
use crate::native::NativeError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by proxy and aggregation operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Native store call failed.
    Native(NativeError),
    /// Native item cannot be converted to a record (data integrity).
    Projection(String),
    /// Two live items resolved to the same identity within one profile.
    IdentityConflict { profile: Profile, key: CompositeKey },
    /// Operation is deliberately not offered.
    Unsupported(&'static str),
    /// Target collection does not accept mutation.
    ReadOnly { profile: Profile, kind: RuleKind },
    /// No collection is wired for the rule's kind.
    KindMismatch { kind: RuleKind },
    /// Rule names a profile with no collection for its kind.
    UnknownProfile { profile: Profile, kind: RuleKind },
    /// Rule names no profile, so there is nothing to write.
    NoProfiles { kind: RuleKind },
    /// No temporary identity could be chosen for guarded removal.
    SentinelUnavailable(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native(err) => write!(f, "{err}"),
            Self::Projection(message) => write!(f, "invalid native rule data: {message}"),
            Self::IdentityConflict { profile, key } => {
                write!(f, "duplicate rule identity {key} in profile `{profile}`")
            }
            Self::Unsupported(operation) => write!(f, "operation not supported: {operation}"),
            Self::ReadOnly { profile, kind } => {
                write!(f, "{kind} rules in profile `{profile}` are read-only")
            }
            Self::KindMismatch { kind } => {
                write!(f, "rule kind `{kind}` is not handled by this rule set")
            }
            Self::UnknownProfile { profile, kind } => {
                write!(f, "no {kind} collection for profile `{profile}`")
            }
            Self::NoProfiles { kind } => write!(f, "{kind} rule names no profile"),
            Self::SentinelUnavailable(message) => {
                write!(f, "no sentinel identity available: {message}")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Native(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NativeError> for StoreError {
    fn from(value: NativeError) -> Self {
        Self::Native(value)
    }
}
