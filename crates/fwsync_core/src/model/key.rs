//! Structural identity keys for rule records.
//!
//! # Responsibility
//! - Hold the ordered tuple of identity-defining values extracted from a record.
//! - Provide the single extractor contract shared by proxies and aggregation.
//!
//! # Invariants
//! - Equality, ordering and hashing are element-wise over `parts`.
//! - Extractors never read the owning profile; profile is implied by the
//!   collection a record was enumerated from.

use std::fmt::{Display, Formatter};

/// One typed element of a composite key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyPart {
    Text(String),
    Int(i64),
    Flag(bool),
    Absent,
}

/// Ordered tuple of typed identity values.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompositeKey {
    parts: Vec<KeyPart>,
}

impl CompositeKey {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a text element.
    pub fn text(mut self, value: impl Into<String>) -> Self {
        self.parts.push(KeyPart::Text(value.into()));
        self
    }

    /// Appends a text element folded to lowercase, for case-insensitive
    /// native attributes such as file paths.
    pub fn folded(self, value: &str) -> Self {
        self.text(value.to_lowercase())
    }

    pub fn int(mut self, value: impl Into<i64>) -> Self {
        self.parts.push(KeyPart::Int(value.into()));
        self
    }

    pub fn flag(mut self, value: bool) -> Self {
        self.parts.push(KeyPart::Flag(value));
        self
    }

    /// Appends an optional text element; `None` becomes `KeyPart::Absent`.
    pub fn opt_text(mut self, value: Option<&str>) -> Self {
        self.parts.push(match value {
            Some(value) => KeyPart::Text(value.to_string()),
            None => KeyPart::Absent,
        });
        self
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl Display for CompositeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("(")?;
        for (index, part) in self.parts.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            match part {
                KeyPart::Text(value) => write!(f, "{value:?}")?,
                KeyPart::Int(value) => write!(f, "{value}")?,
                KeyPart::Flag(value) => write!(f, "{value}")?,
                KeyPart::Absent => f.write_str("-")?,
            }
        }
        f.write_str(")")
    }
}

/// Canonical key extraction for one record kind.
///
/// `identity_key` is what the native store is unique on within one profile.
/// `merge_key` covers every non-profile attribute and decides which
/// per-profile fragments fold into one logical rule.
pub trait Keyed {
    fn identity_key(&self) -> CompositeKey;
    fn merge_key(&self) -> CompositeKey;
}
