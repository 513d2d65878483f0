//! Logical rules reconstructed from per-profile fragments.
//!
//! # Responsibility
//! - Hold the profile -> fragment mapping for one logical rule.
//! - Expose the rule kind used to route add/remove to the right collections.
//!
//! # Invariants
//! - A rule never maps the same profile twice.
//! - The rule's profile set is exactly the key set of its fragment map.

use crate::model::key::{CompositeKey, Keyed};
use crate::model::profile::Profile;
use crate::model::record::{ApplicationRule, PortRule, ServiceRule};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

/// Fragment kind of a logical rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Application,
    Port,
    Service,
}

impl RuleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Port => "port",
            Self::Service => "service",
        }
    }
}

impl Display for RuleKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-profile fragments of one logical rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileFragments<R> {
    fragments: BTreeMap<Profile, R>,
}

impl<R> Default for ProfileFragments<R> {
    fn default() -> Self {
        Self {
            fragments: BTreeMap::new(),
        }
    }
}

impl<R: Clone> ProfileFragments<R> {
    /// Same record placed in every listed profile.
    pub fn uniform(record: R, profiles: impl IntoIterator<Item = Profile>) -> Self {
        Self {
            fragments: profiles
                .into_iter()
                .map(|profile| (profile, record.clone()))
                .collect(),
        }
    }
}

impl<R> ProfileFragments<R> {
    /// Adds one fragment; returns the record back if the profile is taken.
    pub fn insert(&mut self, profile: Profile, record: R) -> Result<(), R> {
        if self.fragments.contains_key(&profile) {
            return Err(record);
        }
        self.fragments.insert(profile, record);
        Ok(())
    }

    pub fn profiles(&self) -> BTreeSet<Profile> {
        self.fragments.keys().copied().collect()
    }

    pub fn get(&self, profile: Profile) -> Option<&R> {
        self.fragments.get(&profile)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Profile, &R)> {
        self.fragments.iter().map(|(profile, record)| (*profile, record))
    }

    /// Fragment of the lowest profile, standing in for the whole rule.
    pub fn representative(&self) -> Option<&R> {
        self.fragments.values().next()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

/// Cross-profile union of fragments sharing one non-profile identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogicalRule {
    Application(ProfileFragments<ApplicationRule>),
    Port(ProfileFragments<PortRule>),
    Service(ProfileFragments<ServiceRule>),
}

impl LogicalRule {
    pub fn application(
        record: ApplicationRule,
        profiles: impl IntoIterator<Item = Profile>,
    ) -> Self {
        Self::Application(ProfileFragments::uniform(record, profiles))
    }

    pub fn port(record: PortRule, profiles: impl IntoIterator<Item = Profile>) -> Self {
        Self::Port(ProfileFragments::uniform(record, profiles))
    }

    pub fn service(record: ServiceRule, profiles: impl IntoIterator<Item = Profile>) -> Self {
        Self::Service(ProfileFragments::uniform(record, profiles))
    }

    pub fn kind(&self) -> RuleKind {
        match self {
            Self::Application(_) => RuleKind::Application,
            Self::Port(_) => RuleKind::Port,
            Self::Service(_) => RuleKind::Service,
        }
    }

    pub fn profiles(&self) -> BTreeSet<Profile> {
        match self {
            Self::Application(fragments) => fragments.profiles(),
            Self::Port(fragments) => fragments.profiles(),
            Self::Service(fragments) => fragments.profiles(),
        }
    }

    /// Display name taken from the representative fragment.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Application(fragments) => fragments.representative().map(|r| r.name.as_str()),
            Self::Port(fragments) => fragments.representative().map(|r| r.name.as_str()),
            Self::Service(fragments) => fragments.representative().map(|r| r.name.as_str()),
        }
    }

    /// Profile-free merge key of the representative fragment.
    pub fn merge_key(&self) -> Option<CompositeKey> {
        match self {
            Self::Application(fragments) => fragments.representative().map(|r| r.merge_key()),
            Self::Port(fragments) => fragments.representative().map(|r| r.merge_key()),
            Self::Service(fragments) => fragments.representative().map(|r| r.merge_key()),
        }
    }
}
