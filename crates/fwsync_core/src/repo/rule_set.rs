//! Aggregated cross-profile rule view.
//!
//! # Responsibility
//! - Fold per-profile collection proxies into one sequence of logical rules.
//! - Route logical add/remove to the kind-appropriate proxy of every profile
//!   the rule names.
//!
//! # Invariants
//! - Grouping uses each record kind's profile-free merge key.
//! - Kinds are emitted applications, ports, services; inside a kind, groups
//!   keep first-seen order.
//! - Add/remove resolve every target proxy before the first native write.
//! - Bulk clear is not offered.

use super::binding::{ApplicationBinding, PortBinding, RecordBinding, ServiceBinding};
use super::error::{StoreError, StoreResult};
use super::proxy::CollectionProxy;
use crate::config::SentinelConfig;
use crate::model::key::{CompositeKey, Keyed};
use crate::model::profile::Profile;
use crate::model::rule::{LogicalRule, ProfileFragments, RuleKind};
use crate::native::FirewallRoot;
use log::{debug, info};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

type Proxies<B> = BTreeMap<Profile, CollectionProxy<B>>;

/// Logical rule collection over application, port and service proxies.
pub struct RuleSet {
    applications: Proxies<ApplicationBinding>,
    ports: Proxies<PortBinding>,
    services: Proxies<ServiceBinding>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleSet {
    /// Empty set with no proxies wired.
    pub fn new() -> Self {
        Self {
            applications: BTreeMap::new(),
            ports: BTreeMap::new(),
            services: BTreeMap::new(),
        }
    }

    /// Wires every collection of every profile the root exposes.
    pub fn open(root: &dyn FirewallRoot, sentinel: &SentinelConfig) -> StoreResult<Self> {
        let mut rule_set = Self::new();
        for profile in root.profiles() {
            rule_set = rule_set
                .with_application_proxy(CollectionProxy::new(
                    profile,
                    root.applications(profile)?,
                    ApplicationBinding::new(sentinel),
                ))
                .with_port_proxy(CollectionProxy::new(
                    profile,
                    root.ports(profile)?,
                    PortBinding::new(sentinel),
                ))
                .with_service_proxy(CollectionProxy::new(
                    profile,
                    root.services(profile)?,
                    ServiceBinding,
                ));
        }
        debug!(
            "event=rule_set_open module=repo status=ok profiles={}",
            rule_set.profiles().len()
        );
        Ok(rule_set)
    }

    pub fn with_application_proxy(mut self, proxy: CollectionProxy<ApplicationBinding>) -> Self {
        self.applications.insert(proxy.profile(), proxy);
        self
    }

    pub fn with_port_proxy(mut self, proxy: CollectionProxy<PortBinding>) -> Self {
        self.ports.insert(proxy.profile(), proxy);
        self
    }

    pub fn with_service_proxy(mut self, proxy: CollectionProxy<ServiceBinding>) -> Self {
        self.services.insert(proxy.profile(), proxy);
        self
    }

    /// Profiles that have at least one wired proxy.
    pub fn profiles(&self) -> Vec<Profile> {
        let mut profiles: Vec<Profile> = self
            .applications
            .keys()
            .chain(self.ports.keys())
            .chain(self.services.keys())
            .copied()
            .collect();
        profiles.sort();
        profiles.dedup();
        profiles
    }

    /// Whether every proxy of `kind` rejects mutation.
    ///
    /// A kind with no proxies reports `true`.
    pub fn is_read_only(&self, kind: RuleKind) -> bool {
        match kind {
            RuleKind::Application => self.applications.values().all(CollectionProxy::is_read_only),
            RuleKind::Port => self.ports.values().all(CollectionProxy::is_read_only),
            RuleKind::Service => self.services.values().all(CollectionProxy::is_read_only),
        }
    }

    /// Enumerates logical rules, merging fragments with equal merge keys.
    ///
    /// # Errors
    /// - Any proxy enumeration error.
    /// - `IdentityConflict` when one profile contributes twice to a group.
    pub fn rules(&self) -> StoreResult<Vec<LogicalRule>> {
        let started_at = Instant::now();
        let mut rules: Vec<LogicalRule> = group_fragments(&self.applications)?
            .into_iter()
            .map(LogicalRule::Application)
            .collect();
        rules.extend(
            group_fragments(&self.ports)?
                .into_iter()
                .map(LogicalRule::Port),
        );
        rules.extend(
            group_fragments(&self.services)?
                .into_iter()
                .map(LogicalRule::Service),
        );
        debug!(
            "event=rule_set_enumerate module=repo status=ok count={} duration_ms={}",
            rules.len(),
            started_at.elapsed().as_millis()
        );
        Ok(rules)
    }

    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.rules()?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Adds one fragment to each profile the rule names.
    ///
    /// # Errors
    /// - `KindMismatch` when no proxy handles the rule's kind.
    /// - `NoProfiles` when the rule names no profile.
    /// - `UnknownProfile` / `ReadOnly` before any native write.
    pub fn add(&self, rule: &LogicalRule) -> StoreResult<()> {
        let written = match rule {
            LogicalRule::Application(fragments) => add_fragments(&self.applications, fragments)?,
            LogicalRule::Port(fragments) => add_fragments(&self.ports, fragments)?,
            LogicalRule::Service(fragments) => add_fragments(&self.services, fragments)?,
        };
        info!(
            "event=rule_add module=repo status=ok kind={} profiles={}",
            rule.kind(),
            written
        );
        Ok(())
    }

    /// Removes the rule's fragment from each profile it names.
    ///
    /// Returns whether at least one fragment was removed.
    pub fn remove(&self, rule: &LogicalRule) -> StoreResult<bool> {
        let removed = match rule {
            LogicalRule::Application(fragments) => {
                remove_fragments(&self.applications, fragments)?
            }
            LogicalRule::Port(fragments) => remove_fragments(&self.ports, fragments)?,
            LogicalRule::Service(fragments) => remove_fragments(&self.services, fragments)?,
        };
        info!(
            "event=rule_remove module=repo status=ok kind={} removed={}",
            rule.kind(),
            removed
        );
        Ok(removed > 0)
    }

    /// Whether every fragment is live with identical attributes.
    pub fn contains(&self, rule: &LogicalRule) -> StoreResult<bool> {
        match rule {
            LogicalRule::Application(fragments) => contains_fragments(&self.applications, fragments),
            LogicalRule::Port(fragments) => contains_fragments(&self.ports, fragments),
            LogicalRule::Service(fragments) => contains_fragments(&self.services, fragments),
        }
    }

    /// Bulk removal is refused; rules are removed one at a time.
    pub fn clear(&self) -> StoreResult<()> {
        Err(StoreError::Unsupported("clear"))
    }
}

fn group_fragments<B: RecordBinding>(
    proxies: &Proxies<B>,
) -> StoreResult<Vec<ProfileFragments<B::Record>>> {
    let mut groups: Vec<ProfileFragments<B::Record>> = Vec::new();
    let mut index: HashMap<CompositeKey, usize> = HashMap::new();
    for (profile, proxy) in proxies {
        for record in proxy.records()? {
            let key = record.merge_key();
            let slot = match index.get(&key) {
                Some(slot) => *slot,
                None => {
                    groups.push(ProfileFragments::default());
                    index.insert(key.clone(), groups.len() - 1);
                    groups.len() - 1
                }
            };
            if groups[slot].insert(*profile, record).is_err() {
                return Err(StoreError::IdentityConflict {
                    profile: *profile,
                    key,
                });
            }
        }
    }
    Ok(groups)
}

/// Pairs each fragment with its proxy; fails before any native call.
fn resolve<'a, B: RecordBinding>(
    proxies: &'a Proxies<B>,
    fragments: &'a ProfileFragments<B::Record>,
) -> StoreResult<Vec<(&'a CollectionProxy<B>, &'a B::Record)>> {
    if proxies.is_empty() {
        return Err(StoreError::KindMismatch { kind: B::KIND });
    }
    fragments
        .iter()
        .map(|(profile, record)| {
            proxies
                .get(&profile)
                .map(|proxy| (proxy, record))
                .ok_or(StoreError::UnknownProfile {
                    profile,
                    kind: B::KIND,
                })
        })
        .collect()
}

fn resolve_writable<'a, B: RecordBinding>(
    proxies: &'a Proxies<B>,
    fragments: &'a ProfileFragments<B::Record>,
) -> StoreResult<Vec<(&'a CollectionProxy<B>, &'a B::Record)>> {
    let targets = resolve(proxies, fragments)?;
    if let Some((proxy, _)) = targets.iter().find(|(proxy, _)| proxy.is_read_only()) {
        return Err(StoreError::ReadOnly {
            profile: proxy.profile(),
            kind: B::KIND,
        });
    }
    Ok(targets)
}

fn add_fragments<B: RecordBinding>(
    proxies: &Proxies<B>,
    fragments: &ProfileFragments<B::Record>,
) -> StoreResult<usize> {
    let targets = resolve_writable(proxies, fragments)?;
    if targets.is_empty() {
        return Err(StoreError::NoProfiles { kind: B::KIND });
    }
    for (proxy, record) in &targets {
        proxy.add(record)?;
    }
    Ok(targets.len())
}

fn remove_fragments<B: RecordBinding>(
    proxies: &Proxies<B>,
    fragments: &ProfileFragments<B::Record>,
) -> StoreResult<usize> {
    let mut removed = 0;
    for (proxy, record) in resolve_writable(proxies, fragments)? {
        if proxy.remove(record)? {
            removed += 1;
        }
    }
    Ok(removed)
}

fn contains_fragments<B: RecordBinding>(
    proxies: &Proxies<B>,
    fragments: &ProfileFragments<B::Record>,
) -> StoreResult<bool> {
    if fragments.is_empty() {
        return Ok(false);
    }
    for (proxy, record) in resolve(proxies, fragments)? {
        match proxy.find(record)? {
            Some(live) if live.merge_key() == record.merge_key() => {}
            _ => return Ok(false),
        }
    }
    Ok(true)
}
