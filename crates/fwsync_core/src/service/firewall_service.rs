//! Firewall use-case service.
//!
//! # Responsibility
//! - Provide stable rule and policy entry points for core callers.
//! - Obtain the native root through the per-context singleton cache.
//!
//! # Invariants
//! - Service APIs never bypass `RuleSet` routing or proxy removal guards.
//! - Service layer stays transport-agnostic: the root arrives as a trait object.

use crate::config::SentinelConfig;
use crate::context::{ContextCache, ExecutionContext};
use crate::model::profile::Profile;
use crate::model::rule::LogicalRule;
use crate::model::settings::ProfileSettings;
use crate::native::{FirewallRoot, NativeError, NativeProfileSettings, NativeResult};
use crate::repo::{RuleSet, StoreError};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Service-level error for firewall use cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirewallServiceError {
    Store(StoreError),
    Native(NativeError),
}

impl Display for FirewallServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Native(err) => write!(f, "{err}"),
        }
    }
}

impl Error for FirewallServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Native(err) => Some(err),
        }
    }
}

impl From<StoreError> for FirewallServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<NativeError> for FirewallServiceError {
    fn from(value: NativeError) -> Self {
        Self::Native(value)
    }
}

pub type FirewallServiceResult<T> = Result<T, FirewallServiceError>;

/// Native root as cached per execution context.
pub struct RootHandle(pub Arc<dyn FirewallRoot>);

/// Use-case service over one native firewall root.
pub struct FirewallService {
    root: Arc<dyn FirewallRoot>,
    rules: RuleSet,
}

impl FirewallService {
    /// Opens the aggregated rule view of `root`.
    pub fn new(root: Arc<dyn FirewallRoot>, sentinel: &SentinelConfig) -> FirewallServiceResult<Self> {
        let rules = RuleSet::open(root.as_ref(), sentinel)?;
        Ok(Self { root, rules })
    }

    /// Opens the service over the root cached for `context`.
    ///
    /// `connect` runs only when no compatible root is cached yet.
    pub fn for_context<F>(
        cache: &ContextCache,
        context: &ExecutionContext,
        sentinel: &SentinelConfig,
        connect: F,
    ) -> FirewallServiceResult<Self>
    where
        F: FnOnce() -> NativeResult<Arc<dyn FirewallRoot>>,
    {
        let handle = cache.get_or_try_create(context, || connect().map(RootHandle))?;
        Self::new(Arc::clone(&handle.0), sentinel)
    }

    pub fn root(&self) -> &Arc<dyn FirewallRoot> {
        &self.root
    }

    pub fn rule_set(&self) -> &RuleSet {
        &self.rules
    }

    pub fn profiles(&self) -> Vec<Profile> {
        self.root.profiles()
    }

    /// Lists logical rules across every profile.
    pub fn rules(&self) -> FirewallServiceResult<Vec<LogicalRule>> {
        Ok(self.rules.rules()?)
    }

    pub fn add_rule(&self, rule: &LogicalRule) -> FirewallServiceResult<()> {
        Ok(self.rules.add(rule)?)
    }

    /// Removes a logical rule; returns whether anything was removed.
    pub fn remove_rule(&self, rule: &LogicalRule) -> FirewallServiceResult<bool> {
        Ok(self.rules.remove(rule)?)
    }

    pub fn contains_rule(&self, rule: &LogicalRule) -> FirewallServiceResult<bool> {
        Ok(self.rules.contains(rule)?)
    }

    pub fn profile_settings(&self, profile: Profile) -> FirewallServiceResult<ProfileSettings> {
        let native = self.root.profile_settings(profile)?;
        Ok(ProfileSettings::from(&native))
    }

    pub fn set_profile_settings(
        &self,
        profile: Profile,
        settings: &ProfileSettings,
    ) -> FirewallServiceResult<()> {
        self.root
            .set_profile_settings(profile, &NativeProfileSettings::from(settings))?;
        info!(
            "event=profile_settings_update module=service status=ok profile={} firewall_enabled={}",
            profile, settings.firewall_enabled
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{FirewallService, FirewallServiceError};
    use crate::config::SentinelConfig;
    use crate::context::{Affinity, ContextCache, ExecutionContext};
    use crate::model::profile::Profile;
    use crate::native::memory::MemoryFirewall;
    use crate::native::{FirewallRoot, NativeError};
    use std::sync::Arc;

    #[test]
    fn connect_failure_surfaces_as_native_error() {
        let cache = ContextCache::new();
        let context = ExecutionContext::new(Affinity::FreeThreaded);
        let result = FirewallService::for_context(&cache, &context, &SentinelConfig::default(), || {
            Err(NativeError::AccessDenied)
        });
        assert_eq!(
            result.err(),
            Some(FirewallServiceError::Native(NativeError::AccessDenied))
        );
    }

    #[test]
    fn cached_root_is_reused_for_the_same_context() {
        let cache = ContextCache::new();
        let context = ExecutionContext::new(Affinity::SingleAffinity);
        let connect = || -> Result<Arc<dyn FirewallRoot>, NativeError> {
            Ok(Arc::new(MemoryFirewall::new(&[Profile::Public])))
        };

        let first = FirewallService::for_context(&cache, &context, &SentinelConfig::default(), connect)
            .expect("first service");
        let second = FirewallService::for_context(&cache, &context, &SentinelConfig::default(), || {
            Err(NativeError::Unavailable("must not reconnect".to_string()))
        })
        .expect("cached root");
        assert!(Arc::ptr_eq(first.root(), second.root()));
        assert_eq!(second.profiles(), vec![Profile::Public]);
    }
}
