//! Client-side model of a profile-partitioned host firewall.
//! This crate keeps rule identity, aggregation and guarded removal in one place.

pub mod codec;
pub mod config;
pub mod context;
pub mod logging;
pub mod model;
pub mod native;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig, LoggingConfig, SentinelConfig};
pub use context::{Affinity, ContextCache, ContextId, ExecutionContext};
pub use logging::{default_log_level, init_logging, init_logging_with, logging_status};
pub use model::key::{CompositeKey, KeyPart, Keyed};
pub use model::profile::Profile;
pub use model::record::{
    ApplicationRule, IpVersion, PortRule, Protocol, Scope, ServiceRule, ServiceType,
};
pub use model::rule::{LogicalRule, ProfileFragments, RuleKind};
pub use model::settings::ProfileSettings;
pub use native::{FirewallRoot, NativeCollection, NativeError, NativeHandle, NativeResult};
pub use repo::{CollectionProxy, RuleSet, StoreError, StoreResult};
pub use service::{FirewallService, FirewallServiceError, FirewallServiceResult};
