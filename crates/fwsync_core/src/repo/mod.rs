//! Managed views over the native rule store.
//!
//! # Responsibility
//! - Wrap each native per-profile collection in a keyed `CollectionProxy`.
//! - Fold proxies into the cross-profile `RuleSet`.
//!
//! # Invariants
//! - Identity and merge semantics come only from `model::key::Keyed`, shared
//!   by proxies and aggregation.
//! - Repository APIs return semantic errors (`IdentityConflict`, `ReadOnly`,
//!   `UnknownProfile`) alongside native transport errors.

pub mod binding;
pub mod error;
pub mod proxy;
pub mod rule_set;

pub use binding::{ApplicationBinding, PortBinding, RecordBinding, Sentinel, ServiceBinding};
pub use error::{StoreError, StoreResult};
pub use proxy::CollectionProxy;
pub use rule_set::RuleSet;
