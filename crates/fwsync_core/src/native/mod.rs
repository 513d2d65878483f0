//! Opaque native rule store boundary.
//!
//! # Responsibility
//! - Describe what core consumes from the host firewall: per-profile
//!   enumerable collections and a root object exposing them.
//! - Keep transport details (COM, RPC, ...) outside of core.
//!
//! # Invariants
//! - Native items have no stable identity; they are shared handles whose
//!   attribute writes land directly in the store.
//! - `NativeCollection::remove` is keyed on the item's *current* identity
//!   field values, read at call time.
//! - Native calls are blocking and are never retried by core.

pub mod memory;

use crate::model::profile::Profile;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type NativeResult<T> = Result<T, NativeError>;

/// Error raised by the native store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeError {
    /// Store or root object cannot be reached.
    Unavailable(String),
    /// Store refused the operation.
    Rejected {
        operation: &'static str,
        message: String,
    },
    /// No item matches the removal key.
    NotFound(String),
    /// Collection does not accept mutation.
    ReadOnly,
    AccessDenied,
}

impl Display for NativeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "native firewall unavailable: {message}"),
            Self::Rejected { operation, message } => {
                write!(f, "native {operation} rejected: {message}")
            }
            Self::NotFound(key) => write!(f, "native item not found: {key}"),
            Self::ReadOnly => write!(f, "native collection is read-only"),
            Self::AccessDenied => write!(f, "native firewall access denied"),
        }
    }
}

impl Error for NativeError {}

/// Shared handle to one native item.
///
/// Cloning yields another handle to the same item, like a COM reference.
#[derive(Debug, Default)]
pub struct NativeHandle<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Clone for NativeHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> NativeHandle<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(value)),
        }
    }

    /// Runs `f` with mutable access to the item's attributes.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.lock())
    }

    /// Returns whether both handles point at the same native item.
    pub fn same_item(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> NativeHandle<T> {
    /// Copies the item's current attributes.
    pub fn snapshot(&self) -> T {
        self.lock().clone()
    }
}

/// Append/enumerate/remove-only native collection.
pub trait NativeCollection: Send + Sync {
    type Item;

    fn enumerate(&self) -> NativeResult<Vec<Self::Item>>;
    fn append(&self, item: Self::Item) -> NativeResult<()>;
    /// Removes the item whose identity fields equal `item`'s current values.
    fn remove(&self, item: &Self::Item) -> NativeResult<()>;
    fn is_read_only(&self) -> bool;
}

/// Native collection shared between proxies, keyed by attribute shape.
pub type SharedCollection<T> = Arc<dyn NativeCollection<Item = NativeHandle<T>>>;

/// Flat native shape of an authorized application.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NativeApplication {
    pub name: String,
    pub process_image_file_name: String,
    pub enabled: bool,
    /// 0 = all, 1 = local subnet, 2 = custom.
    pub scope: i32,
    /// 0 = v4, 1 = v6, 2 = any.
    pub ip_version: i32,
    pub remote_addresses: String,
}

/// Flat native shape of an opened port.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NativePort {
    pub name: String,
    pub port: u16,
    /// IANA protocol number.
    pub protocol: i32,
    pub enabled: bool,
    pub built_in: bool,
    pub scope: i32,
    pub ip_version: i32,
    pub remote_addresses: String,
}

/// Flat native shape of a built-in service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NativeService {
    pub name: String,
    pub service_type: i32,
    pub enabled: bool,
    pub customized: bool,
    pub scope: i32,
    pub ip_version: i32,
    pub remote_addresses: String,
    pub globally_open_ports: Vec<NativePort>,
}

/// Flat native per-profile policy flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeProfileSettings {
    pub firewall_enabled: bool,
    pub exceptions_not_allowed: bool,
    pub notifications_disabled: bool,
    pub unicast_responses_disabled: bool,
    /// Message-type text; `None` when no ICMP type is allowed explicitly.
    pub allowed_icmp_types: Option<String>,
}

impl Default for NativeProfileSettings {
    fn default() -> Self {
        Self {
            firewall_enabled: true,
            exceptions_not_allowed: false,
            notifications_disabled: false,
            unicast_responses_disabled: false,
            allowed_icmp_types: None,
        }
    }
}

/// Native root object exposing per-profile collections and policy flags.
pub trait FirewallRoot: Send + Sync {
    fn profiles(&self) -> Vec<Profile>;
    fn applications(&self, profile: Profile) -> NativeResult<SharedCollection<NativeApplication>>;
    fn ports(&self, profile: Profile) -> NativeResult<SharedCollection<NativePort>>;
    fn services(&self, profile: Profile) -> NativeResult<SharedCollection<NativeService>>;
    fn profile_settings(&self, profile: Profile) -> NativeResult<NativeProfileSettings>;
    fn set_profile_settings(
        &self,
        profile: Profile,
        settings: &NativeProfileSettings,
    ) -> NativeResult<()>;
}

#[cfg(test)]
mod tests {
    use super::{NativeHandle, NativePort};

    #[test]
    fn handle_clones_share_one_item() {
        let handle = NativeHandle::new(NativePort {
            port: 80,
            ..NativePort::default()
        });
        let alias = handle.clone();
        alias.update(|port| port.port = 8080);

        assert_eq!(handle.snapshot().port, 8080);
        assert!(handle.same_item(&alias));
        assert!(!handle.same_item(&NativeHandle::new(NativePort::default())));
    }
}
