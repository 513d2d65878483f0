//! In-process native store.
//!
//! # Responsibility
//! - Implement the native boundary without a host firewall, for simulation
//!   and tests.
//! - Reproduce native semantics core has to cope with: keyed removal on
//!   current field values, silent merge on duplicate append, read-only
//!   service collections.
//!
//! # Invariants
//! - At most one item per removal key in each collection.
//! - Fault injection affects exactly one subsequent `remove` call.

use super::{
    FirewallRoot, NativeApplication, NativeCollection, NativeError, NativeHandle, NativePort,
    NativeProfileSettings, NativeResult, NativeService, SharedCollection,
};
use crate::model::profile::Profile;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Fields a native collection matches on when removing an item.
pub trait RemovalKey {
    type Key: PartialEq + std::fmt::Debug;

    fn removal_key(&self) -> Self::Key;
}

impl RemovalKey for NativeApplication {
    type Key = String;

    fn removal_key(&self) -> String {
        self.process_image_file_name.to_lowercase()
    }
}

impl RemovalKey for NativePort {
    type Key = (u16, i32);

    fn removal_key(&self) -> (u16, i32) {
        (self.port, self.protocol)
    }
}

impl RemovalKey for NativeService {
    type Key = i32;

    fn removal_key(&self) -> i32 {
        self.service_type
    }
}

/// Vector-backed native collection.
#[derive(Debug)]
pub struct MemoryCollection<T> {
    items: Mutex<Vec<NativeHandle<T>>>,
    read_only: bool,
    fail_next_remove: AtomicBool,
    remove_calls: AtomicUsize,
}

impl<T> MemoryCollection<T> {
    pub fn new() -> Self {
        Self::with_read_only(false)
    }

    pub fn read_only() -> Self {
        Self::with_read_only(true)
    }

    fn with_read_only(read_only: bool) -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            read_only,
            fail_next_remove: AtomicBool::new(false),
            remove_calls: AtomicUsize::new(0),
        }
    }

    /// Inserts an item directly, bypassing the read-only flag.
    ///
    /// Models items the store provisions itself.
    pub fn seed(&self, value: T) -> NativeHandle<T> {
        let handle = NativeHandle::new(value);
        self.lock().push(handle.clone());
        handle
    }

    /// Makes the next `remove` call fail after it has been invoked.
    pub fn fail_next_remove(&self) {
        self.fail_next_remove.store(true, Ordering::SeqCst);
    }

    /// Number of `remove` calls received, including failed ones.
    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<NativeHandle<T>>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for MemoryCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> NativeCollection for MemoryCollection<T>
where
    T: RemovalKey + Send + 'static,
{
    type Item = NativeHandle<T>;

    fn enumerate(&self) -> NativeResult<Vec<NativeHandle<T>>> {
        Ok(self.lock().clone())
    }

    fn append(&self, item: NativeHandle<T>) -> NativeResult<()> {
        if self.read_only {
            return Err(NativeError::ReadOnly);
        }
        let key = item.update(|value| value.removal_key());
        let mut items = self.lock();
        let existing = items
            .iter()
            .position(|handle| handle.update(|value| value.removal_key()) == key);
        match existing {
            // Duplicate keys merge into the newest attributes.
            Some(index) => items[index] = item,
            None => items.push(item),
        }
        Ok(())
    }

    fn remove(&self, item: &NativeHandle<T>) -> NativeResult<()> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        if self.read_only {
            return Err(NativeError::ReadOnly);
        }
        let key = item.update(|value| value.removal_key());
        if self.fail_next_remove.swap(false, Ordering::SeqCst) {
            return Err(NativeError::Rejected {
                operation: "remove",
                message: format!("injected failure for key {key:?}"),
            });
        }

        let mut items = self.lock();
        let Some(index) = items
            .iter()
            .position(|handle| handle.update(|value| value.removal_key()) == key)
        else {
            return Err(NativeError::NotFound(format!("{key:?}")));
        };
        items.remove(index);
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}

/// Collections and policy flags of one profile.
#[derive(Debug, Default)]
struct ProfileStore {
    applications: Arc<MemoryCollection<NativeApplication>>,
    ports: Arc<MemoryCollection<NativePort>>,
    services: Arc<MemoryCollection<NativeService>>,
    settings: Mutex<NativeProfileSettings>,
}

impl ProfileStore {
    fn new() -> Self {
        Self {
            services: Arc::new(MemoryCollection::read_only()),
            ..Self::default()
        }
    }
}

/// In-memory firewall root with one store per configured profile.
#[derive(Debug)]
pub struct MemoryFirewall {
    profiles: BTreeMap<Profile, ProfileStore>,
}

impl MemoryFirewall {
    pub fn new(profiles: &[Profile]) -> Self {
        Self {
            profiles: profiles
                .iter()
                .map(|profile| (*profile, ProfileStore::new()))
                .collect(),
        }
    }

    pub fn with_all_profiles() -> Self {
        Self::new(&Profile::ALL)
    }

    pub fn application_store(
        &self,
        profile: Profile,
    ) -> Option<Arc<MemoryCollection<NativeApplication>>> {
        self.profiles
            .get(&profile)
            .map(|store| Arc::clone(&store.applications))
    }

    pub fn port_store(&self, profile: Profile) -> Option<Arc<MemoryCollection<NativePort>>> {
        self.profiles
            .get(&profile)
            .map(|store| Arc::clone(&store.ports))
    }

    pub fn service_store(&self, profile: Profile) -> Option<Arc<MemoryCollection<NativeService>>> {
        self.profiles
            .get(&profile)
            .map(|store| Arc::clone(&store.services))
    }

    fn store(&self, profile: Profile) -> NativeResult<&ProfileStore> {
        self.profiles
            .get(&profile)
            .ok_or_else(|| NativeError::Unavailable(format!("profile `{profile}` not provisioned")))
    }
}

impl FirewallRoot for MemoryFirewall {
    fn profiles(&self) -> Vec<Profile> {
        self.profiles.keys().copied().collect()
    }

    fn applications(&self, profile: Profile) -> NativeResult<SharedCollection<NativeApplication>> {
        let collection: SharedCollection<NativeApplication> = self.store(profile)?.applications.clone();
        Ok(collection)
    }

    fn ports(&self, profile: Profile) -> NativeResult<SharedCollection<NativePort>> {
        let collection: SharedCollection<NativePort> = self.store(profile)?.ports.clone();
        Ok(collection)
    }

    fn services(&self, profile: Profile) -> NativeResult<SharedCollection<NativeService>> {
        let collection: SharedCollection<NativeService> = self.store(profile)?.services.clone();
        Ok(collection)
    }

    fn profile_settings(&self, profile: Profile) -> NativeResult<NativeProfileSettings> {
        let store = self.store(profile)?;
        let settings = store.settings.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(settings.clone())
    }

    fn set_profile_settings(
        &self,
        profile: Profile,
        settings: &NativeProfileSettings,
    ) -> NativeResult<()> {
        let store = self.store(profile)?;
        *store.settings.lock().unwrap_or_else(PoisonError::into_inner) = settings.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryCollection, MemoryFirewall};
    use crate::model::profile::Profile;
    use crate::native::{
        FirewallRoot, NativeCollection, NativeError, NativeHandle, NativePort, NativeService,
    };

    fn port(port: u16, protocol: i32, name: &str) -> NativePort {
        NativePort {
            name: name.to_string(),
            port,
            protocol,
            enabled: true,
            ..NativePort::default()
        }
    }

    #[test]
    fn remove_matches_current_field_values() {
        let collection = MemoryCollection::new();
        let handle = collection.seed(port(80, 6, "web"));
        collection.seed(port(80, 17, "web-udp"));

        handle.update(|item| item.port = 8080);
        let stale = NativeHandle::new(port(80, 6, "web"));
        let err = collection
            .remove(&stale)
            .expect_err("old key no longer matches");
        assert!(matches!(err, NativeError::NotFound(_)));

        collection.remove(&handle).expect("current key matches");
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.remove_calls(), 2);
    }

    #[test]
    fn append_merges_duplicate_keys() {
        let collection = MemoryCollection::new();
        collection
            .append(NativeHandle::new(port(22, 6, "ssh")))
            .expect("append");
        collection
            .append(NativeHandle::new(port(22, 6, "ssh-renamed")))
            .expect("append duplicate");

        let items = collection.enumerate().expect("enumerate");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].snapshot().name, "ssh-renamed");
    }

    #[test]
    fn injected_failure_hits_once() {
        let collection = MemoryCollection::new();
        let handle = collection.seed(port(53, 17, "dns"));
        collection.fail_next_remove();

        assert!(matches!(
            collection.remove(&handle),
            Err(NativeError::Rejected { .. })
        ));
        collection.remove(&handle).expect("second attempt succeeds");
        assert!(collection.is_empty());
    }

    #[test]
    fn service_collections_are_read_only() {
        let firewall = MemoryFirewall::new(&[Profile::Domain]);
        let services = firewall.services(Profile::Domain).expect("services");
        assert!(services.is_read_only());
        let err = services
            .append(NativeHandle::new(NativeService::default()))
            .expect_err("read-only append");
        assert_eq!(err, NativeError::ReadOnly);
    }

    #[test]
    fn unknown_profile_is_unavailable() {
        let firewall = MemoryFirewall::new(&[Profile::Domain]);
        assert_eq!(firewall.profiles(), vec![Profile::Domain]);
        assert!(matches!(
            firewall.ports(Profile::Public),
            Err(NativeError::Unavailable(_))
        ));
    }

    #[test]
    fn settings_roundtrip_per_profile() {
        let firewall = MemoryFirewall::with_all_profiles();
        let mut settings = firewall.profile_settings(Profile::Public).expect("settings");
        assert!(settings.firewall_enabled);
        settings.exceptions_not_allowed = true;
        firewall
            .set_profile_settings(Profile::Public, &settings)
            .expect("store settings");

        assert!(firewall
            .profile_settings(Profile::Public)
            .expect("read back")
            .exceptions_not_allowed);
        assert!(!firewall
            .profile_settings(Profile::Domain)
            .expect("other profile")
            .exceptions_not_allowed);
    }
}
