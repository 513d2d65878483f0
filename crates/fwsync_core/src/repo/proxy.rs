//! Collection proxy over one native per-profile collection.
//!
//! # Responsibility
//! - Present an append/enumerate/remove-only native collection as a set of
//!   records keyed by `CompositeKey`.
//! - Run removal through the sentinel swap so a native item is never left
//!   holding its temporary identity.
//!
//! # Invariants
//! - `records` fails with `IdentityConflict` instead of exposing two records
//!   with one identity.
//! - Guarded removal restores the captured identity on every exit path,
//!   unwinding included, before the sentinel's scratch resource is released.
//! - Not internally synchronized: callers serialize access per collection.

use super::binding::RecordBinding;
use super::error::{StoreError, StoreResult};
use crate::model::key::Keyed;
use crate::model::profile::Profile;
use crate::model::rule::RuleKind;
use crate::native::{NativeHandle, SharedCollection};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::time::Instant;

/// Managed view of one native collection.
pub struct CollectionProxy<B: RecordBinding> {
    profile: Profile,
    collection: SharedCollection<B::Native>,
    binding: B,
}

impl<B: RecordBinding> CollectionProxy<B> {
    pub fn new(profile: Profile, collection: SharedCollection<B::Native>, binding: B) -> Self {
        Self {
            profile,
            collection,
            binding,
        }
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    pub fn kind(&self) -> RuleKind {
        B::KIND
    }

    /// Whether the native collection rejects mutation outright.
    pub fn is_read_only(&self) -> bool {
        self.collection.is_read_only()
    }

    /// Projects every native item to a record.
    ///
    /// # Errors
    /// - `Projection` when an item cannot be represented.
    /// - `IdentityConflict` when two items share an identity key.
    pub fn records(&self) -> StoreResult<Vec<B::Record>> {
        let handles = self.collection.enumerate()?;
        let mut seen = HashSet::with_capacity(handles.len());
        let mut records = Vec::with_capacity(handles.len());
        for handle in &handles {
            let record = self.binding.from_native(&handle.snapshot())?;
            let key = record.identity_key();
            if !seen.insert(key.clone()) {
                return Err(StoreError::IdentityConflict {
                    profile: self.profile,
                    key,
                });
            }
            records.push(record);
        }
        Ok(records)
    }

    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.records()?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns the live record sharing `record`'s identity, if any.
    pub fn find(&self, record: &B::Record) -> StoreResult<Option<B::Record>> {
        let wanted = record.identity_key();
        Ok(self
            .records()?
            .into_iter()
            .find(|live| live.identity_key() == wanted))
    }

    pub fn contains(&self, record: &B::Record) -> StoreResult<bool> {
        Ok(self.find(record)?.is_some())
    }

    /// Appends `record`. Duplicate handling is left to the native store.
    pub fn add(&self, record: &B::Record) -> StoreResult<()> {
        self.ensure_writable()?;
        let native = self.binding.to_native(record);
        self.collection.append(NativeHandle::new(native))?;
        debug!(
            "event=proxy_add module=repo status=ok kind={} profile={}",
            B::KIND,
            self.profile
        );
        Ok(())
    }

    /// Removes the item sharing `record`'s identity.
    ///
    /// Returns `Ok(false)` when no such item exists. The native removal is
    /// keyed on a sentinel identity; the original identity is written back to
    /// the item handle whether removal succeeds, fails or panics.
    pub fn remove(&self, record: &B::Record) -> StoreResult<bool> {
        self.ensure_writable()?;
        let started_at = Instant::now();

        let handles = self.collection.enumerate()?;
        let natives: Vec<B::Native> = handles.iter().map(NativeHandle::snapshot).collect();
        let wanted = record.identity_key();
        let mut target = None;
        for (index, native) in natives.iter().enumerate() {
            if self.binding.from_native(native)?.identity_key() == wanted {
                target = Some(index);
                break;
            }
        }
        let Some(index) = target else {
            debug!(
                "event=proxy_remove module=repo status=not_found kind={} profile={}",
                B::KIND,
                self.profile
            );
            return Ok(false);
        };

        let handle = &handles[index];
        let sentinel = self.binding.sentinel(&natives[index], &natives)?;
        let guard = RestoreIdentity {
            binding: &self.binding,
            handle,
            original: self.binding.identity(&natives[index]),
            scratch: Some(sentinel.scratch),
        };
        handle.update(|native| self.binding.set_identity(native, &sentinel.identity));
        let outcome = self.collection.remove(handle);
        drop(guard);

        match outcome {
            Ok(()) => {
                info!(
                    "event=proxy_remove module=repo status=ok kind={} profile={} duration_ms={}",
                    B::KIND,
                    self.profile,
                    started_at.elapsed().as_millis()
                );
                Ok(true)
            }
            Err(err) => {
                warn!(
                    "event=proxy_remove module=repo status=error kind={} profile={} duration_ms={} error={}",
                    B::KIND,
                    self.profile,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err.into())
            }
        }
    }

    fn ensure_writable(&self) -> StoreResult<()> {
        if self.is_read_only() {
            return Err(StoreError::ReadOnly {
                profile: self.profile,
                kind: B::KIND,
            });
        }
        Ok(())
    }
}

/// Writes the captured identity back to the item, then frees the scratch.
struct RestoreIdentity<'a, B: RecordBinding> {
    binding: &'a B,
    handle: &'a NativeHandle<B::Native>,
    original: B::Identity,
    scratch: Option<B::Scratch>,
}

impl<B: RecordBinding> Drop for RestoreIdentity<'_, B> {
    fn drop(&mut self) {
        let binding = self.binding;
        let original = &self.original;
        self.handle
            .update(|native| binding.set_identity(native, original));
        drop(self.scratch.take());
    }
}

#[cfg(test)]
mod tests {
    use super::CollectionProxy;
    use crate::config::SentinelConfig;
    use crate::model::profile::Profile;
    use crate::model::record::{PortRule, Protocol};
    use crate::native::memory::MemoryCollection;
    use crate::native::{
        NativeCollection, NativeError, NativeHandle, NativePort, NativeResult, SharedCollection,
    };
    use crate::repo::binding::PortBinding;
    use crate::repo::error::StoreError;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::Arc;

    fn port_proxy(collection: Arc<MemoryCollection<NativePort>>) -> CollectionProxy<PortBinding> {
        let shared: SharedCollection<NativePort> = collection;
        CollectionProxy::new(
            Profile::Domain,
            shared,
            PortBinding::new(&SentinelConfig::default()),
        )
    }

    fn native_port(port: u16, protocol: i32) -> NativePort {
        NativePort {
            name: format!("port {port}"),
            port,
            protocol,
            enabled: true,
            scope: 0,
            ip_version: 2,
            remote_addresses: "*".to_string(),
            ..NativePort::default()
        }
    }

    #[test]
    fn records_reject_duplicate_identities() {
        let collection = Arc::new(MemoryCollection::new());
        collection.seed(native_port(80, 6));
        collection.seed(native_port(80, 6));
        let proxy = port_proxy(collection);

        let err = proxy.records().expect_err("duplicate identity must fail");
        assert!(matches!(
            err,
            StoreError::IdentityConflict {
                profile: Profile::Domain,
                ..
            }
        ));
    }

    #[test]
    fn remove_missing_record_returns_false() {
        let collection = Arc::new(MemoryCollection::new());
        collection.seed(native_port(80, 6));
        let proxy = port_proxy(Arc::clone(&collection));

        let removed = proxy
            .remove(&PortRule::new("other", 81, Protocol::Tcp))
            .expect("remove runs");
        assert!(!removed);
        assert_eq!(collection.remove_calls(), 0);
    }

    struct PanickingCollection {
        inner: MemoryCollection<NativePort>,
    }

    impl NativeCollection for PanickingCollection {
        type Item = NativeHandle<NativePort>;

        fn enumerate(&self) -> NativeResult<Vec<Self::Item>> {
            self.inner.enumerate()
        }

        fn append(&self, item: Self::Item) -> NativeResult<()> {
            self.inner.append(item)
        }

        fn remove(&self, _item: &Self::Item) -> NativeResult<()> {
            panic!("native layer faulted");
        }

        fn is_read_only(&self) -> bool {
            false
        }
    }

    #[test]
    fn identity_is_restored_when_native_removal_panics() {
        let collection = Arc::new(PanickingCollection {
            inner: MemoryCollection::new(),
        });
        let handle = collection.inner.seed(native_port(3389, 6));
        let shared: SharedCollection<NativePort> = collection.clone();
        let proxy = CollectionProxy::new(
            Profile::Private,
            shared,
            PortBinding::new(&SentinelConfig::default()),
        );

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            proxy.remove(&PortRule::new("rdp", 3389, Protocol::Tcp))
        }));
        assert!(outcome.is_err());
        assert_eq!(handle.snapshot().port, 3389);
        assert_eq!(collection.inner.len(), 1);
    }

    #[test]
    fn read_only_collection_rejects_mutation_before_native_call() {
        let collection = Arc::new(MemoryCollection::<NativePort>::read_only());
        let proxy = port_proxy(Arc::clone(&collection));
        assert!(proxy.is_read_only());

        let err = proxy
            .remove(&PortRule::new("web", 80, Protocol::Tcp))
            .expect_err("read-only remove");
        assert!(matches!(err, StoreError::ReadOnly { .. }));
        assert_eq!(collection.remove_calls(), 0);

        let err = proxy
            .add(&PortRule::new("web", 80, Protocol::Tcp))
            .expect_err("read-only add");
        assert!(matches!(err, StoreError::ReadOnly { .. }));
    }

    #[test]
    fn native_errors_surface_unchanged() {
        let collection = Arc::new(MemoryCollection::new());
        collection.seed(native_port(25, 6));
        collection.fail_next_remove();
        let proxy = port_proxy(collection);

        let err = proxy
            .remove(&PortRule::new("smtp", 25, Protocol::Tcp))
            .expect_err("injected failure");
        assert!(matches!(
            err,
            StoreError::Native(NativeError::Rejected {
                operation: "remove",
                ..
            })
        ));
    }
}
