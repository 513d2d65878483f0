//! Per-context singleton cache.
//!
//! # Responsibility
//! - Hand out one instance per (context, type), sharing instances between
//!   free-threaded contexts.
//! - Evict entries of contexts that are no longer live.
//!
//! # Invariants
//! - Purge, lookup, adoption and construction run under one lock.
//! - A single-affinity context never receives or lends an instance.
//! - Entries record the context's affinity when first created.

use super::execution::{Affinity, ContextId, ExecutionContext, LivenessToken};
use log::debug;
use once_cell::sync::Lazy;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

static GLOBAL_CACHE: Lazy<ContextCache> = Lazy::new(ContextCache::new);

type Instance = Arc<dyn Any + Send + Sync>;

struct SingletonSlot {
    instance: Instance,
    /// Context that constructed the instance.
    origin: ContextId,
}

struct ContextEntry {
    affinity: Affinity,
    liveness: Weak<LivenessToken>,
    slots: HashMap<TypeId, SingletonSlot>,
}

impl ContextEntry {
    fn is_live(&self) -> bool {
        self.liveness.strong_count() > 0
    }
}

/// Singleton table keyed by execution context and type.
///
/// Constructors run inside the cache lock and must not call back into the
/// same cache.
#[derive(Default)]
pub struct ContextCache {
    entries: Mutex<HashMap<ContextId, ContextEntry>>,
}

impl ContextCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide cache.
    pub fn global() -> &'static ContextCache {
        &GLOBAL_CACHE
    }

    /// Returns the `T` instance for `context`, adopting or constructing one.
    ///
    /// # Errors
    /// Returns `create`'s error unchanged; nothing is cached in that case.
    pub fn get_or_try_create<T, E, F>(&self, context: &ExecutionContext, create: F) -> Result<Arc<T>, E>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Result<T, E>,
    {
        let type_id = TypeId::of::<T>();
        let mut entries = self.lock();

        let before = entries.len();
        entries.retain(|_, entry| entry.is_live());
        let purged = before - entries.len();
        if purged > 0 {
            debug!("event=cache_purge module=context status=ok purged={purged}");
        }

        let entry = entries
            .entry(context.id())
            .or_insert_with(|| ContextEntry {
                affinity: context.affinity(),
                liveness: context.liveness(),
                slots: HashMap::new(),
            });
        let affinity = entry.affinity;
        if let Some(instance) = entry.slots.get(&type_id).and_then(downcast::<T>) {
            return Ok(instance);
        }

        let adopted = match affinity {
            Affinity::FreeThreaded => entries
                .iter()
                .filter(|(id, entry)| {
                    **id != context.id() && entry.affinity == Affinity::FreeThreaded
                })
                .find_map(|(_, entry)| {
                    let slot = entry.slots.get(&type_id)?;
                    downcast::<T>(slot).map(|instance| (instance, slot.origin))
                }),
            Affinity::SingleAffinity => None,
        };

        let (instance, origin, status) = match adopted {
            Some((instance, origin)) => (instance, origin, "adopted"),
            None => (Arc::new(create()?), context.id(), "created"),
        };
        let shared: Instance = instance.clone();
        if let Some(entry) = entries.get_mut(&context.id()) {
            entry.slots.insert(
                type_id,
                SingletonSlot {
                    instance: shared,
                    origin,
                },
            );
        }
        debug!(
            "event=cache_get module=context status={status} context={} affinity={} origin={} type={}",
            context.id(),
            affinity,
            origin,
            type_name::<T>()
        );
        Ok(instance)
    }

    pub fn get_or_create<T, F>(&self, context: &ExecutionContext, create: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        match self.get_or_try_create::<T, Infallible, _>(context, || Ok(create())) {
            Ok(instance) => instance,
            Err(never) => match never {},
        }
    }

    pub fn get_instance<T>(&self, context: &ExecutionContext) -> Arc<T>
    where
        T: Any + Send + Sync + Default,
    {
        self.get_or_create(context, T::default)
    }

    /// Number of context entries, live or awaiting purge.
    pub fn context_count(&self) -> usize {
        self.lock().len()
    }

    /// Whether an entry for `id` is present; does not purge.
    pub fn contains_context(&self, id: ContextId) -> bool {
        self.lock().contains_key(&id)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ContextId, ContextEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn downcast<T: Any + Send + Sync>(slot: &SingletonSlot) -> Option<Arc<T>> {
    Arc::clone(&slot.instance).downcast::<T>().ok()
}

#[cfg(test)]
mod tests {
    use super::ContextCache;
    use crate::context::execution::{Affinity, ExecutionContext};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    #[test]
    fn same_context_reuses_its_slot() {
        let cache = ContextCache::new();
        let context = ExecutionContext::new(Affinity::SingleAffinity);
        let first = cache.get_instance::<Counter>(&context);
        first.0.fetch_add(1, Ordering::SeqCst);
        let second = cache.get_instance::<Counter>(&context);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn failed_construction_caches_nothing() {
        let cache = ContextCache::new();
        let context = ExecutionContext::new(Affinity::FreeThreaded);
        let err = cache
            .get_or_try_create::<Counter, _, _>(&context, || Err("native root unavailable"))
            .err()
            .expect("constructor error is forwarded");
        assert_eq!(err, "native root unavailable");

        let created = cache.get_or_create(&context, || Counter(AtomicUsize::new(7)));
        assert_eq!(created.0.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn distinct_types_get_distinct_slots() {
        let cache = ContextCache::new();
        let context = ExecutionContext::new(Affinity::FreeThreaded);
        let counter = cache.get_instance::<Counter>(&context);
        let label = cache.get_or_create(&context, || String::from("root"));
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
        assert_eq!(label.as_str(), "root");
        assert_eq!(cache.context_count(), 1);
    }
}
