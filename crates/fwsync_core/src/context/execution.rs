//! Calling-context identity and affinity.

use once_cell::unsync::OnceCell;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: OnceCell<ThreadContext> = OnceCell::new();
}

/// Native threading affinity of a calling context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Affinity {
    /// Instances may be shared with every other free-threaded context.
    FreeThreaded,
    /// Instances stay with the context that created them.
    SingleAffinity,
}

impl Affinity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FreeThreaded => "free_threaded",
            Self::SingleAffinity => "single_affinity",
        }
    }
}

impl Display for Affinity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-unique context identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextId(u64);

impl ContextId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl Display for ContextId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

#[derive(Debug)]
pub(crate) struct LivenessToken;

#[derive(Debug, Clone)]
enum Liveness {
    /// Live while any clone of the context exists.
    Owned(Arc<LivenessToken>),
    /// Live while the owning thread's slot exists.
    Thread(Weak<LivenessToken>),
}

/// Thread-local owner of the only strong token of a per-thread context.
struct ThreadContext {
    id: ContextId,
    affinity: Affinity,
    token: Arc<LivenessToken>,
}

/// A calling context together with its affinity class.
///
/// A context from [`ExecutionContext::new`] is live while any clone of it
/// exists. The per-thread context returned by [`ExecutionContext::current`]
/// ends when its thread exits, even if clones of it are still held
/// elsewhere.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    id: ContextId,
    affinity: Affinity,
    liveness: Liveness,
}

fn next_context_id() -> ContextId {
    ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
}

impl ExecutionContext {
    /// Fresh context, not bound to any thread.
    pub fn new(affinity: Affinity) -> Self {
        Self {
            id: next_context_id(),
            affinity,
            liveness: Liveness::Owned(Arc::new(LivenessToken)),
        }
    }

    /// Context of the calling thread, free-threaded unless
    /// [`ExecutionContext::init_current`] ran first on this thread.
    pub fn current() -> Self {
        Self::init_current(Affinity::FreeThreaded)
    }

    /// Binds the calling thread's context with `affinity` on first use.
    ///
    /// Affinity is fixed at creation; later calls return the existing context
    /// unchanged.
    pub fn init_current(affinity: Affinity) -> Self {
        CURRENT.with(|current| {
            let slot = current.get_or_init(|| ThreadContext {
                id: next_context_id(),
                affinity,
                token: Arc::new(LivenessToken),
            });
            Self {
                id: slot.id,
                affinity: slot.affinity,
                liveness: Liveness::Thread(Arc::downgrade(&slot.token)),
            }
        })
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn affinity(&self) -> Affinity {
        self.affinity
    }

    /// Whether the context can still own cache entries.
    pub fn is_live(&self) -> bool {
        match &self.liveness {
            Liveness::Owned(_) => true,
            Liveness::Thread(token) => token.strong_count() > 0,
        }
    }

    pub(crate) fn liveness(&self) -> Weak<LivenessToken> {
        match &self.liveness {
            Liveness::Owned(token) => Arc::downgrade(token),
            Liveness::Thread(token) => token.clone(),
        }
    }
}
