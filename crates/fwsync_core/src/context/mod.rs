//! Execution contexts and the affinity-aware singleton cache.
//!
//! # Responsibility
//! - Identify calling contexts and their native threading affinity.
//! - Cache native root handles per compatible context.
//!
//! # Invariants
//! - The cache lock is the only process-wide mutable state in core.

pub mod cache;
pub mod execution;

pub use cache::ContextCache;
pub use execution::{Affinity, ContextId, ExecutionContext};
