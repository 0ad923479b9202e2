//! Abstract memory budget interfaces.
//!
//! The concrete implementation lives in `chunkflow-mem`. We keep only traits here
//! so arrays and builders can account for their backing storage without pulling
//! the allocator itself into core.

use crate::error::Result;

/// A guard returned by a memory budget when bytes are acquired.
///
/// It must be RAII (releases on Drop). Arrays hold their guard for as long as the
/// last reference to the array lives.
pub trait BudgetGuard: Send + Sync {
    /// Number of bytes currently accounted for by this guard.
    fn bytes(&self) -> usize;

    /// Optional debug tag for metrics/tracing.
    fn tag(&self) -> &'static str {
        "guard"
    }

    /// Grow or shrink the accounted size. Shrinking always succeeds; growing
    /// fails (returns false) if it would exceed the budget.
    fn try_resize(&mut self, new_bytes: usize) -> bool;
}

/// A handle representing a memory-cap enforcer with a concrete guard type.
pub trait MemoryBudget: Send + Sync + 'static {
    type Guard: BudgetGuard;

    /// Attempt to acquire `bytes` from the live budget. Returns a guard on success.
    fn try_acquire(&self, bytes: usize, tag: &'static str) -> Option<Self::Guard>;

    /// Total configured capacity (bytes).
    fn capacity_bytes(&self) -> usize;

    /// Approximate currently used bytes (advisory; not a correctness API).
    fn used_bytes(&self) -> usize;
}

/// Object-safe allocator handed to transformations and builders.
///
/// `allocate` is the only way to obtain accounting for buffer storage; freeing
/// happens when the returned guard is dropped.
pub trait Allocator: Send + Sync {
    fn allocate(&self, bytes: usize, tag: &'static str) -> Result<Box<dyn BudgetGuard>>;

    fn capacity_bytes(&self) -> usize;

    fn used_bytes(&self) -> usize;
}

// NOTE: Do *not* add default impls here that would silently "allow" allocations.
// The mem crate is the only place where guards should be constructed.
