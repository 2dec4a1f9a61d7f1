//! Shared helpers for the cross-crate integration tests under `tests/`.
//!
//! Each test binary links against this lib, so anything more than one
//! scenario needs lives here instead of being duplicated.

use std::sync::Mutex;

use foundry_alloc::{BestFitTree, CoalescingAllocator, HeapArenaSource, Strategy, TieBreak};

/// Best-fit allocator over a plain heap-backed memory manager, matching
/// the configuration the allocator crate's own tests use.
pub fn best_fit_allocator(granularity: usize, default_arena_size: usize) -> CoalescingAllocator<HeapArenaSource> {
    CoalescingAllocator::new(
        granularity,
        default_arena_size,
        HeapArenaSource::new(),
        Box::new(|| Box::new(BestFitTree::new(TieBreak::Min0)) as Box<dyn Strategy + Send>),
    )
}

/// A `Mutex`-guarded allocator, for scenarios where multiple scheduler
/// workers drive it concurrently. The allocator has no synchronization of
/// its own; callers serialize access the same way any `&mut self`-only
/// collaborator would be shared across threads.
pub type SharedAllocator = Mutex<CoalescingAllocator<HeapArenaSource>>;

pub fn shared_best_fit_allocator(granularity: usize, default_arena_size: usize) -> SharedAllocator {
    Mutex::new(best_fit_allocator(granularity, default_arena_size))
}
