//! Error taxonomy for the allocator.

use thiserror::Error;

/// Errors the allocator's public surface can return.
///
/// `InvariantViolated` covers double-free and bad-handle misuse: fatal in
/// debug builds via `debug_assert!`, and undefined behaviour if triggered
/// in release — this variant exists so tests can assert on it through
/// `std::panic::catch_unwind` rather than it actually being a normal
/// `Result` path callers branch on.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The memory manager refused to create a new arena.
    #[error("backing store exhausted: memory manager refused a new arena")]
    BackingExhausted,

    /// A bank-level or block-level invariant was violated: double-free,
    /// a handle that doesn't resolve to an allocated block, or similar
    /// caller misuse.
    #[error("allocator invariant violated: {0}")]
    InvariantViolated(&'static str),
}

pub type AllocResult<T> = Result<T, AllocError>;
