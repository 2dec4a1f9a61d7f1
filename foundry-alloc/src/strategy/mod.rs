//! Pluggable placement strategies.
//!
//! A strategy owns no memory of its own; it only tracks which blocks are
//! free and picks among them. The allocator is the sole owner of block
//! offsets, so `try_allocate` takes an `offset_of` callback to let a
//! strategy test whether a candidate block can actually absorb the
//! alignment padding a request needs, not just whether its size is large
//! enough.

pub mod best_fit;
pub mod linear;
pub mod slot_bucket;

use foundry_abi::BlockId;

/// Opaque per-free-block token a strategy hands back from
/// `add_free_block` and expects on `remove_free_block`/`replace_free_block`.
/// Block ids are already stable unique keys, so the token is just a wrapper.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StrategyToken(pub BlockId);

/// The amount of alignment padding a candidate block would need in order to
/// satisfy `size` at `alignment`, given its current offset and size. `None`
/// if the block is too small even accounting for the padding.
pub fn padding_needed(block_offset: usize, block_size: usize, size: usize, alignment: usize) -> Option<usize> {
    let aligned = foundry_primitives::align_up(block_offset, alignment);
    let padding = aligned - block_offset;
    if block_size >= padding && block_size - padding >= size {
        Some(padding)
    } else {
        None
    }
}

/// Pluggable free-block placement policy.
pub trait Strategy: std::fmt::Debug {
    fn add_free_block(&mut self, block: BlockId, size: usize) -> StrategyToken;

    fn remove_free_block(&mut self, token: StrategyToken);

    /// Find a free block that can satisfy `size` bytes at `alignment`,
    /// given the current offset of each free block via `offset_of`.
    /// Returns the chosen block, its token, and the alignment padding that
    /// must be carved off the block's front.
    fn try_allocate(
        &mut self,
        size: usize,
        alignment: usize,
        offset_of: &dyn Fn(BlockId) -> usize,
    ) -> Option<(BlockId, StrategyToken, usize)>;

    /// Replace the free block referenced by `old` (e.g. after a coalesce)
    /// with `new_block` of `new_size`, returning its new token.
    fn replace_free_block(
        &mut self,
        old: StrategyToken,
        new_block: BlockId,
        new_size: usize,
    ) -> StrategyToken {
        self.remove_free_block(old);
        self.add_free_block(new_block, new_size)
    }
}
