//! A contiguous backing region owned by the allocator.
//!
//! An arena owns an offset-ordered `IntrusiveList` of `Block`s stored in its
//! own `Bank<Block>`, and tracks total/free size so the allocator can answer
//! "is this arena fully free" without rescanning its block list.

use foundry_abi::{ArenaId, BlockId};
use foundry_primitives::{Bank, IntrusiveList};

use crate::block::{Block, BlockState};
use crate::strategy::Strategy;

pub struct Arena {
    pub id: ArenaId,
    pub size: usize,
    pub free_size: usize,
    pub blocks: Bank<Block>,
    pub order: IntrusiveList,
    pub strategy: Box<dyn Strategy + Send>,
}

impl Arena {
    /// Create a fresh arena of `size` bytes, with one free block spanning
    /// the whole region already registered with `strategy`.
    pub fn new(id: ArenaId, size: usize, mut strategy: Box<dyn Strategy + Send>) -> Self {
        let mut blocks = Bank::new();
        let mut order = IntrusiveList::new();
        let root = blocks.insert(Block::new(0, size, BlockState::Free));
        order.push_back(&mut blocks, root);
        strategy.add_free_block(BlockId(root), size);

        Self {
            id,
            size,
            free_size: size,
            blocks,
            order,
            strategy,
        }
    }

    #[inline]
    pub fn is_fully_free(&self) -> bool {
        self.free_size == self.size
    }

    /// Fraction of the arena currently in use, for defrag ordering
    /// Used to order arenas ascending when picking defragment sources.
    pub fn fill_ratio(&self) -> f64 {
        if self.size == 0 {
            return 0.0;
        }
        (self.size - self.free_size) as f64 / self.size as f64
    }

    /// Neighbour of `block` in offset order, if any.
    pub fn prev_of(&self, block: u32) -> Option<u32> {
        use foundry_primitives::bank::BANK_NIL;
        let prev = foundry_primitives::intrusive_list::ListLinks::prev(self.blocks.get(block)?);
        (prev != BANK_NIL).then_some(prev)
    }

    pub fn next_of(&self, block: u32) -> Option<u32> {
        use foundry_primitives::bank::BANK_NIL;
        let next = foundry_primitives::intrusive_list::ListLinks::next(self.blocks.get(block)?);
        (next != BANK_NIL).then_some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::best_fit::{BestFitTree, TieBreak};

    fn strategy() -> Box<dyn Strategy + Send> {
        Box::new(BestFitTree::new(TieBreak::Min0))
    }

    #[test]
    fn new_arena_has_one_free_block_spanning_whole_region() {
        let arena = Arena::new(ArenaId(0), 4096, strategy());
        assert_eq!(arena.free_size, 4096);
        assert!(arena.is_fully_free());
        let head = arena.order.head().unwrap();
        let block = arena.blocks.get(head).unwrap();
        assert_eq!(block.offset, 0);
        assert_eq!(block.size, 4096);
    }

    #[test]
    fn fill_ratio_reflects_free_size() {
        let mut arena = Arena::new(ArenaId(1), 1000, strategy());
        arena.free_size = 250;
        assert!((arena.fill_ratio() - 0.75).abs() < 1e-9);
    }
}
