//! Best-fit tree strategy — the mandatory baseline.
//!
//! Free blocks are kept in a `BTreeSet<(size, BlockId)>` ordered by size
//! then id, so `try_allocate` can binary-search for the smallest block
//! that fits in `O(log n)`. When several free blocks share a size, the
//! tie-break mode picks which one `try_allocate` prefers among the
//! contiguous run of equal-size entries.

use std::collections::BTreeSet;

use foundry_abi::BlockId;

use super::{padding_needed, Strategy, StrategyToken};

/// Which equal-size free block `try_allocate` prefers when several exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// First (smallest id) among equal sizes.
    #[default]
    Min0,
    /// Last (largest id) among equal sizes.
    Min1,
    /// Middle of the equal-size run.
    Min2,
}

#[derive(Debug, Default)]
pub struct BestFitTree {
    free: BTreeSet<(usize, BlockId)>,
    tie_break: TieBreak,
}

impl BestFitTree {
    pub fn new(tie_break: TieBreak) -> Self {
        Self {
            free: BTreeSet::new(),
            tie_break,
        }
    }

    /// Smallest free block whose size satisfies `min_size`, honouring the
    /// tie-break mode among equally-sized candidates.
    fn smallest_fit(&self, min_size: usize) -> Option<(usize, BlockId)> {
        let first = *self.free.range((min_size, BlockId(0))..).next()?;
        if self.tie_break == TieBreak::Min0 {
            return Some(first);
        }

        let run: Vec<(usize, BlockId)> = self
            .free
            .range((first.0, BlockId(0))..)
            .take_while(|(size, _)| *size == first.0)
            .copied()
            .collect();

        match self.tie_break {
            TieBreak::Min0 => Some(first),
            TieBreak::Min1 => run.last().copied(),
            TieBreak::Min2 => run.get(run.len() / 2).copied(),
        }
    }
}

impl Strategy for BestFitTree {
    fn add_free_block(&mut self, block: BlockId, size: usize) -> StrategyToken {
        self.free.insert((size, block));
        StrategyToken(block)
    }

    fn remove_free_block(&mut self, token: StrategyToken) {
        self.free.retain(|(_, id)| *id != token.0);
    }

    fn try_allocate(
        &mut self,
        size: usize,
        alignment: usize,
        offset_of: &dyn Fn(BlockId) -> usize,
    ) -> Option<(BlockId, StrategyToken, usize)> {
        let mut cursor = size;
        loop {
            let (found_size, block) = self.smallest_fit(cursor)?;
            let offset = offset_of(block);
            if let Some(padding) = padding_needed(offset, found_size, size, alignment) {
                self.free.remove(&(found_size, block));
                return Some((block, StrategyToken(block), padding));
            }
            // This candidate's size is big enough but alignment padding
            // doesn't fit; widen the search past it.
            cursor = found_size + 1;
        }
    }
}
