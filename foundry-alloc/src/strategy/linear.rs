//! Linear strategy — unsorted free list, linear scan.
//! Used as a fallback or reference implementation; simplest possible
//! correct strategy.

use foundry_abi::BlockId;

use super::{padding_needed, Strategy, StrategyToken};

#[derive(Debug, Default)]
pub struct Linear {
    free: Vec<(BlockId, usize)>,
}

impl Linear {
    pub fn new() -> Self {
        Self { free: Vec::new() }
    }
}

impl Strategy for Linear {
    fn add_free_block(&mut self, block: BlockId, size: usize) -> StrategyToken {
        self.free.push((block, size));
        StrategyToken(block)
    }

    fn remove_free_block(&mut self, token: StrategyToken) {
        self.free.retain(|(id, _)| *id != token.0);
    }

    fn try_allocate(
        &mut self,
        size: usize,
        alignment: usize,
        offset_of: &dyn Fn(BlockId) -> usize,
    ) -> Option<(BlockId, StrategyToken, usize)> {
        let pos = self.free.iter().position(|(block, block_size)| {
            padding_needed(offset_of(*block), *block_size, size, alignment).is_some()
        })?;
        let (block, block_size) = self.free.remove(pos);
        let padding = padding_needed(offset_of(block), block_size, size, alignment).unwrap();
        Some((block, StrategyToken(block), padding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_fit_scan() {
        let mut linear = Linear::new();
        linear.add_free_block(BlockId(1), 10);
        linear.add_free_block(BlockId(2), 100);
        let (block, _, _) = linear.try_allocate(50, 1, &|_| 0).unwrap();
        assert_eq!(block, BlockId(2));
    }

    #[test]
    fn removed_block_is_not_reused() {
        let mut linear = Linear::new();
        let token = linear.add_free_block(BlockId(1), 100);
        linear.remove_free_block(token);
        assert!(linear.try_allocate(10, 1, &|_| 0).is_none());
    }
}
