//! Slot-bucket strategy.
//!
//! Free blocks are bucketed by `size / granularity`, each bucket holding at
//! most `fixed_max_per_slot` entries. Allocation scans forward from the
//! requested bucket across a bounded `search_window`; if no candidate
//! absorbs the alignment padding within that window, the search escalates
//! to a fallback strategy (typically the best-fit tree).

use std::collections::HashMap;

use foundry_abi::BlockId;

use super::{padding_needed, Strategy, StrategyToken};

pub struct SlotBucket {
    granularity: usize,
    fixed_max_per_slot: usize,
    search_window: usize,
    buckets: Vec<Vec<(BlockId, usize)>>,
    /// Block -> bucket index, for O(1) `remove_free_block`. Entries spilled
    /// to the fallback strategy (bucket full) are absent here.
    location: HashMap<BlockId, usize>,
    fallback: Box<dyn Strategy + Send>,
}

impl std::fmt::Debug for SlotBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotBucket")
            .field("granularity", &self.granularity)
            .field("buckets", &self.buckets.len())
            .finish()
    }
}

impl SlotBucket {
    pub fn new(
        granularity: usize,
        max_bucket: usize,
        fixed_max_per_slot: usize,
        search_window: usize,
        fallback: Box<dyn Strategy + Send>,
    ) -> Self {
        Self {
            granularity: granularity.max(1),
            fixed_max_per_slot,
            search_window,
            buckets: vec![Vec::new(); max_bucket],
            location: HashMap::new(),
            fallback,
        }
    }

    fn bucket_of(&self, size: usize) -> usize {
        (size / self.granularity).min(self.buckets.len() - 1)
    }
}

impl Strategy for SlotBucket {
    fn add_free_block(&mut self, block: BlockId, size: usize) -> StrategyToken {
        let bucket = self.bucket_of(size);
        if self.buckets[bucket].len() < self.fixed_max_per_slot {
            self.buckets[bucket].push((block, size));
            self.location.insert(block, bucket);
            StrategyToken(block)
        } else {
            self.fallback.add_free_block(block, size)
        }
    }

    fn remove_free_block(&mut self, token: StrategyToken) {
        if let Some(bucket) = self.location.remove(&token.0) {
            self.buckets[bucket].retain(|(id, _)| *id != token.0);
        } else {
            self.fallback.remove_free_block(token);
        }
    }

    fn try_allocate(
        &mut self,
        size: usize,
        alignment: usize,
        offset_of: &dyn Fn(BlockId) -> usize,
    ) -> Option<(BlockId, StrategyToken, usize)> {
        let start = self.bucket_of(size);
        let end = (start + self.search_window).min(self.buckets.len());

        for bucket in start..end {
            let hit = self.buckets[bucket].iter().enumerate().find_map(|(i, (block, block_size))| {
                let offset = offset_of(*block);
                padding_needed(offset, *block_size, size, alignment).map(|p| (i, p))
            });
            if let Some((i, padding)) = hit {
                let (block, _) = self.buckets[bucket].remove(i);
                self.location.remove(&block);
                return Some((block, StrategyToken(block), padding));
            }
        }

        self.fallback.try_allocate(size, alignment, offset_of)
    }
}
