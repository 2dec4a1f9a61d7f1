//! Coalescing arena allocator: multi-arena allocate/deallocate/defragment.

use foundry_abi::{AllocId, ArenaId, BlockId};
use foundry_primitives::bank::BankLink;
use foundry_primitives::Bank;

use crate::arena::Arena;
use crate::block::{Block, BlockState};
use crate::error::{AllocError, AllocResult};
use crate::memory_manager::{Defragment, MemoryManager};
use crate::stats::AllocStats;
use crate::strategy::{Strategy, StrategyToken};

#[derive(Clone, Copy, Debug, Default)]
struct AllocRecord {
    arena: ArenaId,
    block: u32,
    link: u32,
}

impl BankLink for AllocRecord {
    fn link(&self) -> u32 {
        self.link
    }
    fn set_link(&mut self, next: u32) {
        self.link = next;
    }
}

/// Multi-arena suballocator parameterized by a backing-storage collaborator
/// `M` and a pluggable placement strategy created per-arena by
/// `strategy_factory`.
pub struct CoalescingAllocator<M> {
    granularity: usize,
    default_arena_size: usize,
    manager: M,
    arenas: Vec<Arena>,
    strategy_factory: Box<dyn Fn() -> Box<dyn Strategy + Send> + Send>,
    allocations: Bank<AllocRecord>,
    stats: AllocStats,
}

impl<M: MemoryManager> CoalescingAllocator<M> {
    pub fn new(
        granularity: usize,
        default_arena_size: usize,
        manager: M,
        strategy_factory: Box<dyn Fn() -> Box<dyn Strategy + Send> + Send>,
    ) -> Self {
        Self {
            granularity: granularity.max(1),
            default_arena_size,
            manager,
            arenas: Vec::new(),
            strategy_factory,
            allocations: Bank::new(),
            stats: AllocStats::default(),
        }
    }

    pub fn stats(&self) -> AllocStats {
        AllocStats {
            arena_count: self.arenas.len(),
            ..self.stats
        }
    }

    /// Number of arenas currently live, for tests.
    pub fn arena_ids(&self) -> Vec<ArenaId> {
        self.arenas.iter().map(|a| a.id).collect()
    }

    pub fn address_of(&self, handle: AllocId) -> AllocResult<(ArenaId, usize, usize)> {
        let record = self
            .allocations
            .get(handle.0)
            .ok_or(AllocError::InvariantViolated("unknown allocation handle"))?;
        let arena = self
            .arenas
            .iter()
            .find(|a| a.id == record.arena)
            .ok_or(AllocError::InvariantViolated("handle references unknown arena"))?;
        let block = arena
            .blocks
            .get(record.block)
            .ok_or(AllocError::InvariantViolated("handle references dangling block"))?;
        Ok((record.arena, block.offset, block.size))
    }

    pub fn allocate(&mut self, size: usize, alignment: usize) -> AllocResult<AllocId> {
        assert!(alignment.is_power_of_two(), "alignment must be a power of two");
        let size = foundry_primitives::align_up(size.max(1), self.granularity);

        let placed = (0..self.arenas.len()).find_map(|i| self.place_in_arena(i, size, alignment).map(|hit| (i, hit)));

        let (arena_idx, (block_id, _offset)) = match placed {
            Some(hit) => hit,
            None => {
                let arena_size = self
                    .default_arena_size
                    .max(foundry_primitives::align_up(size, self.granularity));
                let arena_id = self
                    .manager
                    .add_arena("foundry-alloc", arena_size)
                    .ok_or(AllocError::BackingExhausted)?;
                self.arenas
                    .push(Arena::new(arena_id, arena_size, (self.strategy_factory)()));
                let idx = self.arenas.len() - 1;
                let hit = self
                    .place_in_arena(idx, size, alignment)
                    .expect("freshly created arena must satisfy the request that created it");
                (idx, hit)
            }
        };

        let arena_id = self.arenas[arena_idx].id;
        let handle = AllocId(self.allocations.insert(AllocRecord {
            arena: arena_id,
            block: block_id,
            link: 0,
        }));
        self.arenas[arena_idx].blocks.get_mut(block_id).unwrap().state = BlockState::Allocated(handle);
        self.arenas[arena_idx].free_size -= size;
        self.stats.live_allocations += 1;
        Ok(handle)
    }

    pub fn deallocate(&mut self, handle: AllocId) -> AllocResult<()> {
        let record = *self
            .allocations
            .get(handle.0)
            .ok_or(AllocError::InvariantViolated("double free or bad handle"))?;
        let arena_idx = self
            .arenas
            .iter()
            .position(|a| a.id == record.arena)
            .ok_or(AllocError::InvariantViolated("handle references unknown arena"))?;

        {
            let arena = &mut self.arenas[arena_idx];
            let block = arena
                .blocks
                .get_mut(record.block)
                .ok_or(AllocError::InvariantViolated("handle references dangling block"))?;
            if !matches!(block.state, BlockState::Allocated(h) if h == handle) {
                return Err(AllocError::InvariantViolated("double free or bad handle"));
            }
            block.state = BlockState::Free;
            let size = block.size;
            arena.free_size += size;
            arena.strategy.add_free_block(BlockId(record.block), size);
        }

        let mut block_id = record.block;
        let arena = &mut self.arenas[arena_idx];
        if let Some(prev_id) = arena.prev_of(block_id) {
            if arena.blocks.get(prev_id).unwrap().is_free() {
                block_id = Self::merge(arena, prev_id, block_id);
                self.stats.coalesce_count += 1;
            }
        }
        if let Some(next_id) = arena.next_of(block_id) {
            if arena.blocks.get(next_id).unwrap().is_free() {
                Self::merge(arena, block_id, next_id);
                self.stats.coalesce_count += 1;
            }
        }

        if arena.is_fully_free() {
            let id = arena.id;
            if self.manager.drop_arena(id) {
                self.manager.remove_arena(id);
                self.arenas.remove(arena_idx);
            }
        }

        self.allocations.remove(handle.0);
        self.stats.live_allocations -= 1;
        Ok(())
    }

    /// Try to satisfy `size`/`alignment` from the arena at position `idx`,
    /// splitting its free block and registering leftover pieces back with
    /// the strategy. Returns the bank index of the now-allocated block and
    /// its aligned offset.
    fn place_in_arena(&mut self, idx: usize, size: usize, alignment: usize) -> Option<(u32, usize)> {
        let arena = &mut self.arenas[idx];
        let blocks = &arena.blocks;
        let hit = arena
            .strategy
            .try_allocate(size, alignment, &|id: BlockId| blocks.get(id.0).unwrap().offset);
        let (block_id, _token, padding) = hit?;
        let block_id = block_id.0;

        let (orig_offset, orig_size) = {
            let b = arena.blocks.get(block_id).unwrap();
            (b.offset, b.size)
        };
        let alloc_offset = orig_offset + padding;
        let remainder_offset = alloc_offset + size;
        let remainder_size = orig_size - padding - size;

        if padding > 0 {
            arena.blocks.get_mut(block_id).unwrap().size = padding;
            arena.strategy.add_free_block(BlockId(block_id), padding);

            let alloc_id = arena.blocks.insert(Block::new(alloc_offset, size, BlockState::Free));
            arena.order.insert_after(&mut arena.blocks, block_id, alloc_id);

            if remainder_size > 0 {
                let rem_id = arena
                    .blocks
                    .insert(Block::new(remainder_offset, remainder_size, BlockState::Free));
                arena.order.insert_after(&mut arena.blocks, alloc_id, rem_id);
                arena.strategy.add_free_block(BlockId(rem_id), remainder_size);
            }
            Some((alloc_id, alloc_offset))
        } else {
            arena.blocks.get_mut(block_id).unwrap().size = size;
            if remainder_size > 0 {
                let rem_id = arena
                    .blocks
                    .insert(Block::new(remainder_offset, remainder_size, BlockState::Free));
                arena.order.insert_after(&mut arena.blocks, block_id, rem_id);
                arena.strategy.add_free_block(BlockId(rem_id), remainder_size);
            }
            Some((block_id, alloc_offset))
        }
    }

    /// Merge `absorbed` into `surviving`, which keeps its own offset and
    /// grows by `absorbed`'s size. Both must currently be free and
    /// registered with the strategy.
    fn merge(arena: &mut Arena, surviving: u32, absorbed: u32) -> u32 {
        arena.strategy.remove_free_block(StrategyToken(BlockId(surviving)));
        arena.strategy.remove_free_block(StrategyToken(BlockId(absorbed)));
        let new_size = arena.blocks.get(surviving).unwrap().size + arena.blocks.get(absorbed).unwrap().size;
        arena.order.erase(&mut arena.blocks, absorbed);
        arena.blocks.remove(absorbed);
        arena.blocks.get_mut(surviving).unwrap().size = new_size;
        arena.strategy.add_free_block(BlockId(surviving), new_size);
        surviving
    }
}

impl<M: Defragment> CoalescingAllocator<M> {
    /// Relocate live allocations out of low-fill arenas into higher-fill
    /// ones to compact free space. Only available when the
    /// memory manager implements the defragment contract.
    pub fn defragment(&mut self) -> AllocResult<()> {
        self.manager.begin_defragment();

        let mut order: Vec<usize> = (0..self.arenas.len()).collect();
        order.sort_by(|&a, &b| {
            self.arenas[a]
                .fill_ratio()
                .partial_cmp(&self.arenas[b].fill_ratio())
                .unwrap()
        });

        let mut to_remove = Vec::new();

        for src_idx in order {
            let live: Vec<(AllocId, usize)> = {
                let arena = &self.arenas[src_idx];
                let mut out = Vec::new();
                let mut cursor = arena.order.head();
                while let Some(block_id) = cursor {
                    let block = *arena.blocks.get(block_id).unwrap();
                    if let BlockState::Allocated(handle) = block.state {
                        out.push((handle, block.size));
                    }
                    cursor = arena.next_of(block_id);
                }
                out
            };

            for (old_handle, size) in live {
                let candidates: Vec<usize> = (0..self.arenas.len())
                    .filter(|&i| i != src_idx && !to_remove.contains(&self.arenas[i].id))
                    .collect();
                let dest = candidates
                    .into_iter()
                    .find_map(|i| self.place_in_arena(i, size, self.granularity).map(|hit| (i, hit)));

                let Some((dst_idx, (dst_block_id, dst_offset))) = dest else {
                    continue;
                };

                let dst_arena_id = self.arenas[dst_idx].id;
                let new_handle = AllocId(self.allocations.insert(AllocRecord {
                    arena: dst_arena_id,
                    block: dst_block_id,
                    link: 0,
                }));
                self.arenas[dst_idx].blocks.get_mut(dst_block_id).unwrap().state = BlockState::Allocated(new_handle);
                self.arenas[dst_idx].free_size -= size;

                let old_record = *self.allocations.get(old_handle.0).unwrap();
                let src_arena_id = old_record.arena;
                let src_offset = self
                    .arenas
                    .iter()
                    .find(|a| a.id == src_arena_id)
                    .unwrap()
                    .blocks
                    .get(old_record.block)
                    .unwrap()
                    .offset;

                self.manager.move_memory(src_arena_id, dst_arena_id, src_offset, dst_offset, size);
                self.manager.rebind_alloc(new_handle, dst_arena_id, old_handle, size);
                self.allocations.remove(old_handle.0);
                self.stats.defrag_moves += 1;

                let src_arena = self.arenas.iter_mut().find(|a| a.id == src_arena_id).unwrap();
                let mut block_id = old_record.block;
                src_arena.blocks.get_mut(block_id).unwrap().state = BlockState::Free;
                src_arena.free_size += size;
                src_arena.strategy.add_free_block(BlockId(block_id), size);
                if let Some(prev_id) = src_arena.prev_of(block_id) {
                    if src_arena.blocks.get(prev_id).unwrap().is_free() {
                        block_id = Self::merge(src_arena, prev_id, block_id);
                    }
                }
                if let Some(next_id) = src_arena.next_of(block_id) {
                    if src_arena.blocks.get(next_id).unwrap().is_free() {
                        Self::merge(src_arena, block_id, next_id);
                    }
                }
            }

            let arena = &self.arenas[src_idx];
            if arena.is_fully_free() {
                let id = arena.id;
                if self.manager.drop_arena(id) {
                    self.manager.remove_arena(id);
                    to_remove.push(id);
                    self.stats.defrag_arenas_reclaimed += 1;
                }
            }
        }

        for id in to_remove {
            self.arenas.retain(|a| a.id != id);
        }

        self.manager.end_defragment();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_manager::HeapArenaSource;
    use crate::strategy::best_fit::{BestFitTree, TieBreak};

    fn best_fit_allocator(granularity: usize, default_arena_size: usize) -> CoalescingAllocator<HeapArenaSource> {
        CoalescingAllocator::new(
            granularity,
            default_arena_size,
            HeapArenaSource::new(),
            Box::new(|| Box::new(BestFitTree::new(TieBreak::Min0)) as Box<dyn Strategy + Send>),
        )
    }

    #[test]
    fn sequential_allocations_place_contiguously_and_round_to_granularity() {
        let mut alloc = best_fit_allocator(16, 4096);
        let a = alloc.allocate(100, 1).unwrap();
        let b = alloc.allocate(200, 1).unwrap();
        let c = alloc.allocate(300, 1).unwrap();

        assert_eq!(alloc.address_of(a).unwrap().1, 0);
        assert_eq!(alloc.address_of(b).unwrap().1, 112);
        assert_eq!(alloc.address_of(c).unwrap().1, 320);
    }

    #[test]
    fn freeing_then_reallocating_reuses_the_vacated_block() {
        let mut alloc = best_fit_allocator(16, 4096);
        let _a = alloc.allocate(112, 1).unwrap();
        let b = alloc.allocate(208, 1).unwrap();
        let _c = alloc.allocate(304, 1).unwrap();

        alloc.deallocate(b).unwrap();

        let d = alloc.allocate(64, 1).unwrap();
        let (_, offset, _) = alloc.address_of(d).unwrap();
        assert_eq!(offset, 112, "reused block should start where the freed one did");
    }

    #[test]
    fn coalesce_merges_adjacent_free_neighbours_until_arena_is_reclaimed() {
        let mut alloc = best_fit_allocator(16, 1024);
        let a = alloc.allocate(256, 1).unwrap();
        let b = alloc.allocate(256, 1).unwrap();
        let c = alloc.allocate(256, 1).unwrap();
        let d = alloc.allocate(256, 1).unwrap();
        assert_eq!(alloc.arena_ids().len(), 1);

        alloc.deallocate(b).unwrap();
        // B alone: one free block of 256 at offset 256, no merge possible
        // (A and C are both still allocated).
        let e = alloc.allocate(256, 1).unwrap();
        assert_eq!(alloc.address_of(e).unwrap().1, 256);
        alloc.deallocate(e).unwrap();

        alloc.deallocate(c).unwrap();
        // B and C now coalesce into a single 512-byte free block.
        let f = alloc.allocate(512, 1).unwrap();
        assert_eq!(alloc.address_of(f).unwrap().1, 256);
        alloc.deallocate(f).unwrap();

        alloc.deallocate(a).unwrap();
        let g = alloc.allocate(768, 1).unwrap();
        assert_eq!(alloc.address_of(g).unwrap().1, 0);
        alloc.deallocate(g).unwrap();

        alloc.deallocate(d).unwrap();
        // The lone remaining arena is pinned alive by `HeapArenaSource`
        // (it's the only arena left), but must be completely empty.
        assert_eq!(alloc.arena_ids().len(), 1);
        let a2 = alloc.allocate(1024, 1).unwrap();
        assert_eq!(alloc.address_of(a2).unwrap().1, 0, "whole arena should be one free block again");
    }

    #[test]
    fn double_free_is_a_checked_error() {
        let mut alloc = best_fit_allocator(16, 1024);
        let a = alloc.allocate(64, 1).unwrap();
        alloc.deallocate(a).unwrap();
        assert!(alloc.deallocate(a).is_err());
    }

    #[test]
    fn exhausting_one_arena_creates_another() {
        let mut alloc = best_fit_allocator(16, 256);
        let _a = alloc.allocate(256, 1).unwrap();
        assert_eq!(alloc.arena_ids().len(), 1);
        let _b = alloc.allocate(256, 1).unwrap();
        assert_eq!(alloc.arena_ids().len(), 2);
    }

    #[test]
    fn alignment_is_respected_even_under_fragmentation() {
        let mut alloc = best_fit_allocator(16, 4096);
        let _a = alloc.allocate(16, 1).unwrap();
        let b = alloc.allocate(64, 64).unwrap();
        let (_, offset, _) = alloc.address_of(b).unwrap();
        assert_eq!(offset % 64, 0);
    }

    #[test]
    fn defragment_drains_low_fill_arena_into_higher_fill_ones() {
        let mut alloc = best_fit_allocator(16, 1024);

        let lonely = alloc.allocate(64, 1).unwrap();
        // Pack the first arena completely full, then free it again so it
        // has room again — this just forces the *next* request past it.
        let filler = alloc.allocate(960, 1).unwrap();

        let packed_a = alloc.allocate(64, 1).unwrap(); // spills into a 2nd arena
        let packed_b = alloc.allocate(64, 1).unwrap();
        let packed_c = alloc.allocate(64, 1).unwrap();

        alloc.deallocate(filler).unwrap();
        assert_eq!(alloc.arena_ids().len(), 2);

        alloc.defragment().unwrap();

        // The first arena (low fill: one 64-byte allocation) should have
        // been drained and reclaimed into the second, higher-fill arena.
        // `lonely`'s own handle is invalidated by the move (the manager's
        // `rebind_alloc` hook is the caller's path to the new one); the
        // untouched allocations must still resolve.
        assert_eq!(alloc.arena_ids().len(), 1);
        assert!(alloc.address_of(lonely).is_err());
        for handle in [packed_a, packed_b, packed_c] {
            assert!(alloc.address_of(handle).is_ok());
        }
        assert_eq!(alloc.stats().defrag_moves, 1);
        assert_eq!(alloc.stats().defrag_arenas_reclaimed, 1);
    }

    /// Checks arena bookkeeping invariants against live state.
    fn check_invariants<M>(alloc: &CoalescingAllocator<M>) {
        for arena in &alloc.arenas {
            let mut total = 0usize;
            let mut free_total = 0usize;
            let mut prev_was_free = false;
            let mut expected_offset = 0usize;
            let mut cursor = arena.order.head();
            while let Some(block_id) = cursor {
                let block = arena.blocks.get(block_id).unwrap();
                assert_eq!(block.offset, expected_offset, "block offsets must be contiguous");
                total += block.size;
                if block.is_free() {
                    free_total += block.size;
                    assert!(!prev_was_free, "no two adjacent free blocks may exist");
                }
                prev_was_free = block.is_free();
                expected_offset = block.end();
                cursor = arena.next_of(block_id);
            }
            assert_eq!(total, arena.size, "blocks must partition the whole arena");
            assert_eq!(free_total, arena.free_size, "free counter must track free block sizes");
        }
    }

    use proptest::prop_assert_eq;

    proptest::proptest! {
        #[test]
        fn random_allocate_deallocate_sequences_preserve_arena_invariants(
            ops in proptest::collection::vec((proptest::bool::ANY, 1usize..300, proptest::sample::select(vec![1usize, 2, 4, 8, 16])), 1..200)
        ) {
            let mut alloc = best_fit_allocator(16, 4096);
            let mut live: Vec<AllocId> = Vec::new();

            for (do_alloc, size, alignment) in ops {
                if do_alloc || live.is_empty() {
                    if let Ok(handle) = alloc.allocate(size, alignment) {
                        let (_, offset, _) = alloc.address_of(handle).unwrap();
                        prop_assert_eq!(offset % alignment, 0, "returned address must respect alignment");
                        live.push(handle);
                    }
                } else {
                    let idx = size % live.len();
                    let handle = live.swap_remove(idx);
                    alloc.deallocate(handle).unwrap();
                }
                check_invariants(&alloc);
            }

            for handle in live {
                alloc.deallocate(handle).unwrap();
            }
            check_invariants(&alloc);
        }
    }
}
