//! External collaborator seam: the allocator asks this
//! trait to back new arenas and to decide when an empty arena may be
//! reclaimed. An optional second trait adds the defragment contract.

use foundry_abi::ArenaId;

/// Backing-storage provider for the allocator.
pub trait MemoryManager {
    /// Allocate backing storage of at least `size` bytes, returning a
    /// stable arena id. Must remain valid until `remove_arena`.
    fn add_arena(&mut self, hint: &str, size: usize) -> Option<ArenaId>;

    /// Release backing storage for a previously added arena.
    fn remove_arena(&mut self, arena: ArenaId);

    /// Policy hook: may a fully-empty arena be reclaimed right now?
    fn drop_arena(&mut self, arena: ArenaId) -> bool;
}

/// Optional defragment contract. A `MemoryManager` that
/// also implements this lets the allocator relocate live allocations to
/// compact free space.
pub trait Defragment: MemoryManager {
    fn begin_defragment(&mut self);
    fn end_defragment(&mut self);

    /// Copy `size` bytes from `(src_arena, from_off)` to
    /// `(dst_arena, to_off)`. Ranges never overlap.
    fn move_memory(&mut self, src_arena: ArenaId, dst_arena: ArenaId, from_off: usize, to_off: usize, size: usize);

    /// Update client-side references from `old_handle` to `new_handle`.
    fn rebind_alloc(&mut self, new_handle: foundry_abi::AllocId, new_arena: ArenaId, old_handle: foundry_abi::AllocId, size: usize);
}

/// A `MemoryManager` backed by plain heap buffers (`Vec<u8>`), sufficient
/// to use the allocator standalone and to drive the test suite without
/// every caller having to write their own manager.
pub struct HeapArenaSource {
    next_id: u16,
    buffers: std::collections::HashMap<ArenaId, Vec<u8>>,
}

impl HeapArenaSource {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            buffers: std::collections::HashMap::new(),
        }
    }

    pub fn buffer(&self, arena: ArenaId) -> Option<&[u8]> {
        self.buffers.get(&arena).map(|v| v.as_slice())
    }

    pub fn buffer_mut(&mut self, arena: ArenaId) -> Option<&mut [u8]> {
        self.buffers.get_mut(&arena).map(|v| v.as_mut_slice())
    }
}

impl Default for HeapArenaSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryManager for HeapArenaSource {
    fn add_arena(&mut self, _hint: &str, size: usize) -> Option<ArenaId> {
        let id = ArenaId(self.next_id);
        self.next_id = self.next_id.checked_add(1)?;
        self.buffers.insert(id, vec![0u8; size]);
        Some(id)
    }

    fn remove_arena(&mut self, arena: ArenaId) {
        self.buffers.remove(&arena);
    }

    fn drop_arena(&mut self, arena: ArenaId) -> bool {
        // Keep arena 0 pinned as long as it's the only one left, to avoid
        // immediately re-creating it on the next allocation.
        if arena == ArenaId(0) && self.buffers.len() == 1 {
            return false;
        }
        true
    }
}

impl Defragment for HeapArenaSource {
    fn begin_defragment(&mut self) {
        log::debug!("defragment: begin");
    }

    fn end_defragment(&mut self) {
        log::debug!("defragment: end");
    }

    fn move_memory(&mut self, src_arena: ArenaId, dst_arena: ArenaId, from_off: usize, to_off: usize, size: usize) {
        if src_arena == dst_arena {
            let buf = self.buffers.get_mut(&src_arena).expect("move_memory: unknown arena");
            buf.copy_within(from_off..from_off + size, to_off);
        } else {
            let src = self.buffers.get(&src_arena).expect("move_memory: unknown src arena");
            let chunk = src[from_off..from_off + size].to_vec();
            let dst = self.buffers.get_mut(&dst_arena).expect("move_memory: unknown dst arena");
            dst[to_off..to_off + size].copy_from_slice(&chunk);
        }
    }

    fn rebind_alloc(&mut self, new_handle: foundry_abi::AllocId, new_arena: ArenaId, old_handle: foundry_abi::AllocId, size: usize) {
        log::debug!(
            "rebind_alloc: {:?} ({:?}) -> {:?}, size={}",
            old_handle,
            new_arena,
            new_handle,
            size
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_arena_allocates_zeroed_buffer() {
        let mut mgr = HeapArenaSource::new();
        let id = mgr.add_arena("test", 128).unwrap();
        assert_eq!(mgr.buffer(id).unwrap().len(), 128);
    }

    #[test]
    fn drop_arena_pins_last_remaining_arena() {
        let mut mgr = HeapArenaSource::new();
        let id = mgr.add_arena("test", 128).unwrap();
        assert_eq!(id, ArenaId(0));
        assert!(!mgr.drop_arena(id));
    }

    #[test]
    fn drop_arena_allows_reclaim_when_others_exist() {
        let mut mgr = HeapArenaSource::new();
        let a = mgr.add_arena("a", 128).unwrap();
        let _b = mgr.add_arena("b", 128).unwrap();
        assert!(mgr.drop_arena(a));
    }

    #[test]
    fn move_memory_within_same_arena() {
        let mut mgr = HeapArenaSource::new();
        let id = mgr.add_arena("t", 16).unwrap();
        mgr.buffer_mut(id).unwrap()[0..4].copy_from_slice(&[1, 2, 3, 4]);
        mgr.move_memory(id, id, 0, 8, 4);
        assert_eq!(&mgr.buffer(id).unwrap()[8..12], &[1, 2, 3, 4]);
    }
}
