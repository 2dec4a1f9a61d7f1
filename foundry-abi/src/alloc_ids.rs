//! Allocator id types.
//!
//! `ArenaId` identifies a backing region owned by the allocator; `BlockId`
//! identifies a block within one arena's intrusive list; `AllocId` is the
//! opaque handle returned to callers of `allocate`. All three are newtypes
//! over an integer with a reserved sentinel value, following the same
//! invalid-id-as-zero-or-max convention used throughout the workspace.

/// Sentinel meaning "no arena" / "not yet assigned."
pub const INVALID_ARENA_ID: u16 = u16::MAX;
/// Sentinel meaning "no block" / end of an intrusive list.
pub const INVALID_BLOCK_ID: u32 = u32::MAX;
/// Sentinel meaning "no allocation" / end of a bank free-list.
pub const INVALID_ALLOC_ID: u32 = 0;

/// Stable 16-bit identifier of a backing region owned by the allocator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArenaId(pub u16);

impl ArenaId {
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != INVALID_ARENA_ID
    }
}

impl Default for ArenaId {
    fn default() -> Self {
        ArenaId(INVALID_ARENA_ID)
    }
}

/// Identifier of a block within a single arena's block list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub u32);

impl BlockId {
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != INVALID_BLOCK_ID
    }
}

impl Default for BlockId {
    fn default() -> Self {
        BlockId(INVALID_BLOCK_ID)
    }
}

/// Opaque 32-bit handle returned to callers of `allocate`, indexing into a
/// bank. Index 0 is the bank's reserved sentinel and is never handed out as
/// a live handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AllocId(pub u32);

impl AllocId {
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != INVALID_ALLOC_ID
    }
}

impl Default for AllocId {
    fn default() -> Self {
        AllocId(INVALID_ALLOC_ID)
    }
}
