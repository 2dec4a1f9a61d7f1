//! Shared low-level primitives used by both the allocator and the
//! scheduler: index recycling (`Bank`), an intrusive doubly-linked list
//! over bank indices, a ticket spinlock, a single-owner local ring, and a
//! generation-tagged index.

pub mod alignment;
pub mod bank;
pub mod intrusive_list;
pub mod ring_buffer;
pub mod spinlock;
pub mod tagged_ptr;

pub use alignment::{align_down_u64, align_down_usize, align_up_u64, align_up_usize};
pub use alignment::{align_down_usize as align_down, align_up_usize as align_up};
pub use bank::{Bank, BankLink, BANK_NIL};
pub use intrusive_list::{IntrusiveList, ListLinks};
pub use ring_buffer::LocalRing;
pub use spinlock::{TicketLock, TicketLockGuard};
pub use tagged_ptr::TaggedIndex;
