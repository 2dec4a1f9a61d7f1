//! A work-group is a contiguous range of workers sharing a priority.

use std::sync::atomic::{AtomicUsize, Ordering};

use foundry_abi::WorkGroupId;

pub struct WorkGroup {
    pub id: WorkGroupId,
    pub name: String,
    pub priority: i32,
    pub start: usize,
    pub count: usize,
    push_offset: AtomicUsize,
}

impl WorkGroup {
    pub fn new(id: WorkGroupId, name: impl Into<String>, priority: i32, start: usize, count: usize) -> Self {
        Self {
            id,
            name: name.into(),
            priority,
            start,
            count,
            push_offset: AtomicUsize::new(0),
        }
    }

    pub fn contains(&self, worker_index: usize) -> bool {
        worker_index >= self.start && worker_index < self.start + self.count
    }

    /// Next worker index to push to, round-robin over `[start, start+count)`.
    pub fn next_push_target(&self) -> usize {
        let offset = self.push_offset.fetch_add(1, Ordering::Relaxed) % self.count;
        self.start + offset
    }
}
