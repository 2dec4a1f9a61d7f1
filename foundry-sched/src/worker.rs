//! A worker is one OS thread plus the queues it owns.
//!
//! Per the concurrency model: a shared queue is contended by its owner
//! (pop) and thieves (pop), so it's spin-lock guarded; the exclusive queue
//! is pushed to by any thread but only ever popped by the owner; the local
//! ring is touched only by the owner, in both directions, so it needs no
//! synchronization at all.

use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use foundry_abi::WorkerId;
use foundry_primitives::{LocalRing, TicketLock};

use crate::work_item::WorkItem;

/// Bound on the owner's lock-free local ring (spec's `max_local_work_item`).
pub const MAX_LOCAL_WORK_ITEMS: usize = 64;

pub struct Worker {
    pub id: WorkerId,
    pub(crate) shared: TicketLock<VecDeque<WorkItem>>,
    pub(crate) exclusive: TicketLock<VecDeque<WorkItem>>,
    local: UnsafeCell<LocalRing<WorkItem, MAX_LOCAL_WORK_ITEMS>>,
    pub(crate) quitting: AtomicBool,
    thread: Mutex<Option<std::thread::Thread>>,
}

// `local` is only ever touched by the thread running this worker's main
// loop (see `Scheduler::run_worker_loop`); every other field is already
// safe to share (TicketLock<T> is Sync, AtomicBool is Sync, Mutex is Sync).
unsafe impl Sync for Worker {}

impl Worker {
    pub fn new(id: WorkerId) -> Self {
        Self {
            id,
            shared: TicketLock::new(VecDeque::new()),
            exclusive: TicketLock::new(VecDeque::new()),
            local: UnsafeCell::new(LocalRing::new()),
            quitting: AtomicBool::new(false),
            thread: Mutex::new(None),
        }
    }

    pub(crate) fn set_thread(&self, thread: std::thread::Thread) {
        *self.thread.lock().unwrap() = Some(thread);
    }

    pub(crate) fn wake(&self) {
        if let Some(thread) = self.thread.lock().unwrap().as_ref() {
            thread.unpark();
        }
    }

    pub(crate) fn request_quit(&self) {
        self.quitting.store(true, Ordering::Release);
        self.wake();
    }

    pub(crate) fn is_quitting(&self) -> bool {
        self.quitting.load(Ordering::Acquire)
    }

    /// # Safety
    /// Caller must be the thread running this worker's main loop.
    pub(crate) fn try_pop_local(&self) -> Option<WorkItem> {
        unsafe { (*self.local.get()).try_pop() }
    }

    /// # Safety
    /// Caller must be the thread running this worker's main loop.
    pub(crate) fn try_push_local(&self, item: WorkItem) -> Result<(), WorkItem> {
        unsafe { (*self.local.get()).try_push(item) }
    }

    pub(crate) fn try_pop_exclusive(&self) -> Option<WorkItem> {
        self.exclusive.lock().pop_front()
    }

    /// Pops this worker's shared queue. The same method serves both the
    /// owner's own scan and a thief's steal attempt — they contend on the
    /// same lock, as the concurrency model requires.
    pub(crate) fn try_pop_shared(&self) -> Option<WorkItem> {
        self.shared.lock().pop_front()
    }
}
