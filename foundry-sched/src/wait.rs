//! Binary semaphore wait primitives.
//!
//! Both flavours satisfy the same `notify`/`try_acquire` contract; they
//! differ only in what they do while the permit isn't available yet.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use foundry_abi::WorkerId;

use crate::Scheduler;

/// Parks the caller until `notify` is called.
pub struct BlockingEvent {
    ready: AtomicBool,
    waiter: Mutex<Option<std::thread::Thread>>,
}

impl BlockingEvent {
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            waiter: Mutex::new(None),
        }
    }

    pub fn try_acquire(&self) -> bool {
        self.ready.swap(false, Ordering::AcqRel)
    }

    pub fn notify(&self) {
        self.ready.store(true, Ordering::Release);
        if let Some(thread) = self.waiter.lock().unwrap().take() {
            thread.unpark();
        }
    }

    /// Block the calling thread until a permit is available.
    pub fn wait(&self) {
        if self.try_acquire() {
            return;
        }
        *self.waiter.lock().unwrap() = Some(std::thread::current());
        while !self.try_acquire() {
            std::thread::park();
        }
    }
}

impl Default for BlockingEvent {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits by repeatedly pumping `scheduler.busy_work(worker)` instead of
/// parking — used when the waiter is itself a worker and the thing it's
/// waiting on might only make progress if that worker keeps draining its
/// own queues (otherwise a producer scheduled on the same worker would
/// never run, and the wait would deadlock).
pub struct BusyEvent {
    ready: AtomicBool,
}

impl BusyEvent {
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
        }
    }

    pub fn try_acquire(&self) -> bool {
        self.ready.swap(false, Ordering::AcqRel)
    }

    pub fn notify(&self) {
        self.ready.store(true, Ordering::Release);
    }

    pub fn wait(&self, worker: WorkerId, scheduler: &Scheduler) {
        while !self.try_acquire() {
            scheduler.busy_work(worker);
        }
    }
}

impl Default for BusyEvent {
    fn default() -> Self {
        Self::new()
    }
}
