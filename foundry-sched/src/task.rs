//! Coroutine-style task handles.
//!
//! A task carries a result slot, a single continuation, and an atomic
//! boolean that arbitrates the race between "producer finishes" and
//! "consumer begins to wait." Whichever side loses the race does the
//! work of waking the other; neither side blocks while holding a lock.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use foundry_abi::{TaskId, TaskStatus, WorkerId};

use crate::wait::BusyEvent;
use crate::Scheduler;

type Continuation = Box<dyn FnOnce() + Send>;

struct TaskState<T> {
    id: TaskId,
    result: UnsafeCell<Option<T>>,
    continuation: UnsafeCell<Option<Continuation>>,
    /// `false` until either side has touched it; the side whose swap
    /// observes `true` is responsible for resuming the other.
    armed: AtomicBool,
}

// `result`/`continuation` are only ever touched from the producer side
// (before its `complete` swap) and the consumer side (before its
// `await_suspend` swap), which `armed` ensures never overlap.
unsafe impl<T: Send> Send for TaskState<T> {}
unsafe impl<T: Send> Sync for TaskState<T> {}

impl<T> TaskState<T> {
    fn new(id: TaskId) -> Self {
        Self {
            id,
            result: UnsafeCell::new(None),
            continuation: UnsafeCell::new(None),
            armed: AtomicBool::new(false),
        }
    }

    fn is_complete(&self) -> bool {
        unsafe { (*self.result.get()).is_some() }
    }

    /// Producer side: publish the result, then resume a parked consumer if
    /// one arrived first.
    fn complete(&self, value: T) {
        unsafe {
            *self.result.get() = Some(value);
        }
        if self.armed.swap(true, Ordering::AcqRel) {
            let continuation = unsafe { (*self.continuation.get()).take() };
            if let Some(continuation) = continuation {
                continuation();
            }
        }
    }

    /// Consumer side: store the resume handle, then find out whether the
    /// producer already finished. Returns `true` if the caller actually
    /// suspended (producer will call `continuation` later), `false` if the
    /// result is already available and the caller should proceed directly.
    fn await_suspend(&self, continuation: Continuation) -> bool {
        unsafe {
            *self.continuation.get() = Some(continuation);
        }
        if self.armed.swap(true, Ordering::AcqRel) {
            unsafe {
                let _ = (*self.continuation.get()).take();
            }
            false
        } else {
            true
        }
    }

    fn take_result(&self) -> T {
        unsafe { (*self.result.get()).take() }.expect("task result polled before completion")
    }
}

/// Handle to a suspended or completed computation.
pub struct CoTask<T> {
    state: Arc<TaskState<T>>,
}

impl<T: Send + 'static> CoTask<T> {
    pub fn id(&self) -> TaskId {
        self.state.id
    }

    pub fn status(&self) -> TaskStatus {
        if self.state.is_complete() {
            TaskStatus::Completed
        } else {
            TaskStatus::Suspended
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_complete()
    }

    /// Wait for the result by pumping `scheduler`'s `busy_work` loop on
    /// `worker` — used when the waiting side must keep making progress on
    /// other work that might itself resolve this task (e.g. the producer
    /// was submitted to the same worker).
    pub fn await_on(self, worker: WorkerId, scheduler: &Scheduler) -> T {
        if !self.state.is_complete() {
            let event = Arc::new(BusyEvent::new());
            let signal = Arc::clone(&event);
            let suspended = self.state.await_suspend(Box::new(move || signal.notify()));
            if suspended {
                event.wait(worker, scheduler);
            }
        }
        self.state.take_result()
    }

    /// Wait for the result by parking the calling thread. Suitable when the
    /// caller isn't itself a scheduler worker and has nothing else to do
    /// while it waits.
    pub fn block_on(self) -> T {
        if !self.state.is_complete() {
            let thread = std::thread::current();
            let suspended = self
                .state
                .await_suspend(Box::new(move || thread.unpark()));
            if suspended {
                while !self.state.is_complete() {
                    std::thread::park();
                }
            }
        }
        self.state.take_result()
    }
}

/// Deferred task (`co_task`): constructed suspended. Returns the handle
/// plus the work item that resumes it — the caller decides when and where
/// that item runs (submit it to the scheduler, or run it inline).
pub fn co_task<T, F>(id: TaskId, work: F) -> (CoTask<T>, crate::work_item::WorkItem)
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::new(TaskState::new(id));
    let producer = Arc::clone(&state);
    let item: crate::work_item::WorkItem = Box::new(move || {
        let value = work();
        producer.complete(value);
    });
    (CoTask { state }, item)
}

/// Eager task (`co_sequence`): runs `work` synchronously right now, on the
/// calling thread, and returns an already-completed handle. Used to chain
/// work without leaving the current worker.
pub fn co_sequence<T, F>(id: TaskId, work: F) -> CoTask<T>
where
    F: FnOnce() -> T,
    T: Send + 'static,
{
    let state = Arc::new(TaskState::new(id));
    state.complete(work());
    CoTask { state }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::thread;

    #[test]
    fn eager_task_is_ready_immediately() {
        let task: CoTask<u32> = co_sequence(TaskId(1), || 42);
        assert!(task.is_ready());
        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(task.block_on(), 42);
    }

    #[test]
    fn deferred_task_resumes_consumer_parked_first() {
        let (task, item) = co_task(TaskId(2), || 7u32);
        assert!(!task.is_ready());

        let done = Arc::new(AtomicU32::new(0));
        let done_clone = Arc::clone(&done);
        let consumer = thread::spawn(move || {
            let value = task.block_on();
            done_clone.store(value, Ordering::SeqCst);
        });

        // give the consumer a chance to park before the producer runs
        thread::sleep(std::time::Duration::from_millis(20));
        item();
        consumer.join().unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn deferred_task_resumes_consumer_that_arrives_after_completion() {
        let (task, item) = co_task(TaskId(3), || 99u32);
        item();
        assert!(task.is_ready());
        assert_eq!(task.block_on(), 99);
    }
}
