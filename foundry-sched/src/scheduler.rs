//! The scheduler: owns every worker and work-group, and drives execution.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::thread::JoinHandle;

use foundry_abi::{WorkGroupId, WorkerId};
use log::debug;

use crate::error::{SchedulerError, SchedulerResult};
use crate::group::WorkGroup;
use crate::work_item::WorkItem;
use crate::worker::Worker;

thread_local! {
    static CURRENT_WORKER: std::cell::Cell<Option<WorkerId>> = const { std::cell::Cell::new(None) };
}

/// The worker whose main loop is running on the calling thread, if any.
/// Only meaningful from inside a work item or the main loop itself.
pub fn current_worker() -> Option<WorkerId> {
    CURRENT_WORKER.with(|cell| cell.get())
}

pub struct Scheduler {
    workers: Vec<Worker>,
    groups: Mutex<Vec<WorkGroup>>,
    next_group_id: AtomicU32,
    handles: Mutex<Vec<JoinHandle<()>>>,
    shutdown: AtomicBool,
}

impl Scheduler {
    pub fn new(worker_count: usize) -> Self {
        assert!(worker_count > 0, "scheduler needs at least one worker");
        let workers = (0..worker_count)
            .map(|i| Worker::new(WorkerId(i as u32)))
            .collect();
        Self {
            workers,
            groups: Mutex::new(Vec::new()),
            next_group_id: AtomicU32::new(0),
            handles: Mutex::new(Vec::new()),
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Register a work-group over workers `[start, start+count)`.
    pub fn create_group(&self, priority: i32, name: impl Into<String>, start: usize, count: usize) -> WorkGroupId {
        assert!(
            start + count <= self.workers.len(),
            "group range exceeds worker count"
        );
        let id = WorkGroupId(self.next_group_id.fetch_add(1, Ordering::Relaxed));
        self.groups
            .lock()
            .unwrap()
            .push(WorkGroup::new(id, name, priority, start, count));
        id
    }

    /// Spawn one OS thread per worker, each running the main loop.
    pub fn begin_execution(self: &std::sync::Arc<Self>) {
        let mut handles = self.handles.lock().unwrap();
        assert!(handles.is_empty(), "begin_execution called twice");
        for index in 0..self.workers.len() {
            let scheduler = std::sync::Arc::clone(self);
            let handle = std::thread::Builder::new()
                .name(format!("foundry-worker-{index}"))
                .spawn(move || scheduler.run_worker_loop(WorkerId(index as u32)))
                .expect("failed to spawn worker thread");
            handles.push(handle);
        }
        // Threads register themselves via `Worker::set_thread` at the top
        // of `run_worker_loop`, so wait for that before returning in case a
        // caller submits (and wakes) before the thread gets scheduled.
        drop(handles);
    }

    /// Signal every worker to stop after its current item, then join them.
    pub fn end_execution(&self) {
        self.shutdown.store(true, Ordering::Release);
        for worker in &self.workers {
            worker.request_quit();
        }
        let mut handles = self.handles.lock().unwrap();
        for handle in handles.drain(..) {
            handle.join().expect("worker thread panicked");
        }
    }

    /// Push onto the round-robin worker of `group`.
    pub fn submit(&self, group: WorkGroupId, item: WorkItem) -> SchedulerResult<()> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(SchedulerError::SubmitAfterShutdown);
        }
        let target = {
            let groups = self.groups.lock().unwrap();
            let group = groups
                .iter()
                .find(|g| g.id == group)
                .expect("submit to unknown group");
            group.next_push_target()
        };
        self.workers[target].shared.lock().push_back(item);
        self.workers[target].wake();
        Ok(())
    }

    /// Push onto a specific worker's exclusive queue.
    pub fn submit_to_worker(&self, worker: WorkerId, item: WorkItem) -> SchedulerResult<()> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(SchedulerError::SubmitAfterShutdown);
        }
        let worker = &self.workers[worker.0 as usize];
        worker.exclusive.lock().push_back(item);
        worker.wake();
        Ok(())
    }

    /// Push onto the calling worker's own local ring, falling back to its
    /// shared queue if the ring is full. Only valid when called from the
    /// thread running `worker`'s main loop.
    pub fn submit_local(&self, worker: WorkerId, item: WorkItem) {
        let target = &self.workers[worker.0 as usize];
        if let Err(item) = target.try_push_local(item) {
            target.shared.lock().push_back(item);
        }
    }

    /// Run exactly one scheduling iteration for `worker`: local ring,
    /// exclusive queue, own shared queue, then steal. Returns whether an
    /// item was found and run.
    ///
    /// # Safety contract
    /// Must only be called from the thread that owns `worker` (its main
    /// loop, or a work item currently executing on it) — the local ring it
    /// touches has no synchronization of its own.
    pub fn busy_work(&self, worker: WorkerId) -> bool {
        let index = worker.0 as usize;
        let mine = &self.workers[index];

        let item = mine
            .try_pop_local()
            .or_else(|| mine.try_pop_exclusive())
            .or_else(|| mine.try_pop_shared())
            .or_else(|| self.steal(index));

        match item {
            Some(item) => {
                item();
                true
            }
            None => false,
        }
    }

    fn steal(&self, thief_index: usize) -> Option<WorkItem> {
        let n = self.workers.len();
        if n <= 1 {
            return None;
        }
        for offset in 1..n {
            let victim = (thief_index + offset) % n;
            if let Some(item) = self.workers[victim].try_pop_shared() {
                debug!("worker {thief_index} stole from worker {victim}");
                return Some(item);
            }
        }
        None
    }

    fn run_worker_loop(&self, worker: WorkerId) {
        let index = worker.0 as usize;
        self.workers[index].set_thread(std::thread::current());
        CURRENT_WORKER.with(|cell| cell.set(Some(worker)));
        loop {
            if self.busy_work(worker) {
                continue;
            }
            // No work right now. Only quit once the queues are actually
            // drained, so a quit requested right after a burst of submits
            // still lets every already-queued item run.
            if self.workers[index].is_quitting() {
                break;
            }
            std::thread::park();
        }
    }
}
