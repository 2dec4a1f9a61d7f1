//! A producer task allocates a block; a consumer task awaits the result
//! and frees it. Exercises the coroutine handoff and the allocator
//! together, the way a real pipeline stage would pass ownership of a
//! buffer from one task to the next.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use foundry_abi::TaskId;
use foundry_sched::{co_task, current_worker, Scheduler};
use foundry_tests::shared_best_fit_allocator;

#[test]
fn producer_allocates_consumer_frees_every_trial() {
    let allocator = Arc::new(shared_best_fit_allocator(16, 4096));
    let freed = Arc::new(AtomicU64::new(0));

    let scheduler = Arc::new(Scheduler::new(4));
    let group = scheduler.create_group(0, "pipeline", 0, 4);
    scheduler.begin_execution();

    const TRIALS: u64 = 500;
    for i in 0..TRIALS {
        let producer_allocator = Arc::clone(&allocator);
        let size = 8 + (i % 64) as usize;
        let (task, producer_item) = co_task(TaskId(i), move || {
            producer_allocator.lock().unwrap().allocate(size, 1).unwrap()
        });
        scheduler.submit(group, producer_item).unwrap();

        let consumer_allocator = Arc::clone(&allocator);
        let consumer_scheduler = Arc::clone(&scheduler);
        let freed = Arc::clone(&freed);
        scheduler
            .submit(
                group,
                Box::new(move || {
                    let worker = current_worker().expect("work item must run on a worker");
                    let handle = task.await_on(worker, &consumer_scheduler);
                    consumer_allocator.lock().unwrap().deallocate(handle).unwrap();
                    freed.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
    }

    scheduler.end_execution();

    assert_eq!(freed.load(Ordering::SeqCst), TRIALS);
    assert_eq!(allocator.lock().unwrap().stats().live_allocations, 0);
}
