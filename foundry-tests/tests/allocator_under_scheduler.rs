//! Drives the arena allocator concurrently from scheduler workers: each
//! submitted item either allocates or frees a previously-allocated
//! handle, guarded by a single mutex the way any non-thread-safe
//! collaborator would be shared across worker threads.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use foundry_sched::Scheduler;
use foundry_tests::shared_best_fit_allocator;

#[test]
fn concurrent_allocate_and_free_leaves_consistent_stats() {
    let allocator = Arc::new(shared_best_fit_allocator(16, 4096));
    let live: Arc<Mutex<Vec<foundry_abi::AllocId>>> = Arc::new(Mutex::new(Vec::new()));
    let allocated_total = Arc::new(AtomicU64::new(0));
    let freed_total = Arc::new(AtomicU64::new(0));

    let scheduler = Arc::new(Scheduler::new(4));
    let group = scheduler.create_group(0, "alloc-workers", 0, 4);
    scheduler.begin_execution();

    for i in 0..2000u64 {
        let allocator = Arc::clone(&allocator);
        let live = Arc::clone(&live);
        let allocated_total = Arc::clone(&allocated_total);
        let freed_total = Arc::clone(&freed_total);

        scheduler
            .submit(
                group,
                Box::new(move || {
                    // Free roughly a third of the time, once there's
                    // something to free; otherwise allocate.
                    let should_free = i % 3 == 0;
                    let mut guard = live.lock().unwrap();
                    if should_free && !guard.is_empty() {
                        let idx = (i as usize) % guard.len();
                        let handle = guard.swap_remove(idx);
                        drop(guard);
                        allocator.lock().unwrap().deallocate(handle).unwrap();
                        freed_total.fetch_add(1, Ordering::SeqCst);
                    } else {
                        drop(guard);
                        let size = 16 + (i % 200) as usize;
                        let handle = allocator.lock().unwrap().allocate(size, 1).unwrap();
                        live.lock().unwrap().push(handle);
                        allocated_total.fetch_add(1, Ordering::SeqCst);
                    }
                }),
            )
            .unwrap();
    }

    scheduler.end_execution();

    let remaining = live.lock().unwrap();
    let stats = allocator.lock().unwrap().stats();
    assert_eq!(stats.live_allocations, remaining.len());
    assert_eq!(
        allocated_total.load(Ordering::SeqCst) - freed_total.load(Ordering::SeqCst),
        remaining.len() as u64
    );

    // Every surviving handle must still resolve.
    let allocator = allocator.lock().unwrap();
    for &handle in remaining.iter() {
        assert!(allocator.address_of(handle).is_ok());
    }
}
