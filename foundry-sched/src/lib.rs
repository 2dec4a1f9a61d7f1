//! Cooperative, work-stealing task scheduler: workers, work-groups, wait
//! events, and coroutine-style tasks built on top of them.

pub mod error;
pub mod group;
pub mod scheduler;
pub mod task;
pub mod wait;
pub mod work_item;
pub mod worker;

pub use error::{SchedulerError, SchedulerResult};
pub use group::WorkGroup;
pub use scheduler::{current_worker, Scheduler};
pub use task::{co_sequence, co_task, CoTask};
pub use wait::{BlockingEvent, BusyEvent};
pub use work_item::WorkItem;
pub use worker::Worker;
