//! Scheduler id and status types shared between `foundry-sched` and its
//! callers.

/// Sentinel meaning "no task."
pub const INVALID_TASK_ID: u64 = u64::MAX;
/// Sentinel meaning "no worker."
pub const INVALID_WORKER_ID: u32 = u32::MAX;

/// Identifier of a worker thread, stable for its lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerId(pub u32);

/// Identifier of a work-group: a set of workers sharing a run queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkGroupId(pub u32);

/// Monotonic id handed out to every submitted co-task, used only for
/// diagnostics (logging, test assertions) — the scheduler itself addresses
/// tasks through their handle, not this id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u64);

/// Type-safe task status with explicit state-machine semantics, covering
/// the states a cooperative co-task actually passes through.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TaskStatus {
    #[default]
    Suspended = 0,
    Running = 1,
    Completed = 2,
}

impl TaskStatus {
    #[inline]
    pub const fn can_transition_to(self, target: Self) -> bool {
        match self {
            Self::Suspended => matches!(target, Self::Running),
            Self::Running => matches!(target, Self::Suspended | Self::Completed),
            Self::Completed => false,
        }
    }
}
