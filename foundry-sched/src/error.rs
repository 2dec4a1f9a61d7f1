//! Error taxonomy for the scheduler's public surface.

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    /// A worker's local ring was full; caller should fall back to pushing
    /// onto the shared queue instead.
    #[error("local ring full")]
    QueueFull,

    /// `submit` was called after `end_execution` has been invoked.
    #[error("submit after scheduler shutdown")]
    SubmitAfterShutdown,
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
