//! Type-erased unit of work pushed onto a queue and run by a worker.

/// A boxed, one-shot callable. Queues are homogeneous over this type so a
/// worker's pop/run loop never needs to know what kind of work it picked up.
pub type WorkItem = Box<dyn FnOnce() + Send + 'static>;
