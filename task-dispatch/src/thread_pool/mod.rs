//! This module contains project's ThreadPool trait,
//! the task types it runs and its shared-queue implementation.

use crate::Result;
use std::time::Duration;

/// ThreadPool trait that describes
/// the functionality of a fixed-capacity pool capable of
/// accepting tasks and running them on its worker threads
pub trait ThreadPool: Send + Sync + Sized {
    /// spawn `capacity` workers named `<name_prefix><n>`, n starting at 1
    fn start(capacity: i32, name_prefix: &str) -> Result<Self>;

    /// enqueue a task without blocking, fails once shutdown has begun
    fn submit(&self, task: Task) -> Result<()>;

    /// stop accepting tasks and wait up to `timeout` for queued and running ones
    fn shutdown(&self, timeout: Duration) -> Result<()>;

    /// like [`ThreadPool::shutdown`], but interrupt running and queued tasks first
    fn shutdown_now(&self, timeout: Duration) -> Result<()>;

    /// snapshot of the pool's counters
    fn stats(&self) -> PoolStats;
}

/// Lifecycle of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// workers are up and submissions are accepted
    Accepting,
    /// shutdown has begun, outstanding tasks are still finishing
    Draining,
    /// every task finished and every worker has been joined
    Stopped,
}

/// Counters describing what a pool has done so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// number of workers
    pub capacity: usize,
    /// tasks accepted by `submit`
    pub submitted: usize,
    /// tasks waiting for a free worker
    pub queued: usize,
    /// tasks currently executing
    pub running: usize,
    /// tasks that ran to completion
    pub completed: usize,
    /// tasks that stopped on an interruption
    pub interrupted: usize,
    /// tasks that panicked or returned an error
    pub failed: usize,
    /// current lifecycle state
    pub lifecycle: Lifecycle,
}

impl PoolStats {
    /// tasks accepted but not yet in a terminal state
    pub fn outstanding(&self) -> usize {
        self.queued + self.running
    }
}

mod cancel;
mod shared_queue;
mod task;

pub use cancel::CancelToken;
pub use shared_queue::SharedQueueThreadPool;
pub use task::{Task, TaskContext, TaskOutcome};
