use super::CancelToken;
use crate::{PoolErrorKind, Result};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

type Work = Box<dyn FnOnce(&TaskContext) -> Result<()> + Send + 'static>;

/// What a running unit of work can see of the worker executing it
pub struct TaskContext {
    worker_name: String,
    token: CancelToken,
}

impl TaskContext {
    pub(crate) fn new(worker_name: String, token: CancelToken) -> Self {
        Self { worker_name, token }
    }

    /// name of the worker thread running the task, e.g. `LabWorker-1`
    pub fn worker_name(&self) -> &str {
        &self.worker_name
    }

    /// interruption signal fired by an immediate shutdown
    pub fn token(&self) -> &CancelToken {
        &self.token
    }
}

/// Terminal state of an accepted task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// unit of work returned `Ok`
    Completed,
    /// unit of work observed cancellation and returned `Interrupted`
    Interrupted,
    /// unit of work panicked or returned any other error
    Failed,
}

/// A caller-chosen id plus a unit of work.
///
/// Ids are only used for reporting, the pool does not require them to be unique.
pub struct Task {
    id: i64,
    work: Work,
}

impl Task {
    /// wrap a unit of work
    pub fn new<F>(id: i64, work: F) -> Self
    where
        F: FnOnce(&TaskContext) -> Result<()> + Send + 'static,
    {
        Self {
            id,
            work: Box::new(work),
        }
    }

    /// caller supplied id
    pub fn id(&self) -> i64 {
        self.id
    }

    // panics are caught here so that the worker can continue running other tasks
    pub(crate) fn run(self, ctx: &TaskContext) -> TaskOutcome {
        let Task { id, work } = self;
        match catch_unwind(AssertUnwindSafe(|| work(ctx))) {
            Ok(Ok(())) => TaskOutcome::Completed,
            Ok(Err(ref e)) if e.kind() == PoolErrorKind::Interrupted => TaskOutcome::Interrupted,
            Ok(Err(e)) => {
                error!("Worker: {}, Task: {}, Error: {}", ctx.worker_name(), id, e);
                TaskOutcome::Failed
            }
            Err(_panic) => {
                error!(
                    "Worker: {}, Task: {}, Error: {}",
                    ctx.worker_name(),
                    id,
                    PoolErrorKind::TaskFailure
                );
                TaskOutcome::Failed
            }
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("id", &self.id).finish()
    }
}
