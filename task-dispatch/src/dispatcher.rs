use crate::thread_pool::{Task, TaskContext, ThreadPool};
use crate::{CountDownLatch, DispatchConfig, Result};
use crossbeam::channel::Sender;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Observable lifecycle report of a dispatched task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    /// a worker picked the task up
    Started {
        /// task id
        id: i64,
        /// name of the worker running it
        worker: String,
    },
    /// the simulated work finished
    Ended {
        /// task id
        id: i64,
    },
    /// the simulated work was cut short by an interruption
    Interrupted {
        /// task id
        id: i64,
    },
}

impl TaskEvent {
    /// id of the task this event belongs to
    pub fn id(&self) -> i64 {
        match *self {
            TaskEvent::Started { id, .. } => id,
            TaskEvent::Ended { id } => id,
            TaskEvent::Interrupted { id } => id,
        }
    }
}

impl fmt::Display for TaskEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskEvent::Started { id, worker } => write!(f, "Start Task {} on {}", id, worker),
            TaskEvent::Ended { id } => write!(f, "End Task {}", id),
            TaskEvent::Interrupted { id } => write!(f, "Task {} was interrupted", id),
        }
    }
}

/// Destination of task events
pub trait EventSink: Send + Sync + 'static {
    /// record one event
    fn report(&self, event: TaskEvent);
}

/// Prints every event as one line on stdout
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl EventSink for StdoutSink {
    fn report(&self, event: TaskEvent) {
        match event {
            TaskEvent::Interrupted { .. } => eprintln!("{}", event),
            _ => println!("{}", event),
        }
    }
}

impl EventSink for Sender<TaskEvent> {
    fn report(&self, event: TaskEvent) {
        if self.send(event).is_err() {
            debug!("Event receiver dropped");
        }
    }
}

/// What happened to a dispatched batch by the time [`TaskDispatcher::run`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// tasks handed to the pool
    pub submitted: usize,
    /// tasks that reached a terminal state within the grace period
    pub finished: usize,
    /// whether every submitted task finished within the grace period
    pub all_finished: bool,
}

/// Tasks submitted by [`TaskDispatcher::submit_all`] that may still be running
pub struct Batch {
    submitted: usize,
    latch: CountDownLatch,
}

impl Batch {
    /// number of tasks in the batch
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Block until every task of the batch reached a terminal state,
    /// or `grace_period` passed.
    pub fn wait(&self, grace_period: Duration) -> DispatchReport {
        let all_finished = self.latch.wait_timeout(grace_period);
        let finished = self.submitted - self.latch.remaining();
        if !all_finished {
            warn!(
                "Grace period of {:?} elapsed with {} of {} tasks unfinished",
                grace_period,
                self.submitted - finished,
                self.submitted
            );
        }

        DispatchReport {
            submitted: self.submitted,
            finished,
            all_finished,
        }
    }
}

// counts its task as done when dropped, whether the work returned or panicked
struct Arrival(CountDownLatch);

impl Drop for Arrival {
    fn drop(&mut self) {
        self.0.count_down();
    }
}

/// Submits the startup workload to a pool and waits for it.
///
/// Each task reports its start with the worker's name, sleeps for the task
/// duration while watching the pool's interruption signal, then reports its
/// end. After submission the dispatcher blocks until every task reached a
/// terminal state or the grace period passed, whichever is first.
pub struct TaskDispatcher<S: EventSink = StdoutSink> {
    sink: Arc<S>,
    task_duration: Duration,
    grace_period: Duration,
}

impl TaskDispatcher<StdoutSink> {
    /// dispatcher printing its events on stdout
    pub fn new(task_duration: Duration, grace_period: Duration) -> Self {
        Self::with_sink(task_duration, grace_period, StdoutSink)
    }
}

impl<S: EventSink> TaskDispatcher<S> {
    /// dispatcher sending its events to `sink`
    pub fn with_sink(task_duration: Duration, grace_period: Duration, sink: S) -> Self {
        Self {
            sink: Arc::new(sink),
            task_duration,
            grace_period,
        }
    }

    /// dispatcher with the timings of `config`
    pub fn from_config(config: &DispatchConfig, sink: S) -> Self {
        Self::with_sink(config.task_duration(), config.grace_period(), sink)
    }

    /// Submit one task per id, in order, then wait at most the grace period.
    ///
    /// A rejected submission aborts the run and is returned to the caller.
    /// Tasks already submitted keep running on the pool.
    pub fn run<P: ThreadPool>(&self, pool: &P, task_ids: &[i64]) -> Result<DispatchReport> {
        let batch = self.submit_all(pool, task_ids)?;
        Ok(batch.wait(self.grace_period))
    }

    /// Submit one task per id, in order, without waiting for them.
    pub fn submit_all<P: ThreadPool>(&self, pool: &P, task_ids: &[i64]) -> Result<Batch> {
        let latch = CountDownLatch::new(task_ids.len());

        for &id in task_ids {
            if let Err(e) = pool.submit(self.task(id, latch.clone())) {
                error!("Cannot submit Task {}: {}", id, e);
                return Err(e);
            }
            debug!("Submitted Task {}", id);
        }
        info!("{} tasks submitted", task_ids.len());

        Ok(Batch {
            submitted: task_ids.len(),
            latch,
        })
    }

    /// grace period used by [`TaskDispatcher::run`]
    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    fn task(&self, id: i64, latch: CountDownLatch) -> Task {
        let sink = Arc::clone(&self.sink);
        let duration = self.task_duration;
        let arrival = Arrival(latch);

        Task::new(id, move |ctx: &TaskContext| {
            let _arrival = arrival;
            sink.report(TaskEvent::Started {
                id,
                worker: ctx.worker_name().to_owned(),
            });

            match ctx.token().sleep(duration) {
                Ok(()) => {
                    sink.report(TaskEvent::Ended { id });
                    Ok(())
                }
                Err(e) => {
                    sink.report(TaskEvent::Interrupted { id });
                    Err(e)
                }
            }
        })
    }
}
