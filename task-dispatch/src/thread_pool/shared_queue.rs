use super::{CancelToken, Lifecycle, PoolStats, Task, TaskContext, TaskOutcome, ThreadPool};
use crate::{PoolErrorKind, Result};
use crossbeam::channel::{self, Receiver, Sender};
use std::mem;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

enum Message {
    NewTask(Task),
    Terminate,
}

struct State {
    lifecycle: Lifecycle,
    submitted: usize,
    queued: usize,
    running: usize,
    completed: usize,
    interrupted: usize,
    failed: usize,
}

impl State {
    fn outstanding(&self) -> usize {
        self.queued + self.running
    }
}

// everything the workers and the pool handle both touch
struct Shared {
    state: Mutex<State>,
    // signalled whenever the outstanding count drops to zero
    drained: Condvar,
    token: CancelToken,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn task_started(&self) {
        let mut state = self.lock();
        state.queued -= 1;
        state.running += 1;
    }

    fn task_finished(&self, outcome: TaskOutcome) {
        let mut state = self.lock();
        state.running -= 1;
        match outcome {
            TaskOutcome::Completed => state.completed += 1,
            TaskOutcome::Interrupted => state.interrupted += 1,
            TaskOutcome::Failed => state.failed += 1,
        }
        if state.outstanding() == 0 {
            self.drained.notify_all();
        }
    }
}

struct Worker {
    name: String,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn new(name: String, receiver: Receiver<Message>, shared: Arc<Shared>) -> Result<Self> {
        let thread_name = name.clone();
        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            debug!("Worker {} started", thread_name);
            // the loop also ends if every sender is gone
            for message in receiver.iter() {
                match message {
                    Message::NewTask(task) => {
                        shared.task_started();
                        let ctx = TaskContext::new(thread_name.clone(), shared.token.clone());
                        let outcome = task.run(&ctx);
                        shared.task_finished(outcome);
                    }
                    Message::Terminate => break,
                }
            }
            trace!("Worker {} exiting", thread_name);
        })?;

        Ok(Self {
            name,
            handle: Some(handle),
        })
    }

    fn join(&mut self) {
        trace!("Joining Worker {}", self.name);
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                // the last handle to the pool was dropped inside one of its tasks
                warn!("Worker {} cannot join itself, detaching it", self.name);
                return;
            }
            if handle.join().is_err() {
                error!("Worker {} panicked outside of a task", self.name);
            }
        }
    }
}

/// Shared Queue ThreadPool
/// It maintains a fixed number of named workers and sends incoming tasks to
/// them through a multi-consumer channel, so the earliest queued task goes to
/// the next worker that becomes idle.
///
/// # Note:
/// Dropping a pool that was never shut down waits for every queued and running
/// task to finish, so a task that never returns blocks the drop forever.
/// `shutdown`, `shutdown_now` and the final drop must not happen on one of the
/// pool's own workers, since they wait for that worker to exit.
///
/// # Example:
///
/// ```
/// use task_dispatch::thread_pool::{SharedQueueThreadPool, Task, ThreadPool};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let pool = SharedQueueThreadPool::start(2, "LabWorker-").unwrap();
/// let counter = Arc::new(AtomicUsize::new(0));
///
/// for id in 0..5 {
///     let counter = Arc::clone(&counter);
///     pool.submit(Task::new(id, move |_ctx| {
///         counter.fetch_add(1, Ordering::SeqCst);
///         Ok(())
///     }))
///     .unwrap();
/// }
///
/// pool.shutdown(Duration::from_secs(5)).unwrap();
/// assert_eq!(5, counter.load(Ordering::SeqCst));
/// ```
pub struct SharedQueueThreadPool {
    capacity: usize,
    names: Vec<String>,
    workers: Mutex<Vec<Worker>>,
    // each worker holds a clone of the receiving end
    sender: Sender<Message>,
    shared: Arc<Shared>,
}

impl SharedQueueThreadPool {
    /// number of workers
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// names of the workers, in spawn order
    pub fn worker_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<Worker>> {
        self.workers.lock().unwrap_or_else(|e| e.into_inner())
    }

    // stop accepting tasks; a no-op once the pool is already closed
    fn close(&self) {
        let mut state = self.shared.lock();
        if state.lifecycle != Lifecycle::Accepting {
            return;
        }
        state.lifecycle = Lifecycle::Draining;
        info!(
            "Pool shutting down, {} queued and {} running tasks",
            state.queued, state.running
        );

        // terminate signals queue up behind every accepted task
        for _ in 0..self.capacity {
            if self.sender.send(Message::Terminate).is_err() {
                warn!("All workers already exited");
                break;
            }
        }
    }

    fn wait_drained(&self, timeout: Duration) -> Result<()> {
        // a timeout past the end of time means no deadline
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.shared.lock();

        while state.outstanding() > 0 {
            let deadline = match deadline {
                Some(deadline) => deadline,
                None => {
                    state = self
                        .shared
                        .drained
                        .wait(state)
                        .unwrap_or_else(|e| e.into_inner());
                    continue;
                }
            };

            match deadline.checked_duration_since(Instant::now()) {
                Some(remaining) if remaining > Duration::from_millis(0) => {
                    state = self
                        .shared
                        .drained
                        .wait_timeout(state, remaining)
                        .unwrap_or_else(|e| e.into_inner())
                        .0;
                }
                _ => {
                    warn!(
                        "Shutdown timed out after {:?}, {} queued and {} running tasks",
                        timeout, state.queued, state.running
                    );
                    return Err(PoolErrorKind::ShutdownTimeout.into());
                }
            }
        }

        Ok(())
    }

    fn join_workers(&self) {
        let mut workers = mem::take(&mut *self.lock_workers());
        for worker in workers.iter_mut() {
            worker.join();
        }
        self.shared.lock().lifecycle = Lifecycle::Stopped;
    }
}

impl ThreadPool for SharedQueueThreadPool {
    fn start(capacity: i32, name_prefix: &str) -> Result<Self> {
        if capacity <= 0 {
            error!("Invalid pool capacity {}", capacity);
            return Err(PoolErrorKind::Configuration.into());
        }
        if name_prefix.contains('\0') {
            error!("Worker name prefix contains a null byte");
            return Err(PoolErrorKind::Configuration.into());
        }

        let (sender, receiver) = channel::unbounded();
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                lifecycle: Lifecycle::Accepting,
                submitted: 0,
                queued: 0,
                running: 0,
                completed: 0,
                interrupted: 0,
                failed: 0,
            }),
            drained: Condvar::new(),
            token: CancelToken::new(),
        });

        let capacity = capacity as usize;
        let mut workers = Vec::with_capacity(capacity);
        for i in 1..=capacity {
            let name = format!("{}{}", name_prefix, i);
            match Worker::new(name, receiver.clone(), Arc::clone(&shared)) {
                Ok(worker) => workers.push(worker),
                Err(error) => {
                    // stop whatever did come up before reporting the failure
                    for _ in 0..workers.len() {
                        let _ = sender.send(Message::Terminate);
                    }
                    for worker in &mut workers {
                        worker.join();
                    }
                    return Err(error);
                }
            }
        }
        info!("Pool started with {} workers", capacity);

        Ok(Self {
            capacity,
            names: workers.iter().map(|w| w.name.clone()).collect(),
            workers: Mutex::new(workers),
            sender,
            shared,
        })
    }

    fn submit(&self, task: Task) -> Result<()> {
        let mut state = self.shared.lock();
        if state.lifecycle != Lifecycle::Accepting {
            warn!("Rejected Task {}, pool is closed", task.id());
            return Err(PoolErrorKind::PoolClosed.into());
        }

        trace!("Queueing Task {}", task.id());
        // sent under the lock so no task can land behind the terminate signals
        if self.sender.send(Message::NewTask(task)).is_err() {
            return Err(PoolErrorKind::PoolClosed.into());
        }
        state.submitted += 1;
        state.queued += 1;
        Ok(())
    }

    fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.close();
        self.wait_drained(timeout)?;
        self.join_workers();
        info!("Pool stopped");
        Ok(())
    }

    fn shutdown_now(&self, timeout: Duration) -> Result<()> {
        self.close();
        info!("Interrupting outstanding tasks");
        self.shared.token.cancel();
        self.wait_drained(timeout)?;
        self.join_workers();
        info!("Pool stopped");
        Ok(())
    }

    fn stats(&self) -> PoolStats {
        let state = self.shared.lock();
        PoolStats {
            capacity: self.capacity,
            submitted: state.submitted,
            queued: state.queued,
            running: state.running,
            completed: state.completed,
            interrupted: state.interrupted,
            failed: state.failed,
            lifecycle: state.lifecycle,
        }
    }
}

impl Drop for SharedQueueThreadPool {
    fn drop(&mut self) {
        self.close();
        self.join_workers();
    }
}
