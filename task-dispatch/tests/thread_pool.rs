use crossbeam::channel::unbounded;
use ntest::timeout;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use task_dispatch::thread_pool::{Lifecycle, SharedQueueThreadPool, Task, ThreadPool};
use task_dispatch::PoolErrorKind;

const LONG: Duration = Duration::from_secs(10);

#[test]
#[timeout(2000)]
fn smoke_test() {
    let (tx, rx) = unbounded();
    let pool = SharedQueueThreadPool::start(1, "LabWorker-").unwrap();

    pool.submit(Task::new(1, move |_ctx| {
        tx.send(14).unwrap();
        Ok(())
    }))
    .unwrap();

    assert_eq!(14, rx.recv().unwrap());
    pool.shutdown(LONG).unwrap();
}

#[test]
fn start_rejects_non_positive_capacity() {
    for capacity in &[0, -1] {
        let err = SharedQueueThreadPool::start(*capacity, "LabWorker-")
            .err()
            .expect("pool should not start");
        assert_eq!(err.kind(), PoolErrorKind::Configuration);
    }
}

#[test]
#[timeout(5000)]
fn workers_are_named_after_prefix() {
    let pool = SharedQueueThreadPool::start(3, "LabWorker-").unwrap();
    assert_eq!(pool.capacity(), 3);
    assert_eq!(pool.stats().capacity, 3);
    assert_eq!(
        pool.worker_names(),
        vec!["LabWorker-1", "LabWorker-2", "LabWorker-3"]
    );

    let (tx, rx) = unbounded();
    for id in 0..9 {
        let tx = tx.clone();
        pool.submit(Task::new(id, move |ctx| {
            let thread_name = thread::current().name().map(String::from);
            tx.send((ctx.worker_name().to_owned(), thread_name)).unwrap();
            Ok(())
        }))
        .unwrap();
    }

    let allowed: HashSet<_> = pool.worker_names().into_iter().collect();
    for _ in 0..9 {
        let (worker, thread_name) = rx.recv().unwrap();
        assert!(allowed.contains(&worker));
        assert_eq!(Some(worker), thread_name);
    }
    pool.shutdown(LONG).unwrap();
}

#[test]
#[timeout(10000)]
fn running_tasks_never_exceed_capacity() {
    for &capacity in &[1, 2, 4] {
        let pool = SharedQueueThreadPool::start(capacity, "Bounded-").unwrap();
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for id in 0..12 {
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            pool.submit(Task::new(id, move |_ctx| {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(20));
                current.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }))
            .unwrap();
        }

        pool.shutdown(LONG).unwrap();
        let peak = peak.load(Ordering::SeqCst);
        assert!(peak >= 1);
        assert!(peak <= capacity as usize, "peak {} > {}", peak, capacity);
        assert_eq!(pool.stats().completed, 12);
    }
}

#[test]
#[timeout(5000)]
fn single_worker_runs_tasks_in_submission_order() {
    let pool = SharedQueueThreadPool::start(1, "LabWorker-").unwrap();
    let (tx, rx) = unbounded();

    for id in 0..10 {
        let tx = tx.clone();
        pool.submit(Task::new(id, move |_ctx| {
            tx.send(id).unwrap();
            Ok(())
        }))
        .unwrap();
    }
    pool.shutdown(LONG).unwrap();

    let order: Vec<i64> = rx.try_iter().collect();
    assert_eq!(order, (0..10).collect::<Vec<_>>());
}

#[test]
#[timeout(2000)]
fn submit_after_shutdown_is_rejected() {
    let pool = SharedQueueThreadPool::start(2, "LabWorker-").unwrap();
    pool.shutdown(LONG).unwrap();

    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    let err = pool
        .submit(Task::new(1, move |_ctx| {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        }))
        .unwrap_err();

    assert_eq!(err.kind(), PoolErrorKind::PoolClosed);
    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(pool.stats().submitted, 0);
}

#[test]
#[timeout(5000)]
fn failing_tasks_do_not_kill_the_pool() {
    let pool = SharedQueueThreadPool::start(1, "LabWorker-").unwrap();
    let (tx, rx) = unbounded();

    pool.submit(Task::new(1, |_ctx| panic!("boom"))).unwrap();
    pool.submit(Task::new(2, |_ctx| Err(PoolErrorKind::TaskFailure.into())))
        .unwrap();
    pool.submit(Task::new(3, move |_ctx| {
        tx.send(3).unwrap();
        Ok(())
    }))
    .unwrap();

    assert_eq!(3, rx.recv().unwrap());
    pool.shutdown(LONG).unwrap();

    let stats = pool.stats();
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.completed, 1);
}

#[test]
#[timeout(2000)]
fn shutdown_of_idle_pool_succeeds_immediately() {
    let pool = SharedQueueThreadPool::start(2, "LabWorker-").unwrap();
    pool.shutdown(Duration::from_millis(0)).unwrap();

    let stats = pool.stats();
    assert_eq!(stats.lifecycle, Lifecycle::Stopped);
    assert_eq!(stats.outstanding(), 0);
}

#[test]
#[timeout(2000)]
fn shutdown_twice_is_a_no_op() {
    let pool = SharedQueueThreadPool::start(2, "LabWorker-").unwrap();
    pool.submit(Task::new(1, |_ctx| Ok(()))).unwrap();

    pool.shutdown(LONG).unwrap();
    pool.shutdown(LONG).unwrap();
    pool.shutdown_now(Duration::from_millis(0)).unwrap();

    let stats = pool.stats();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.lifecycle, Lifecycle::Stopped);
}

#[test]
#[timeout(5000)]
fn graceful_shutdown_waits_for_queued_and_running_tasks() {
    let pool = SharedQueueThreadPool::start(2, "LabWorker-").unwrap();
    for id in 1..=3 {
        pool.submit(Task::new(id, |ctx| {
            ctx.token().sleep(Duration::from_millis(50))
        }))
        .unwrap();
    }

    pool.shutdown(LONG).unwrap();
    let stats = pool.stats();
    assert_eq!(stats.submitted, 3);
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.interrupted, 0);
}

#[test]
#[timeout(5000)]
fn shutdown_times_out_with_tasks_outstanding() {
    let pool = SharedQueueThreadPool::start(1, "LabWorker-").unwrap();
    for id in 1..=2 {
        pool.submit(Task::new(id, |ctx| {
            ctx.token().sleep(Duration::from_millis(200))
        }))
        .unwrap();
    }

    let err = pool.shutdown(Duration::from_millis(0)).unwrap_err();
    assert_eq!(err.kind(), PoolErrorKind::ShutdownTimeout);
    assert_eq!(pool.stats().lifecycle, Lifecycle::Draining);

    // still closed while draining
    let err = pool.submit(Task::new(3, |_ctx| Ok(()))).unwrap_err();
    assert_eq!(err.kind(), PoolErrorKind::PoolClosed);

    // the running task was not interrupted by the timeout
    pool.shutdown(LONG).unwrap();
    let stats = pool.stats();
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.lifecycle, Lifecycle::Stopped);
}

#[test]
#[timeout(5000)]
fn shutdown_now_interrupts_running_and_queued_tasks() {
    let pool = SharedQueueThreadPool::start(1, "LabWorker-").unwrap();
    let (started_tx, started_rx) = unbounded();

    for id in 1..=2 {
        let started_tx = started_tx.clone();
        pool.submit(Task::new(id, move |ctx| {
            started_tx.send(id).unwrap();
            ctx.token().sleep(LONG)
        }))
        .unwrap();
    }

    assert_eq!(1, started_rx.recv().unwrap());
    pool.shutdown_now(LONG).unwrap();

    let stats = pool.stats();
    assert_eq!(stats.interrupted, 2);
    assert_eq!(stats.completed, 0);
    assert_eq!(stats.lifecycle, Lifecycle::Stopped);
}

#[test]
#[timeout(5000)]
fn every_task_reaches_exactly_one_terminal_state() {
    let pool = SharedQueueThreadPool::start(3, "LabWorker-").unwrap();
    for id in 0..30 {
        pool.submit(Task::new(id, move |ctx| match id % 3 {
            0 => Ok(()),
            1 => Err(PoolErrorKind::TaskFailure.into()),
            _ => ctx.token().sleep(Duration::from_millis(5)),
        }))
        .unwrap();
    }

    pool.shutdown(LONG).unwrap();
    let stats = pool.stats();
    assert_eq!(stats.outstanding(), 0);
    assert_eq!(
        stats.completed + stats.interrupted + stats.failed,
        stats.submitted
    );
    assert_eq!(stats.failed, 10);
}

#[test]
#[timeout(5000)]
fn dropping_the_pool_finishes_accepted_tasks() {
    let counter = Arc::new(AtomicUsize::new(0));
    let pool = SharedQueueThreadPool::start(2, "LabWorker-").unwrap();

    for id in 0..5 {
        let counter = Arc::clone(&counter);
        pool.submit(Task::new(id, move |_ctx| {
            thread::sleep(Duration::from_millis(10));
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
        .unwrap();
    }

    drop(pool);
    assert_eq!(5, counter.load(Ordering::SeqCst));
}

#[test]
#[timeout(5000)]
fn shutdown_without_deadline_drains_the_pool() {
    let pool = SharedQueueThreadPool::start(1, "LabWorker-").unwrap();
    for id in 1..=2 {
        pool.submit(Task::new(id, |ctx| {
            ctx.token().sleep(Duration::from_millis(20))
        }))
        .unwrap();
    }

    pool.shutdown(Duration::MAX).unwrap();
    let stats = pool.stats();
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.lifecycle, Lifecycle::Stopped);
}

#[test]
#[timeout(5000)]
fn endless_sleep_is_interrupted_by_shutdown_now() {
    let pool = SharedQueueThreadPool::start(1, "P-").unwrap();
    let (started_tx, started_rx) = unbounded();

    pool.submit(Task::new(1, move |ctx| {
        started_tx.send(()).unwrap();
        ctx.token().sleep(Duration::MAX)
    }))
    .unwrap();

    started_rx.recv().unwrap();
    pool.shutdown_now(Duration::MAX).unwrap();

    let stats = pool.stats();
    assert_eq!(stats.interrupted, 1);
    assert_eq!(stats.failed, 0);
}

#[test]
#[timeout(5000)]
fn tasks_can_read_worker_names_during_shutdown() {
    let pool = Arc::new(SharedQueueThreadPool::start(2, "LabWorker-").unwrap());
    let (started_tx, started_rx) = unbounded();
    let (names_tx, names_rx) = unbounded();

    let handle = Arc::clone(&pool);
    pool.submit(Task::new(1, move |_ctx| {
        started_tx.send(()).unwrap();
        // give the main thread time to enter shutdown
        thread::sleep(Duration::from_millis(100));
        names_tx.send(handle.worker_names()).unwrap();
        Ok(())
    }))
    .unwrap();

    started_rx.recv().unwrap();
    pool.shutdown(LONG).unwrap();

    assert_eq!(names_rx.recv().unwrap(), vec!["LabWorker-1", "LabWorker-2"]);
    assert_eq!(pool.stats().completed, 1);
}

#[test]
#[timeout(5000)]
fn last_handle_dropped_inside_a_task_does_not_join_its_own_worker() {
    let pool = Arc::new(SharedQueueThreadPool::start(2, "LabWorker-").unwrap());
    let (go_tx, go_rx) = unbounded();
    let (done_tx, done_rx) = unbounded();

    let handle = Arc::clone(&pool);
    pool.submit(Task::new(1, move |_ctx| {
        go_rx.recv().unwrap();
        drop(handle);
        done_tx.send(()).unwrap();
        Ok(())
    }))
    .unwrap();

    drop(pool);
    go_tx.send(()).unwrap();
    done_rx.recv().unwrap();
}
