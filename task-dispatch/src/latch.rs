use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

struct Inner {
    remaining: Mutex<usize>,
    cvar: Condvar,
}

/// A countdown synchronizer that can be awaited with a deadline.
///
/// Clones share the same count. Every call to [`CountDownLatch::count_down`]
/// decrements it, and [`CountDownLatch::wait_timeout`] returns as soon as the
/// count reaches zero or the timeout passes, whichever comes first.
#[derive(Clone)]
pub struct CountDownLatch {
    inner: Arc<Inner>,
}

impl CountDownLatch {
    /// create a latch expecting `count` arrivals
    pub fn new(count: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                remaining: Mutex::new(count),
                cvar: Condvar::new(),
            }),
        }
    }

    /// record one arrival, saturating at zero
    pub fn count_down(&self) {
        let mut remaining = self
            .inner
            .remaining
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if *remaining > 0 {
            *remaining -= 1;
            if *remaining == 0 {
                self.inner.cvar.notify_all();
            }
        }
    }

    /// arrivals still expected
    pub fn remaining(&self) -> usize {
        *self
            .inner
            .remaining
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Block until the count reaches zero or `timeout` passes.
    ///
    /// Returns `true` if the count reached zero.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        // too far out to represent: wait without a deadline
        let deadline = Instant::now().checked_add(timeout);
        let mut remaining = self
            .inner
            .remaining
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        while *remaining > 0 {
            let deadline = match deadline {
                Some(deadline) => deadline,
                None => {
                    remaining = self
                        .inner
                        .cvar
                        .wait(remaining)
                        .unwrap_or_else(|e| e.into_inner());
                    continue;
                }
            };

            match deadline.checked_duration_since(Instant::now()) {
                Some(left) if left > Duration::from_millis(0) => {
                    remaining = self
                        .inner
                        .cvar
                        .wait_timeout(remaining, left)
                        .unwrap_or_else(|e| e.into_inner())
                        .0;
                }
                _ => return false,
            }
        }

        true
    }
}
