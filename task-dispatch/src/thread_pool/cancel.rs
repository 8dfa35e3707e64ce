use crate::{PoolErrorKind, Result};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Default)]
struct Signal {
    cancelled: Mutex<bool>,
    cvar: Condvar,
}

/// Cooperative interruption flag shared between a pool and its tasks.
///
/// A unit of work checks the token at its suspension points:
/// [`CancelToken::sleep`] wakes up early and returns
/// [`PoolErrorKind::Interrupted`] as soon as the token is cancelled.
#[derive(Clone, Default)]
pub struct CancelToken {
    signal: Arc<Signal>,
}

impl CancelToken {
    /// create a fresh, uncancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// cancel the token and wake every task blocked in [`CancelToken::sleep`]
    pub fn cancel(&self) {
        let mut cancelled = self
            .signal
            .cancelled
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *cancelled = true;
        self.signal.cvar.notify_all();
    }

    /// whether [`CancelToken::cancel`] has been called
    pub fn is_cancelled(&self) -> bool {
        *self
            .signal
            .cancelled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// return `Interrupted` if the token has been cancelled
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(PoolErrorKind::Interrupted.into());
        }
        Ok(())
    }

    /// Block for `duration`, or until the token is cancelled.
    ///
    /// Returns `Ok(())` when the full duration elapsed and
    /// `Err(Interrupted)` when cancellation cut the wait short.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        // too far out to represent: sleep until cancelled
        let deadline = Instant::now().checked_add(duration);
        let mut cancelled = self
            .signal
            .cancelled
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        while !*cancelled {
            let deadline = match deadline {
                Some(deadline) => deadline,
                None => {
                    cancelled = self
                        .signal
                        .cvar
                        .wait(cancelled)
                        .unwrap_or_else(|e| e.into_inner());
                    continue;
                }
            };

            match deadline.checked_duration_since(Instant::now()) {
                Some(remaining) if remaining > Duration::from_millis(0) => {
                    cancelled = self
                        .signal
                        .cvar
                        .wait_timeout(cancelled, remaining)
                        .unwrap_or_else(|e| e.into_inner())
                        .0;
                }
                _ => return Ok(()),
            }
        }

        Err(PoolErrorKind::Interrupted.into())
    }
}
