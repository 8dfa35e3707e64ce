use failure::{Backtrace, Context, Fail};
use std::fmt;
use std::io;

/// Error Type for the worker pool and the dispatcher
#[derive(Debug)]
pub struct PoolError {
    inner: Context<PoolErrorKind>,
}

/// Kinds of possible Errors raised by the pool, its tasks and the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Fail)]
pub enum PoolErrorKind {
    /// Invalid pool capacity or worker naming
    #[fail(display = "Invalid pool configuration")]
    Configuration,
    /// Task submitted after shutdown began
    #[fail(display = "Pool is closed and no longer accepts tasks")]
    PoolClosed,
    /// A unit of work panicked or returned an unexpected error
    #[fail(display = "Task failed while running")]
    TaskFailure,
    /// A unit of work observed cancellation and stopped early
    #[fail(display = "Task was interrupted")]
    Interrupted,
    /// Shutdown wait elapsed with tasks still outstanding
    #[fail(display = "Shutdown timed out with tasks outstanding")]
    ShutdownTimeout,
    /// IoError triggered by thread spawning or config file reads
    #[fail(display = "Io Error")]
    IoError,
    /// Config file could not be parsed
    #[fail(display = "Json parsing error")]
    JsonError,
}

impl PoolError {
    /// get the kind of the error
    pub fn kind(&self) -> PoolErrorKind {
        *self.inner.get_context()
    }
}

impl Fail for PoolError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl From<PoolErrorKind> for PoolError {
    fn from(kind: PoolErrorKind) -> PoolError {
        PoolError {
            inner: Context::new(kind),
        }
    }
}

impl From<Context<PoolErrorKind>> for PoolError {
    fn from(context: Context<PoolErrorKind>) -> PoolError {
        PoolError { inner: context }
    }
}

impl From<io::Error> for PoolError {
    fn from(error: io::Error) -> PoolError {
        error.context(PoolErrorKind::IoError).into()
    }
}

impl From<serde_json::Error> for PoolError {
    fn from(error: serde_json::Error) -> PoolError {
        error.context(PoolErrorKind::JsonError).into()
    }
}
