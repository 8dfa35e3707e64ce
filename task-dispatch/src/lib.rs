#![deny(missing_docs)]
#![warn(rust_2018_idioms)]

//! This crate provides a fixed-capacity worker pool
//! and a dispatcher that feeds it a startup workload

mod config;
mod dispatcher;
mod error;
mod latch;
pub mod thread_pool;

#[macro_use]
extern crate failure;
pub use config::DispatchConfig;
pub use dispatcher::{Batch, DispatchReport, EventSink, StdoutSink, TaskDispatcher, TaskEvent};
pub use error::PoolError;
pub use error::PoolErrorKind;
pub use latch::CountDownLatch;

/// Result type used by this crate
pub type Result<T> = core::result::Result<T, PoolError>;
