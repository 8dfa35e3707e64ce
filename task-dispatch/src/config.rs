use crate::{PoolErrorKind, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;
use tracing::error;

/// Startup settings for the pool and the dispatcher.
///
/// Every field is optional in a config file; missing ones fall back to
/// [`DispatchConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// number of pool workers
    pub capacity: i32,
    /// worker names are this prefix followed by a 1-based index
    pub name_prefix: String,
    /// ids of the tasks dispatched at startup, in submission order
    pub task_ids: Vec<i64>,
    /// simulated work per task, in milliseconds
    pub task_duration_ms: u64,
    /// longest the dispatcher waits for its tasks after submitting them
    pub grace_period_ms: u64,
    /// longest the pool shutdown waits for outstanding tasks
    pub shutdown_timeout_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            capacity: 2,
            name_prefix: String::from("LabWorker-"),
            task_ids: vec![1, 2, 3],
            task_duration_ms: 1000,
            grace_period_ms: 3000,
            shutdown_timeout_ms: 1000,
        }
    }
}

impl DispatchConfig {
    /// read a JSON config file and validate it
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: DispatchConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// reject settings the pool cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.capacity <= 0 {
            error!("Pool capacity must be positive, got {}", self.capacity);
            return Err(PoolErrorKind::Configuration.into());
        }
        if self.name_prefix.contains('\0') {
            error!("Worker name prefix contains a null byte");
            return Err(PoolErrorKind::Configuration.into());
        }
        Ok(())
    }

    /// per-task simulated work
    pub fn task_duration(&self) -> Duration {
        Duration::from_millis(self.task_duration_ms)
    }

    /// dispatcher wait after submission
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// pool shutdown wait
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
