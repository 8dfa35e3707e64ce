use clap::Parser;
use std::path::PathBuf;
use std::process::exit;
use task_dispatch::thread_pool::{SharedQueueThreadPool, ThreadPool};
use task_dispatch::{DispatchConfig, Result, StdoutSink, TaskDispatcher};
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(long)]
    #[clap(help = "JSON file with pool and workload settings")]
    config: Option<PathBuf>,

    #[clap(long)]
    #[clap(help = "Number of pool workers")]
    capacity: Option<i32>,

    #[clap(long)]
    #[clap(help = "Worker thread name prefix")]
    prefix: Option<String>,

    #[clap(long, use_value_delimiter = true)]
    #[clap(help = "Comma separated ids of the tasks to dispatch")]
    tasks: Option<Vec<i64>>,

    #[clap(long)]
    #[clap(help = "Simulated work per task, in milliseconds")]
    task_duration_ms: Option<u64>,

    #[clap(long)]
    #[clap(help = "Longest wait for the tasks after submitting them, in milliseconds")]
    grace_period_ms: Option<u64>,

    #[clap(long)]
    #[clap(help = "Longest wait for the pool to drain on shutdown, in milliseconds")]
    shutdown_timeout_ms: Option<u64>,

    #[clap(long)]
    #[clap(default_value_t = Level::INFO)]
    #[clap(help = "Maximum level of diagnostics written to stderr")]
    log_level: Level,
}

impl Args {
    // file settings first, flags override them
    fn into_config(self) -> Result<DispatchConfig> {
        let mut config = match &self.config {
            Some(path) => DispatchConfig::from_file(path)?,
            None => DispatchConfig::default(),
        };

        if let Some(capacity) = self.capacity {
            config.capacity = capacity;
        }
        if let Some(prefix) = self.prefix {
            config.name_prefix = prefix;
        }
        if let Some(tasks) = self.tasks {
            config.task_ids = tasks;
        }
        if let Some(ms) = self.task_duration_ms {
            config.task_duration_ms = ms;
        }
        if let Some(ms) = self.grace_period_ms {
            config.grace_period_ms = ms;
        }
        if let Some(ms) = self.shutdown_timeout_ms {
            config.shutdown_timeout_ms = ms;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() {
    let args = Args::parse();

    // set log collector
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(args.log_level)
        .init();

    info!("Application Started: Version {}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = args.into_config().and_then(|config| dispatch(&config)) {
        eprintln!("{}", e);
        exit(1);
    }
}

fn dispatch(config: &DispatchConfig) -> Result<()> {
    info!("Application use config: {:?}", config);
    let pool = SharedQueueThreadPool::start(config.capacity, &config.name_prefix)?;
    let dispatcher = TaskDispatcher::from_config(config, StdoutSink);

    println!("\n========== Starting Async Task Execution ==========\n");

    let batch = dispatcher.submit_all(&pool, &config.task_ids)?;

    println!("\n========== All tasks submitted ==========");
    println!("(Tasks will run asynchronously on thread pool)\n");

    let report = batch.wait(dispatcher.grace_period());
    info!(
        "{} of {} tasks finished within the grace period",
        report.finished, report.submitted
    );

    pool.shutdown(config.shutdown_timeout())?;

    println!("\n========== Async Task Execution Complete ==========\n");
    Ok(())
}
