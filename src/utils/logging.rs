//! Tracing setup for the router binary.
//!
//! Payment runs log to two sinks: a coloured console layer, and an hourly
//! rolled plain-text file under `output/logs/` that keeps event targets.

use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Rolled log files land here as `autopay-router.log.<yyyy-mm-dd-hh>`.
pub const LOG_DIR: &str = "output/logs";
/// Daily `executions_<yyyy-mm-dd>.jsonl` journals, one record per line.
pub const EXECUTIONS_DIR: &str = "output/executions";
pub const LOG_FILE: &str = "autopay-router.log";

/// Keeps the file writer's background thread alive; dropping it flushes
/// and stops file logging.
pub struct LoggingGuard {
    pub _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Installs the console and file layers. `RUST_LOG` narrows or widens the
/// default `info` level. RPC transport crates stay at `warn`.
pub fn setup_logging() -> Result<Arc<LoggingGuard>> {
    let file_appender = tracing_appender::rolling::hourly(LOG_DIR, LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_ansi(true)
                .with_level(true)
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_thread_ids(false)
                .with_level(true)
                .with_ansi(false)
                .compact()
        )
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse()?)
                .add_directive("hyper=warn".parse()?)
                .add_directive("alloy_transport_http=warn".parse()?)
        )
        .init();

    Ok(Arc::new(LoggingGuard { _guard: guard }))
}

/// Creates `output/logs` and `output/executions` before the first tick so
/// neither the appender nor the journal has to.
pub fn setup_output_directories() -> Result<()> {
    for dir in [LOG_DIR, EXECUTIONS_DIR] {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}
