use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::error::AppError;

const LOG_FILE_PREFIX: &str = "smiling";
const MAX_LOG_FILES: usize = 10;
const TIME_FORMAT: &str = "[%Y-%m-%d %H:%M:%S]";

/// Install the global subscriber.
///
/// Verbose runs log at debug level to stderr; otherwise info and above go to
/// a daily rolling file under `log_dir`. Keep the returned guard alive until
/// exit so buffered lines are flushed.
pub fn init_logging(verbose: bool, log_dir: &Path) -> Result<Option<WorkerGuard>, AppError> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    if verbose {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_timer(ChronoLocal::new(TIME_FORMAT.to_owned()))
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init()
            .map_err(|e| AppError::Initialization(e.to_string()))?;
        return Ok(None);
    }

    std::fs::create_dir_all(log_dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(log_dir)
        .map_err(|e| AppError::Initialization(e.to_string()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_timer(ChronoLocal::new(TIME_FORMAT.to_owned()))
                .with_writer(writer),
        )
        .with(filter)
        .try_init()
        .map_err(|e| AppError::Initialization(e.to_string()))?;
    Ok(Some(guard))
}
