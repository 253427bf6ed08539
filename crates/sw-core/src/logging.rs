//! Subscriber setup. Called once from `main`; library code only emits
//! `tracing` events.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create log directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid log path: {0}")]
    BadPath(PathBuf),
    #[error("failed to install subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global subscriber writing to the configured log file.
///
/// `RUST_LOG` overrides the configured level. Keep the returned guard alive
/// for the life of the process or buffered lines are lost.
pub fn init(config: &LoggingConfig) -> Result<WorkerGuard, LoggingError> {
    let path = config.resolve_path();
    let (dir, file_name) = split_log_path(&path)?;
    std::fs::create_dir_all(dir)?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter_for(&config.level))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init()?;

    Ok(guard)
}

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn split_log_path(path: &Path) -> Result<(&Path, &std::ffi::OsStr), LoggingError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        Some(_) => Path::new("."),
        None => return Err(LoggingError::BadPath(path.to_path_buf())),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| LoggingError::BadPath(path.to_path_buf()))?;
    Ok((dir, file_name))
}
