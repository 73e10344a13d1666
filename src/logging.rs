//! Tracing setup: stderr always, plus an append-only log file when one is configured.

use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{AppError, Result};

/// Installs the global subscriber. `RUST_LOG` overrides the configured level.
///
/// The returned guard flushes the file writer on drop and must live as long as logging is wanted.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let console = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file = config.file.as_deref().filter(|path| !path.as_os_str().is_empty());
    let (file_layer, guard) = match file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            let layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .init();
    Ok(guard)
}

/// Non-blocking writer appending to `path`, creating parent directories as needed.
fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let name = path
        .file_name()
        .ok_or_else(|| AppError::Config(format!("log file {} has no file name", path.display())))?;
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name.to_string_lossy())
        .build(dir)
        .map_err(|e| AppError::Config(format!("cannot open log file {}: {e}", path.display())))?;
    Ok(tracing_appender::non_blocking(appender))
}
