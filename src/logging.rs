//! Tracing setup for the command-line tool.
//!
//! Diagnostics go to stderr, filtered by the `FILETIDY_LOG` environment
//! variable (standard `EnvFilter` syntax). Without it the level is `warn`, or
//! `debug` with `--verbose`. `--log FILE` adds a plain-text file layer that
//! always records this crate at debug level.

use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

pub const LOG_ENV_VAR: &str = "FILETIDY_LOG";

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("cannot open log file {}: {reason}", path.display())]
    LogFile { path: PathBuf, reason: String },
    #[error("logging is already initialized: {0}")]
    AlreadyInitialized(String),
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "warn" }
}

fn stderr_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
}

fn file_appender(path: &Path) -> Result<RollingFileAppender, LoggingError> {
    let error = |reason: String| LoggingError::LogFile {
        path: path.to_path_buf(),
        reason,
    };
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| error("not a file name".to_string()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
        .map_err(|e| error(e.to_string()))
}

/// Installs the global subscriber.
///
/// The returned guard flushes the file layer on drop and must be held until
/// the program exits.
pub fn init_logger(verbose: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>, LoggingError> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(stderr_filter(verbose));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(path)?);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(EnvFilter::new("filetidy=debug"));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    tracing::debug!(verbose, log_file = ?log_file, "logging initialized");
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false), "warn");
        assert_eq!(default_directive(true), "debug");
    }

    #[test]
    fn test_file_appender_in_existing_dir() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("run.log");
        assert!(file_appender(&path).is_ok());
    }

    #[test]
    fn test_file_appender_rejects_directory_path() {
        assert!(matches!(
            file_appender(Path::new("/")),
            Err(LoggingError::LogFile { .. })
        ));
    }
}
