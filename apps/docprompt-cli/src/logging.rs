//! Logging initialization.
//!
//! Human-readable tracing output always goes to stderr so that rendered
//! prompts on stdout stay machine-readable. With `--log-file`, a JSON layer
//! is added that writes to the given path.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Initialize the tracing subscriber with stderr output.
///
/// When `log_file` is `Some`, an additional JSON file layer is added.
///
/// Returns an optional [`WorkerGuard`] that must be held for the
/// lifetime of the program to ensure all buffered logs are flushed.
///
/// # Errors
///
/// Returns an error if the log file or its directory cannot be created.
pub fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    if let Some((subscriber, guard)) = build_tracing(log_file)? {
        subscriber.init();
        Ok(Some(guard))
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(EnvFilter::from_default_env())
            .init();
        Ok(None)
    }
}

/// Build the dual-layer subscriber without registering it globally.
///
/// Returns `None` when no log file is requested.
fn build_tracing(
    log_file: Option<&Path>,
) -> Result<Option<(impl tracing::Subscriber + Send + Sync + use<>, WorkerGuard)>> {
    let Some(log_file) = log_file else {
        return Ok(None);
    };

    let (non_blocking, guard) = open_log_writer(log_file)?;

    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(EnvFilter::from_default_env()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::from_default_env()),
        );

    Ok(Some((subscriber, guard)))
}

/// Create the log file (and its parent directory), returning a non-blocking
/// writer and its guard.
fn open_log_writer(
    log_file: &Path,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    if let Some(dir) = log_file.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory: {}", dir.display()))?;
    }

    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("failed to open log file: {}", log_file.display()))?;

    Ok(tracing_appender::non_blocking(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_create_log_dir_and_file() {
        let tmp = tempfile::tempdir().unwrap();
        let log_file = tmp.path().join("logs").join("docprompt.log");

        let (_non_blocking, _guard) = open_log_writer(&log_file).unwrap();

        assert!(log_file.parent().unwrap().is_dir(), "log directory should be created");
        assert!(log_file.is_file(), "log file should be created");
    }

    #[test]
    fn test_should_append_to_existing_log_file() {
        let tmp = tempfile::tempdir().unwrap();
        let log_file = tmp.path().join("docprompt.log");
        fs::write(&log_file, "previous run\n").unwrap();

        let (_non_blocking, _guard) = open_log_writer(&log_file).unwrap();

        let content = fs::read_to_string(&log_file).unwrap();
        assert!(content.starts_with("previous run"), "existing logs should be kept");
    }

    #[test]
    fn test_should_return_error_for_invalid_log_path() {
        // A directory cannot be created under /dev/null.
        let result = open_log_writer(Path::new("/dev/null/logs/docprompt.log"));
        assert!(result.is_err(), "should fail when directory cannot be created");
    }

    #[test]
    fn test_should_return_none_guard_without_log_file() {
        let result = build_tracing(None).unwrap();
        assert!(result.is_none(), "should return None when no log file is given");
    }
}
