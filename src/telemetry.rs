//! Process-wide logging
//!
//! [`init`] installs one subscriber for the whole process: human-readable
//! output on stderr plus a plain-text copy in `{log_dir}/run_{timestamp}.log`.
//! The returned [`LogSession`] is held by `main` and closed on shutdown.

use crate::error::{Error, Result};
use chrono::{DateTime, Local};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Filter used when `RUST_LOG` is unset or invalid
pub const DEFAULT_FILTER: &str = "info";

/// Handle on the installed log sinks
#[derive(Debug)]
pub struct LogSession {
    path: PathBuf,
    file: Arc<File>,
}

impl LogSession {
    /// Path of this run's log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush the log file and close the session
    pub fn finish(self) {
        tracing::info!(log_file = %self.path.display(), "closing log session");
        if let Err(e) = (&*self.file).flush().and_then(|()| self.file.sync_all()) {
            eprintln!("failed to flush log file {}: {}", self.path.display(), e);
        }
    }
}

/// Install the global subscriber and open the run log file
///
/// Fails if `log_dir` cannot be created or a subscriber is already installed.
pub fn init(log_dir: &Path) -> Result<LogSession> {
    let (path, file) = create_log_file(log_dir, Local::now())?;
    let file = Arc::new(file);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(file.clone()),
        )
        .try_init()
        .map_err(|e| {
            let reason = format!("failed to install logger: {e}");
            Error::Io(std::io::Error::other(reason))
        })?;

    tracing::info!(log_file = %path.display(), "log session started");
    Ok(LogSession { path, file })
}

/// File name of the log for a run started at `started`
pub fn log_file_name(started: DateTime<Local>) -> String {
    format!("run_{}.log", started.format("%Y-%m-%d_%H-%M-%S"))
}

fn create_log_file(log_dir: &Path, started: DateTime<Local>) -> Result<(PathBuf, File)> {
    std::fs::create_dir_all(log_dir).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!(
                "Failed to create log directory '{}': {}",
                log_dir.display(),
                e
            ),
        ))
    })?;

    let path = log_dir.join(log_file_name(started));
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to open log file '{}': {}", path.display(), e),
            ))
        })?;
    Ok((path, file))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn log_file_name_uses_local_timestamp() {
        let started = Local.with_ymd_and_hms(2025, 1, 31, 23, 5, 9).unwrap();
        assert_eq!(log_file_name(started), "run_2025-01-31_23-05-09.log");
    }

    #[test]
    fn log_directory_is_created() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("nested").join("logs");
        let started = Local.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();

        let (path, _file) = create_log_file(&dir, started).unwrap();

        assert_eq!(path, dir.join("run_2025-06-01_08-00-00.log"));
        assert!(path.exists());
    }

    #[test]
    fn existing_log_file_is_appended() {
        let temp = tempdir().unwrap();
        let started = Local.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        let (path, mut file) = create_log_file(temp.path(), started).unwrap();
        writeln!(file, "first").unwrap();
        drop(file);

        let (_, mut again) = create_log_file(temp.path(), started).unwrap();
        writeln!(again, "second").unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn unusable_log_directory_is_an_io_error() {
        let temp = tempdir().unwrap();
        let blocker = temp.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let err = create_log_file(&blocker.join("logs"), Local::now()).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
