//! Logging configuration for fordconnect.
//!
//! Output always goes to stdout. When a log directory is configured a second,
//! plain-text layer writes to `fordconnect_YYYY-MM-DD.log` in that directory.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{Error, Result};

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Suppress all output except errors.
    Quiet,
    /// Normal output level (info and above).
    #[default]
    Normal,
    /// Verbose output (debug and above).
    Verbose,
    /// Very verbose output (trace level).
    Trace,
}

impl Verbosity {
    /// Convert verbosity to tracing level filter.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }
}

/// Path of today's log file inside `directory`.
#[must_use]
pub fn log_file_path(directory: &Path) -> PathBuf {
    let date = chrono::Local::now().format("%Y-%m-%d");
    directory.join(format!("fordconnect_{date}.log"))
}

/// Initialize the logging system.
///
/// The level comes from `verbosity` unless `RUST_LOG` is set. Returns the log
/// file path when `log_dir` is given.
///
/// # Errors
///
/// Returns an error if the log directory or file cannot be created.
///
/// # Examples
///
/// ```no_run
/// use fordconnect::{init_logging, logging::Verbosity};
///
/// // Console only
/// init_logging(Verbosity::Normal, None).unwrap();
/// ```
pub fn init_logging(verbosity: Verbosity, log_dir: Option<&Path>) -> Result<Option<PathBuf>> {
    let default_filter = format!("fordconnect={}", verbosity.to_level_filter());

    // Allow RUST_LOG to override
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));

    let log_file = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|source| Error::DirectoryCreate {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = log_file_path(dir);
            Some((File::create(&path)?, path))
        }
        None => None,
    };

    let (file_layer, log_path) = match log_file {
        Some((file, path)) => (
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            ),
            Some(path),
        ),
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .with(file_layer);

    // Install the subscriber (ignore error if already set)
    let _ = subscriber.try_init();

    if let Some(path) = &log_path {
        info!("Logging to file '{}'", path.display());
    }
    Ok(log_path)
}

/// Initialize logging for tests.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_to_level() {
        assert_eq!(Verbosity::Quiet.to_level_filter(), Level::ERROR);
        assert_eq!(Verbosity::Normal.to_level_filter(), Level::INFO);
        assert_eq!(Verbosity::Verbose.to_level_filter(), Level::DEBUG);
        assert_eq!(Verbosity::Trace.to_level_filter(), Level::TRACE);
    }

    #[test]
    fn test_verbosity_default() {
        assert_eq!(Verbosity::default(), Verbosity::Normal);
    }

    #[test]
    fn test_log_file_name() {
        let path = log_file_path(Path::new("/var/log/fordconnect"));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("fordconnect_"));
        assert!(name.ends_with(".log"));
        // fordconnect_YYYY-MM-DD.log
        assert_eq!(name.len(), "fordconnect_2021-03-22.log".len());
        assert_eq!(path.parent(), Some(Path::new("/var/log/fordconnect")));
    }

    #[test]
    fn test_init_logging_console_only() {
        let path = init_logging(Verbosity::Normal, None).unwrap();
        assert!(path.is_none());
    }

    #[test]
    fn test_init_logging_creates_log_file() {
        let dir = std::env::temp_dir().join(format!("fordconnect-logs-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let path = init_logging(Verbosity::Quiet, Some(&dir)).unwrap().unwrap();
        assert!(path.is_file());
        assert!(path.starts_with(&dir));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_init_test_logging_does_not_panic() {
        init_test_logging();
    }
}
