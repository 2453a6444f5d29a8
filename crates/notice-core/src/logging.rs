//! Tracing subscriber setup.
//!
//! Filtering follows `NOTICE_LOG` (same syntax as `RUST_LOG`), defaulting to
//! `warn`. Output goes to stderr, or to `${NOTICE_HOME}/logs/notice.log` when
//! file logging is enabled. Stdout is left alone for the rendered notice.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const LOG_ENV: &str = "NOTICE_LOG";
pub const LOG_FILE_NAME: &str = "notice.log";
const DEFAULT_FILTER: &str = "warn";

/// Where log output should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    /// Append to `notice.log` inside this directory.
    File(PathBuf),
}

/// Keeps the background file writer alive; drop it last to flush.
#[must_use]
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Installs the global subscriber.
///
/// # Errors
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init(target: &LogTarget) -> Result<LogGuard> {
    let filter = build_filter(std::env::var(LOG_ENV).ok().as_deref());

    match target {
        LogTarget::Stderr => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .try_init()
                .context("install log subscriber")?;
            Ok(LogGuard { _file_guard: None })
        }
        LogTarget::File(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .try_init()
                .context("install log subscriber")?;

            tracing::debug!(path = %log_file_path(dir).display(), "file logging enabled");
            Ok(LogGuard {
                _file_guard: Some(guard),
            })
        }
    }
}

/// Path of the log file inside `dir`.
pub fn log_file_path(dir: &Path) -> PathBuf {
    dir.join(LOG_FILE_NAME)
}

/// Parses `directives`, falling back to the default filter when they are
/// missing or invalid.
fn build_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_defaults_to_warn() {
        assert_eq!(build_filter(None).to_string(), "warn");
        assert_eq!(build_filter(Some("  ")).to_string(), "warn");
    }

    #[test]
    fn test_filter_uses_directives() {
        assert_eq!(
            build_filter(Some("notice_core=debug")).to_string(),
            "notice_core=debug"
        );
    }

    #[test]
    fn test_log_file_path() {
        assert_eq!(
            log_file_path(Path::new("/tmp/notice/logs")),
            PathBuf::from("/tmp/notice/logs/notice.log")
        );
    }
}
