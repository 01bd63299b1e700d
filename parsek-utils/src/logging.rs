//! Logging setup for parsek binaries
//!
//! Everything logs through `tracing`; this module only installs the global
//! subscriber. The filter comes from `PARSEK_LOG` (EnvFilter syntax) and
//! output goes to stderr, a log file under the state directory, or both.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing_subscriber::fmt::{self, format::FmtSpan};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::{paths, ParsekError, Result};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "PARSEK_LOG";

/// File name used under [`paths::log_dir`]
pub const LOG_FILE_NAME: &str = "parsek.log";

/// Where log lines go and how much detail they carry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// EnvFilter directives, e.g. `info` or `parsek_config=debug`
    pub filter: String,
    pub stderr: bool,
    /// Append plain-text logs to this file
    pub file: Option<PathBuf>,
    /// Log span enter/exit
    pub span_events: bool,
    /// Include source file and line
    pub source_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
            stderr: true,
            file: None,
            span_events: false,
            source_location: false,
        }
    }
}

impl LogConfig {
    /// Long-running host: stderr plus `parsek.log` in the state directory
    pub fn host() -> Self {
        Self {
            filter: filter_from_env("info"),
            file: Some(paths::log_dir().join(LOG_FILE_NAME)),
            source_location: true,
            ..Self::default()
        }
    }

    /// One-shot commands: warnings and errors on stderr only
    pub fn cli() -> Self {
        Self {
            filter: filter_from_env("warn"),
            ..Self::default()
        }
    }

    /// Everything at debug level on stderr
    pub fn development() -> Self {
        Self {
            filter: "debug".into(),
            span_events: true,
            source_location: true,
            ..Self::default()
        }
    }
}

fn filter_from_env(fallback: &str) -> String {
    std::env::var(LOG_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// Install the global subscriber described by `config`.
///
/// Fails on an invalid filter, an unopenable log file, or when a subscriber
/// is already installed.
pub fn init_logging_with_config(config: LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| ParsekError::config(format!("Invalid log filter: {}", e)))?;

    let span_events = if config.span_events {
        FmtSpan::ENTER | FmtSpan::EXIT
    } else {
        FmtSpan::NONE
    };

    let stderr_layer = config.stderr.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(span_events.clone())
            .with_file(config.source_location)
            .with_line_number(config.source_location)
    });

    let file_layer = match &config.file {
        Some(path) => Some(
            fmt::layer()
                .with_writer(Arc::new(open_log_file(path)?))
                .with_ansi(false)
                .with_span_events(span_events)
                .with_file(config.source_location)
                .with_line_number(config.source_location),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ParsekError::internal(format!("Failed to init logging: {}", e)))
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        paths::ensure_dir(dir).map_err(|e| ParsekError::FileWrite {
            path: dir.to_path_buf(),
            source: e,
        })?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ParsekError::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })
}
