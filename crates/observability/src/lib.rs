//! Tracing setup for the agent-pulse binary.
//!
//! One stdout layer (compact or JSON) plus an optional daily-rolling log
//! file. `RUST_LOG` overrides the configured level.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// File name prefix of the rolling log file.
pub const LOG_FILE_NAME: &str = "agent-pulse.log";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format `{other}` (expected compact or json)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
    /// Directory for the rolling log file; `None` logs to stdout only.
    pub log_dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            log_dir: None,
        }
    }
}

/// Keeps the non-blocking file writer alive. Dropping it flushes pending
/// log lines.
pub struct LoggingGuard {
    _file: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Install the global subscriber.
pub fn init_tracing(config: &LogConfig) -> anyhow::Result<LoggingGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("invalid log level `{}`", config.level))?;

    let stdout_layer = match config.format {
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .boxed(),
    };

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let (writer, guard) = file_writer(dir)?;
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("global tracing subscriber already installed")?;

    tracing::info!(
        level = %config.level,
        format = ?config.format,
        log_dir = ?config.log_dir,
        "Logging initialized"
    );

    Ok(LoggingGuard { _file: guard })
}

fn file_writer(
    dir: &Path,
) -> anyhow::Result<(
    tracing_appender::non_blocking::NonBlocking,
    tracing_appender::non_blocking::WorkerGuard,
)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_NAME);
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!(" Compact ".parse::<LogFormat>(), Ok(LogFormat::Compact));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Compact);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_init_tracing_writes_rolling_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            level: "info".into(),
            format: LogFormat::Json,
            log_dir: Some(dir.path().join("logs")),
        };

        let guard = init_tracing(&config).unwrap();
        tracing::warn!(marker = "rolling-file-check", "hello from test");
        drop(guard);

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("logs"))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(LOG_FILE_NAME))
            .collect();
        assert_eq!(entries.len(), 1);

        let contents = std::fs::read_to_string(entries[0].path()).unwrap();
        assert!(contents.contains("rolling-file-check"));

        // A second install is rejected instead of panicking.
        assert!(init_tracing(&LogConfig::default()).is_err());
    }
}
