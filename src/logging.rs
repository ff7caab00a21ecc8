//! Log output for the daemon.
//!
//! Two sinks: a daily rolling file and stderr. Stdout stays free for the
//! terminal login prompts and the QR code.

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,cmdgate=debug";
const LOG_FILE: &str = "cmdgate.log";

/// Line format of the log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    /// One JSON object per event, for log shippers
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "plain" => Some(LogFormat::Text),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Where and how to write the log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    pub dir: PathBuf,
    pub format: LogFormat,
}

impl LogOptions {
    /// Read `CMDGATE_LOG_DIR` and `CMDGATE_LOG_FORMAT`.
    ///
    /// Runs before the CLI is parsed, so these are plain environment
    /// variables (a `.env` file counts).
    pub fn from_env() -> Result<Self> {
        Self::resolve(
            std::env::var_os("CMDGATE_LOG_DIR").map(PathBuf::from),
            std::env::var("CMDGATE_LOG_FORMAT").ok().as_deref(),
        )
    }

    fn resolve(dir: Option<PathBuf>, format: Option<&str>) -> Result<Self> {
        let dir = match dir {
            Some(dir) => dir,
            None => default_log_dir()?,
        };
        let format = match format {
            None => LogFormat::Text,
            Some(value) => LogFormat::parse(value)
                .ok_or_else(|| anyhow!("Unknown log format '{}': expected text or json", value))?,
        };
        Ok(Self { dir, format })
    }
}

/// Install the file and stderr layers.
///
/// The returned guard flushes the file writer on drop; hold it until exit.
pub fn init() -> Result<(WorkerGuard, PathBuf)> {
    let options = LogOptions::from_env()?;
    let guard = init_with(&options)?;
    Ok((guard, options.dir))
}

fn init_with(options: &LogOptions) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&options.dir)?;
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&options.dir, LOG_FILE));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (json_file, text_file) = match options.format {
        LogFormat::Json => (
            Some(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_writer(writer),
            ),
            None,
        ),
        LogFormat::Text => (
            None,
            Some(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_file)
        .with(text_file)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .map_err(|e| anyhow!("Logging already initialized: {}", e))?;

    tracing::debug!(
        "Writing {:?} logs to {}",
        options.format,
        options.dir.join(LOG_FILE).display()
    );
    Ok(guard)
}

fn default_log_dir() -> Result<PathBuf> {
    directories::ProjectDirs::from("com", "cmdgate", "cmdgate")
        .map(|dirs| dirs.data_dir().join("logs"))
        .ok_or_else(|| anyhow!("Could not determine data directory; set CMDGATE_LOG_DIR"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_dir_and_format() {
        let options = LogOptions::resolve(Some(PathBuf::from("/var/log/cmdgate")), Some("JSON")).unwrap();
        assert_eq!(options.dir, PathBuf::from("/var/log/cmdgate"));
        assert_eq!(options.format, LogFormat::Json);
    }

    #[test]
    fn test_format_defaults_to_text() {
        let options = LogOptions::resolve(Some(PathBuf::from("logs")), None).unwrap();
        assert_eq!(options.format, LogFormat::Text);
        assert!(LogOptions::resolve(Some(PathBuf::from("logs")), Some("xml")).is_err());
    }
}
