//! Tracing subscriber for the coachrs binary
//!
//! Engine events go to stderr so `--json` results on stdout stay parseable. When
//! `file` is set, a JSON copy of every event is appended to a daily rolling file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILE: &str = "coachrs.log";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Daily rolling JSON log; the date is appended to the file name
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Level for a `-v` count. Without flags only fallbacks and failures show.
    pub fn from_verbosity(count: u8) -> Self {
        match count {
            0 => LogLevel::Warn,
            1 => LogLevel::Info,
            2 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

/// Filter used when `RUST_LOG` is unset. HTTP client internals stay at warn so
/// generator calls do not drown out engine events.
pub fn default_filter(level: LogLevel) -> String {
    format!(
        "coachrs={},reqwest=warn,hyper=warn,hyper_util=warn",
        level.as_directive()
    )
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(config.level)));

    let console = fmt::layer().with_writer(std::io::stderr);
    let console = match config.format {
        LogFormat::Pretty => console.pretty().with_target(false).boxed(),
        LogFormat::Json => console.json().with_current_span(true).boxed(),
        LogFormat::Compact => console.compact().boxed(),
    };

    let file = match &config.file {
        Some(path) => {
            let directory = path.parent().unwrap_or_else(|| Path::new("."));
            fs::create_dir_all(directory)?;
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(DEFAULT_LOG_FILE);
            let appender = tracing_appender::rolling::daily(directory, name);
            Some(fmt::layer().json().with_writer(appender).with_current_span(true))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()?;

    tracing::debug!(level = ?config.level, format = ?config.format, file = ?config.file, "Logging initialized");
    Ok(())
}
