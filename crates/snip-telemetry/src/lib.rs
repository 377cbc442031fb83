//! Process-wide logging setup.
//!
//! Call [`init`] once at startup. The filter is read from `RUST_LOG` and
//! falls back to [`DEFAULT_FILTER`]; records emitted through the `log` crate
//! by dependencies are forwarded into `tracing`.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt as layer_fmt, EnvFilter, Registry};

pub const DEFAULT_FILTER: &str = "info,snip=debug";

/// Output encoding of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable, one line per event.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(TelemetryError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => f.write_str("text"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("unknown log format '{0}', expected 'text' or 'json'")]
    UnknownFormat(String),
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
    #[error("failed to bridge log records: {0}")]
    LogBridge(#[from] tracing_log::log_tracer::SetLoggerError),
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber.
///
/// Fails if a subscriber or `log` logger is already installed.
pub fn init(format: LogFormat) -> Result<(), TelemetryError> {
    let (text, json) = match format {
        LogFormat::Text => (Some(layer_fmt::layer().with_target(true)), None),
        LogFormat::Json => (
            None,
            Some(layer_fmt::layer().json().with_current_span(true)),
        ),
    };

    let subscriber = Registry::default().with(filter()).with(text).with(json);
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;

    tracing::debug!(%format, "telemetry initialized");
    Ok(())
}
