//! Logging setup for the gateway service.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

use crate::error::{GateSrvError, Result};

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Enable console output.
    pub console: bool,
    /// Optional log file path; rotated daily.
    pub file: Option<String>,
    /// Enable ANSI colors in console output.
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: true,
            file: None,
            ansi: true,
        }
    }
}

fn env_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| GateSrvError::ConfigError(format!("Invalid log level: {}", e)))
}

/// Initialize logging with the given configuration.
///
/// Returns a guard that must be kept alive for file logging to work.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let mut layers = Vec::new();
    let mut guard = None;

    if config.console {
        let layer = fmt::layer()
            .compact()
            .with_ansi(config.ansi)
            .with_target(true)
            .with_filter(env_filter(&config.level)?)
            .boxed();
        layers.push(layer);
    }

    if let Some(file_path) = &config.file {
        let path = Path::new(file_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| GateSrvError::ConfigError(format!("Cannot create log dir: {}", e)))?;
        }

        let appender = tracing_appender::rolling::daily(
            path.parent().unwrap_or_else(|| Path::new(".")),
            path.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("gatesrv.log"),
        );
        let (writer, worker_guard) = tracing_appender::non_blocking(appender);
        guard = Some(worker_guard);

        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
            .with_filter(env_filter(&config.level)?)
            .boxed();
        layers.push(layer);
    }

    tracing_subscriber::registry().with(layers).init();
    Ok(guard)
}
