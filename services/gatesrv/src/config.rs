//! Service configuration.
//!
//! Loaded from defaults, an optional TOML file and `GATESRV_` prefixed
//! environment variables, highest priority last.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{GateSrvError, Result};
use crate::logging::LogConfig;

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Pub/sub endpoint the gateway publishes driver commands on.
    pub downstream_endpoint: String,
    /// Pub/sub endpoint the gateway receives driver responses on.
    pub upstream_endpoint: String,
    /// Per-request deadline for one-shot commands, in milliseconds.
    pub request_timeout_ms: u64,
    /// Tick of the pending-table timeout sweep, in milliseconds.
    pub sweep_interval_ms: u64,
    /// Capacity of the poll-result fan-out channel.
    pub poll_channel_capacity: usize,
    /// Capacity of the transport frame channels.
    pub frame_channel_capacity: usize,
    /// Logging configuration.
    pub log: LogConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            downstream_endpoint: "ipc:///tmp/to.modbus".to_string(),
            upstream_endpoint: "ipc:///tmp/from.modbus".to_string(),
            request_timeout_ms: 30_000,
            sweep_interval_ms: 100,
            poll_channel_capacity: 64,
            frame_channel_capacity: 256,
            log: LogConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(GateSrvError::ConfigError(
                "request_timeout_ms must be positive".to_string(),
            ));
        }
        if self.sweep_interval_ms == 0 {
            return Err(GateSrvError::ConfigError(
                "sweep_interval_ms must be positive".to_string(),
            ));
        }
        if self.poll_channel_capacity == 0 || self.frame_channel_capacity == 0 {
            return Err(GateSrvError::ConfigError(
                "channel capacities must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration from defaults, an optional file and environment.
pub fn load(path: Option<&str>) -> Result<GatewayConfig> {
    let mut figment = Figment::from(Serialized::defaults(GatewayConfig::default()));
    if let Some(path) = path {
        figment = figment.merge(Toml::file(path));
    }
    let config: GatewayConfig = figment
        .merge(Env::prefixed("GATESRV_").split("__"))
        .extract()
        .map_err(|e| GateSrvError::ConfigError(format!("Failed to load configuration: {}", e)))?;
    config.validate()?;
    Ok(config)
}
