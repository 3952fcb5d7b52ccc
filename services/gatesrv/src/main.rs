//! Gateway service binary.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use gatesrv::config::{self, GatewayConfig};
use gatesrv::logging;
use gatesrv::runtime;
use gatesrv::transport::{channel_bundle, ChannelDriverLink};
use gatesrv::Gateway;

#[derive(Parser, Debug)]
#[command(name = "gatesrv", about = "Modbus-TCP gateway service")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "GATESRV_CONFIG")]
    config: Option<String>,

    /// Override the configured log level
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config: GatewayConfig =
        config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(level) = args.log_level {
        config.log.level = level;
    }

    if args.validate {
        println!("configuration ok");
        return Ok(());
    }

    let _log_guard = logging::init_logging(&config.log).context("Failed to initialize logging")?;
    info!(
        downstream = %config.downstream_endpoint,
        upstream = %config.upstream_endpoint,
        timeout_ms = config.request_timeout_ms,
        "starting gateway"
    );

    let (channels, socket) = channel_bundle(config.frame_channel_capacity);
    let gateway = Arc::new(Gateway::new(
        Arc::new(ChannelDriverLink::new(channels.driver_commands)),
        &config,
    ));
    let handles = runtime::start(
        gateway,
        channels.requests,
        channels.replies,
        channels.driver_responses,
        &config,
    );

    // the pub/sub loops for the configured endpoints plug onto the
    // socket-side channel ends; held open until shutdown so the
    // gateway loops stay up
    let _socket = socket;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("shutdown signal received");
    for handle in handles {
        handle.abort();
    }
    Ok(())
}
