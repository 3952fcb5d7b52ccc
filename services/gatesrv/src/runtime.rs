//! Background task wiring.
//!
//! Spawns the loops the running service is made of: upstream request
//! dispatch, driver response correlation, the timeout sweeper and the
//! poll result publisher. The returned handles let the caller abort
//! everything on shutdown.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{info, warn};

use mbgate_wire::downstream::DriverRes;
use mbgate_wire::upstream::method;

use crate::config::GatewayConfig;
use crate::correlator;
use crate::dispatcher::Gateway;
use crate::transport::Frame;

/// Start every background loop of the gateway.
pub fn start(
    gateway: Arc<Gateway>,
    requests: mpsc::Receiver<Frame>,
    replies: mpsc::Sender<Frame>,
    driver_responses: mpsc::Receiver<Frame>,
    config: &GatewayConfig,
) -> Vec<JoinHandle<()>> {
    vec![
        spawn_request_loop(gateway.clone(), requests, replies.clone()),
        spawn_response_loop(gateway.clone(), driver_responses),
        correlator::spawn_sweeper(
            gateway.pending(),
            Duration::from_millis(config.sweep_interval_ms),
        ),
        spawn_poll_publisher(gateway.polls().subscribe(), replies),
    ]
}

/// Requests run concurrently; a slow driver round trip must not stall
/// the intake of the next frame.
fn spawn_request_loop(
    gateway: Arc<Gateway>,
    mut requests: mpsc::Receiver<Frame>,
    replies: mpsc::Sender<Frame>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = requests.recv().await {
            let gateway = gateway.clone();
            let replies = replies.clone();
            tokio::spawn(async move {
                let reply = gateway.dispatch(&frame).await;
                if replies.send(reply).await.is_err() {
                    warn!("upstream reply channel closed");
                }
            });
        }
        info!("upstream request channel closed, dispatch loop exiting");
    })
}

fn spawn_response_loop(
    gateway: Arc<Gateway>,
    mut responses: mpsc::Receiver<Frame>,
) -> JoinHandle<()> {
    let pending = gateway.pending();
    tokio::spawn(async move {
        while let Some(frame) = responses.recv().await {
            match serde_json::from_str::<DriverRes>(&frame.payload) {
                Ok(res) => pending.resolve(res),
                Err(err) => warn!(error = %err, "discarding unparseable driver response"),
            }
        }
        info!("driver response channel closed, correlation loop exiting");
    })
}

fn spawn_poll_publisher(
    mut results: broadcast::Receiver<mbgate_wire::upstream::PollData>,
    replies: mpsc::Sender<Frame>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match results.recv().await {
                Ok(data) => {
                    let payload = match serde_json::to_string(&data) {
                        Ok(payload) => payload,
                        Err(err) => {
                            warn!(error = %err, "failed to serialize poll result");
                            continue;
                        }
                    };
                    if replies.send(Frame::new(method::POLL_DATA, payload)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "poll publisher lagged, results dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        info!("poll result stream closed, publisher exiting");
    })
}
