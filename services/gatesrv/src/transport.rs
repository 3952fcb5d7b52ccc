//! Pub/sub transport seam.
//!
//! The concrete socket layer lives outside this service. What crosses
//! the boundary here is the two-frame message shape — a topic string
//! plus a JSON payload — carried over async channels; a real
//! deployment plugs its subscriber/publisher loops onto the channel
//! ends.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{GateSrvError, Result};

/// Topic every driver-bound command is published under.
pub const DRIVER_TOPIC: &str = "tcp";

/// A two-frame pub/sub message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub topic: String,
    pub payload: String,
}

impl Frame {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// A frame headed for the Modbus driver.
    pub fn driver(payload: impl Into<String>) -> Self {
        Self::new(DRIVER_TOPIC, payload)
    }
}

/// Sink for commands headed to the Modbus driver.
#[async_trait]
pub trait DriverLink: Send + Sync {
    async fn send(&self, frame: Frame) -> Result<()>;
}

/// Channel-backed link used for in-process wiring and tests.
pub struct ChannelDriverLink {
    tx: mpsc::Sender<Frame>,
}

impl ChannelDriverLink {
    pub fn new(tx: mpsc::Sender<Frame>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl DriverLink for ChannelDriverLink {
    async fn send(&self, frame: Frame) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| GateSrvError::TransportError("driver channel closed".to_string()))
    }
}

/// Create a frame channel pair with the given capacity.
pub fn frame_channel(capacity: usize) -> (mpsc::Sender<Frame>, mpsc::Receiver<Frame>) {
    mpsc::channel(capacity)
}

/// Gateway-side ends of the four frame channels.
pub struct GatewayChannels {
    /// Commands headed to the driver.
    pub driver_commands: mpsc::Sender<Frame>,
    /// Responses coming back from the driver.
    pub driver_responses: mpsc::Receiver<Frame>,
    /// Inbound client requests.
    pub requests: mpsc::Receiver<Frame>,
    /// Outbound replies and poll results.
    pub replies: mpsc::Sender<Frame>,
}

/// Socket-side ends, consumed by the process's pub/sub loops: publish
/// from `driver_commands` and `replies`, feed subscribed traffic into
/// `driver_responses` and `requests`. Closing any of these shuts the
/// matching gateway loop down.
pub struct SocketChannels {
    pub driver_commands: mpsc::Receiver<Frame>,
    pub driver_responses: mpsc::Sender<Frame>,
    pub requests: mpsc::Sender<Frame>,
    pub replies: mpsc::Receiver<Frame>,
}

/// Create the four frame channels joining the gateway loops to the
/// socket layer.
pub fn channel_bundle(capacity: usize) -> (GatewayChannels, SocketChannels) {
    let (cmd_tx, cmd_rx) = mpsc::channel(capacity);
    let (res_tx, res_rx) = mpsc::channel(capacity);
    let (req_tx, req_rx) = mpsc::channel(capacity);
    let (rep_tx, rep_rx) = mpsc::channel(capacity);
    (
        GatewayChannels {
            driver_commands: cmd_tx,
            driver_responses: res_rx,
            requests: req_rx,
            replies: rep_tx,
        },
        SocketChannels {
            driver_commands: cmd_rx,
            driver_responses: res_tx,
            requests: req_tx,
            replies: rep_rx,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_link_delivers_frames() {
        let (tx, mut rx) = frame_channel(4);
        let link = ChannelDriverLink::new(tx);

        link.send(Frame::driver(r#"{"tid":"1"}"#)).await.unwrap();
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.topic, DRIVER_TOPIC);
        assert_eq!(frame.payload, r#"{"tid":"1"}"#);
    }

    #[tokio::test]
    async fn test_channel_bundle_connects_both_sides() {
        let (mut gateway, mut socket) = channel_bundle(4);

        socket
            .requests
            .send(Frame::new("once.read", "{}"))
            .await
            .unwrap();
        assert_eq!(gateway.requests.recv().await.unwrap().topic, "once.read");

        gateway
            .replies
            .send(Frame::new("once.read", "{}"))
            .await
            .unwrap();
        assert_eq!(socket.replies.recv().await.unwrap().topic, "once.read");

        gateway.driver_commands.send(Frame::driver("{}")).await.unwrap();
        assert_eq!(
            socket.driver_commands.recv().await.unwrap().topic,
            DRIVER_TOPIC
        );

        socket.driver_responses.send(Frame::driver("{}")).await.unwrap();
        assert!(gateway.driver_responses.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_closed_channel_is_transport_error() {
        let (tx, rx) = frame_channel(1);
        drop(rx);
        let link = ChannelDriverLink::new(tx);

        let err = link.send(Frame::driver("{}")).await.unwrap_err();
        assert!(matches!(err, GateSrvError::TransportError(_)));
    }
}
