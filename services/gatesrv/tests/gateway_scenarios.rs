//! End-to-end scenarios against a simulated Modbus driver.
//!
//! The full task wiring runs as in production; only the driver process
//! is replaced by an in-memory register/coil image answering on the
//! same two-frame wire.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

use gatesrv::config::GatewayConfig;
use gatesrv::runtime;
use gatesrv::transport::{channel_bundle, ChannelDriverLink, Frame, DRIVER_TOPIC};
use gatesrv::Gateway;
use mbgate_wire::upstream::method;

#[derive(Default)]
struct DeviceImage {
    registers: HashMap<u16, u16>,
    coils: HashMap<u16, u16>,
    timeout_us: i64,
}

type SharedImage = Arc<Mutex<DeviceImage>>;

/// Answer driver commands out of the in-memory image.
fn spawn_driver(
    mut commands: mpsc::Receiver<Frame>,
    responses: mpsc::Sender<Frame>,
    image: SharedImage,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = commands.recv().await {
            assert_eq!(frame.topic, DRIVER_TOPIC);
            let cmd: Value = serde_json::from_str(&frame.payload).unwrap();
            let tid = cmd["tid"].as_str().unwrap();
            let code = cmd["cmd"].as_u64().unwrap();
            let addr = cmd["addr"].as_u64().unwrap_or(0) as u16;
            let len = cmd["len"].as_u64().unwrap_or(1) as u16;

            let res = {
                let mut image = image.lock().unwrap();
                let mut res = json!({"tid": tid, "status": "ok"});
                match code {
                    1 | 2 => {
                        let bits: Vec<u16> = (addr..addr + len)
                            .map(|a| *image.coils.get(&a).unwrap_or(&0))
                            .collect();
                        res["data"] = json!(bits);
                    }
                    3 | 4 => {
                        let words: Vec<u16> = (addr..addr + len)
                            .map(|a| *image.registers.get(&a).unwrap_or(&0))
                            .collect();
                        res["data"] = json!(words);
                    }
                    5 => {
                        let bit = u16::from(cmd["data"].as_u64().unwrap() != 0);
                        image.coils.insert(addr, bit);
                    }
                    6 => {
                        image.registers.insert(addr, cmd["data"].as_u64().unwrap() as u16);
                    }
                    15 => {
                        for (i, bit) in cmd["data"].as_array().unwrap().iter().enumerate() {
                            image
                                .coils
                                .insert(addr + i as u16, u16::from(bit.as_u64().unwrap() != 0));
                        }
                    }
                    16 => {
                        for (i, word) in cmd["data"].as_array().unwrap().iter().enumerate() {
                            image
                                .registers
                                .insert(addr + i as u16, word.as_u64().unwrap() as u16);
                        }
                    }
                    50 => {
                        image.timeout_us = cmd["timeout"].as_i64().unwrap();
                    }
                    51 => {
                        res["timeout"] = json!(image.timeout_us);
                    }
                    other => panic!("fake driver got unsupported cmd {}", other),
                }
                res
            };
            responses
                .send(Frame::driver(res.to_string()))
                .await
                .unwrap();
        }
    })
}

struct Harness {
    gateway: Arc<Gateway>,
    requests: mpsc::Sender<Frame>,
    replies: mpsc::Receiver<Frame>,
    handles: Vec<JoinHandle<()>>,
}

impl Harness {
    /// Full wiring with the image-backed driver attached.
    fn with_driver(config: GatewayConfig, image: SharedImage) -> Self {
        let (mut harness, cmd_rx, res_tx) = Self::bare(config);
        harness.handles.push(spawn_driver(cmd_rx, res_tx, image));
        harness
    }

    /// Wiring with the driver side left to the test.
    fn bare(config: GatewayConfig) -> (Self, mpsc::Receiver<Frame>, mpsc::Sender<Frame>) {
        let (channels, socket) = channel_bundle(config.frame_channel_capacity);
        let gateway = Arc::new(Gateway::new(
            Arc::new(ChannelDriverLink::new(channels.driver_commands)),
            &config,
        ));
        let handles = runtime::start(
            gateway.clone(),
            channels.requests,
            channels.replies,
            channels.driver_responses,
            &config,
        );
        let harness = Self {
            gateway,
            requests: socket.requests,
            replies: socket.replies,
            handles,
        };
        (harness, socket.driver_commands, socket.driver_responses)
    }

    /// Send one request and await its reply, skipping interleaved poll
    /// results.
    async fn call(&mut self, method: &str, payload: Value) -> Value {
        self.requests
            .send(Frame::new(method, payload.to_string()))
            .await
            .unwrap();
        loop {
            let frame = self.next_frame().await;
            if frame.topic == method {
                return serde_json::from_str(&frame.payload).unwrap();
            }
            assert_eq!(frame.topic, method::POLL_DATA, "unexpected reply topic");
        }
    }

    async fn next_frame(&mut self) -> Frame {
        timeout(Duration::from_secs(5), self.replies.recv())
            .await
            .expect("timed out waiting for a reply frame")
            .expect("reply channel closed")
    }

    async fn next_poll_data(&mut self) -> Value {
        loop {
            let frame = self.next_frame().await;
            if frame.topic == method::POLL_DATA {
                return serde_json::from_str(&frame.payload).unwrap();
            }
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

fn fast_config() -> GatewayConfig {
    GatewayConfig {
        request_timeout_ms: 100,
        sweep_interval_ms: 20,
        ..GatewayConfig::default()
    }
}

#[tokio::test]
async fn test_write_register_then_read_back() {
    let image = SharedImage::default();
    let mut harness = Harness::with_driver(GatewayConfig::default(), image);

    let ack = harness
        .call(
            method::ONCE_WRITE,
            json!({"tid": 1, "fc": 6, "ip": "127.0.0.1", "slave": 1, "addr": 10, "data": 60000}),
        )
        .await;
    assert_eq!(ack, json!({"tid": 1, "status": "ok"}));

    let res = harness
        .call(
            method::ONCE_READ,
            json!({"tid": 2, "fc": 3, "ip": "127.0.0.1", "slave": 1, "addr": 10, "len": 1}),
        )
        .await;
    assert_eq!(res["status"], "ok");
    assert_eq!(res["data"], json!([60000]));
}

#[tokio::test]
async fn test_write_coils_then_read_back() {
    let image = SharedImage::default();
    let mut harness = Harness::with_driver(GatewayConfig::default(), image);

    let pattern = json!([1, 0, 1, 1, 0, 0, 1, 1, 1, 0]);
    let ack = harness
        .call(
            method::ONCE_WRITE,
            json!({
                "tid": 1, "fc": 15, "ip": "127.0.0.1", "slave": 1,
                "addr": 100, "len": 10, "data": pattern
            }),
        )
        .await;
    assert_eq!(ack["status"], "ok");

    let res = harness
        .call(
            method::ONCE_READ,
            json!({"tid": 2, "fc": 1, "ip": "127.0.0.1", "slave": 1, "addr": 100, "len": 10}),
        )
        .await;
    assert_eq!(res["data"], pattern);
    // coil reads never carry a type or byte echo
    assert!(res.get("type").is_none());
    assert!(res.get("bytes").is_none());

    // flip one coil with the single-coil code and read it back
    let ack = harness
        .call(
            method::ONCE_WRITE,
            json!({"tid": 3, "fc": 5, "ip": "127.0.0.1", "slave": 1, "addr": 110, "data": 1}),
        )
        .await;
    assert_eq!(ack["status"], "ok");

    let res = harness
        .call(
            method::ONCE_READ,
            json!({"tid": 4, "fc": 1, "ip": "127.0.0.1", "slave": 1, "addr": 110}),
        )
        .await;
    assert_eq!(res["data"], json!([1]));
}

#[tokio::test]
async fn test_typed_read_decodes_and_echoes_bytes() {
    let image = SharedImage::default();
    {
        let mut image = image.lock().unwrap();
        image.registers.insert(0, 0x1234);
        image.registers.insert(1, 0x5678);
    }
    let mut harness = Harness::with_driver(GatewayConfig::default(), image);

    let res = harness
        .call(
            method::ONCE_READ,
            json!({
                "tid": 3, "fc": 3, "ip": "127.0.0.1", "slave": 1,
                "addr": 0, "len": 2, "type": "uint32", "order": "ABCD"
            }),
        )
        .await;
    assert_eq!(res["status"], "ok");
    assert_eq!(res["type"], "uint32");
    assert_eq!(res["data"], json!([0x1234_5678_u32]));
    assert_eq!(res["bytes"], json!([0x12, 0x34, 0x56, 0x78]));
}

#[tokio::test]
async fn test_scale_read() {
    let image = SharedImage::default();
    image.lock().unwrap().registers.insert(5, 0);
    let mut harness = Harness::with_driver(GatewayConfig::default(), image);

    let res = harness
        .call(
            method::ONCE_READ,
            json!({
                "tid": 4, "fc": 3, "ip": "127.0.0.1", "slave": 1, "addr": 5,
                "type": "scale", "range": {"a": -100, "b": 100, "c": 0, "d": 1000}
            }),
        )
        .await;
    assert_eq!(res["data"], json!([500.0]));
}

#[tokio::test]
async fn test_timeout_set_then_get() {
    let image = SharedImage::default();
    let mut harness = Harness::with_driver(GatewayConfig::default(), image);

    let res = harness
        .call(method::TIMEOUT_SET, json!({"tid": 1, "timeout": 212_000}))
        .await;
    assert_eq!(res["status"], "ok");

    let res = harness.call(method::TIMEOUT_GET, json!({"tid": 2})).await;
    assert_eq!(res["timeout"], 212_000);
}

#[tokio::test]
async fn test_silent_driver_times_out_and_late_reply_is_discarded() {
    let (mut harness, mut cmd_rx, res_tx) = Harness::bare(fast_config());

    harness
        .requests
        .send(Frame::new(
            method::ONCE_READ,
            json!({"tid": 9, "fc": 3, "ip": "127.0.0.1", "slave": 1, "addr": 0}).to_string(),
        ))
        .await
        .unwrap();

    // swallow the command, never answer
    let cmd = cmd_rx.recv().await.unwrap();
    let tid = serde_json::from_str::<Value>(&cmd.payload).unwrap()["tid"]
        .as_str()
        .unwrap()
        .to_string();

    let frame = harness.next_frame().await;
    let body: Value = serde_json::from_str(&frame.payload).unwrap();
    assert_eq!(body["tid"], 9);
    assert!(body["status"].as_str().unwrap().contains("timed out"));
    assert!(harness.gateway.pending().is_empty());

    // the reply arriving after the deadline is dropped without a trace
    res_tx
        .send(Frame::driver(
            json!({"tid": tid, "status": "ok", "data": [1]}).to_string(),
        ))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(harness.gateway.pending().is_empty());
    assert!(
        timeout(Duration::from_millis(50), harness.replies.recv())
            .await
            .is_err(),
        "late reply must not produce an upstream frame"
    );
}

#[tokio::test]
async fn test_poll_lifecycle() {
    let image = SharedImage::default();
    image.lock().unwrap().registers.insert(0, 7);
    let mut harness = Harness::with_driver(GatewayConfig::default(), image);

    let ack = harness
        .call(
            method::POLL_CREATE,
            json!({
                "tid": 1, "name": "meter", "interval": 50,
                "fc": 3, "ip": "127.0.0.1", "slave": 1, "addr": 0
            }),
        )
        .await;
    assert_eq!(ack["status"], "ok");

    let first = harness.next_poll_data().await;
    let second = harness.next_poll_data().await;
    assert_eq!(first["name"], "meter");
    assert_eq!(first["status"], "ok");
    assert_eq!(first["data"], json!([7]));
    assert!(second["timestamp"].as_i64() >= first["timestamp"].as_i64());

    let dup = harness
        .call(
            method::POLL_CREATE,
            json!({
                "tid": 2, "name": "meter", "interval": 50,
                "fc": 3, "ip": "127.0.0.1", "slave": 1, "addr": 0
            }),
        )
        .await;
    assert!(dup["status"].as_str().unwrap().contains("Duplicate"));

    let listed = harness.call(method::POLL_LIST, json!({"tid": 3})).await;
    assert_eq!(listed["polls"][0]["name"], "meter");
    assert_eq!(listed["polls"][0]["interval"], 50);

    let ack = harness
        .call(method::POLL_DISABLE, json!({"tid": 4, "name": "meter"}))
        .await;
    assert_eq!(ack["status"], "ok");

    let ack = harness
        .call(method::POLL_DELETE, json!({"tid": 5, "name": "meter"}))
        .await;
    assert_eq!(ack["status"], "ok");
    assert!(harness.gateway.polls().is_empty());
}

#[tokio::test]
async fn test_unknown_command_answers_with_failure() {
    let image = SharedImage::default();
    let mut harness = Harness::with_driver(GatewayConfig::default(), image);

    let res = harness.call("poll.rename", json!({"tid": 8})).await;
    assert_eq!(res["tid"], 8);
    assert!(res["status"].as_str().unwrap().contains("Unknown command"));
}

#[tokio::test]
async fn test_write_with_hex_payload() {
    let image = SharedImage::default();
    let mut harness = Harness::with_driver(GatewayConfig::default(), image.clone());

    let ack = harness
        .call(
            method::ONCE_WRITE,
            json!({
                "tid": 1, "fc": 16, "ip": "127.0.0.1", "slave": 1,
                "addr": 20, "len": 2, "hex": true, "data": "112C004F"
            }),
        )
        .await;
    assert_eq!(ack["status"], "ok");

    let image = image.lock().unwrap();
    assert_eq!(image.registers.get(&20), Some(&0x112C));
    assert_eq!(image.registers.get(&21), Some(&0x004F));
}
