//! Request dispatch.
//!
//! [`GatewayCore`] owns the downstream round trip: serialize a driver
//! command, claim a pending slot, publish, await the correlated
//! response. [`Gateway`] routes upstream frames by method onto the
//! core and the poll registry and always answers with a frame, turning
//! every error into the `{tid, status}` failure shape.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::{Duration, Instant};
use tracing::debug;

use mbgate_wire::downstream::DriverRes;
use mbgate_wire::upstream::{
    method, OnceReadReq, OnceReadRes, OnceWriteReq, PollCreateReq, PollListReq, PollListRes,
    PollNameReq, SimpleRes, TimeoutReq, TimeoutRes,
};
use mbgate_wire::STATUS_OK;

use crate::config::GatewayConfig;
use crate::correlator::PendingTable;
use crate::error::{GateSrvError, Result};
use crate::scheduler::{PollRegistry, ReadSubmitter};
use crate::translator::{self, DriverCommand};
use crate::transport::{DriverLink, Frame};

/// Downstream engine: one command in, one correlated response out.
pub struct GatewayCore {
    driver: Arc<dyn DriverLink>,
    pending: Arc<PendingTable>,
    request_timeout: Duration,
}

impl GatewayCore {
    pub fn new(driver: Arc<dyn DriverLink>, request_timeout: Duration) -> Self {
        Self {
            driver,
            pending: Arc::new(PendingTable::new()),
            request_timeout,
        }
    }

    pub fn pending(&self) -> Arc<PendingTable> {
        self.pending.clone()
    }

    /// Publish a command and await its response, bounded by the
    /// request timeout. The pending slot is released on every exit
    /// path: by the response, by the sweeper, or here when the send
    /// itself fails.
    pub async fn roundtrip(&self, cmd: &DriverCommand) -> Result<DriverRes> {
        let payload = serde_json::to_string(cmd)?;
        let tid = cmd.tid();
        let deadline = Instant::now() + self.request_timeout;
        let rx = self.pending.register(tid, deadline)?;

        debug!(tid = %tid, "publishing driver command");
        if let Err(err) = self.driver.send(Frame::driver(payload)).await {
            self.pending.discard(tid);
            return Err(err);
        }

        rx.await
            .map_err(|_| GateSrvError::TransportError("pending slot dropped".to_string()))?
    }

    pub async fn submit_write(&self, req: &OnceWriteReq) -> Result<SimpleRes> {
        let cmd = translator::write_command(req)?;
        let res = self.roundtrip(&cmd).await?;
        translator::write_response(req.tid, &res)
    }

    pub async fn submit_timeout(&self, tid: i64, timeout: Option<i64>) -> Result<TimeoutRes> {
        let cmd = translator::timeout_command(tid, timeout);
        let res = self.roundtrip(&cmd).await?;
        translator::timeout_response(tid, &res)
    }
}

#[async_trait]
impl ReadSubmitter for GatewayCore {
    async fn submit_read(&self, req: OnceReadReq) -> Result<OnceReadRes> {
        let cmd = translator::read_command(&req)?;
        let res = self.roundtrip(&cmd).await?;
        translator::read_response(&req, &res)
    }
}

/// The complete gateway: downstream engine plus poll registry.
pub struct Gateway {
    core: Arc<GatewayCore>,
    polls: Arc<PollRegistry>,
}

impl Gateway {
    pub fn new(driver: Arc<dyn DriverLink>, config: &GatewayConfig) -> Self {
        let core = Arc::new(GatewayCore::new(
            driver,
            Duration::from_millis(config.request_timeout_ms),
        ));
        let polls = PollRegistry::new(core.clone(), config.poll_channel_capacity);
        Self { core, polls }
    }

    pub fn pending(&self) -> Arc<PendingTable> {
        self.core.pending()
    }

    pub fn polls(&self) -> &Arc<PollRegistry> {
        &self.polls
    }

    /// Handle one upstream request frame. Always answers on the
    /// request's own topic; failures collapse to `{tid, status}`.
    pub async fn dispatch(&self, frame: &Frame) -> Frame {
        match self.route(&frame.topic, &frame.payload).await {
            Ok(payload) => Frame::new(frame.topic.clone(), payload),
            Err(err) => {
                let tid = extract_tid(&frame.payload);
                debug!(method = %frame.topic, tid, error = %err, "request failed");
                let fail = SimpleRes::fail(tid, err.to_string());
                let payload =
                    serde_json::to_string(&fail).unwrap_or_else(|_| String::from("{}"));
                Frame::new(frame.topic.clone(), payload)
            }
        }
    }

    async fn route(&self, method: &str, payload: &str) -> Result<String> {
        match method {
            method::ONCE_READ => {
                let req: OnceReadReq = serde_json::from_str(payload)?;
                let res = self.core.submit_read(req).await?;
                Ok(serde_json::to_string(&res)?)
            }
            method::ONCE_WRITE => {
                let req: OnceWriteReq = serde_json::from_str(payload)?;
                let res = self.core.submit_write(&req).await?;
                Ok(serde_json::to_string(&res)?)
            }
            method::TIMEOUT_GET => {
                let req: TimeoutReq = serde_json::from_str(payload)?;
                let res = self.core.submit_timeout(req.tid, None).await?;
                Ok(serde_json::to_string(&res)?)
            }
            method::TIMEOUT_SET => {
                // a set without a value degenerates to a get
                let req: TimeoutReq = serde_json::from_str(payload)?;
                let res = self.core.submit_timeout(req.tid, req.timeout).await?;
                Ok(serde_json::to_string(&res)?)
            }
            method::POLL_CREATE => {
                let req: PollCreateReq = serde_json::from_str(payload)?;
                self.polls.create(req.task)?;
                Ok(serde_json::to_string(&SimpleRes::ok(req.tid))?)
            }
            method::POLL_ENABLE => {
                let req: PollNameReq = serde_json::from_str(payload)?;
                self.polls.enable(&req.name)?;
                Ok(serde_json::to_string(&SimpleRes::ok(req.tid))?)
            }
            method::POLL_DISABLE => {
                let req: PollNameReq = serde_json::from_str(payload)?;
                self.polls.disable(&req.name)?;
                Ok(serde_json::to_string(&SimpleRes::ok(req.tid))?)
            }
            method::POLL_DELETE => {
                let req: PollNameReq = serde_json::from_str(payload)?;
                self.polls.delete(&req.name)?;
                Ok(serde_json::to_string(&SimpleRes::ok(req.tid))?)
            }
            method::POLL_LIST => {
                let req: PollListReq = serde_json::from_str(payload)?;
                let res = PollListRes {
                    tid: req.tid,
                    status: STATUS_OK.to_string(),
                    polls: self.polls.list(),
                };
                Ok(serde_json::to_string(&res)?)
            }
            other => Err(GateSrvError::UnknownCommand(other.to_string())),
        }
    }
}

/// Best-effort tid recovery from a payload that may not even be JSON,
/// so failure responses can still correlate.
fn extract_tid(payload: &str) -> i64 {
    serde_json::from_str::<Value>(payload)
        .ok()
        .and_then(|v| v.get("tid").and_then(Value::as_i64))
        .unwrap_or(0)
}
