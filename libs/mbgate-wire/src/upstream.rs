//! Upstream wire shapes (client ↔ gateway).
//!
//! Clients speak a richer JSON than the driver: requests carry the
//! function code plus the type context (`type`, `order`, `range`) the
//! gateway needs to decode raw registers, and poll requests add the
//! task name, interval and enabled flag.

use serde::{Deserialize, Serialize};

use crate::value::{DecodedValue, ScaleRange, ValueType, WordOrder, WriteData};

/// Upstream command identifiers, carried in the request frame's topic.
pub mod method {
    pub const ONCE_READ: &str = "once.read";
    pub const ONCE_WRITE: &str = "once.write";
    pub const TIMEOUT_GET: &str = "timeout.get";
    pub const TIMEOUT_SET: &str = "timeout.set";
    pub const POLL_CREATE: &str = "poll.create";
    pub const POLL_ENABLE: &str = "poll.enable";
    pub const POLL_DISABLE: &str = "poll.disable";
    pub const POLL_DELETE: &str = "poll.delete";
    pub const POLL_LIST: &str = "poll.list";
    /// Topic poll results are published under.
    pub const POLL_DATA: &str = "poll.data";
}

fn default_port() -> String {
    "502".to_string()
}

fn default_len() -> u16 {
    1
}

fn default_enabled() -> bool {
    true
}

/// One-shot read request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnceReadReq {
    pub tid: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Function code: 1, 2, 3 or 4.
    pub fc: u8,
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: String,
    pub slave: u8,
    pub addr: u16,
    #[serde(default = "default_len")]
    pub len: u16,
    /// Ignored for coil function codes; bits travel as 0/1 words.
    #[serde(default, rename = "type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub order: WordOrder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<ScaleRange>,
}

/// One-shot read response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OnceReadRes {
    pub tid: i64,
    pub status: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
    /// Raw big-endian byte image, echoed for typed register reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<DecodedValue>,
}

impl OnceReadRes {
    /// Failed reads keep the `{tid, status}` shape so callers can
    /// still correlate.
    pub fn fail(tid: i64, status: impl Into<String>) -> Self {
        Self {
            tid,
            status: status.into(),
            value_type: None,
            bytes: None,
            data: None,
        }
    }
}

/// One-shot write request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnceWriteReq {
    pub tid: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Function code: 5, 6, 15 or 16.
    pub fc: u8,
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: String,
    pub slave: u8,
    pub addr: u16,
    /// Required for multi writes; must match the data length.
    #[serde(default)]
    pub len: u16,
    /// Advisory flag: the data payload is a hex string.
    #[serde(default)]
    pub hex: bool,
    pub data: WriteData,
}

/// Generic `{tid, status}` response (writes, poll mutations).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleRes {
    pub tid: i64,
    pub status: String,
}

impl SimpleRes {
    pub fn ok(tid: i64) -> Self {
        Self {
            tid,
            status: crate::STATUS_OK.to_string(),
        }
    }

    pub fn fail(tid: i64, status: impl Into<String>) -> Self {
        Self {
            tid,
            status: status.into(),
        }
    }
}

/// Connection-timeout get/set request. A set without a value is
/// treated as a get.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutReq {
    pub tid: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
}

/// Connection-timeout response; `timeout` present for gets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutRes {
    pub tid: i64,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
}

/// Everything that defines a recurring read task. Also the shape
/// returned by `poll.list`, with `enabled` reflecting current state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollTaskSpec {
    /// Unique task name.
    pub name: String,
    /// Firing interval in milliseconds; must be positive.
    pub interval: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Function code: 1, 2, 3 or 4.
    pub fc: u8,
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: String,
    pub slave: u8,
    pub addr: u16,
    #[serde(default = "default_len")]
    pub len: u16,
    #[serde(default, rename = "type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub order: WordOrder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<ScaleRange>,
}

impl PollTaskSpec {
    /// Build the one-shot read a firing submits, with a fresh tid.
    pub fn to_read_request(&self, tid: i64) -> OnceReadReq {
        OnceReadReq {
            tid,
            from: None,
            fc: self.fc,
            ip: self.ip.clone(),
            port: self.port.clone(),
            slave: self.slave,
            addr: self.addr,
            len: self.len,
            value_type: self.value_type,
            order: self.order,
            range: self.range,
        }
    }
}

/// Poll registration request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollCreateReq {
    pub tid: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(flatten)]
    pub task: PollTaskSpec,
}

/// Enable/disable/delete request addressing a task by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollNameReq {
    pub tid: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub name: String,
}

/// List request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollListReq {
    pub tid: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

/// Snapshot of every registered task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollListRes {
    pub tid: i64,
    pub status: String,
    pub polls: Vec<PollTaskSpec>,
}

/// One poll firing's result, published to every subscriber.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollData {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<DecodedValue>,
}
