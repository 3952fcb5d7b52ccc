//! Downstream wire shapes (gateway ↔ driver).
//!
//! The driver speaks primitive function-code commands keyed by a
//! numeric `cmd` field and answers with a generic status/data
//! response. Transaction ids travel as decimal strings on this wire.

use serde::{Deserialize, Serialize};

/// Read request, `cmd` 1 (coils), 2 (discrete inputs), 3 (holding
/// registers) or 4 (input registers).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverReadReq {
    pub tid: String,
    pub cmd: u8,
    pub ip: String,
    pub port: String,
    pub slave: u8,
    pub addr: u16,
    pub len: u16,
}

/// Single write request, `cmd` 5 (coil) or 6 (register).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverSingleWriteReq {
    pub tid: String,
    pub cmd: u8,
    pub ip: String,
    pub port: String,
    pub slave: u8,
    pub addr: u16,
    pub data: u16,
}

/// Multiple write request, `cmd` 15 (coils) or 16 (registers).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverMultiWriteReq {
    pub tid: String,
    pub cmd: u8,
    pub ip: String,
    pub port: String,
    pub slave: u8,
    pub addr: u16,
    pub len: u16,
    pub data: Vec<u16>,
}

/// Connection-timeout request, `cmd` 50 (set) or 51 (get). The driver
/// keeps the timeout in microseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverTimeoutReq {
    pub tid: String,
    pub cmd: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
}

/// Generic driver response. `data` is present only for read function
/// codes; `timeout` only for `cmd` 51.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverRes {
    pub tid: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u16>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
}

impl DriverRes {
    /// Whether the driver reported success.
    pub fn is_ok(&self) -> bool {
        self.status == crate::STATUS_OK
    }
}
