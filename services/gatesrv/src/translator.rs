//! Command translation.
//!
//! Maps typed upstream requests onto primitive driver commands and
//! driver responses back into typed upstream responses. The driver
//! wire is untyped; the type context for a read decode is reattached
//! from the original request, never from the wire.

use serde::Serialize;

use mbgate_wire::codec;
use mbgate_wire::downstream::{
    DriverMultiWriteReq, DriverReadReq, DriverRes, DriverSingleWriteReq, DriverTimeoutReq,
};
use mbgate_wire::upstream::{OnceReadReq, OnceReadRes, OnceWriteReq, SimpleRes, TimeoutRes};
use mbgate_wire::{DecodedValue, ValueType, WriteData};

use crate::error::{GateSrvError, Result};

/// Modbus operation selector. Adding a code is a compile-time-checked
/// change: the wire mapping below is exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCode {
    ReadCoils,
    ReadDiscreteInputs,
    ReadHoldingRegisters,
    ReadInputRegisters,
    WriteSingleCoil,
    WriteSingleRegister,
    WriteMultipleCoils,
    WriteMultipleRegisters,
    SetTimeout,
    GetTimeout,
}

impl FunctionCode {
    pub fn from_wire(code: u8) -> Result<Self> {
        match code {
            1 => Ok(FunctionCode::ReadCoils),
            2 => Ok(FunctionCode::ReadDiscreteInputs),
            3 => Ok(FunctionCode::ReadHoldingRegisters),
            4 => Ok(FunctionCode::ReadInputRegisters),
            5 => Ok(FunctionCode::WriteSingleCoil),
            6 => Ok(FunctionCode::WriteSingleRegister),
            15 => Ok(FunctionCode::WriteMultipleCoils),
            16 => Ok(FunctionCode::WriteMultipleRegisters),
            50 => Ok(FunctionCode::SetTimeout),
            51 => Ok(FunctionCode::GetTimeout),
            other => Err(GateSrvError::InvalidFunctionCode(other)),
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            FunctionCode::ReadCoils => 1,
            FunctionCode::ReadDiscreteInputs => 2,
            FunctionCode::ReadHoldingRegisters => 3,
            FunctionCode::ReadInputRegisters => 4,
            FunctionCode::WriteSingleCoil => 5,
            FunctionCode::WriteSingleRegister => 6,
            FunctionCode::WriteMultipleCoils => 15,
            FunctionCode::WriteMultipleRegisters => 16,
            FunctionCode::SetTimeout => 50,
            FunctionCode::GetTimeout => 51,
        }
    }

    pub fn is_read(self) -> bool {
        matches!(
            self,
            FunctionCode::ReadCoils
                | FunctionCode::ReadDiscreteInputs
                | FunctionCode::ReadHoldingRegisters
                | FunctionCode::ReadInputRegisters
        )
    }

    pub fn is_write(self) -> bool {
        matches!(
            self,
            FunctionCode::WriteSingleCoil
                | FunctionCode::WriteSingleRegister
                | FunctionCode::WriteMultipleCoils
                | FunctionCode::WriteMultipleRegisters
        )
    }

    pub fn is_single_write(self) -> bool {
        matches!(
            self,
            FunctionCode::WriteSingleCoil | FunctionCode::WriteSingleRegister
        )
    }

    /// Coil and discrete-input codes carry bits as 0/1 words and
    /// bypass the value codec.
    pub fn is_bit(self) -> bool {
        matches!(
            self,
            FunctionCode::ReadCoils
                | FunctionCode::ReadDiscreteInputs
                | FunctionCode::WriteSingleCoil
                | FunctionCode::WriteMultipleCoils
        )
    }
}

/// A command headed to the driver; serializes to the exact downstream
/// wire shape of its variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DriverCommand {
    Read(DriverReadReq),
    SingleWrite(DriverSingleWriteReq),
    MultiWrite(DriverMultiWriteReq),
    Timeout(DriverTimeoutReq),
}

impl DriverCommand {
    pub fn tid(&self) -> &str {
        match self {
            DriverCommand::Read(req) => &req.tid,
            DriverCommand::SingleWrite(req) => &req.tid,
            DriverCommand::MultiWrite(req) => &req.tid,
            DriverCommand::Timeout(req) => &req.tid,
        }
    }
}

/// Build the driver command for a one-shot read. Type/order pairing is
/// validated here so malformed requests fail before any I/O.
pub fn read_command(req: &OnceReadReq) -> Result<DriverCommand> {
    let fc = FunctionCode::from_wire(req.fc)?;
    if !fc.is_read() {
        return Err(GateSrvError::InvalidFunctionCode(req.fc));
    }
    if req.len == 0 {
        return Err(GateSrvError::ConfigError(
            "read length must be at least 1".to_string(),
        ));
    }
    if !fc.is_bit() {
        codec::validate_pair(req.value_type, req.order)?;
        if let Some(range) = &req.range {
            range.validate()?;
        }
    }
    Ok(DriverCommand::Read(DriverReadReq {
        tid: req.tid.to_string(),
        cmd: fc.to_wire(),
        ip: req.ip.clone(),
        port: req.port.clone(),
        slave: req.slave,
        addr: req.addr,
        len: req.len,
    }))
}

/// Build the driver command for a one-shot write. Single-write codes
/// require scalar data; multi-write codes a sequence (or a hex string,
/// decoded here) whose length matches `len`.
pub fn write_command(req: &OnceWriteReq) -> Result<DriverCommand> {
    let fc = FunctionCode::from_wire(req.fc)?;
    if !fc.is_write() {
        return Err(GateSrvError::InvalidFunctionCode(req.fc));
    }
    if req.hex && !matches!(req.data, WriteData::Hex(_)) {
        return Err(GateSrvError::DataError(
            "hex flag set but data is not a hex string".to_string(),
        ));
    }

    if fc.is_single_write() {
        let WriteData::Scalar(value) = &req.data else {
            return Err(GateSrvError::DataError(format!(
                "function code {} requires scalar data",
                req.fc
            )));
        };
        return Ok(DriverCommand::SingleWrite(DriverSingleWriteReq {
            tid: req.tid.to_string(),
            cmd: fc.to_wire(),
            ip: req.ip.clone(),
            port: req.port.clone(),
            slave: req.slave,
            addr: req.addr,
            data: *value,
        }));
    }

    let words = match &req.data {
        WriteData::Sequence(words) => words.clone(),
        WriteData::Hex(hex) => codec::hex_to_words(hex)?,
        WriteData::Scalar(_) => {
            return Err(GateSrvError::DataError(format!(
                "function code {} requires a data sequence",
                req.fc
            )))
        }
    };
    if req.len as usize != words.len() {
        return Err(GateSrvError::DataError(format!(
            "declared length {} does not match data length {}",
            req.len,
            words.len()
        )));
    }
    Ok(DriverCommand::MultiWrite(DriverMultiWriteReq {
        tid: req.tid.to_string(),
        cmd: fc.to_wire(),
        ip: req.ip.clone(),
        port: req.port.clone(),
        slave: req.slave,
        addr: req.addr,
        len: req.len,
        data: words,
    }))
}

/// Build the driver command for a timeout get or set.
pub fn timeout_command(tid: i64, timeout: Option<i64>) -> DriverCommand {
    let fc = if timeout.is_some() {
        FunctionCode::SetTimeout
    } else {
        FunctionCode::GetTimeout
    };
    DriverCommand::Timeout(DriverTimeoutReq {
        tid: tid.to_string(),
        cmd: fc.to_wire(),
        timeout,
    })
}

/// Translate a driver read reply into the typed upstream response,
/// decoding through the codec with the original request's context.
pub fn read_response(req: &OnceReadReq, res: &DriverRes) -> Result<OnceReadRes> {
    if !res.is_ok() {
        return Err(GateSrvError::DriverError(res.status.clone()));
    }
    let raw = res
        .data
        .as_deref()
        .ok_or_else(|| GateSrvError::DataError("read response carries no data".to_string()))?;

    let fc = FunctionCode::from_wire(req.fc)?;
    if fc.is_bit() {
        // bits are already 0/1 words; no decode, no byte echo
        return Ok(OnceReadRes {
            tid: req.tid,
            status: res.status.clone(),
            value_type: None,
            bytes: None,
            data: Some(DecodedValue::Registers(raw.to_vec())),
        });
    }

    let value = codec::decode(raw, req.value_type, req.order, req.range.as_ref())?;
    let bytes = (req.value_type != ValueType::RegisterArray)
        .then(|| raw.iter().flat_map(|w| w.to_be_bytes()).collect());
    Ok(OnceReadRes {
        tid: req.tid,
        status: res.status.clone(),
        value_type: Some(req.value_type),
        bytes,
        data: Some(value),
    })
}

/// Translate a driver write acknowledgement: a pure status check.
pub fn write_response(tid: i64, res: &DriverRes) -> Result<SimpleRes> {
    if !res.is_ok() {
        return Err(GateSrvError::DriverError(res.status.clone()));
    }
    Ok(SimpleRes::ok(tid))
}

/// Translate a driver timeout reply.
pub fn timeout_response(tid: i64, res: &DriverRes) -> Result<TimeoutRes> {
    if !res.is_ok() {
        return Err(GateSrvError::DriverError(res.status.clone()));
    }
    Ok(TimeoutRes {
        tid,
        status: res.status.clone(),
        timeout: res.timeout,
    })
}
