//! Wire payload types and the register value codec for the mbgate
//! Modbus-TCP gateway.
//!
//! Everything that crosses the gateway's two pub/sub boundaries lives
//! here: the upstream (client facing) and downstream (driver facing)
//! JSON payload shapes, plus the codec that turns raw 16-bit register
//! words into typed values and back.

pub mod codec;
pub mod downstream;
pub mod error;
pub mod upstream;
pub mod value;

pub use error::{Result, WireError};
pub use value::{DecodedValue, ScaleRange, ValueType, WordOrder, WriteData};

/// Status string carried by every successful response on both wires.
pub const STATUS_OK: &str = "ok";
