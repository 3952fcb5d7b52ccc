//! Error handling for the gateway service.

use mbgate_wire::WireError;
use thiserror::Error;

/// Gateway service error type.
///
/// Codec and translation errors are synchronous and reach the caller
/// immediately; timeout and driver errors are delivered as failed
/// responses after the downstream round trip.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateSrvError {
    /// Malformed word count or undecodable value.
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Bad scale range or unsupported type/order pair.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Function code outside the supported catalogue.
    #[error("Invalid function code: {0}")]
    InvalidFunctionCode(u8),

    /// Transaction id already has a pending slot.
    #[error("Duplicate transaction id: {0}")]
    DuplicateTransaction(String),

    /// Poll task name already registered.
    #[error("Duplicate poll name: {0}")]
    DuplicatePollName(String),

    /// Poll task name not registered.
    #[error("Poll not found: {0}")]
    PollNotFound(String),

    /// Unrecognized upstream command identifier.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// No driver reply within the request deadline.
    #[error("Request timed out: tid {0}")]
    Timeout(String),

    /// Driver answered with a non-ok status.
    #[error("Driver error: {0}")]
    DriverError(String),

    /// Transport channel failure.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Malformed payload or data/length mismatch.
    #[error("Data error: {0}")]
    DataError(String),
}

impl From<WireError> for GateSrvError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::Decode(msg) => GateSrvError::DecodeError(msg),
            WireError::Config(msg) => GateSrvError::ConfigError(msg),
        }
    }
}

impl From<serde_json::Error> for GateSrvError {
    fn from(err: serde_json::Error) -> Self {
        GateSrvError::DataError(err.to_string())
    }
}

/// Result type alias for the gateway service.
pub type Result<T> = std::result::Result<T, GateSrvError>;
