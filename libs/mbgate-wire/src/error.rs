//! Error types for the wire crate.

use thiserror::Error;

/// Errors raised by the value codec and payload validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Malformed word count or a value that cannot be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Unsupported type/order pair or an invalid scale range.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for the wire crate.
pub type Result<T> = std::result::Result<T, WireError>;
