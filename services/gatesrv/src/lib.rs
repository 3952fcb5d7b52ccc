//! Modbus-TCP gateway service core.
//!
//! The gateway sits between typed application clients and a raw
//! Modbus-TCP driver process: it translates rich read/write/poll
//! requests into primitive function-code commands, correlates driver
//! replies back to their callers by transaction id, and runs the
//! recurring poll schedule.

pub mod config;
pub mod correlator;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod scheduler;
pub mod translator;
pub mod transport;

pub use dispatcher::{Gateway, GatewayCore};
pub use error::{GateSrvError, Result};
