//! Error Module
//!
//! Error kinds surfaced by the device core.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Native platform call that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeOperation {
    Connect,
    Disconnect,
    EnumerateServices,
    Pair,
    Subscribe,
}

impl fmt::Display for NativeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeOperation::Connect => write!(f, "connect"),
            NativeOperation::Disconnect => write!(f, "disconnect"),
            NativeOperation::EnumerateServices => write!(f, "service enumeration"),
            NativeOperation::Pair => write!(f, "pairing"),
            NativeOperation::Subscribe => write!(f, "event subscription"),
        }
    }
}

/// Capability the device does not provide
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Mtu,
    Rssi,
    PinPairing,
    ReliableWrite,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Mtu => write!(f, "MTU negotiation"),
            Capability::Rssi => write!(f, "RSSI updates"),
            Capability::PinPairing => write!(f, "PIN pairing"),
            Capability::ReliableWrite => write!(f, "reliable write"),
        }
    }
}

/// Errors returned by device operations and carried by discovery streams.
///
/// `Clone` so a single failure can be delivered to every attached subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("native {operation} failed: {message}")]
    Native {
        operation: NativeOperation,
        message: String,
    },

    #[error("{0} is not supported on this device")]
    Unsupported(Capability),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("native {operation} timed out after {timeout:?}")]
    Timeout {
        operation: NativeOperation,
        timeout: Duration,
    },

    #[error("async runtime unavailable: {0}")]
    Runtime(String),
}

impl DeviceError {
    pub fn native(operation: NativeOperation, message: impl Into<String>) -> Self {
        Self::Native {
            operation,
            message: message.into(),
        }
    }
}

pub type Result<T, E = DeviceError> = std::result::Result<T, E>;
