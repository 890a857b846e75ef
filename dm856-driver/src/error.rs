//! Error types for the DM856 driver.

use std::time::Duration;

use thiserror::Error;
use tokio_modbus::ExceptionCode;

use crate::registers::{IndexOutOfRange, Register};

/// Result type alias using [`DriverError`].
pub type Result<T> = std::result::Result<T, DriverError>;

/// A single Modbus transaction failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModbusError {
    /// No response within the per-transaction timeout.
    #[error("no response for register 0x{address:02X} within {timeout:?}")]
    Timeout { address: u16, timeout: Duration },

    /// The device answered with an exception code.
    #[error("device exception {code:?} on register 0x{address:02X}")]
    Exception { address: u16, code: ExceptionCode },

    /// Read quantity outside 1..=256, rejected before sending.
    #[error("invalid register count {count} (expected 1..=256)")]
    Quantity { count: u16 },

    /// The device returned fewer words than requested.
    #[error("short response: expected {expected} words, got {received}")]
    ShortResponse { expected: usize, received: usize },

    /// Framing or I/O failure reported by the Modbus client.
    #[error("modbus transport failure: {0}")]
    Protocol(String),
}

/// Errors reported by [`DeviceDriver`](crate::DeviceDriver) operations.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The serial port could not be opened. Not recoverable.
    #[error("serial port '{port}' unavailable: {source}")]
    Transport {
        port: String,
        #[source]
        source: tokio_serial::Error,
    },

    /// A transaction failed; never retried.
    #[error(transparent)]
    Modbus(#[from] ModbusError),

    /// Parameter index outside the register map, caught before any transaction.
    #[error("invalid parameter: {0}")]
    InvalidParameter(#[from] IndexOutOfRange),

    /// The self-test itself succeeded but its stop write failed.
    /// The device may still be armed or running.
    #[error("stop write to {register} failed: {source}")]
    StopFailed {
        register: Register,
        #[source]
        source: ModbusError,
    },

    /// The mandatory stop write failed after an earlier error.
    /// The device may still be armed or running.
    #[error("stop write to {register} failed ({cleanup}) after: {cause}")]
    CleanupFailed {
        register: Register,
        cause: Box<DriverError>,
        cleanup: ModbusError,
    },
}

impl DriverError {
    /// True when the device may have been left armed or running.
    pub fn leaves_device_active(&self) -> bool {
        matches!(
            self,
            DriverError::StopFailed { .. } | DriverError::CleanupFailed { .. }
        )
    }
}
