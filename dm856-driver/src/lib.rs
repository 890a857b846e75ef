//! Modbus RTU programmer for DM856 stepper drivers.
//!
//! The driver exposes the configuration parameters as named holding
//! registers, persists them to the device EEPROM, and runs the two built-in
//! self-tests (current loop and resonance).
//!
//! # Self-test sequencing
//!
//! ```text
//! IDLE --start write--> ARMED --capture | timed wait--> IDLE (stop write)
//! ```
//!
//! The stop write is issued on every exit path, including failures of the
//! configuration or capture steps.

pub mod config;
pub mod delay;
pub mod driver;
pub mod error;
pub mod link;
pub mod mock;
pub mod registers;
pub mod sample;

pub use config::{ProgrammerConfig, SerialConfig};
pub use delay::{Delay, TokioDelay};
pub use driver::{DeviceDriver, ParameterValue, ResonanceProfile, TEST_CURRENT_MA};
pub use error::{DriverError, ModbusError, Result};
pub use link::{RegisterIo, RtuLink, SLAVE_ID, TRANSACTION_TIMEOUT};
pub use registers::{IndexOutOfRange, Parameter, Register, RegisterMap};
pub use sample::{SAMPLE_COUNT, SampleBuffer, decode_sample};
