//! In-memory stand-ins for the serial device and the clock.
//!
//! [`MockDevice`] answers register transactions from a map and can be told
//! to fail specific ones. [`VirtualClock`] records waits instead of
//! sleeping. Both log into a shared [`Journal`] so tests can assert the exact
//! order of writes and waits.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::delay::Delay;
use crate::error::ModbusError;
use crate::link::{RegisterIo, check_quantity};

/// One recorded interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transaction {
    Read { address: u16, count: u16 },
    Write { address: u16, value: u16 },
    Sleep(Duration),
}

/// Shared, ordered record of transactions and waits.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Transaction>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, transaction: Transaction) {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(transaction);
    }

    /// Everything recorded so far, in order.
    pub fn entries(&self) -> Vec<Transaction> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Attempted writes as `(address, value)` pairs, in order.
    pub fn writes(&self) -> Vec<(u16, u16)> {
        self.entries()
            .into_iter()
            .filter_map(|t| match t {
                Transaction::Write { address, value } => Some((address, value)),
                _ => None,
            })
            .collect()
    }

    /// Position of the first matching entry.
    pub fn position(&self, transaction: Transaction) -> Option<usize> {
        self.entries().iter().position(|t| *t == transaction)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A write that should be answered with an error.
#[derive(Debug, Clone)]
struct WriteFailure {
    address: u16,
    value: Option<u16>,
    error: ModbusError,
}

/// Scripted device answering from an in-memory register map.
///
/// Registers that were never set read as 0. Failed writes are still
/// journaled, since the request did go out on the bus.
#[derive(Debug, Default)]
pub struct MockDevice {
    registers: HashMap<u16, u16>,
    read_failures: HashMap<u16, ModbusError>,
    write_failures: Vec<WriteFailure>,
    stalled_writes: Vec<(u16, u16)>,
    journal: Journal,
    closed: bool,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record into an existing journal (e.g. one shared with a [`VirtualClock`]).
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            journal,
            ..Self::default()
        }
    }

    pub fn with_register(mut self, address: u16, value: u16) -> Self {
        self.registers.insert(address, value);
        self
    }

    /// Preload consecutive registers starting at `address`.
    pub fn with_block(mut self, address: u16, values: &[u16]) -> Self {
        for (offset, value) in values.iter().enumerate() {
            self.registers
                .insert(address.wrapping_add(offset as u16), *value);
        }
        self
    }

    /// Fail every read that starts at `address`.
    pub fn fail_read(mut self, address: u16, error: ModbusError) -> Self {
        self.read_failures.insert(address, error);
        self
    }

    /// Fail every write to `address`.
    pub fn fail_write(mut self, address: u16, error: ModbusError) -> Self {
        self.write_failures.push(WriteFailure {
            address,
            value: None,
            error,
        });
        self
    }

    /// Fail writes of `value` to `address`.
    pub fn fail_write_value(mut self, address: u16, value: u16, error: ModbusError) -> Self {
        self.write_failures.push(WriteFailure {
            address,
            value: Some(value),
            error,
        });
        self
    }

    /// Never answer writes of `value` to `address`.
    pub fn stall_write_value(mut self, address: u16, value: u16) -> Self {
        self.stalled_writes.push((address, value));
        self
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    pub fn register(&self, address: u16) -> Option<u16> {
        self.registers.get(&address).copied()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl RegisterIo for MockDevice {
    async fn read_words(&mut self, address: u16, count: u16) -> Result<Vec<u16>, ModbusError> {
        check_quantity(count)?;
        self.journal.record(Transaction::Read { address, count });

        if let Some(error) = self.read_failures.get(&address) {
            return Err(error.clone());
        }

        Ok((0..count)
            .map(|offset| self.register(address.wrapping_add(offset)).unwrap_or(0))
            .collect())
    }

    async fn write_word(&mut self, address: u16, value: u16) -> Result<(), ModbusError> {
        self.journal.record(Transaction::Write { address, value });

        if self.stalled_writes.contains(&(address, value)) {
            std::future::pending::<()>().await;
        }

        let failure = self.write_failures.iter().find(|f| {
            f.address == address && f.value.is_none_or(|expected| expected == value)
        });
        if let Some(failure) = failure {
            return Err(failure.error.clone());
        }

        self.registers.insert(address, value);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ModbusError> {
        self.closed = true;
        Ok(())
    }
}

/// Clock that records waits instead of sleeping.
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    journal: Journal,
    elapsed: Duration,
}

impl VirtualClock {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            elapsed: Duration::ZERO,
        }
    }

    /// Total virtual time slept.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

impl Delay for VirtualClock {
    async fn sleep(&mut self, duration: Duration) {
        self.journal.record(Transaction::Sleep(duration));
        self.elapsed += duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unset_registers_read_zero() {
        let mut device = MockDevice::new().with_register(0x20, 1600);

        assert_eq!(device.read_words(0x1F, 3).await.unwrap(), vec![0, 1600, 0]);
        assert_eq!(
            device.journal().entries(),
            vec![Transaction::Read {
                address: 0x1F,
                count: 3
            }]
        );
    }

    #[tokio::test]
    async fn test_failed_write_is_journaled() {
        let mut device =
            MockDevice::new().fail_write_value(0x02, 0, ModbusError::Protocol("x".into()));

        assert!(device.write_word(0x02, 1).await.is_ok());
        assert!(device.write_word(0x02, 0).await.is_err());
        assert_eq!(device.journal().writes(), vec![(0x02, 1), (0x02, 0)]);
        assert_eq!(device.register(0x02), Some(1));
    }

    #[tokio::test]
    async fn test_invalid_quantity_not_journaled() {
        let mut device = MockDevice::new();

        assert_eq!(
            device.read_words(0x05, 0).await,
            Err(ModbusError::Quantity { count: 0 })
        );
        assert!(device.journal().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_write_never_completes() {
        let mut device = MockDevice::new().stall_write_value(0x09, 0);

        let stalled =
            tokio::time::timeout(Duration::from_secs(5), device.write_word(0x09, 0)).await;
        assert!(stalled.is_err());
        assert!(device.write_word(0x09, 1).await.is_ok());
        assert_eq!(device.journal().writes(), vec![(0x09, 0), (0x09, 1)]);
    }

    #[tokio::test]
    async fn test_close_marks_device_closed() {
        let mut device = MockDevice::new();
        assert!(!device.is_closed());

        device.close().await.unwrap();
        assert!(device.is_closed());
    }

    #[tokio::test]
    async fn test_virtual_clock_shares_journal() {
        let journal = Journal::new();
        let mut device = MockDevice::with_journal(journal.clone());
        let mut clock = VirtualClock::new(journal.clone());

        device.write_word(0x09, 1).await.unwrap();
        clock.sleep(Duration::from_secs(5)).await;

        assert_eq!(clock.elapsed(), Duration::from_secs(5));
        assert_eq!(
            journal.entries(),
            vec![
                Transaction::Write {
                    address: 0x09,
                    value: 1
                },
                Transaction::Sleep(Duration::from_secs(5)),
            ]
        );
    }
}
