//! Transactional access to the driver's holding registers.
//!
//! Every call maps to exactly one Modbus transaction against slave 1 with a
//! fixed timeout. Failures are returned as-is; nothing is retried.

use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_modbus::client::{Context, Reader, Writer};
use tokio_modbus::prelude::*;
use tokio_serial::{DataBits, FlowControl, Parity, SerialStream, StopBits};
use tracing::{info, trace, warn};

use crate::config::SerialConfig;
use crate::error::{DriverError, ModbusError};

/// Modbus slave address of the driver.
pub const SLAVE_ID: u8 = 1;

/// Per-transaction response timeout.
pub const TRANSACTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest block accepted by a single holding-register read.
pub const MAX_READ_COUNT: u16 = 256;

/// Register-level transactions against a single device.
#[allow(async_fn_in_trait)]
pub trait RegisterIo {
    /// Read `count` consecutive holding registers starting at `address`.
    async fn read_words(&mut self, address: u16, count: u16) -> Result<Vec<u16>, ModbusError>;

    /// Write a single holding register.
    async fn write_word(&mut self, address: u16, value: u16) -> Result<(), ModbusError>;

    /// Read a single holding register.
    async fn read_word(&mut self, address: u16) -> Result<u16, ModbusError> {
        let words = self.read_words(address, 1).await?;
        words.first().copied().ok_or(ModbusError::ShortResponse {
            expected: 1,
            received: 0,
        })
    }

    /// Release the underlying connection.
    async fn close(&mut self) -> Result<(), ModbusError> {
        Ok(())
    }
}

/// Reject read quantities the device does not accept.
pub fn check_quantity(count: u16) -> Result<(), ModbusError> {
    if count == 0 || count > MAX_READ_COUNT {
        return Err(ModbusError::Quantity { count });
    }
    Ok(())
}

/// Reject a response carrying fewer words than were requested.
pub fn check_response_len(words: &[u16], count: u16) -> Result<(), ModbusError> {
    if words.len() < usize::from(count) {
        return Err(ModbusError::ShortResponse {
            expected: usize::from(count),
            received: words.len(),
        });
    }
    Ok(())
}

/// Modbus RTU master bound to a serial port.
pub struct RtuLink {
    ctx: Context,
    /// Port path or transport name, for logs.
    port: String,
    timeout: Duration,
}

impl RtuLink {
    /// Open the serial port (8N2, no flow control) and attach to slave 1.
    pub fn open(serial: &SerialConfig) -> Result<Self, DriverError> {
        let builder = tokio_serial::new(&serial.port, serial.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::Two)
            .flow_control(FlowControl::None);

        let stream = SerialStream::open(&builder).map_err(|source| DriverError::Transport {
            port: serial.port.clone(),
            source,
        })?;

        info!(
            port = %serial.port,
            baud_rate = serial.baud_rate,
            slave = SLAVE_ID,
            "Opened Modbus RTU link"
        );

        Ok(Self::attach(stream, serial.port.clone()))
    }

    /// Attach to slave 1 over an already open byte stream.
    pub fn attach<T>(transport: T, port: impl Into<String>) -> Self
    where
        T: AsyncRead + AsyncWrite + fmt::Debug + Unpin + Send + 'static,
    {
        Self {
            ctx: rtu::attach_slave(transport, Slave(SLAVE_ID)),
            port: port.into(),
            timeout: TRANSACTION_TIMEOUT,
        }
    }
}

impl RegisterIo for RtuLink {
    async fn read_words(&mut self, address: u16, count: u16) -> Result<Vec<u16>, ModbusError> {
        check_quantity(count)?;
        trace!(address, count, "-> read holding registers");

        let result = tokio::time::timeout(
            self.timeout,
            self.ctx.read_holding_registers(address, count),
        )
        .await
        .map_err(|_| ModbusError::Timeout {
            address,
            timeout: self.timeout,
        })
        .and_then(|response| response.map_err(|e| ModbusError::Protocol(e.to_string())))
        .and_then(|response| response.map_err(|code| ModbusError::Exception { address, code }));

        match result.and_then(|words| check_response_len(&words, count).map(|()| words)) {
            Ok(words) => {
                trace!(address, ?words, "<- read holding registers");
                Ok(words)
            }
            Err(e) => {
                warn!(address, count, "Read failed: {}", e);
                Err(e)
            }
        }
    }

    async fn write_word(&mut self, address: u16, value: u16) -> Result<(), ModbusError> {
        trace!(address, value, "-> write single register");

        let result = tokio::time::timeout(
            self.timeout,
            self.ctx.write_single_register(address, value),
        )
        .await
        .map_err(|_| ModbusError::Timeout {
            address,
            timeout: self.timeout,
        })
        .and_then(|response| response.map_err(|e| ModbusError::Protocol(e.to_string())))
        .and_then(|response| response.map_err(|code| ModbusError::Exception { address, code }));

        match result {
            Ok(()) => {
                trace!(address, value, "<- write acknowledged");
                Ok(())
            }
            Err(e) => {
                warn!(address, value, "Write failed: {}", e);
                Err(e)
            }
        }
    }

    async fn close(&mut self) -> Result<(), ModbusError> {
        self.ctx
            .disconnect()
            .await
            .map_err(|e| ModbusError::Protocol(e.to_string()))?;
        info!(port = %self.port, "Closed Modbus RTU link");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};
    use tokio_modbus::ExceptionCode;

    /// CRC-16/MODBUS, appended low byte first.
    fn frame(body: &[u8]) -> Vec<u8> {
        let mut crc: u16 = 0xFFFF;
        for byte in body {
            crc ^= u16::from(*byte);
            for _ in 0..8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ 0xA001
                } else {
                    crc >> 1
                };
            }
        }
        let mut framed = body.to_vec();
        framed.extend_from_slice(&crc.to_le_bytes());
        framed
    }

    /// Answer one request with `response`, returning the request bytes.
    async fn answer(device: &mut DuplexStream, request_len: usize, response: &[u8]) -> Vec<u8> {
        let mut request = vec![0u8; request_len];
        device.read_exact(&mut request).await.unwrap();
        device.write_all(response).await.unwrap();
        request
    }

    #[test]
    fn test_frame_crc() {
        assert_eq!(
            frame(&[0x01, 0x03, 0x00, 0x05, 0x00, 0xC8]),
            vec![0x01, 0x03, 0x00, 0x05, 0x00, 0xC8, 0x54, 0x5D]
        );
    }

    #[test]
    fn test_check_response_len() {
        assert!(check_response_len(&[1, 2, 3], 3).is_ok());
        assert_eq!(
            check_response_len(&[1], 3),
            Err(ModbusError::ShortResponse {
                expected: 3,
                received: 1
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_times_out_without_response() {
        let (client, mut device) = duplex(1024);
        let mut link = RtuLink::attach(client, "duplex");

        let result = link.read_words(0x05, 200).await;
        assert_eq!(
            result,
            Err(ModbusError::Timeout {
                address: 0x05,
                timeout: TRANSACTION_TIMEOUT
            })
        );

        let mut request = [0u8; 8];
        device.read_exact(&mut request).await.unwrap();
        assert_eq!(request.to_vec(), frame(&[0x01, 0x03, 0x00, 0x05, 0x00, 0xC8]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_decodes_response() {
        let (client, mut device) = duplex(1024);
        let mut link = RtuLink::attach(client, "duplex");

        let responder = tokio::spawn(async move {
            answer(&mut device, 8, &frame(&[0x01, 0x03, 0x02, 0x06, 0x40])).await
        });

        assert_eq!(link.read_word(0x20).await, Ok(1600));
        assert_eq!(
            responder.await.unwrap(),
            frame(&[0x01, 0x03, 0x00, 0x20, 0x00, 0x01])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_reports_exception_code() {
        let (client, mut device) = duplex(1024);
        let mut link = RtuLink::attach(client, "duplex");

        let responder = tokio::spawn(async move {
            answer(&mut device, 8, &frame(&[0x01, 0x86, 0x02])).await
        });

        assert_eq!(
            link.write_word(0x02, 3000).await,
            Err(ModbusError::Exception {
                address: 0x02,
                code: ExceptionCode::IllegalDataAddress
            })
        );
        assert_eq!(
            responder.await.unwrap(),
            frame(&[0x01, 0x06, 0x00, 0x02, 0x0B, 0xB8])
        );
    }

    #[test]
    fn test_check_quantity_bounds() {
        assert_eq!(check_quantity(0), Err(ModbusError::Quantity { count: 0 }));
        assert!(check_quantity(1).is_ok());
        assert!(check_quantity(200).is_ok());
        assert!(check_quantity(256).is_ok());
        assert_eq!(
            check_quantity(257),
            Err(ModbusError::Quantity { count: 257 })
        );
    }

    #[test]
    fn test_open_missing_port_is_transport_error() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let _guard = runtime.enter();

        let serial = SerialConfig {
            port: "/dev/dm856-does-not-exist".to_string(),
            baud_rate: 38400,
        };

        match RtuLink::open(&serial) {
            Err(DriverError::Transport { port, .. }) => {
                assert_eq!(port, "/dev/dm856-does-not-exist")
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("opening a missing port must fail"),
        }
    }
}
