// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus RTU transport over a serial line.
//!
//! Every device on the line shares one open port. The slave address is
//! switched on the `tokio-modbus` context before each request. The context
//! reads through a [`SerialLine`] that the transport also holds, so input left
//! over from a failed exchange can be discarded before the next request.

use std::io::{self, ErrorKind};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::timeout;
use tokio_modbus::client::{Client, Context as ModbusContext, Reader};
use tokio_modbus::prelude::*;
use tokio_modbus::Error as TokioModbusError;
use tokio_serial::{
    ClearBuffer, DataBits as SerialDataBits, Parity as SerialParity, SerialPort,
    SerialPortBuilderExt, SerialStream, StopBits as SerialStopBits,
};

use crate::error::{ConnectionError, ModbusError, ModbusResult, OperationError, TimeoutError};
use crate::types::{DataBits, ModbusRtuConfig, Parity, StopBits};

use super::transport::{map_exception, map_protocol_error, ModbusTransport, TransportState};

// =============================================================================
// SerialLine
// =============================================================================

/// An open serial port shared by the `tokio-modbus` context and the
/// transport.
#[derive(Debug, Clone)]
struct SerialLine {
    stream: Arc<Mutex<SerialStream>>,
}

impl SerialLine {
    fn new(stream: SerialStream) -> Self {
        Self {
            stream: Arc::new(Mutex::new(stream)),
        }
    }

    /// Drops every byte received but not yet read.
    fn discard_input(&self) -> tokio_serial::Result<()> {
        self.stream.lock().clear(ClearBuffer::Input)
    }
}

impl AsyncRead for SerialLine {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.stream.lock()).poll_read(cx, buf)
    }
}

impl AsyncWrite for SerialLine {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut *self.stream.lock()).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.stream.lock()).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.stream.lock()).poll_shutdown(cx)
    }
}

// =============================================================================
// ModbusRtuTransport
// =============================================================================

/// Modbus RTU transport using tokio-modbus over a serial port.
pub struct ModbusRtuTransport {
    config: ModbusRtuConfig,
    context: std::sync::Mutex<Option<ModbusContext>>,
    line: Option<SerialLine>,
    slave_id: u8,
    state: TransportState,
}

impl ModbusRtuTransport {
    /// Creates a closed transport.
    pub fn new(config: ModbusRtuConfig) -> Self {
        Self {
            config,
            context: std::sync::Mutex::new(None),
            line: None,
            slave_id: 1,
            state: TransportState::Disconnected,
        }
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &ModbusRtuConfig {
        &self.config
    }

    fn convert_data_bits(bits: DataBits) -> SerialDataBits {
        match bits {
            DataBits::Five => SerialDataBits::Five,
            DataBits::Six => SerialDataBits::Six,
            DataBits::Seven => SerialDataBits::Seven,
            DataBits::Eight => SerialDataBits::Eight,
        }
    }

    fn convert_parity(parity: Parity) -> SerialParity {
        match parity {
            Parity::None => SerialParity::None,
            Parity::Odd => SerialParity::Odd,
            Parity::Even => SerialParity::Even,
        }
    }

    fn convert_stop_bits(bits: StopBits) -> SerialStopBits {
        match bits {
            StopBits::One => SerialStopBits::One,
            StopBits::Two => SerialStopBits::Two,
        }
    }

    fn context_slot(&mut self) -> &mut Option<ModbusContext> {
        self.context.get_mut().unwrap_or_else(|e| e.into_inner())
    }

    fn context(&mut self) -> ModbusResult<&mut ModbusContext> {
        self.context_slot()
            .as_mut()
            .ok_or_else(|| ModbusError::connection(ConnectionError::NotConnected))
    }

    fn deadline_error(&self) -> ModbusError {
        ModbusError::timeout(TimeoutError::read(self.config.timeout))
    }

    /// Maps a tokio-modbus error to ModbusError.
    fn map_modbus_error(&self, error: TokioModbusError, address: u16, count: u16) -> ModbusError {
        match error {
            TokioModbusError::Transport(io_error) => match io_error.kind() {
                ErrorKind::NotFound => {
                    ModbusError::connection(ConnectionError::serial_not_found(&self.config.port))
                }
                ErrorKind::PermissionDenied => ModbusError::connection(
                    ConnectionError::serial_access_denied(&self.config.port),
                ),
                ErrorKind::TimedOut => {
                    ModbusError::timeout(TimeoutError::response(self.config.timeout))
                }
                ErrorKind::BrokenPipe | ErrorKind::ConnectionReset => ModbusError::connection(
                    ConnectionError::closed(Some("Serial connection lost".to_string())),
                ),
                _ => ModbusError::operation(OperationError::ReadFailed {
                    address,
                    count,
                    message: io_error.to_string(),
                    source: Some(io_error),
                }),
            },
            TokioModbusError::Protocol(protocol_error) => {
                map_protocol_error(address, count, protocol_error)
            }
        }
    }
}

#[async_trait]
impl ModbusTransport for ModbusRtuTransport {
    async fn connect(&mut self) -> ModbusResult<()> {
        if self.state.is_connected() {
            return Ok(());
        }

        self.state = TransportState::Connecting;

        let builder = tokio_serial::new(&self.config.port, self.config.baud_rate)
            .data_bits(Self::convert_data_bits(self.config.data_bits))
            .parity(Self::convert_parity(self.config.parity))
            .stop_bits(Self::convert_stop_bits(self.config.stop_bits));

        let serial = match builder.open_native_async() {
            Ok(serial) => serial,
            Err(e) => {
                self.state = TransportState::Disconnected;
                let error = match e.kind {
                    tokio_serial::ErrorKind::NoDevice => {
                        ConnectionError::serial_not_found(&self.config.port)
                    }
                    tokio_serial::ErrorKind::Io(ErrorKind::PermissionDenied) => {
                        ConnectionError::serial_access_denied(&self.config.port)
                    }
                    tokio_serial::ErrorKind::Io(ErrorKind::NotFound) => {
                        ConnectionError::serial_not_found(&self.config.port)
                    }
                    _ => ConnectionError::SerialConfigurationFailed {
                        port: self.config.port.clone(),
                        message: e.to_string(),
                    },
                };
                return Err(ModbusError::connection(error));
            }
        };

        let line = SerialLine::new(serial);
        *self.context_slot() = Some(rtu::attach_slave(line.clone(), Slave(self.slave_id)));
        self.line = Some(line);
        self.state = TransportState::Connected;

        tracing::info!(
            port = %self.config.port,
            baud_rate = self.config.baud_rate,
            parity = %self.config.parity,
            "Serial port opened"
        );

        Ok(())
    }

    async fn disconnect(&mut self) -> ModbusResult<()> {
        if let Some(mut ctx) = self.context_slot().take() {
            if let Err(e) = ctx.disconnect().await {
                tracing::warn!(port = %self.config.port, error = %e, "Error closing serial port");
            }
            tracing::debug!(port = %self.config.port, "Serial port closed");
        }
        self.line = None;
        self.state = TransportState::Disconnected;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    fn state(&self) -> TransportState {
        self.state
    }

    fn set_slave(&mut self, slave_id: u8) {
        self.slave_id = slave_id;
        if let Some(ctx) = self.context_slot().as_mut() {
            ctx.set_slave(Slave(slave_id));
        }
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.config.timeout = timeout;
    }

    async fn read_coils(&mut self, address: u16, count: u16) -> ModbusResult<Vec<bool>> {
        let deadline = self.config.timeout;
        let result = timeout(deadline, self.context()?.read_coils(address, count)).await;
        result
            .map_err(|_| self.deadline_error())?
            .map_err(|e| self.map_modbus_error(e, address, count))?
            .map_err(|e| map_exception(0x01, e))
    }

    async fn read_discrete_inputs(&mut self, address: u16, count: u16) -> ModbusResult<Vec<bool>> {
        let deadline = self.config.timeout;
        let result = timeout(deadline, self.context()?.read_discrete_inputs(address, count)).await;
        result
            .map_err(|_| self.deadline_error())?
            .map_err(|e| self.map_modbus_error(e, address, count))?
            .map_err(|e| map_exception(0x02, e))
    }

    async fn read_holding_registers(&mut self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        let deadline = self.config.timeout;
        let result = timeout(deadline, self.context()?.read_holding_registers(address, count)).await;
        result
            .map_err(|_| self.deadline_error())?
            .map_err(|e| self.map_modbus_error(e, address, count))?
            .map_err(|e| map_exception(0x03, e))
    }

    async fn read_input_registers(&mut self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        let deadline = self.config.timeout;
        let result = timeout(deadline, self.context()?.read_input_registers(address, count)).await;
        result
            .map_err(|_| self.deadline_error())?
            .map_err(|e| self.map_modbus_error(e, address, count))?
            .map_err(|e| map_exception(0x04, e))
    }

    /// Waits out the inter-frame silence, then discards whatever arrived,
    /// so a late reply to the failed request is not taken as the answer to
    /// the next one.
    async fn flush(&mut self) -> ModbusResult<()> {
        let silence = self.config.calculated_inter_frame_delay();
        let Some(line) = self.line.as_ref() else {
            return Ok(());
        };
        tokio::time::sleep(silence.max(Duration::from_millis(1))).await;
        line.discard_input().map_err(|e| {
            ModbusError::operation(OperationError::DiscardFailed {
                port: self.config.port.clone(),
                message: e.to_string(),
            })
        })
    }

    fn display_name(&self) -> String {
        format!(
            "rtu:{}@{}-{}{}{}",
            self.config.port,
            self.config.baud_rate,
            self.config.data_bits,
            self.config.parity,
            self.config.stop_bits
        )
    }
}

impl std::fmt::Debug for ModbusRtuTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModbusRtuTransport")
            .field("port", &self.config.port)
            .field("slave_id", &self.slave_id)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_transport_is_closed() {
        let mut transport = ModbusRtuTransport::new(ModbusRtuConfig::new("/dev/ttyUSB0"));
        assert!(!transport.is_connected());
        assert_eq!(transport.display_name(), "rtu:/dev/ttyUSB0@9600-8N1");

        let err = transport.read_holding_registers(0, 1).await.unwrap_err();
        assert!(err.is_connection());

        transport.disconnect().await.unwrap();
        assert_eq!(transport.state(), TransportState::Disconnected);
    }

    #[tokio::test]
    async fn test_flush_on_closed_transport_is_noop() {
        let mut transport = ModbusRtuTransport::new(ModbusRtuConfig::new("/dev/ttyUSB0"));
        assert!(transport.flush().await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_discard_input_drops_stale_reply() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (mut slave_end, master_end) = SerialStream::pair().unwrap();
        let mut line = SerialLine::new(master_end);

        // Late answer to a request that already timed out.
        slave_end.write_all(&[0x01, 0x03, 0x02, 0x00, 0x96]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        line.discard_input().unwrap();

        slave_end.write_all(&[0x02]).await.unwrap();
        let mut buf = [0u8; 8];
        let n = timeout(Duration::from_secs(1), line.read(&mut buf))
            .await
            .expect("fresh byte should arrive")
            .unwrap();
        assert_eq!(&buf[..n], &[0x02]);
    }

    #[tokio::test]
    async fn test_missing_port_fails_to_open() {
        let mut transport =
            ModbusRtuTransport::new(ModbusRtuConfig::new("/dev/gauge-does-not-exist"));
        assert!(transport.connect().await.is_err());
        assert!(!transport.is_connected());
    }
}
