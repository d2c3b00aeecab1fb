// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The wire seam under a [`Connection`](super::Connection).
//!
//! [`ModbusTransport`] is the seam between the connection and the wire. The
//! RTU and TCP transports implement it over `tokio-modbus`; tests implement
//! it with scripted responses.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio_modbus::ExceptionCode;

use crate::error::{ModbusError, ModbusResult, OperationError, ProtocolError};

// =============================================================================
// TransportState
// =============================================================================

/// Whether a port is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportState {
    /// Port closed.
    #[default]
    Disconnected,
    /// Open in progress.
    Connecting,
    /// Port open.
    Connected,
}

impl TransportState {
    /// Only [`Connected`](Self::Connected) counts as open.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        })
    }
}

// =============================================================================
// ModbusTransport Trait
// =============================================================================

/// Byte-level Modbus master over one physical port.
///
/// All methods take `&mut self`: a port carries one request at a time and the
/// owning [`Connection`](super::Connection) serializes access.
#[async_trait]
pub trait ModbusTransport: Send + Sync {
    /// Opens the port. Calling it on an open transport is a no-op.
    async fn connect(&mut self) -> ModbusResult<()>;

    /// Closes the port. Calling it on a closed transport is a no-op.
    async fn disconnect(&mut self) -> ModbusResult<()>;

    /// Whether requests can be sent.
    fn is_connected(&self) -> bool;

    /// Current [`TransportState`].
    fn state(&self) -> TransportState;

    /// Addresses subsequent requests to `slave_id`.
    fn set_slave(&mut self, slave_id: u8);

    /// Sets the per-request response timeout.
    fn set_timeout(&mut self, timeout: Duration);

    /// Reads coils (FC 01).
    async fn read_coils(&mut self, address: u16, count: u16) -> ModbusResult<Vec<bool>>;

    /// Reads discrete inputs (FC 02).
    async fn read_discrete_inputs(&mut self, address: u16, count: u16) -> ModbusResult<Vec<bool>>;

    /// Reads holding registers (FC 03).
    async fn read_holding_registers(&mut self, address: u16, count: u16) -> ModbusResult<Vec<u16>>;

    /// Reads input registers (FC 04).
    async fn read_input_registers(&mut self, address: u16, count: u16) -> ModbusResult<Vec<u16>>;

    /// Discards pending inbound bytes after a failed request.
    ///
    /// The default does nothing.
    async fn flush(&mut self) -> ModbusResult<()> {
        Ok(())
    }

    /// Returns a display name for this transport.
    fn display_name(&self) -> String;
}

// =============================================================================
// tokio-modbus Error Mapping
// =============================================================================

/// Numeric code of a tokio-modbus exception.
pub(crate) fn exception_code(code: &ExceptionCode) -> u8 {
    match code {
        ExceptionCode::IllegalFunction => 0x01,
        ExceptionCode::IllegalDataAddress => 0x02,
        ExceptionCode::IllegalDataValue => 0x03,
        ExceptionCode::ServerDeviceFailure => 0x04,
        ExceptionCode::Acknowledge => 0x05,
        ExceptionCode::ServerDeviceBusy => 0x06,
        ExceptionCode::MemoryParityError => 0x08,
        ExceptionCode::GatewayPathUnavailable => 0x0A,
        ExceptionCode::GatewayTargetDevice => 0x0B,
        _ => 0xFF,
    }
}

/// Maps an exception response for `function_code`.
pub(crate) fn map_exception(function_code: u8, code: ExceptionCode) -> ModbusError {
    ModbusError::protocol(ProtocolError::exception_response(
        function_code,
        exception_code(&code),
    ))
}

/// Maps a malformed or mismatched response.
pub(crate) fn map_protocol_error(
    address: u16,
    count: u16,
    error: tokio_modbus::ProtocolError,
) -> ModbusError {
    ModbusError::operation(OperationError::read_failed(address, count, error.to_string()))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_state() {
        assert!(TransportState::Connected.is_connected());
        assert!(!TransportState::Connecting.is_connected());
        assert_eq!(TransportState::default(), TransportState::Disconnected);
        assert_eq!(TransportState::Connected.to_string(), "connected");
    }

    #[test]
    fn test_exception_mapping() {
        let error = map_exception(0x03, ExceptionCode::IllegalDataAddress);
        match error {
            ModbusError::Protocol(ProtocolError::ExceptionResponse {
                function_code,
                exception_code,
                ..
            }) => {
                assert_eq!(function_code, 0x03);
                assert_eq!(exception_code, 0x02);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
