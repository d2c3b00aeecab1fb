// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Errors raised by transports and the reader.
//!
//! # Layout
//!
//! ```text
//! ModbusError
//! ├── Connection    - Opening or losing a port
//! ├── Protocol      - Exception replies from a slave
//! ├── Operation     - Failed or short reads
//! ├── Timeout       - A read outlived its deadline
//! └── Configuration - Rejected port settings
//! ```
//!
//! Only [`ConnectionError`] and [`ConfigurationError`] ever reach callers of
//! the manager. Everything raised during a poll cycle is recorded on the
//! affected device instead.
//!
//! # Examples
//!
//! ```
//! use gauge_modbus::error::{ConnectionError, ModbusError};
//!
//! let error = ModbusError::connection(ConnectionError::refused("192.168.1.100", 502));
//! assert!(error.is_connection());
//! assert_eq!(error.to_string(), "192.168.1.100:502 refused the connection");
//! ```

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result alias for Modbus operations.
pub type ModbusResult<T> = Result<T, ModbusError>;

// =============================================================================
// ModbusError
// =============================================================================

/// Any failure on a Modbus port.
#[derive(Debug, Error)]
pub enum ModbusError {
    /// Transport could not be opened or was lost.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// The slave answered with an exception.
    #[error("{0}")]
    Protocol(#[from] ProtocolError),

    /// A read request failed in the transport.
    #[error("{0}")]
    Operation(#[from] OperationError),

    /// A request exceeded its deadline.
    #[error("{0}")]
    Timeout(#[from] TimeoutError),

    /// Invalid settings.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),
}

impl ModbusError {
    /// From a [`ConnectionError`].
    pub fn connection(error: ConnectionError) -> Self {
        Self::Connection(error)
    }

    /// From a [`ProtocolError`].
    pub fn protocol(error: ProtocolError) -> Self {
        Self::Protocol(error)
    }

    /// From an [`OperationError`].
    pub fn operation(error: OperationError) -> Self {
        Self::Operation(error)
    }

    /// From a [`TimeoutError`].
    pub fn timeout(error: TimeoutError) -> Self {
        Self::Timeout(error)
    }

    /// From a [`ConfigurationError`].
    pub fn configuration(error: ConfigurationError) -> Self {
        Self::Configuration(error)
    }

    /// Request issued while the port is closed.
    pub fn not_connected() -> Self {
        Self::Connection(ConnectionError::NotConnected)
    }

    /// Read that outlived `duration`.
    pub fn read_timeout(duration: Duration) -> Self {
        Self::Timeout(TimeoutError::read(duration))
    }

    /// Exception reply to `function_code`.
    pub fn exception(function_code: u8, exception_code: u8) -> Self {
        Self::Protocol(ProtocolError::exception_response(function_code, exception_code))
    }

    /// Returns `true` for timeouts.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Returns `true` for connection failures.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Category label used in log fields.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Protocol(_) => "protocol",
            Self::Operation(_) => "operation",
            Self::Timeout(_) => "timeout",
            Self::Configuration(_) => "configuration",
        }
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Failures opening, using or closing a port.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The peer refused the TCP connection.
    #[error("{host}:{port} refused the connection")]
    Refused {
        /// Peer host.
        host: String,
        /// Peer port.
        port: u16,
        /// I/O cause.
        #[source]
        source: Option<io::Error>,
    },

    /// The TCP handshake did not finish in time.
    #[error("No answer from {host}:{port} within {duration:?}")]
    TimedOut {
        /// Peer host.
        host: String,
        /// Peer port.
        port: u16,
        /// Timeout duration.
        duration: Duration,
    },

    /// The host name did not resolve.
    #[error("Cannot resolve '{hostname}'")]
    DnsResolutionFailed {
        /// Name as configured.
        hostname: String,
        /// I/O cause.
        #[source]
        source: Option<io::Error>,
    },

    /// No such serial device.
    #[error("No serial device at {port}")]
    SerialPortNotFound {
        /// Device path.
        port: String,
    },

    /// The serial device exists but cannot be opened.
    #[error("Permission denied opening {port}")]
    SerialPortAccessDenied {
        /// Device path.
        port: String,
    },

    /// The serial line settings were not accepted.
    #[error("Cannot configure {port}: {message}")]
    SerialConfigurationFailed {
        /// Device path.
        port: String,
        /// Detail.
        message: String,
    },

    /// The peer closed the port.
    #[error("Port closed by peer")]
    Closed {
        /// What the transport reported, if anything.
        reason: Option<String>,
    },

    /// The port is not open.
    #[error("Port is not open")]
    NotConnected,
}

impl ConnectionError {
    /// Refusal without an I/O cause.
    pub fn refused(host: impl Into<String>, port: u16) -> Self {
        Self::Refused {
            host: host.into(),
            port,
            source: None,
        }
    }

    /// Refusal caused by `source`.
    pub fn refused_with(host: impl Into<String>, port: u16, source: io::Error) -> Self {
        Self::Refused {
            host: host.into(),
            port,
            source: Some(source),
        }
    }

    /// Handshake deadline exceeded.
    pub fn timed_out(host: impl Into<String>, port: u16, duration: Duration) -> Self {
        Self::TimedOut {
            host: host.into(),
            port,
            duration,
        }
    }

    /// Unresolvable host name.
    pub fn dns_failed(hostname: impl Into<String>) -> Self {
        Self::DnsResolutionFailed {
            hostname: hostname.into(),
            source: None,
        }
    }

    /// Missing serial device.
    pub fn serial_not_found(port: impl Into<String>) -> Self {
        Self::SerialPortNotFound { port: port.into() }
    }

    /// Unopenable serial device.
    pub fn serial_access_denied(port: impl Into<String>) -> Self {
        Self::SerialPortAccessDenied { port: port.into() }
    }

    /// Port closed by the peer.
    pub fn closed(reason: Option<String>) -> Self {
        Self::Closed { reason }
    }
}

// =============================================================================
// ProtocolError
// =============================================================================

/// Slave exception replies.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Exception reply.
    #[error("Slave rejected function {function_code:#04x} with exception {exception_code} ({exception_name})")]
    ExceptionResponse {
        /// Request function code.
        function_code: u8,
        /// Code from the reply.
        exception_code: u8,
        /// Name of `exception_code`.
        exception_name: &'static str,
    },
}

impl ProtocolError {
    /// Exception reply with its name filled in.
    pub fn exception_response(function_code: u8, exception_code: u8) -> Self {
        Self::ExceptionResponse {
            function_code,
            exception_code,
            exception_name: Self::exception_name(exception_code),
        }
    }

    /// Name of a Modbus exception code.
    pub fn exception_name(code: u8) -> &'static str {
        match code {
            0x01 => "Illegal Function",
            0x02 => "Illegal Data Address",
            0x03 => "Illegal Data Value",
            0x04 => "Slave Device Failure",
            0x05 => "Acknowledge",
            0x06 => "Slave Device Busy",
            0x08 => "Memory Parity Error",
            0x0A => "Gateway Path Unavailable",
            0x0B => "Gateway Target Device Failed to Respond",
            _ => "Unknown Exception",
        }
    }
}

// =============================================================================
// OperationError
// =============================================================================

/// Reads that completed badly.
#[derive(Debug, Error)]
pub enum OperationError {
    /// The transport reported a failure.
    #[error("Reading {count} item(s) at {address} failed: {message}")]
    ReadFailed {
        /// First address.
        address: u16,
        /// Items asked for.
        count: u16,
        /// Detail.
        message: String,
        /// I/O cause.
        #[source]
        source: Option<io::Error>,
    },

    /// Bytes pending on a serial line could not be dropped.
    #[error("Cannot discard pending input on {port}: {message}")]
    DiscardFailed {
        /// Device path.
        port: String,
        /// Detail.
        message: String,
    },

    /// Fewer items came back than were asked for.
    #[error("Reply at {address} carried {actual} of {expected} item(s)")]
    ShortResponse {
        /// First address.
        address: u16,
        /// Items asked for.
        expected: usize,
        /// Items received.
        actual: usize,
    },
}

impl OperationError {
    /// Failed read of `count` items at `address`.
    pub fn read_failed(address: u16, count: u16, message: impl Into<String>) -> Self {
        Self::ReadFailed {
            address,
            count,
            message: message.into(),
            source: None,
        }
    }
}

// =============================================================================
// TimeoutError
// =============================================================================

/// Reads that outlived a deadline.
#[derive(Debug, Error)]
pub enum TimeoutError {
    /// The reader's own deadline fired.
    #[error("Timeout")]
    Read {
        /// Deadline in force.
        duration: Duration,
    },

    /// The transport gave up first.
    #[error("Timeout")]
    Response {
        /// Deadline in force.
        duration: Duration,
    },
}

impl TimeoutError {
    /// Reader deadline.
    pub fn read(duration: Duration) -> Self {
        Self::Read { duration }
    }

    /// Transport deadline.
    pub fn response(duration: Duration) -> Self {
        Self::Response { duration }
    }

    /// Deadline in force.
    pub fn duration(&self) -> Duration {
        match self {
            Self::Read { duration } | Self::Response { duration } => *duration,
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Rejected port settings.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Unusable host.
    #[error("Host '{address}' rejected: {reason}")]
    InvalidHost {
        /// Host as configured.
        address: String,
        /// Why.
        reason: String,
    },

    /// Unusable TCP port.
    #[error("TCP port {port} rejected: {reason}")]
    InvalidPort {
        /// Port as configured.
        port: u16,
        /// Why.
        reason: String,
    },

    /// Baud rate outside the supported list.
    #[error("Unsupported baud rate {baud_rate}")]
    InvalidBaudRate {
        /// Rate as configured.
        baud_rate: u32,
    },

    /// Unusable response timeout.
    #[error("Response timeout {duration:?} rejected: {reason}")]
    InvalidTimeout {
        /// Timeout as configured.
        duration: Duration,
        /// Why.
        reason: String,
    },

    /// A required setting is empty.
    #[error("Setting '{field}' is required")]
    MissingField {
        /// Setting name.
        field: String,
    },
}

impl ConfigurationError {
    /// Rejected host.
    pub fn invalid_host(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidHost {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Rejected TCP port.
    pub fn invalid_port(port: u16, reason: impl Into<String>) -> Self {
        Self::InvalidPort {
            port,
            reason: reason.into(),
        }
    }

    /// Empty required setting.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField { field: field.into() }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = ModbusError::read_timeout(Duration::from_millis(1250));
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Timeout");
        assert_eq!(err.category(), "timeout");
    }

    #[test]
    fn test_exception_message() {
        let err = ModbusError::exception(0x03, 0x02);
        assert!(err.to_string().contains("Illegal Data Address"));
        assert!(!err.is_connection());
        assert_eq!(err.category(), "protocol");
    }

    #[test]
    fn test_discard_failure_is_an_operation_error() {
        let err = ModbusError::operation(OperationError::DiscardFailed {
            port: "/dev/ttyUSB0".to_string(),
            message: "Input/output error".to_string(),
        });
        assert_eq!(err.category(), "operation");
        assert_eq!(
            err.to_string(),
            "Cannot discard pending input on /dev/ttyUSB0: Input/output error"
        );
    }

    #[test]
    fn test_connection_messages() {
        let err = ModbusError::connection(ConnectionError::serial_not_found("/dev/ttyUSB9"));
        assert!(err.is_connection());
        assert_eq!(err.to_string(), "No serial device at /dev/ttyUSB9");
        assert_eq!(
            ModbusError::not_connected().to_string(),
            "Port is not open"
        );
    }
}
