// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transport configuration.
//!
//! One [`ModbusConfig`] describes one physical port: a serial line for RTU or
//! a socket for TCP. Slave addresses are not part of it since a port is
//! shared by every device wired to it.
//!
//! # Examples
//!
//! ```
//! use gauge_modbus::types::{ModbusConfig, ModbusRtuConfig, Parity};
//!
//! let config = ModbusConfig::Rtu(ModbusRtuConfig::new("/dev/ttyUSB0").with_parity(Parity::Even));
//! assert!(config.validate().is_ok());
//! assert_eq!(config.display_name(), "rtu:/dev/ttyUSB0@9600-8E1");
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, ModbusError, ModbusResult};

/// Baud rates accepted for serial ports.
pub const VALID_BAUD_RATES: &[u32] = &[
    300, 600, 1200, 2400, 4800, 9600, 14400, 19200, 38400, 57600, 115200, 230400, 460800, 921600,
];

/// Default per-request response timeout.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(1);

fn default_tcp_port() -> u16 {
    502
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_response_timeout() -> Duration {
    DEFAULT_RESPONSE_TIMEOUT
}

fn default_true() -> bool {
    true
}

// =============================================================================
// ModbusTcpConfig
// =============================================================================

/// Modbus TCP endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModbusTcpConfig {
    /// Host name or IP address.
    pub host: String,

    /// TCP port.
    #[serde(default = "default_tcp_port")]
    pub port: u16,

    /// Socket connect deadline.
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Per-request response timeout.
    #[serde(default = "default_response_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Enable TCP_NODELAY.
    #[serde(default = "default_true")]
    pub tcp_nodelay: bool,
}

impl ModbusTcpConfig {
    /// Creates a configuration with default port and timeouts.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_tcp_port(),
            connect_timeout: default_connect_timeout(),
            timeout: default_response_timeout(),
            tcp_nodelay: true,
        }
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the response timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `host:port`.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validates this configuration.
    pub fn validate(&self) -> ModbusResult<()> {
        if self.host.trim().is_empty() {
            return Err(ModbusError::configuration(ConfigurationError::invalid_host(
                &self.host,
                "host must not be empty",
            )));
        }
        if self.port == 0 {
            return Err(ModbusError::configuration(ConfigurationError::invalid_port(
                0,
                "port must be non-zero",
            )));
        }
        validate_timeout(self.timeout)?;
        validate_timeout(self.connect_timeout)
    }
}

// =============================================================================
// ModbusRtuConfig
// =============================================================================

/// Modbus RTU serial line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModbusRtuConfig {
    /// Serial port path, e.g. `/dev/ttyUSB0` or `COM1`.
    pub port: String,

    /// Baud rate.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Data bits.
    #[serde(default)]
    pub data_bits: DataBits,

    /// Parity.
    #[serde(default)]
    pub parity: Parity,

    /// Stop bits.
    #[serde(default)]
    pub stop_bits: StopBits,

    /// Per-request response timeout.
    #[serde(default = "default_response_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Inter-frame silence. Calculated from the line settings when unset.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "humantime_serde")]
    pub inter_frame_delay: Option<Duration>,
}

impl ModbusRtuConfig {
    /// Creates a 9600 8N1 configuration.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: default_baud_rate(),
            data_bits: DataBits::default(),
            parity: Parity::default(),
            stop_bits: StopBits::default(),
            timeout: default_response_timeout(),
            inter_frame_delay: None,
        }
    }

    /// Sets the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Sets the parity.
    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    /// Sets the response timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Modbus RTU 3.5 character silence for the line settings.
    ///
    /// At 9600 baud with 10 bits per character this is about 3.6ms; the
    /// result is never below 1ms.
    pub fn calculated_inter_frame_delay(&self) -> Duration {
        if let Some(delay) = self.inter_frame_delay {
            return delay;
        }

        let bits_per_char =
            1 + self.data_bits.bits() + self.parity.bits() + self.stop_bits.bits();
        let delay_us =
            (3.5 * f64::from(bits_per_char) / f64::from(self.baud_rate.max(1)) * 1_000_000.0) as u64;

        Duration::from_micros(delay_us.max(1000))
    }

    /// Validates this configuration.
    pub fn validate(&self) -> ModbusResult<()> {
        if self.port.trim().is_empty() {
            return Err(ModbusError::configuration(ConfigurationError::missing_field(
                "port",
            )));
        }
        if !VALID_BAUD_RATES.contains(&self.baud_rate) {
            return Err(ModbusError::configuration(
                ConfigurationError::InvalidBaudRate {
                    baud_rate: self.baud_rate,
                },
            ));
        }
        validate_timeout(self.timeout)
    }
}

fn validate_timeout(duration: Duration) -> ModbusResult<()> {
    if duration.is_zero() {
        return Err(ModbusError::configuration(ConfigurationError::InvalidTimeout {
            duration,
            reason: "timeout must be positive".to_string(),
        }));
    }
    Ok(())
}

// =============================================================================
// Serial Port Settings
// =============================================================================

/// Data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    /// 5 data bits.
    Five,
    /// 6 data bits.
    Six,
    /// 7 data bits.
    Seven,
    /// 8 data bits.
    #[default]
    Eight,
}

impl DataBits {
    /// Returns the number of bits.
    pub const fn bits(&self) -> u8 {
        match self {
            Self::Five => 5,
            Self::Six => 6,
            Self::Seven => 7,
            Self::Eight => 8,
        }
    }
}

impl TryFrom<u8> for DataBits {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            5 => Ok(Self::Five),
            6 => Ok(Self::Six),
            7 => Ok(Self::Seven),
            8 => Ok(Self::Eight),
            other => Err(format!("invalid data bits: {} (expected 5-8)", other)),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(value: DataBits) -> Self {
        value.bits()
    }
}

impl fmt::Display for DataBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// Parity mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    /// No parity.
    #[default]
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
}

impl Parity {
    /// Returns the number of parity bits.
    pub const fn bits(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Odd | Self::Even => 1,
        }
    }

    /// Returns the short character representation.
    pub const fn char(&self) -> char {
        match self {
            Self::None => 'N',
            Self::Odd => 'O',
            Self::Even => 'E',
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.char())
    }
}

/// Stop bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StopBits {
    /// 1 stop bit.
    #[default]
    One,
    /// 2 stop bits.
    Two,
}

impl StopBits {
    /// Returns the number of stop bits.
    pub const fn bits(&self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

impl TryFrom<u8> for StopBits {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(format!("invalid stop bits: {} (expected 1 or 2)", other)),
        }
    }
}

impl From<StopBits> for u8 {
    fn from(value: StopBits) -> Self {
        value.bits()
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

// =============================================================================
// ModbusConfig
// =============================================================================

/// Transport settings of one physical port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModbusConfig {
    /// Modbus TCP.
    Tcp(ModbusTcpConfig),
    /// Modbus RTU over a serial line.
    Rtu(ModbusRtuConfig),
}

impl ModbusConfig {
    /// Returns `true` for TCP.
    pub const fn is_tcp(&self) -> bool {
        matches!(self, Self::Tcp(_))
    }

    /// Returns `true` for RTU.
    pub const fn is_rtu(&self) -> bool {
        matches!(self, Self::Rtu(_))
    }

    /// Per-request response timeout.
    pub fn response_timeout(&self) -> Duration {
        match self {
            Self::Tcp(c) => c.timeout,
            Self::Rtu(c) => c.timeout,
        }
    }

    /// Validates the settings.
    pub fn validate(&self) -> ModbusResult<()> {
        match self {
            Self::Tcp(c) => c.validate(),
            Self::Rtu(c) => c.validate(),
        }
    }

    /// Short identifier for logs.
    pub fn display_name(&self) -> String {
        match self {
            Self::Tcp(c) => format!("tcp:{}", c.socket_addr()),
            Self::Rtu(c) => format!(
                "rtu:{}@{}-{}{}{}",
                c.port, c.baud_rate, c.data_bits, c.parity, c.stop_bits
            ),
        }
    }
}

impl fmt::Display for ModbusConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rtu_defaults() {
        let config = ModbusRtuConfig::new("/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, StopBits::One);
        assert_eq!(config.timeout, DEFAULT_RESPONSE_TIMEOUT);
    }

    #[test]
    fn test_rtu_validation() {
        assert!(ModbusRtuConfig::new("/dev/ttyS0").validate().is_ok());
        assert!(ModbusRtuConfig::new("").validate().is_err());
        assert!(ModbusRtuConfig::new("/dev/ttyS0").with_baud_rate(12345).validate().is_err());
        assert!(ModbusRtuConfig::new("/dev/ttyS0")
            .with_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_tcp_validation() {
        assert!(ModbusTcpConfig::new("10.0.0.5").validate().is_ok());
        assert!(ModbusTcpConfig::new("").validate().is_err());
        assert!(ModbusTcpConfig::new("10.0.0.5").with_port(0).validate().is_err());
    }

    #[test]
    fn test_inter_frame_delay() {
        let config = ModbusRtuConfig::new("/dev/ttyS0");
        let delay = config.calculated_inter_frame_delay();
        assert!(delay >= Duration::from_millis(3) && delay <= Duration::from_millis(5));

        let fast = ModbusRtuConfig::new("/dev/ttyS0").with_baud_rate(115200);
        assert_eq!(fast.calculated_inter_frame_delay(), Duration::from_millis(1));
    }

    #[test]
    fn test_tagged_deserialization() {
        let json = serde_json::json!({
            "type": "rtu",
            "port": "/dev/ttyUSB0",
            "baud_rate": 19200,
            "data_bits": 7,
            "parity": "even",
            "stop_bits": 2,
            "timeout": "500ms"
        });
        let config: ModbusConfig = serde_json::from_value(json).unwrap();
        match &config {
            ModbusConfig::Rtu(rtu) => {
                assert_eq!(rtu.data_bits, DataBits::Seven);
                assert_eq!(rtu.stop_bits, StopBits::Two);
                assert_eq!(rtu.parity, Parity::Even);
            }
            other => panic!("unexpected config: {:?}", other),
        }
        assert_eq!(config.response_timeout(), Duration::from_millis(500));

        let tcp: ModbusConfig =
            serde_json::from_value(serde_json::json!({"type": "tcp", "host": "plc.local"})).unwrap();
        assert_eq!(tcp.display_name(), "tcp:plc.local:502");
    }

    #[test]
    fn test_invalid_data_bits() {
        let json = serde_json::json!({"type": "rtu", "port": "/dev/ttyS0", "data_bits": 9});
        assert!(serde_json::from_value::<ModbusConfig>(json).is_err());
    }
}
