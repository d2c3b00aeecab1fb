// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema.
//!
//! ```text
//! GaugeConfig
//! ├── logging   LoggingConfig
//! ├── polling   PollingConfig   -> PollPolicy + ManagerSettings
//! ├── storage   StoreConfig
//! ├── runtime   RuntimeConfig
//! └── ports[]   PortConfig
//!     ├── transport  ModbusConfig
//!     └── devices[]  DeviceSpec
//! ```

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use gauge_core::policy::{
    DEFAULT_ERROR_DELAY, DEFAULT_INTER_DEVICE_DELAY, DEFAULT_PROBE_INTERVAL, DEFAULT_RETRIES,
    DEFAULT_SETTLE_DELAY,
};
use gauge_core::{collections_clash, DeviceSpec, PollPolicy, ValidationError};
use gauge_modbus::{ManagerSettings, ModbusConfig, DEFAULT_POLL_INTERVAL};
use gauge_store::{StoreBackend, StoreConfig};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Default interval of the runtime status summary.
pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(60);

// =============================================================================
// GaugeConfig
// =============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GaugeConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Poll loop pacing and failure policy, shared by every port.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Snapshot storage.
    #[serde(default)]
    pub storage: StoreConfig,

    /// Runtime behaviour of the binary.
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Physical ports, one manager each.
    #[serde(default)]
    pub ports: Vec<PortConfig>,
}

impl GaugeConfig {
    /// Validates the whole configuration.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::Validation`] found, with the path of
    /// the offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        self.polling.validate()?;
        self.runtime.validate()?;
        validate_storage(&self.storage)?;

        if self.ports.is_empty() {
            return Err(ConfigError::validation("ports", "at least one port is required"));
        }

        let mut port_names = HashSet::new();
        // Device names partition storage, so they are unique across ports.
        let mut device_names: Vec<(&str, String)> = Vec::new();

        for (i, port) in self.ports.iter().enumerate() {
            let path = format!("ports[{}]", i);
            port.validate(&path)?;
            if !port_names.insert(port.name.as_str()) {
                return Err(ConfigError::validation(
                    format!("{}.name", path),
                    format!("duplicate port name '{}'", port.name),
                ));
            }

            for (j, device) in port.devices.iter().enumerate() {
                let device_path = format!("{}.devices[{}]", path, j);
                if let Some((name, existing)) = device_names
                    .iter()
                    .find(|(name, _)| collections_clash(name, &device.name))
                {
                    let message = if *name == device.name {
                        format!("device name '{}' already used by {}", device.name, existing)
                    } else {
                        format!(
                            "device name '{}' shares a storage collection with '{}' ({})",
                            device.name, name, existing
                        )
                    };
                    return Err(ConfigError::validation(format!("{}.name", device_path), message));
                }
                device_names.push((device.name.as_str(), device_path));
            }
        }

        Ok(())
    }

    /// Ports with `enabled: true`, with their index in `ports`.
    pub fn enabled_ports(&self) -> impl Iterator<Item = (usize, &PortConfig)> {
        self.ports.iter().enumerate().filter(|(_, p)| p.enabled)
    }

    /// Total number of configured devices.
    pub fn device_count(&self) -> usize {
        self.ports.iter().map(|p| p.devices.len()).sum()
    }

    /// Returns a port by name.
    pub fn port(&self, name: &str) -> Option<&PortConfig> {
        self.ports.iter().find(|p| p.name == name)
    }
}

fn validate_storage(storage: &StoreConfig) -> ConfigResult<()> {
    if storage.backend != StoreBackend::Memory && storage.path.as_os_str().is_empty() {
        return Err(ConfigError::validation("storage.path", "cannot be empty"));
    }
    if storage.capacity == Some(0) {
        return Err(ConfigError::validation("storage.capacity", "must be greater than zero"));
    }
    Ok(())
}

// =============================================================================
// Port Configuration
// =============================================================================

fn default_enabled() -> bool {
    true
}

/// One physical port and the devices behind it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortConfig {
    /// Unique port name, used in logs.
    pub name: String,

    /// Disabled ports are skipped at startup.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Serial or TCP transport.
    pub transport: ModbusConfig,

    /// Devices polled on this port, in polling order.
    #[serde(default)]
    pub devices: Vec<DeviceSpec>,
}

impl PortConfig {
    /// Creates an enabled port without devices.
    pub fn new(name: impl Into<String>, transport: ModbusConfig) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            transport,
            devices: Vec::new(),
        }
    }

    /// Appends a device.
    pub fn with_device(mut self, device: DeviceSpec) -> Self {
        self.devices.push(device);
        self
    }

    fn validate(&self, path: &str) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::validation(format!("{}.name", path), "cannot be empty"));
        }

        self.transport
            .validate()
            .map_err(|e| ConfigError::validation(format!("{}.transport", path), e.to_string()))?;

        let mut slave_ids: HashMap<u8, &str> = HashMap::new();
        for (j, device) in self.devices.iter().enumerate() {
            let device_path = format!("{}.devices[{}]", path, j);
            let slave_id = device
                .validate()
                .map_err(|e| device_error(&device_path, &e))?;

            if let Some(existing) = slave_ids.insert(slave_id, device.name.as_str()) {
                return Err(ConfigError::validation(
                    format!("{}.slave_id", device_path),
                    ValidationError::DuplicateSlaveId {
                        slave_id,
                        existing: existing.to_string(),
                    }
                    .to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Maps a device validation error onto the field it concerns.
fn device_error(device_path: &str, error: &ValidationError) -> ConfigError {
    let field = match error {
        ValidationError::SlaveIdOutOfRange { .. } | ValidationError::DuplicateSlaveId { .. } => {
            "slave_id"
        }
        ValidationError::EmptyName
        | ValidationError::DuplicateName { .. }
        | ValidationError::CollectionClash { .. } => "name",
        ValidationError::ZeroSaveInterval { .. } => "save_interval",
        ValidationError::DuplicateRegisterKey { .. } => "registers",
    };
    ConfigError::validation(format!("{}.{}", device_path, field), error.to_string())
}

// =============================================================================
// Polling Configuration
// =============================================================================

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

fn default_probe_interval() -> Duration {
    DEFAULT_PROBE_INTERVAL
}

fn default_inter_device_delay() -> Duration {
    DEFAULT_INTER_DEVICE_DELAY
}

fn default_error_delay() -> Duration {
    DEFAULT_ERROR_DELAY
}

fn default_settle_delay() -> Duration {
    DEFAULT_SETTLE_DELAY
}

/// Poll loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollingConfig {
    /// Pause between polling cycles.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Consecutive failures before a device is only probed.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Minimum time between probes of an unresponsive device.
    #[serde(default = "default_probe_interval", with = "humantime_serde")]
    pub probe_interval: Duration,

    /// Pause after every device.
    #[serde(default = "default_inter_device_delay", with = "humantime_serde")]
    pub inter_device_delay: Duration,

    /// Pause after a device poll aborted unexpectedly.
    #[serde(default = "default_error_delay", with = "humantime_serde")]
    pub error_delay: Duration,

    /// Pause after a device's first register failed.
    #[serde(default = "default_settle_delay", with = "humantime_serde")]
    pub settle_delay: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            retries: DEFAULT_RETRIES,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            inter_device_delay: DEFAULT_INTER_DEVICE_DELAY,
            error_delay: DEFAULT_ERROR_DELAY,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

impl PollingConfig {
    /// Failure and pacing policy for the poller.
    pub fn policy(&self) -> PollPolicy {
        PollPolicy::default()
            .with_retries(self.retries)
            .with_probe_interval(self.probe_interval)
            .with_delays(self.inter_device_delay, self.error_delay, self.settle_delay)
    }

    /// Settings for one manager.
    pub fn manager_settings(&self) -> ManagerSettings {
        ManagerSettings::default()
            .with_poll_interval(self.poll_interval)
            .with_policy(self.policy())
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::validation("polling.poll_interval", "must be greater than zero"));
        }
        if self.retries == 0 {
            return Err(ConfigError::validation("polling.retries", "must be at least 1"));
        }
        if self.probe_interval.is_zero() {
            return Err(ConfigError::validation("polling.probe_interval", "must be greater than zero"));
        }
        Ok(())
    }
}

// =============================================================================
// Runtime Configuration
// =============================================================================

fn default_status_interval() -> Duration {
    DEFAULT_STATUS_INTERVAL
}

/// Runtime settings of the binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Interval of the periodic status summary in the log.
    #[serde(default = "default_status_interval", with = "humantime_serde")]
    pub status_interval: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            status_interval: DEFAULT_STATUS_INTERVAL,
        }
    }
}

impl RuntimeConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.status_interval.is_zero() {
            return Err(ConfigError::validation("runtime.status_interval", "must be greater than zero"));
        }
        Ok(())
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Filter directive for the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parses a level name, accepting `warning` for [`LogLevel::Warn`].
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// Single-line compact output.
    Compact,
    /// JSON lines for log shippers.
    Json,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use gauge_core::{DataType, FunctionCode, RegisterDefinition};
    use gauge_modbus::{ModbusRtuConfig, ModbusTcpConfig};

    fn boiler_room() -> PortConfig {
        PortConfig::new("boiler-room", ModbusConfig::Rtu(ModbusRtuConfig::new("/dev/ttyUSB0")))
            .with_device(DeviceSpec::new(1, "boiler1").with_register(RegisterDefinition::new(
                "Level",
                "parameters",
                FunctionCode::Holding,
                0,
                DataType::Uint16,
            )))
    }

    fn config_with(ports: Vec<PortConfig>) -> GaugeConfig {
        GaugeConfig {
            ports,
            ..GaugeConfig::default()
        }
    }

    #[test]
    fn test_valid_config() {
        let config = config_with(vec![boiler_room()]);
        assert!(config.validate().is_ok());
        assert_eq!(config.device_count(), 1);
        assert!(config.port("boiler-room").is_some());
    }

    #[test]
    fn test_requires_a_port() {
        let err = GaugeConfig::default().validate().unwrap_err();
        assert_eq!(err.field(), Some("ports"));
    }

    #[test]
    fn test_duplicate_port_name() {
        let second = PortConfig::new("boiler-room", ModbusConfig::Tcp(ModbusTcpConfig::new("10.0.0.5")));
        let err = config_with(vec![boiler_room(), second]).validate().unwrap_err();
        assert_eq!(err.field(), Some("ports[1].name"));
    }

    #[test]
    fn test_device_field_paths() {
        let port = boiler_room().with_device(DeviceSpec::new(300, "pump"));
        let err = config_with(vec![port]).validate().unwrap_err();
        assert_eq!(err.field(), Some("ports[0].devices[1].slave_id"));

        let port = boiler_room().with_device(DeviceSpec::new(1, "pump"));
        let err = config_with(vec![port]).validate().unwrap_err();
        assert_eq!(err.field(), Some("ports[0].devices[1].slave_id"));
        assert!(err.to_string().contains("boiler1"));

        let port = boiler_room()
            .with_device(DeviceSpec::new(2, "pump").with_save_interval(Duration::ZERO));
        let err = config_with(vec![port]).validate().unwrap_err();
        assert_eq!(err.field(), Some("ports[0].devices[1].save_interval"));
    }

    #[test]
    fn test_device_names_unique_across_ports() {
        let other = PortConfig::new("line-2", ModbusConfig::Tcp(ModbusTcpConfig::new("10.0.0.5")))
            .with_device(DeviceSpec::new(1, "boiler1"));
        let err = config_with(vec![boiler_room(), other]).validate().unwrap_err();
        assert_eq!(err.field(), Some("ports[1].devices[0].name"));

        let other = PortConfig::new("line-2", ModbusConfig::Tcp(ModbusTcpConfig::new("10.0.0.5")))
            .with_device(DeviceSpec::new(1, "BOILER1"));
        let err = config_with(vec![boiler_room(), other]).validate().unwrap_err();
        assert_eq!(err.field(), Some("ports[1].devices[0].name"));
        assert!(err.to_string().contains("storage collection"));

        let other = PortConfig::new("line-2", ModbusConfig::Tcp(ModbusTcpConfig::new("10.0.0.5")))
            .with_device(DeviceSpec::new(1, "Котел"))
            .with_device(DeviceSpec::new(2, "Насос"));
        assert!(config_with(vec![boiler_room(), other]).validate().is_ok());
    }

    #[test]
    fn test_invalid_transport() {
        let port = PortConfig::new(
            "bad",
            ModbusConfig::Rtu(ModbusRtuConfig::new("/dev/ttyUSB1").with_baud_rate(12345)),
        );
        let err = config_with(vec![port]).validate().unwrap_err();
        assert_eq!(err.field(), Some("ports[0].transport"));
    }

    #[test]
    fn test_polling_validation() {
        let mut config = config_with(vec![boiler_room()]);
        config.polling.retries = 0;
        assert_eq!(config.validate().unwrap_err().field(), Some("polling.retries"));

        let mut config = config_with(vec![boiler_room()]);
        config.polling.poll_interval = Duration::ZERO;
        assert_eq!(config.validate().unwrap_err().field(), Some("polling.poll_interval"));
    }

    #[test]
    fn test_polling_to_manager_settings() {
        let polling = PollingConfig {
            poll_interval: Duration::from_millis(500),
            retries: 5,
            ..PollingConfig::default()
        };
        let settings = polling.manager_settings();
        assert_eq!(settings.poll_interval, Duration::from_millis(500));
        assert_eq!(settings.policy.retries, 5);
        assert_eq!(settings.policy.probe_interval, Duration::from_secs(60));
        assert_eq!(settings.policy.settle_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_enabled_ports() {
        let mut disabled = PortConfig::new("spare", ModbusConfig::Tcp(ModbusTcpConfig::new("10.0.0.9")));
        disabled.enabled = false;
        let config = config_with(vec![boiler_room(), disabled]);
        let names: Vec<_> = config.enabled_ports().map(|(i, p)| (i, p.name.as_str())).collect();
        assert_eq!(names, vec![(0, "boiler-room")]);
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("loud"), None);
        assert_eq!(LogLevel::Debug.as_str(), "debug");
    }
}
