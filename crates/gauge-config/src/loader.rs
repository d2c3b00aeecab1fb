// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading.
//!
//! Loading runs in this order:
//!
//! 1. `${VAR}` and `${VAR:default}` placeholders in the raw text are replaced
//! 2. The text is parsed as YAML, TOML or JSON depending on the extension
//! 3. Environment overrides are applied
//! 4. A relative storage path is resolved against the file's directory
//! 5. The result is validated
//!
//! # Environment Overrides
//!
//! ```text
//! GAUGE_LOG_LEVEL=debug
//! GAUGE_STORAGE_PATH=/var/lib/gauge
//! GAUGE_POLL_INTERVAL_MS=500
//! GAUGE_RETRIES=5
//! GAUGE_PORTS_0_ENABLED=false
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{GaugeConfig, LogLevel};

/// Default prefix of override variables.
pub const DEFAULT_ENV_PREFIX: &str = "GAUGE";

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    base_path: Option<PathBuf>,
    env_prefix: String,
    resolve_env_vars: bool,
    resolve_paths: bool,
}

impl ConfigLoader {
    /// Creates a loader with placeholders, overrides and path resolution enabled.
    pub fn new() -> Self {
        Self {
            base_path: None,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            resolve_env_vars: true,
            resolve_paths: true,
        }
    }

    /// Resolves relative paths against `path` instead of the file's directory.
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Sets the prefix of override variables.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables placeholders and overrides.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Enables or disables relative path resolution.
    pub fn with_path_resolution(mut self, enabled: bool) -> Self {
        self.resolve_paths = enabled;
        self
    }

    /// Loads and validates the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileNotFound`] or [`ConfigError::Io`] if the
    /// file cannot be read, [`ConfigError::Parse`] for malformed content and
    /// [`ConfigError::Validation`] for an invalid configuration.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<GaugeConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let base_path = self.base_path.clone().unwrap_or_else(|| {
            path.parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."))
        });

        let content = read_file(path)?;
        let format = ConfigFormat::from_path(path)?;
        let mut config = self
            .parse_content(&content, format)
            .map_err(|e| match e {
                ConfigError::Serialization { message } => ConfigError::parse(path, message),
                other => other,
            })?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }
        if self.resolve_paths {
            resolve_relative_paths(&mut config, &base_path);
        }

        config.validate()?;

        debug!(
            ports = config.ports.len(),
            devices = config.device_count(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Loads and validates configuration text.
    ///
    /// Relative paths are left untouched.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<GaugeConfig> {
        let mut config = self.parse_content(content, format)?;
        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }
        if let Some(base_path) = self.base_path.as_deref().filter(|_| self.resolve_paths) {
            resolve_relative_paths(&mut config, base_path);
        }
        config.validate()?;
        Ok(config)
    }

    fn parse_content(&self, content: &str, format: ConfigFormat) -> ConfigResult<GaugeConfig> {
        if self.resolve_env_vars {
            parse_str(&resolve_env_placeholders(content), format)
        } else {
            parse_str(content, format)
        }
    }

    fn apply_env_overrides(&self, config: &mut GaugeConfig) -> ConfigResult<()> {
        let var = |suffix: &str| format!("{}_{}", self.env_prefix, suffix);

        if let Ok(value) = env::var(var("LOG_LEVEL")) {
            config.logging.level = LogLevel::parse(&value).ok_or_else(|| {
                ConfigError::invalid_env_var(var("LOG_LEVEL"), "expected trace, debug, info, warn or error")
            })?;
        }

        if let Ok(value) = env::var(var("STORAGE_PATH")) {
            config.storage.path = PathBuf::from(value);
        }

        if let Ok(value) = env::var(var("POLL_INTERVAL_MS")) {
            let millis: u64 = value.parse().map_err(|_| {
                ConfigError::invalid_env_var(var("POLL_INTERVAL_MS"), "expected valid number")
            })?;
            config.polling.poll_interval = Duration::from_millis(millis);
        }

        if let Ok(value) = env::var(var("RETRIES")) {
            config.polling.retries = value.parse().map_err(|_| {
                ConfigError::invalid_env_var(var("RETRIES"), "expected valid number")
            })?;
        }

        for (i, port) in config.ports.iter_mut().enumerate() {
            if let Ok(value) = env::var(var(&format!("PORTS_{}_ENABLED", i))) {
                port.enabled = parse_bool(&value);
            }
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML, the default.
    Yaml,
    /// TOML.
    Toml,
    /// JSON.
    Json,
}

impl ConfigFormat {
    /// Detects the format from the file extension.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        match extension.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }

    /// Canonical file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn read_file(path: &Path) -> ConfigResult<String> {
    if !path.exists() {
        return Err(ConfigError::file_not_found(path));
    }
    fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))
}

fn parse_str(content: &str, format: ConfigFormat) -> ConfigResult<GaugeConfig> {
    match format {
        ConfigFormat::Yaml => parse_yaml(content),
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
    }
}

fn parse_yaml<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| ConfigError::serialization(e.to_string()))
}

/// Replaces `${VAR}` and `${VAR:default}` with environment values.
///
/// Unset variables without a default and unterminated placeholders are kept
/// verbatim.
fn resolve_env_placeholders(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find('}') else {
            result.push_str(&rest[start..]);
            return result;
        };

        let body = &after[..end];
        let (name, default) = match body.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (body, None),
        };

        match (env::var(name), default) {
            (Ok(value), _) => result.push_str(&value),
            (Err(_), Some(default)) => result.push_str(default),
            (Err(_), None) => {
                warn!(variable = name, "Environment variable not found");
                result.push_str(&rest[start..start + 2 + end + 1]);
            }
        }
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    result
}

fn resolve_relative_paths(config: &mut GaugeConfig, base_path: &Path) {
    if config.storage.path.is_relative() {
        config.storage.path = base_path.join(&config.storage.path);
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "true" | "1" | "yes" | "on" | "enabled"
    )
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
///
/// ```no_run
/// use gauge_config::loader::load_config;
///
/// let config = load_config("gauge.yaml").unwrap();
/// ```
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<GaugeConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration text with default settings.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<GaugeConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use gauge_core::{DataType, Endian, FunctionCode};
    use gauge_modbus::{DataBits, ModbusConfig, Parity, StopBits};
    use gauge_store::StoreBackend;
    use std::io::Write;

    const YAML: &str = r#"
logging:
  level: debug
polling:
  poll_interval: 2s
  retries: 4
storage:
  backend: jsonl
  path: ./data
ports:
  - name: boiler-room
    transport:
      type: rtu
      port: /dev/ttyUSB0
      baud_rate: 19200
      data_bits: 8
      parity: even
      stop_bits: 1
      timeout: 500ms
    devices:
      - slave_id: 1
        name: boiler1
        save_interval: 10s
        registers:
          - key: Level
            category: parameters
            function_code: holding
            address: 0
            data_type: uint16
            unit: мм
          - key: Pi
            category: parameters
            function_code: input
            address: 10
            data_type: float32
            word_order: little
"#;

    fn write_temp(name: &str, content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    fn loader() -> ConfigLoader {
        // A private prefix keeps overrides from other tests out.
        ConfigLoader::new().with_env_prefix("GAUGE_LOADER_TEST")
    }

    #[test]
    fn test_load_yaml() {
        let (dir, path) = write_temp("gauge.yaml", YAML);
        let config = loader().load(&path).unwrap();

        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.polling.poll_interval, Duration::from_secs(2));
        assert_eq!(config.polling.retries, 4);
        assert_eq!(config.polling.probe_interval, Duration::from_secs(60));
        assert_eq!(config.storage.backend, StoreBackend::Jsonl);
        assert_eq!(config.storage.path, dir.path().join("./data"));

        let port = &config.ports[0];
        assert!(port.enabled);
        let ModbusConfig::Rtu(rtu) = &port.transport else {
            panic!("expected rtu transport");
        };
        assert_eq!(rtu.baud_rate, 19200);
        assert_eq!(rtu.data_bits, DataBits::Eight);
        assert_eq!(rtu.parity, Parity::Even);
        assert_eq!(rtu.stop_bits, StopBits::One);
        assert_eq!(rtu.timeout, Duration::from_millis(500));

        let device = &port.devices[0];
        assert_eq!(device.save_interval, Duration::from_secs(10));
        assert_eq!(device.registers[0].unit, "мм");
        assert_eq!(device.registers[1].function_code, FunctionCode::Input);
        assert_eq!(device.registers[1].data_type, DataType::Float32);
        assert_eq!(device.registers[1].word_order, Endian::Little);
    }

    #[test]
    fn test_load_toml() {
        let toml = r#"
[[ports]]
name = "line-1"

[ports.transport]
type = "tcp"
host = "10.0.0.5"
port = 1502

[[ports.devices]]
slave_id = 3
name = "pump"
"#;
        let (_dir, path) = write_temp("gauge.toml", toml);
        let config = loader().load(&path).unwrap();
        let ModbusConfig::Tcp(tcp) = &config.ports[0].transport else {
            panic!("expected tcp transport");
        };
        assert_eq!(tcp.socket_addr(), "10.0.0.5:1502");
        assert_eq!(config.ports[0].devices[0].slave_id, 3);
    }

    #[test]
    fn test_load_json() {
        let json = r#"{"ports": [{"name": "line-1",
            "transport": {"type": "tcp", "host": "10.0.0.5"},
            "devices": [{"slave_id": 3, "name": "pump", "save_interval": "1m"}]}]}"#;
        let config = loader().load_from_str(json, ConfigFormat::Json).unwrap();
        assert_eq!(config.ports[0].devices[0].save_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_missing_file() {
        let err = loader().load("/nonexistent/gauge.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_parse_error_names_file() {
        let (_dir, path) = write_temp("gauge.yaml", "ports: [ {name: 1");
        let err = loader().load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_validation_error_path() {
        let yaml = YAML.replace("slave_id: 1", "slave_id: 0");
        let (_dir, path) = write_temp("gauge.yaml", &yaml);
        let err = loader().load(&path).unwrap_err();
        assert_eq!(err.field(), Some("ports[0].devices[0].slave_id"));
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.yml")).unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.TOML")).unwrap(), ConfigFormat::Toml);
        assert!(ConfigFormat::from_path(Path::new("a.ini")).is_err());
        assert!(ConfigFormat::from_path(Path::new("gauge")).is_err());
    }

    #[test]
    fn test_env_placeholders() {
        env::set_var("GAUGE_PLACEHOLDER_TEST_PORT", "/dev/ttyS3");
        let resolved = resolve_env_placeholders(
            "port: ${GAUGE_PLACEHOLDER_TEST_PORT}\nbaud: ${GAUGE_PLACEHOLDER_UNSET:9600}\nx: ${GAUGE_PLACEHOLDER_UNSET}\ny: ${open",
        );
        assert_eq!(
            resolved,
            "port: /dev/ttyS3\nbaud: 9600\nx: ${GAUGE_PLACEHOLDER_UNSET}\ny: ${open"
        );
    }

    #[test]
    fn test_env_overrides() {
        let prefix = "GAUGE_OVERRIDE_TEST";
        env::set_var(format!("{}_LOG_LEVEL", prefix), "warning");
        env::set_var(format!("{}_POLL_INTERVAL_MS", prefix), "250");
        env::set_var(format!("{}_RETRIES", prefix), "6");
        env::set_var(format!("{}_STORAGE_PATH", prefix), "/var/lib/gauge");
        env::set_var(format!("{}_PORTS_0_ENABLED", prefix), "false");

        let config = ConfigLoader::new()
            .with_env_prefix(prefix)
            .load_from_str(YAML, ConfigFormat::Yaml)
            .unwrap();
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert_eq!(config.polling.poll_interval, Duration::from_millis(250));
        assert_eq!(config.polling.retries, 6);
        assert_eq!(config.storage.path, PathBuf::from("/var/lib/gauge"));
        assert!(!config.ports[0].enabled);
    }

    #[test]
    fn test_invalid_env_override() {
        let prefix = "GAUGE_BAD_OVERRIDE_TEST";
        env::set_var(format!("{}_RETRIES", prefix), "many");
        let err = ConfigLoader::new()
            .with_env_prefix(prefix)
            .load_from_str(YAML, ConfigFormat::Yaml)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { .. }));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("Yes"));
        assert!(parse_bool("1"));
        assert!(!parse_bool("off"));
    }
}
