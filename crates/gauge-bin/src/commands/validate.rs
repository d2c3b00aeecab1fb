// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use gauge_config::{load_config, GaugeConfig};
use gauge_store::StoreBackend;

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Executes the `validate` command.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;
    let config = load_config(config_path).map_err(|e| {
        BinError::config(format!("Configuration validation failed: {}", e))
    })?;
    let warnings = collect_warnings(&config);

    match args.format {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {}", config_path.display());
            println!();
            println!("Summary:");
            println!("  Ports:    {} ({} enabled)", config.ports.len(), config.enabled_ports().count());
            println!("  Devices:  {}", config.device_count());
            println!("  Storage:  {} at {}", config.storage.backend, config.storage.path.display());
            println!("  Interval: {}", humantime::format_duration(config.polling.poll_interval));
            for port in &config.ports {
                println!(
                    "  - {} [{}] {}: {} devices",
                    port.name,
                    if port.enabled { "enabled" } else { "disabled" },
                    port.transport,
                    port.devices.len()
                );
            }

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "summary": {
                    "port_count": config.ports.len(),
                    "enabled_port_count": config.enabled_ports().count(),
                    "device_count": config.device_count(),
                    "storage_backend": config.storage.backend.to_string(),
                    "poll_interval_ms": config.polling.poll_interval.as_millis() as u64,
                },
                "warnings": warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Conditions that are valid but probably unintended.
fn collect_warnings(config: &GaugeConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.enabled_ports().next().is_none() {
        warnings.push("All ports are disabled".to_string());
    }
    for port in &config.ports {
        if port.devices.is_empty() {
            warnings.push(format!("Port '{}' has no devices", port.name));
        }
        for device in port.devices.iter().filter(|d| d.registers.is_empty()) {
            warnings.push(format!("Device '{}' on port '{}' has no registers", device.name, port.name));
        }
    }
    if config.storage.backend == StoreBackend::Rocksdb && !cfg!(feature = "rocksdb-backend") {
        warnings.push("RocksDB storage requires the rocksdb-backend feature".to_string());
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauge_config::PortConfig;
    use gauge_core::DeviceSpec;
    use gauge_modbus::{ModbusConfig, ModbusTcpConfig};

    #[test]
    fn test_collect_warnings() {
        let mut spare = PortConfig::new("spare", ModbusConfig::Tcp(ModbusTcpConfig::new("10.0.0.9")));
        spare.enabled = false;
        let config = GaugeConfig {
            ports: vec![spare.with_device(DeviceSpec::new(1, "pump"))],
            ..GaugeConfig::default()
        };

        let warnings = collect_warnings(&config);
        assert!(warnings.contains(&"All ports are disabled".to_string()));
        assert!(warnings.iter().any(|w| w.contains("'pump'")));
    }
}
