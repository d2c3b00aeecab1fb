// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Reference devices, register maps and configuration files.

use std::time::Duration;

use gauge_core::{DataType, DeviceSpec, Endian, FunctionCode, RegisterDefinition};

use super::mocks::MockTransport;

// =============================================================================
// Devices
// =============================================================================

/// Device specs shared by the integration tests.
pub struct DeviceFixtures;

impl DeviceFixtures {
    /// A boiler controller mixing every register table and decoding option:
    ///
    /// | Key   | Table   | Address | Type    | Notes              |
    /// |-------|---------|---------|---------|--------------------|
    /// | Level | holding | 0       | uint16  | unit `мм`          |
    /// | Temp  | input   | 2       | int16   | scale 0.1, 1 dp    |
    /// | Pi    | input   | 10      | float32 | little word order  |
    /// | Pump  | coil    | 3       | bool    |                    |
    /// | Alarm | holding | 5       | uint16  | bit 2              |
    pub fn boiler(slave_id: i64, name: &str) -> DeviceSpec {
        DeviceSpec::new(slave_id, name)
            .with_register(
                RegisterDefinition::new("Level", "parameters", FunctionCode::Holding, 0, DataType::Uint16)
                    .with_unit("мм"),
            )
            .with_register(
                RegisterDefinition::new("Temp", "parameters", FunctionCode::Input, 2, DataType::Int16)
                    .with_unit("°C")
                    .with_scale(0.1, 1),
            )
            .with_register(
                RegisterDefinition::new("Pi", "parameters", FunctionCode::Input, 10, DataType::Float32)
                    .with_order(Endian::Big, Endian::Little),
            )
            .with_register(RegisterDefinition::new(
                "Pump",
                "status",
                FunctionCode::Coil,
                3,
                DataType::Bool,
            ))
            .with_register(
                RegisterDefinition::new("Alarm", "status", FunctionCode::Holding, 5, DataType::Uint16)
                    .with_bit(2),
            )
    }

    /// `boiler1` on slave 1.
    pub fn boiler1() -> DeviceSpec {
        Self::boiler(1, "boiler1")
    }

    /// A pump with a single speed register.
    pub fn pump(slave_id: i64, name: &str) -> DeviceSpec {
        DeviceSpec::new(slave_id, name).with_register(
            RegisterDefinition::new("Speed", "parameters", FunctionCode::Holding, 0, DataType::Uint16)
                .with_unit("rpm"),
        )
    }

    /// `boiler1` saving every `interval`.
    pub fn boiler1_saving_every(interval: Duration) -> DeviceSpec {
        Self::boiler1().with_save_interval(interval)
    }
}

// =============================================================================
// Register Maps
// =============================================================================

/// Expected decoded values of [`TransportFixtures::boiler`].
pub mod boiler_values {
    /// `Level` in мм.
    pub const LEVEL: f64 = 150.0;
    /// `Temp` in °C.
    pub const TEMP: f64 = 21.5;
    /// `Pi`.
    pub const PI: f64 = std::f32::consts::PI as f64;
    /// `Pump`.
    pub const PUMP: bool = true;
    /// `Alarm`.
    pub const ALARM: bool = true;
}

/// Register maps matching [`DeviceFixtures`].
pub struct TransportFixtures;

impl TransportFixtures {
    /// Answers every register of [`DeviceFixtures::boiler`] on `slave_id`.
    pub fn boiler(transport: MockTransport, slave_id: u8) -> MockTransport {
        transport
            .with_words(slave_id, FunctionCode::Holding, 0, &[150])
            .with_words(slave_id, FunctionCode::Input, 2, &[215])
            .with_words(slave_id, FunctionCode::Input, 10, &[0x4049, 0x0FDB])
            .with_bits(slave_id, FunctionCode::Coil, 3, &[true])
            .with_words(slave_id, FunctionCode::Holding, 5, &[0b0000_0100])
    }

    /// Answers [`DeviceFixtures::pump`] on `slave_id` with `rpm`.
    pub fn pump(transport: MockTransport, slave_id: u8, rpm: u16) -> MockTransport {
        transport.with_words(slave_id, FunctionCode::Holding, 0, &[rpm])
    }
}

// =============================================================================
// Configuration Files
// =============================================================================

/// Configuration file contents.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// An RTU port and a disabled TCP port, stored in memory.
    pub const TWO_PORTS_YAML: &'static str = r#"
logging:
  level: debug
  format: json

polling:
  poll_interval: 500ms
  retries: 5
  probe_interval: 2m

storage:
  backend: memory

ports:
  - name: boiler-room
    transport:
      type: rtu
      port: /dev/ttyUSB0
      baud_rate: 19200
      parity: even
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
            unit: "мм"
          - key: Pi
            category: parameters
            function_code: input
            address: 10
            data_type: float32
            word_order: little
      - slave_id: 2
        name: pump2
        registers:
          - key: Speed
            category: parameters
            function_code: holding
            address: 0
            data_type: uint16
            unit: rpm

  - name: spare
    enabled: false
    transport:
      type: tcp
      host: 192.168.1.50
    devices:
      - slave_id: 1
        name: spare-meter
        registers:
          - key: Energy
            category: counters
            function_code: input
            address: 0
            data_type: uint32
"#;

    /// A single TCP port whose host comes from `GAUGE_IT_HOST`, defaulting
    /// to `10.0.0.9`.
    pub const TCP_WITH_PLACEHOLDER_TOML: &'static str = r#"
[storage]
backend = "jsonl"
path = "snapshots"

[[ports]]
name = "meters"

[ports.transport]
type = "tcp"
host = "${GAUGE_IT_HOST:10.0.0.9}"
port = 1502

[[ports.devices]]
slave_id = 7
name = "meter7"

[[ports.devices.registers]]
key = "Power"
category = "parameters"
function_code = "input"
address = 4
data_type = "float32"
unit = "kW"
"#;
}
