// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Polled device records.
//!
//! A [`Device`] is shared between the poll loop and its save timer. The poll
//! loop is the only writer: it swaps in a freshly built [`DeviceData`] once a
//! cycle completes and updates failure counters. The save timer and status
//! queries only read, taking a cheap `Arc` clone of the current dataset.
//!
//! ```text
//!   Poller ──write──▶ ┌──────────────────────┐ ◀──read── Saver
//!                     │ data: Arc<DeviceData> │
//!                     │ health: DeviceHealth  │ ◀──read── status
//!                     └──────────────────────┘
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::ValidationError;
use crate::policy::PollPolicy;
use crate::types::{DeviceData, RegisterDefinition};

/// Lowest valid Modbus slave address.
pub const MIN_SLAVE_ID: i64 = 1;

/// Highest valid Modbus unicast slave address.
pub const MAX_SLAVE_ID: i64 = 247;

/// Default interval between persisted snapshots.
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(30);

fn default_save_interval() -> Duration {
    DEFAULT_SAVE_INTERVAL
}

// =============================================================================
// DeviceSpec
// =============================================================================

/// Unvalidated input for registering a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DeviceSpec {
    /// Modbus slave address, checked against 1–247 on registration.
    pub slave_id: i64,

    /// Unique device name, also the storage partition.
    pub name: String,

    /// Registers read every cycle, in order.
    #[serde(default)]
    pub registers: Vec<RegisterDefinition>,

    /// Interval between persisted snapshots.
    #[serde(default = "default_save_interval", with = "humantime_serde")]
    pub save_interval: Duration,
}

impl DeviceSpec {
    /// Creates a spec with no registers and the default save interval.
    pub fn new(slave_id: i64, name: impl Into<String>) -> Self {
        Self {
            slave_id,
            name: name.into(),
            registers: Vec::new(),
            save_interval: DEFAULT_SAVE_INTERVAL,
        }
    }

    /// Appends a register definition.
    pub fn with_register(mut self, register: RegisterDefinition) -> Self {
        self.registers.push(register);
        self
    }

    /// Sets the save interval.
    pub fn with_save_interval(mut self, interval: Duration) -> Self {
        self.save_interval = interval;
        self
    }

    /// Checks the fields that do not depend on other registered devices.
    pub fn validate(&self) -> Result<u8, ValidationError> {
        if !(MIN_SLAVE_ID..=MAX_SLAVE_ID).contains(&self.slave_id) {
            return Err(ValidationError::slave_id(self.slave_id));
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.save_interval.is_zero() {
            return Err(ValidationError::ZeroSaveInterval {
                device: self.name.clone(),
            });
        }

        let mut seen = HashSet::new();
        for register in &self.registers {
            if !seen.insert(register.key.as_str()) {
                return Err(ValidationError::DuplicateRegisterKey {
                    device: self.name.clone(),
                    key: register.key.clone(),
                });
            }
        }

        Ok(self.slave_id as u8)
    }
}

// =============================================================================
// DeviceHealth
// =============================================================================

/// Failure tracking state of a device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceHealth {
    /// Consecutive failed cycles since the last success.
    pub fail_count: u32,
    /// Time of the last successful cycle.
    pub last_success: Option<DateTime<Utc>>,
    /// Error text of the last failed cycle, cleared on success.
    pub last_error: Option<String>,
    /// Time of the last persisted snapshot.
    pub last_save: Option<DateTime<Utc>>,
    /// Monotonic time of the last probe of an unresponsive device.
    pub last_retry_attempt: Option<Instant>,
}

// =============================================================================
// Device
// =============================================================================

/// A registered device and its last-known dataset.
#[derive(Debug)]
pub struct Device {
    slave_id: u8,
    name: String,
    registers: Vec<RegisterDefinition>,
    save_interval: Duration,
    data: RwLock<Arc<DeviceData>>,
    health: Mutex<DeviceHealth>,
}

impl Device {
    /// Validates `spec` and builds a device with zeroed counters.
    pub fn new(spec: DeviceSpec) -> Result<Self, ValidationError> {
        let slave_id = spec.validate()?;
        Ok(Self {
            slave_id,
            name: spec.name,
            registers: spec.registers,
            save_interval: spec.save_interval,
            data: RwLock::new(Arc::new(DeviceData::new())),
            health: Mutex::new(DeviceHealth::default()),
        })
    }

    /// Modbus slave address.
    #[inline]
    pub fn slave_id(&self) -> u8 {
        self.slave_id
    }

    /// Device name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register definitions in poll order.
    #[inline]
    pub fn registers(&self) -> &[RegisterDefinition] {
        &self.registers
    }

    /// Snapshot interval.
    #[inline]
    pub fn save_interval(&self) -> Duration {
        self.save_interval
    }

    // =========================================================================
    // Dataset
    // =========================================================================

    /// Current dataset. Never observed half-updated.
    pub fn data(&self) -> Arc<DeviceData> {
        Arc::clone(&self.data.read())
    }

    /// Replaces the dataset wholesale.
    pub fn replace_data(&self, data: DeviceData) {
        *self.data.write() = Arc::new(data);
    }

    // =========================================================================
    // Health
    // =========================================================================

    /// Copy of the failure tracking state.
    pub fn health(&self) -> DeviceHealth {
        self.health.lock().clone()
    }

    /// Consecutive failure count.
    pub fn fail_count(&self) -> u32 {
        self.health.lock().fail_count
    }

    /// Records a failed cycle and returns the new failure count.
    pub fn record_failure(&self, error: impl Into<String>) -> u32 {
        let mut health = self.health.lock();
        health.fail_count = health.fail_count.saturating_add(1);
        health.last_error = Some(error.into());
        health.fail_count
    }

    /// Records a successful cycle.
    pub fn record_success(&self) {
        let mut health = self.health.lock();
        health.fail_count = 0;
        health.last_success = Some(Utc::now());
        health.last_error = None;
    }

    /// Records that an unresponsive device was probed at `at`.
    pub fn record_retry_attempt(&self, at: Instant) {
        self.health.lock().last_retry_attempt = Some(at);
    }

    /// Records a persisted snapshot.
    pub fn record_save(&self, at: DateTime<Utc>) {
        self.health.lock().last_save = Some(at);
    }

    /// Read-only status projection.
    pub fn status(&self, policy: &PollPolicy) -> DeviceStatus {
        let health = self.health();
        DeviceStatus {
            slave_id: self.slave_id,
            name: self.name.clone(),
            fail_count: health.fail_count,
            last_success: health.last_success,
            last_error: health.last_error,
            last_save: health.last_save,
            is_responding: policy.is_responding(health.fail_count),
            data: self.data(),
        }
    }
}

// =============================================================================
// DeviceStatus
// =============================================================================

/// Point-in-time view of a device for status consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    /// Modbus slave address.
    pub slave_id: u8,
    /// Device name.
    pub name: String,
    /// Consecutive failed cycles.
    pub fail_count: u32,
    /// Last successful cycle.
    pub last_success: Option<DateTime<Utc>>,
    /// Last failure text.
    pub last_error: Option<String>,
    /// Last persisted snapshot.
    pub last_save: Option<DateTime<Utc>>,
    /// `fail_count < retries`.
    pub is_responding: bool,
    /// Last-known dataset.
    pub data: Arc<DeviceData>,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, FunctionCode, RegisterValue, Number};

    fn level() -> RegisterDefinition {
        RegisterDefinition::new("Level", "parameters", FunctionCode::Holding, 0, DataType::Uint16)
            .with_unit("мм")
    }

    #[test]
    fn test_slave_id_range() {
        for bad in [0, -1, 248, 1000] {
            let err = Device::new(DeviceSpec::new(bad, "dev")).unwrap_err();
            assert_eq!(err, ValidationError::SlaveIdOutOfRange { slave_id: bad });
        }
        assert_eq!(Device::new(DeviceSpec::new(1, "a")).unwrap().slave_id(), 1);
        assert_eq!(Device::new(DeviceSpec::new(247, "b")).unwrap().slave_id(), 247);
    }

    #[test]
    fn test_rejects_empty_name_and_duplicate_keys() {
        assert_eq!(
            Device::new(DeviceSpec::new(3, "  ")).unwrap_err(),
            ValidationError::EmptyName
        );

        let spec = DeviceSpec::new(3, "boiler1").with_register(level()).with_register(level());
        assert!(matches!(
            Device::new(spec).unwrap_err(),
            ValidationError::DuplicateRegisterKey { .. }
        ));
    }

    #[test]
    fn test_counters_start_zeroed() {
        let device = Device::new(DeviceSpec::new(1, "boiler1").with_register(level())).unwrap();
        let health = device.health();
        assert_eq!(health, DeviceHealth::default());
        assert!(device.data().is_empty());
        assert_eq!(device.save_interval(), DEFAULT_SAVE_INTERVAL);
    }

    #[test]
    fn test_failure_and_success_tracking() {
        let device = Device::new(DeviceSpec::new(1, "boiler1")).unwrap();
        assert_eq!(device.record_failure("Timeout"), 1);
        assert_eq!(device.record_failure("Timeout"), 2);
        assert_eq!(device.health().last_error.as_deref(), Some("Timeout"));

        device.record_success();
        let health = device.health();
        assert_eq!(health.fail_count, 0);
        assert!(health.last_error.is_none());
        assert!(health.last_success.is_some());
    }

    #[test]
    fn test_replace_data_keeps_old_snapshots_intact() {
        let device = Device::new(DeviceSpec::new(1, "boiler1")).unwrap();
        let before = device.data();

        let mut data = DeviceData::new();
        data.entry("parameters".to_string())
            .or_default()
            .insert("Level".to_string(), RegisterValue::numeric(Some(Number::Int(150)), "мм"));
        device.replace_data(data);

        assert!(before.is_empty());
        assert_eq!(
            device.data()["parameters"]["Level"],
            RegisterValue::numeric(Some(Number::Int(150)), "мм")
        );
    }

    #[test]
    fn test_status_projection() {
        let device = Device::new(DeviceSpec::new(9, "pump")).unwrap();
        let policy = PollPolicy::default().with_retries(2);
        device.record_failure("Timeout");
        assert!(device.status(&policy).is_responding);
        device.record_failure("Timeout");

        let status = device.status(&policy);
        assert!(!status.is_responding);
        assert_eq!(status.fail_count, 2);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["slaveId"], 9);
        assert_eq!(json["isResponding"], false);
        assert_eq!(json["lastError"], "Timeout");
    }
}
