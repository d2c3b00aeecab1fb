// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Poll cycles over the devices of one connection.
//!
//! # Device States
//!
//! ```text
//!            failure                 fail_count >= retries
//! Healthy ───────────▶ Degraded ─────────────────────────▶ Quiescent
//!    ▲                                                         │
//!    └──────────────── any successful probe ◀──────────────────┘
//!                                            (one probe per probe_interval)
//! ```
//!
//! Devices are polled strictly one after another, registers strictly in
//! order. A panic while polling one device is caught at the cycle level and
//! never stops the remaining devices.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use gauge_core::{Device, DeviceData, PollPolicy, RegisterValue};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::client::Connection;
use crate::reader::{ReadResult, Reader};

// =============================================================================
// Outcomes
// =============================================================================

/// Result of polling one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The connection is closed; nothing was read.
    NotConnected,
    /// The first register answered. `failed` later registers were dropped
    /// from the dataset.
    Completed {
        /// Registers read.
        read: usize,
        /// Registers that failed after the first.
        failed: usize,
    },
    /// The first register failed; the rest were skipped.
    Failed {
        /// Error of the first register.
        error: String,
    },
}

/// Counters of one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Devices polled normally.
    pub polled: usize,
    /// Quiescent devices probed.
    pub probed: usize,
    /// Quiescent devices skipped.
    pub skipped: usize,
    /// Devices whose poll failed.
    pub failed: usize,
    /// Devices whose poll panicked.
    pub panicked: usize,
}

// =============================================================================
// Poller
// =============================================================================

/// Drives poll cycles for one connection.
#[derive(Debug, Clone)]
pub struct Poller {
    connection: Arc<Connection>,
    reader: Reader,
    policy: PollPolicy,
}

impl Poller {
    /// Creates a poller reading over `connection`.
    pub fn new(connection: Arc<Connection>, policy: PollPolicy) -> Self {
        let reader = Reader::new(Arc::clone(&connection));
        Self {
            connection,
            reader,
            policy,
        }
    }

    /// The applied policy.
    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Reads every register of `device` and swaps in the new dataset.
    ///
    /// If the first register fails the device is counted as failed, its
    /// dataset stays untouched and the remaining registers are skipped after
    /// the settle delay. Later failures only drop their key from the new
    /// dataset.
    pub async fn poll_device(&self, device: &Device) -> PollOutcome {
        if !self.connection.is_connected() {
            return PollOutcome::NotConnected;
        }

        let mut data = DeviceData::new();
        let mut read = 0;
        let mut failed = 0;

        for (index, register) in device.registers().iter().enumerate() {
            match self.reader.read_register(device, register).await {
                ReadResult::Success(success) => {
                    let value = RegisterValue::from_reading(register, success.value);
                    data.entry(success.category)
                        .or_default()
                        .insert(success.key, value);
                    read += 1;
                }
                ReadResult::Failure(failure) if index == 0 => {
                    let fail_count = device.record_failure(failure.error.clone());
                    warn!(
                        device = %device.name(),
                        slave_id = device.slave_id(),
                        fail_count = fail_count,
                        error = %failure.error,
                        "Device did not respond"
                    );
                    sleep(self.policy.settle_delay).await;
                    return PollOutcome::Failed {
                        error: failure.error,
                    };
                }
                ReadResult::Failure(_) => {
                    failed += 1;
                }
            }
        }

        let recovered = device.fail_count() >= self.policy.retries;
        device.record_success();
        device.replace_data(data);

        if recovered {
            info!(device = %device.name(), slave_id = device.slave_id(), "Device responding again");
        }
        debug!(device = %device.name(), read = read, failed = failed, "Device polled");

        PollOutcome::Completed { read, failed }
    }

    /// Runs one cycle over `devices` in order.
    ///
    /// Quiescent devices (`fail_count >= retries`) are probed at most once
    /// per probe interval and skipped otherwise.
    pub async fn poll_all_devices(&self, devices: &[Arc<Device>]) -> CycleSummary {
        let mut summary = CycleSummary::default();

        for device in devices {
            if device.fail_count() >= self.policy.retries {
                let now = Instant::now();
                let due = device
                    .health()
                    .last_retry_attempt
                    .map_or(true, |at| now.duration_since(at) >= self.policy.probe_interval);

                if !due {
                    summary.skipped += 1;
                    sleep(self.policy.inter_device_delay).await;
                    continue;
                }

                device.record_retry_attempt(now);
                summary.probed += 1;
                debug!(device = %device.name(), slave_id = device.slave_id(), "Probing unresponsive device");
            } else {
                summary.polled += 1;
            }

            match AssertUnwindSafe(self.poll_device(device)).catch_unwind().await {
                Ok(PollOutcome::Failed { .. }) => summary.failed += 1,
                Ok(_) => {}
                Err(_) => {
                    summary.panicked += 1;
                    error!(device = %device.name(), slave_id = device.slave_id(), "Poll of device panicked");
                    sleep(self.policy.error_delay).await;
                }
            }

            sleep(self.policy.inter_device_delay).await;
        }

        summary
    }
}

// =============================================================================
// Tests
// =============================================================================
