// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Failure and pacing policy shared by the poller and the saver.

use std::time::Duration;

/// Default consecutive failures before a device is considered unresponsive.
pub const DEFAULT_RETRIES: u32 = 3;

/// Default spacing between probes of an unresponsive device.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(60);

/// Default pause between two devices on the same bus.
pub const DEFAULT_INTER_DEVICE_DELAY: Duration = Duration::from_millis(50);

/// Default pause after a device poll aborted unexpectedly.
pub const DEFAULT_ERROR_DELAY: Duration = Duration::from_secs(1);

/// Default pause after a device's first register failed.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Failure tracking and bus pacing parameters.
///
/// # Examples
///
/// ```
/// use gauge_core::policy::PollPolicy;
/// use std::time::Duration;
///
/// let policy = PollPolicy::default().with_retries(5);
/// assert_eq!(policy.retries, 5);
/// assert_eq!(policy.probe_interval, Duration::from_secs(60));
/// assert!(policy.is_responding(4));
/// assert!(!policy.is_responding(5));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Consecutive failures after which a device is only probed.
    pub retries: u32,
    /// Minimum time between probes of an unresponsive device.
    pub probe_interval: Duration,
    /// Pause inserted after every device in a cycle.
    pub inter_device_delay: Duration,
    /// Pause inserted after a device poll aborted unexpectedly.
    pub error_delay: Duration,
    /// Pause after a device's first register read failed.
    pub settle_delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            inter_device_delay: DEFAULT_INTER_DEVICE_DELAY,
            error_delay: DEFAULT_ERROR_DELAY,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

impl PollPolicy {
    /// Sets the failure threshold.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Sets the probe interval.
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    /// Sets all pacing delays at once.
    pub fn with_delays(mut self, inter_device: Duration, error: Duration, settle: Duration) -> Self {
        self.inter_device_delay = inter_device;
        self.error_delay = error;
        self.settle_delay = settle;
        self
    }

    /// Policy without pacing delays, for tests.
    pub fn for_testing() -> Self {
        Self::default().with_delays(Duration::ZERO, Duration::ZERO, Duration::ZERO)
    }

    /// Returns `true` while `fail_count` is below the threshold.
    #[inline]
    pub fn is_responding(&self, fail_count: u32) -> bool {
        fail_count < self.retries
    }
}
