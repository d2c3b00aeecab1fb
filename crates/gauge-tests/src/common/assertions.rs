// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Assertion helpers for device datasets.

use std::time::Duration;

use gauge_core::{DeviceData, RegisterValue};

/// Tolerance for numeric comparisons.
pub const EPSILON: f64 = 1e-6;

/// Looks up `category.key` in a dataset.
pub fn value_at<'a>(data: &'a DeviceData, category: &str, key: &str) -> Option<&'a RegisterValue> {
    data.get(category).and_then(|c| c.get(key))
}

/// Asserts that `category.key` holds a number close to `expected`.
#[track_caller]
pub fn assert_number(data: &DeviceData, category: &str, key: &str, expected: f64) {
    let value = value_at(data, category, key)
        .unwrap_or_else(|| panic!("{}.{} missing from {:?}", category, key, data));
    let number = value
        .number()
        .unwrap_or_else(|| panic!("{}.{} is not a number: {:?}", category, key, value));
    assert!(
        (number.as_f64() - expected).abs() < EPSILON,
        "{}.{}: expected {}, got {:?}",
        category,
        key,
        expected,
        number
    );
}

/// Asserts that `category.key` holds the flag `expected`.
#[track_caller]
pub fn assert_flag(data: &DeviceData, category: &str, key: &str, expected: bool) {
    let value = value_at(data, category, key)
        .unwrap_or_else(|| panic!("{}.{} missing from {:?}", category, key, data));
    assert_eq!(value.flag(), Some(expected), "{}.{}: {:?}", category, key, value);
}

/// Asserts that `category.key` is absent.
#[track_caller]
pub fn assert_missing(data: &DeviceData, category: &str, key: &str) {
    assert!(
        value_at(data, category, key).is_none(),
        "{}.{} should be missing from {:?}",
        category,
        key,
        data
    );
}

/// Polls `condition` every 10ms until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
