// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Periodic per-device snapshot persistence.
//!
//! Each device gets its own timer task. Timers are independent of the poll
//! loop and of each other: a slow or failing storage write delays only the
//! device it belongs to.
//!
//! The first tick fires one full interval after scheduling, so a freshly
//! registered device is never persisted before it has been polled.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::StoreError;
use crate::store::{PersistedSnapshot, SnapshotSink, SnapshotStore};

// =============================================================================
// SaveOutcome
// =============================================================================

/// Result of a single save tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A snapshot was written.
    Saved,
    /// Nothing polled yet.
    SkippedEmpty,
    /// The device is flagged unresponsive.
    SkippedUnresponsive,
    /// The storage write failed.
    Failed,
}

/// Runs one save tick for `device` against `sink`.
///
/// Skips silently when the dataset is empty or `fail_count >= retries`.
/// Storage failures are logged and reported as [`SaveOutcome::Failed`].
pub async fn save_snapshot(device: &Device, sink: &dyn SnapshotSink, retries: u32) -> SaveOutcome {
    let data = device.data();
    if data.is_empty() {
        return SaveOutcome::SkippedEmpty;
    }
    if device.fail_count() >= retries {
        return SaveOutcome::SkippedUnresponsive;
    }

    let snapshot = PersistedSnapshot::now(device.slave_id(), data);
    match sink.insert(&snapshot).await {
        Ok(()) => {
            device.record_save(snapshot.timestamp);
            debug!(device = %device.name(), collection = %sink.collection(), "Snapshot saved");
            SaveOutcome::Saved
        }
        Err(e) => {
            warn!(device = %device.name(), error = %e, "Failed to save snapshot");
            SaveOutcome::Failed
        }
    }
}

// =============================================================================
// Saver
// =============================================================================

/// Owns the save timers of all devices on one connection.
#[derive(Debug)]
pub struct Saver {
    store: Arc<dyn SnapshotStore>,
    retries: u32,
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl Saver {
    /// Creates a saver writing into `store`.
    pub fn new(store: Arc<dyn SnapshotStore>, retries: u32) -> Self {
        Self {
            store,
            retries,
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// Storage backend.
    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    /// Schedules the periodic save of `device`.
    ///
    /// Returns `Ok(false)` if the device already has a timer.
    pub fn start_device_saving(&self, device: &Arc<Device>) -> Result<bool, StoreError> {
        let mut timers = self.timers.lock();
        if timers.contains_key(device.name()) {
            return Ok(false);
        }

        let sink = self.store.collection(device.name())?;
        let period = device.save_interval();
        let retries = self.retries;
        let device = Arc::clone(device);
        let name = device.name().to_string();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                save_snapshot(&device, sink.as_ref(), retries).await;
            }
        });

        info!(device = %name, interval = ?period, "Snapshot saving started");
        timers.insert(name, handle);
        Ok(true)
    }

    /// Cancels the timer of the named device. Returns whether one existed.
    pub fn stop_device_saving(&self, name: &str) -> bool {
        match self.timers.lock().remove(name) {
            Some(handle) => {
                handle.abort();
                debug!(device = %name, "Snapshot saving stopped");
                true
            }
            None => false,
        }
    }

    /// Cancels every timer.
    pub fn stop_all_saving(&self) {
        let timers: Vec<_> = self.timers.lock().drain().collect();
        for (_, handle) in &timers {
            handle.abort();
        }
        if !timers.is_empty() {
            info!(count = timers.len(), "Snapshot saving stopped for all devices");
        }
    }

    /// Returns `true` if the named device has an active timer.
    pub fn is_saving(&self, name: &str) -> bool {
        self.timers.lock().contains_key(name)
    }

    /// Number of active timers.
    pub fn active_count(&self) -> usize {
        self.timers.lock().len()
    }
}

impl Drop for Saver {
    fn drop(&mut self) {
        for (_, handle) in self.timers.get_mut().drain() {
            handle.abort();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::device::DeviceSpec;
    use crate::types::{DeviceData, Number, RegisterValue};

    #[derive(Debug, Default)]
    struct RecordingSink {
        saved: Mutex<Vec<PersistedSnapshot>>,
        fail: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl SnapshotSink for RecordingSink {
        async fn insert(&self, snapshot: &PersistedSnapshot) -> Result<(), StoreError> {
            if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(StoreError::backend("disk full"));
            }
            self.saved.lock().push(snapshot.clone());
            Ok(())
        }

        fn collection(&self) -> &str {
            "test"
        }
    }

    #[derive(Debug, Default)]
    struct RecordingStore {
        sinks: Mutex<HashMap<String, Arc<RecordingSink>>>,
    }

    impl RecordingStore {
        fn saved(&self, device: &str) -> usize {
            self.sinks
                .lock()
                .get(device)
                .map(|s| s.saved.lock().len())
                .unwrap_or(0)
        }
    }

    impl SnapshotStore for RecordingStore {
        fn collection(&self, device: &str) -> Result<Arc<dyn SnapshotSink>, StoreError> {
            let sink: Arc<dyn SnapshotSink> =
                Arc::clone(self.sinks.lock().entry(device.to_string()).or_default()) as _;
            Ok(sink)
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn device_with_data(name: &str, interval: Duration) -> Arc<Device> {
        let device = Device::new(DeviceSpec::new(1, name).with_save_interval(interval)).unwrap();
        let mut data = DeviceData::new();
        data.entry("parameters".to_string())
            .or_default()
            .insert("Level".to_string(), RegisterValue::numeric(Some(Number::Int(150)), "мм"));
        device.replace_data(data);
        Arc::new(device)
    }

    #[tokio::test]
    async fn test_save_snapshot_skips() {
        let sink = RecordingSink::default();
        let empty = Device::new(DeviceSpec::new(2, "empty")).unwrap();
        assert_eq!(save_snapshot(&empty, &sink, 3).await, SaveOutcome::SkippedEmpty);

        let device = device_with_data("boiler1", Duration::from_secs(30));
        for _ in 0..3 {
            device.record_failure("Timeout");
        }
        assert_eq!(save_snapshot(&device, &sink, 3).await, SaveOutcome::SkippedUnresponsive);
        assert!(sink.saved.lock().is_empty());

        device.record_success();
        assert_eq!(save_snapshot(&device, &sink, 3).await, SaveOutcome::Saved);
        assert_eq!(sink.saved.lock().len(), 1);
        assert!(device.health().last_save.is_some());
    }

    #[tokio::test]
    async fn test_save_snapshot_storage_failure() {
        let sink = RecordingSink::default();
        sink.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        let device = device_with_data("boiler1", Duration::from_secs(30));
        assert_eq!(save_snapshot(&device, &sink, 3).await, SaveOutcome::Failed);
        assert!(device.health().last_save.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_first_tick_after_one_interval() {
        let store = Arc::new(RecordingStore::default());
        let saver = Saver::new(store.clone(), 3);
        let device = device_with_data("boiler1", Duration::from_secs(10));

        assert!(saver.start_device_saving(&device).unwrap());
        assert!(!saver.start_device_saving(&device).unwrap());

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(store.saved("boiler1"), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.saved("boiler1"), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(store.saved("boiler1"), 2);

        assert!(saver.stop_device_saving("boiler1"));
        assert!(!saver.stop_device_saving("boiler1"));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.saved("boiler1"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all_saving() {
        let store = Arc::new(RecordingStore::default());
        let saver = Saver::new(store.clone(), 3);
        saver.start_device_saving(&device_with_data("a", Duration::from_secs(5))).unwrap();
        saver.start_device_saving(&device_with_data("b", Duration::from_secs(5))).unwrap();
        assert_eq!(saver.active_count(), 2);

        saver.stop_all_saving();
        saver.stop_all_saving();
        assert_eq!(saver.active_count(), 0);
        assert!(!saver.is_saving("a"));

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(store.saved("a") + store.saved("b"), 0);
    }
}
