// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Lifecycle facade for one connection and its devices.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────────────────────────────┐
//!  add/remove ──▶ │                 Manager                  │ ──▶ status
//!                 │  registry: Vec<Arc<Device>>              │
//!                 │  poll loop task ──▶ Poller ──▶ Reader ───┼──▶ Connection
//!                 │  Saver (one timer task per device) ──────┼──▶ SnapshotStore
//!                 └──────────────────────────────────────────┘
//! ```
//!
//! Exactly one poll cycle runs against the connection at a time. Stopping
//! and restarting the loop in quick succession is safe: the new loop waits
//! for a cycle still running in the old one.

use std::sync::Arc;
use std::time::Duration;

use gauge_core::{
    collections_clash, CoreError, Device, DeviceData, DeviceSpec, DeviceStatus, PollPolicy, Saver,
    SnapshotStore, ValidationError,
};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::client::Connection;
use crate::error::ModbusResult;
use crate::poller::{CycleSummary, Poller};

/// Default pause between poll cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

// =============================================================================
// ManagerSettings
// =============================================================================

/// Scheduling settings of a [`Manager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerSettings {
    /// Pause between the end of one cycle and the start of the next.
    pub poll_interval: Duration,
    /// Failure and pacing policy.
    pub policy: PollPolicy,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            policy: PollPolicy::default(),
        }
    }
}

impl ManagerSettings {
    /// Sets the poll interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets the policy.
    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }
}

// =============================================================================
// Manager
// =============================================================================

struct PollLoop {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owns the devices, poll loop and save timers of one connection.
pub struct Manager {
    connection: Arc<Connection>,
    poller: Arc<Poller>,
    saver: Saver,
    settings: ManagerSettings,
    devices: Arc<RwLock<Vec<Arc<Device>>>>,
    poll_loop: Mutex<Option<PollLoop>>,
    cycle_lock: Arc<tokio::sync::Mutex<()>>,
}

impl Manager {
    /// Creates a manager. Snapshots of its devices go to `store`.
    pub fn new(
        connection: Arc<Connection>,
        store: Arc<dyn SnapshotStore>,
        settings: ManagerSettings,
    ) -> Self {
        let poller = Arc::new(Poller::new(Arc::clone(&connection), settings.policy));
        Self {
            connection,
            poller,
            saver: Saver::new(store, settings.policy.retries),
            settings,
            devices: Arc::new(RwLock::new(Vec::new())),
            poll_loop: Mutex::new(None),
            cycle_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// The shared connection.
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Scheduling settings.
    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// Validates and registers a device, then starts its save timer.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for an invalid spec or a name or
    /// slave id already in use, and [`CoreError::Store`] if the storage
    /// collection cannot be opened.
    pub fn add_device(&self, spec: DeviceSpec) -> Result<Arc<Device>, CoreError> {
        let device = Arc::new(Device::new(spec)?);

        let mut devices = self.devices.write();
        if let Some(existing) = devices.iter().find(|d| d.name() == device.name()) {
            return Err(ValidationError::DuplicateName {
                name: existing.name().to_string(),
            }
            .into());
        }
        if let Some(existing) = devices
            .iter()
            .find(|d| collections_clash(d.name(), device.name()))
        {
            return Err(ValidationError::CollectionClash {
                name: device.name().to_string(),
                existing: existing.name().to_string(),
            }
            .into());
        }
        if let Some(existing) = devices.iter().find(|d| d.slave_id() == device.slave_id()) {
            return Err(ValidationError::DuplicateSlaveId {
                slave_id: device.slave_id(),
                existing: existing.name().to_string(),
            }
            .into());
        }

        self.saver.start_device_saving(&device)?;
        devices.push(Arc::clone(&device));

        info!(
            connection = %self.connection.name(),
            device = %device.name(),
            slave_id = device.slave_id(),
            registers = device.registers().len(),
            "Device registered"
        );
        Ok(device)
    }

    /// Unregisters the device with `slave_id` and stops its save timer.
    /// Returns whether a device was found.
    pub fn remove_device(&self, slave_id: u8) -> bool {
        let removed = {
            let mut devices = self.devices.write();
            devices
                .iter()
                .position(|d| d.slave_id() == slave_id)
                .map(|index| devices.remove(index))
        };

        match removed {
            Some(device) => {
                self.saver.stop_device_saving(device.name());
                info!(device = %device.name(), slave_id = slave_id, "Device removed");
                true
            }
            None => false,
        }
    }

    /// Registered devices in registration order.
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.devices.read().clone()
    }

    /// Device with `slave_id`.
    pub fn device(&self, slave_id: u8) -> Option<Arc<Device>> {
        self.devices
            .read()
            .iter()
            .find(|d| d.slave_id() == slave_id)
            .cloned()
    }

    /// Last-known dataset of the named device.
    pub fn device_data(&self, name: &str) -> Option<Arc<DeviceData>> {
        self.devices
            .read()
            .iter()
            .find(|d| d.name() == name)
            .map(|d| d.data())
    }

    /// Number of registered devices.
    pub fn device_count(&self) -> usize {
        self.devices.read().len()
    }

    /// Status of every device in registration order.
    pub fn get_devices_status(&self) -> Vec<DeviceStatus> {
        let policy = self.settings.policy;
        self.devices
            .read()
            .iter()
            .map(|d| d.status(&policy))
            .collect()
    }

    // =========================================================================
    // Polling
    // =========================================================================

    /// Returns `true` while the poll loop is scheduled.
    pub fn is_polling(&self) -> bool {
        self.poll_loop.lock().is_some()
    }

    /// Starts the poll loop. Returns `false` if it was already running.
    pub fn start_polling(&self) -> bool {
        let mut slot = self.poll_loop.lock();
        if slot.is_some() {
            return false;
        }

        let (stop, mut stop_rx) = watch::channel(false);
        let poller = Arc::clone(&self.poller);
        let devices = Arc::clone(&self.devices);
        let cycle_lock = Arc::clone(&self.cycle_lock);
        let interval = self.settings.poll_interval;
        let name = self.connection.name().to_string();

        let handle = tokio::spawn(async move {
            loop {
                {
                    let _cycle = cycle_lock.lock().await;
                    if *stop_rx.borrow() {
                        break;
                    }
                    let snapshot = devices.read().clone();
                    let summary = poller.poll_all_devices(&snapshot).await;
                    debug!(
                        connection = %name,
                        polled = summary.polled,
                        probed = summary.probed,
                        skipped = summary.skipped,
                        failed = summary.failed,
                        "Poll cycle finished"
                    );
                }

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = stop_rx.changed() => break,
                }
            }
            debug!(connection = %name, "Poll loop exited");
        });

        *slot = Some(PollLoop { stop, handle });
        info!(connection = %self.connection.name(), interval = ?interval, "Polling started");
        true
    }

    /// Stops the poll loop. A cycle in progress finishes; no new one starts.
    /// Returns `false` if the loop was not running.
    pub fn stop_polling(&self) -> bool {
        match self.poll_loop.lock().take() {
            Some(poll_loop) => {
                let _ = poll_loop.stop.send(true);
                drop(poll_loop.handle);
                info!(connection = %self.connection.name(), "Polling stopped");
                true
            }
            None => false,
        }
    }

    /// Runs a single cycle now, outside the loop.
    pub async fn poll_once(&self) -> CycleSummary {
        let _cycle = self.cycle_lock.lock().await;
        let snapshot = self.devices();
        self.poller.poll_all_devices(&snapshot).await
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Opens the connection.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the port cannot be opened.
    pub async fn connect(&self) -> ModbusResult<()> {
        self.connection.connect().await
    }

    /// Stops polling and every save timer, waits for a running cycle and
    /// closes the connection.
    pub async fn disconnect(&self) {
        self.stop_polling();
        self.saver.stop_all_saving();
        let _cycle = self.cycle_lock.lock().await;
        self.connection.disconnect().await;
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        if let Some(poll_loop) = self.poll_loop.get_mut().take() {
            let _ = poll_loop.stop.send(true);
            poll_loop.handle.abort();
        }
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("connection", &self.connection.name())
            .field("devices", &self.device_count())
            .field("polling", &self.is_polling())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use async_trait::async_trait;
    use gauge_core::{
        DataType, FunctionCode, PersistedSnapshot, RegisterDefinition, SnapshotSink, StoreError,
    };

    use crate::testing::{Probe, Reply, ScriptedTransport};

    #[derive(Debug, Default)]
    struct CountingSink(Mutex<usize>);

    #[async_trait]
    impl SnapshotSink for CountingSink {
        async fn insert(&self, _snapshot: &PersistedSnapshot) -> Result<(), StoreError> {
            *self.0.lock() += 1;
            Ok(())
        }

        fn collection(&self) -> &str {
            "counting"
        }
    }

    #[derive(Debug, Default)]
    struct CountingStore(Mutex<HashMap<String, Arc<CountingSink>>>);

    impl CountingStore {
        fn count(&self, device: &str) -> usize {
            self.0.lock().get(device).map(|s| *s.0.lock()).unwrap_or(0)
        }
    }

    impl SnapshotStore for CountingStore {
        fn collection(&self, device: &str) -> Result<Arc<dyn SnapshotSink>, StoreError> {
            let sink: Arc<dyn SnapshotSink> =
                Arc::clone(self.0.lock().entry(device.to_string()).or_default()) as _;
            Ok(sink)
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn spec(slave_id: i64, name: &str) -> DeviceSpec {
        DeviceSpec::new(slave_id, name).with_register(
            RegisterDefinition::new("Level", "parameters", FunctionCode::Holding, 0, DataType::Uint16)
                .with_unit("мм"),
        )
    }

    fn manager(transport: ScriptedTransport) -> (Manager, Probe, Arc<CountingStore>) {
        let probe = transport.probe();
        let connection = Arc::new(Connection::with_transport(
            Box::new(transport),
            Duration::from_secs(1),
        ));
        let store = Arc::new(CountingStore::default());
        let settings = ManagerSettings::default()
            .with_poll_interval(Duration::from_secs(1))
            .with_policy(PollPolicy::for_testing());
        (Manager::new(connection, store.clone(), settings), probe, store)
    }

    #[tokio::test]
    async fn test_add_device_validation() {
        let (manager, _, _) = manager(ScriptedTransport::new());

        assert!(matches!(
            manager.add_device(spec(0, "zero")),
            Err(CoreError::Validation(ValidationError::SlaveIdOutOfRange { slave_id: 0 }))
        ));
        assert!(matches!(
            manager.add_device(spec(248, "high")),
            Err(CoreError::Validation(_))
        ));

        manager.add_device(spec(1, "boiler1")).unwrap();
        assert!(matches!(
            manager.add_device(spec(2, "boiler1")),
            Err(CoreError::Validation(ValidationError::DuplicateName { .. }))
        ));
        assert!(matches!(
            manager.add_device(spec(1, "boiler2")),
            Err(CoreError::Validation(ValidationError::DuplicateSlaveId { slave_id: 1, .. }))
        ));
        assert!(matches!(
            manager.add_device(spec(2, "Boiler1")),
            Err(CoreError::Validation(ValidationError::CollectionClash { .. }))
        ));
        manager.add_device(spec(2, "boiler 1")).unwrap();
        assert_eq!(manager.device_count(), 2);
    }

    #[tokio::test]
    async fn test_remove_device() {
        let (manager, _, _) = manager(ScriptedTransport::new());
        manager.add_device(spec(1, "boiler1")).unwrap();
        manager.add_device(spec(2, "boiler2")).unwrap();

        assert!(manager.remove_device(1));
        assert!(!manager.remove_device(1));
        assert!(manager.device(1).is_none());
        assert_eq!(manager.devices()[0].name(), "boiler2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_lifecycle() {
        let transport =
            ScriptedTransport::new().on(1, FunctionCode::Holding, 0, Reply::Words(vec![150]));
        let (manager, probe, _) = manager(transport);
        manager.add_device(spec(1, "boiler1")).unwrap();
        manager.connect().await.unwrap();

        assert!(manager.start_polling());
        assert!(!manager.start_polling());
        assert!(manager.is_polling());

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(probe.reads(), 3);

        let data = manager.device_data("boiler1").unwrap();
        assert_eq!(
            data["parameters"]["Level"].number(),
            Some(gauge_core::Number::Int(150))
        );

        assert!(manager.stop_polling());
        assert!(!manager.stop_polling());
        assert!(!manager.is_polling());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(probe.reads(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_stops_timers_and_polling() {
        let transport =
            ScriptedTransport::new().on(1, FunctionCode::Holding, 0, Reply::Words(vec![150]));
        let (manager, probe, store) = manager(transport);
        manager
            .add_device(spec(1, "boiler1").with_save_interval(Duration::from_secs(5)))
            .unwrap();
        manager.connect().await.unwrap();
        manager.start_polling();

        tokio::time::sleep(Duration::from_millis(5500)).await;
        assert_eq!(store.count("boiler1"), 1);

        manager.disconnect().await;
        assert!(!manager.is_polling());
        assert!(!manager.connection().is_connected());

        let reads = probe.reads();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.count("boiler1"), 1);
        assert_eq!(probe.reads(), reads);
    }

    #[tokio::test]
    async fn test_status_projection() {
        let (manager, _, _) = manager(ScriptedTransport::new());
        manager.add_device(spec(4, "pump")).unwrap();

        let status = manager.get_devices_status();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].slave_id, 4);
        assert!(status[0].is_responding);
        assert!(status[0].data.is_empty());
    }
}
