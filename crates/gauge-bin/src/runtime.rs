// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Polling runtime orchestration.
//!
//! Startup runs in this order:
//!
//! 1. Open the snapshot store
//! 2. Build one [`Manager`] per enabled port and register its devices
//! 3. Connect every port; a failing port is logged and skipped
//! 4. Start polling on the connected ports
//!
//! Shutdown disconnects every manager, which stops polling and save timers
//! before the port is closed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use gauge_config::{load_config, GaugeConfig};
use gauge_modbus::{Connection, Manager};
use gauge_store::open_store;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownSignal;

// =============================================================================
// PortRuntime
// =============================================================================

/// A configured port and its manager.
#[derive(Debug)]
pub struct PortRuntime {
    /// Port name from the configuration.
    pub name: String,
    /// Manager owning the port's devices.
    pub manager: Arc<Manager>,
    /// Whether the last connect attempt succeeded.
    pub connected: bool,
}

/// Opens the store and builds a manager for every enabled port.
///
/// # Errors
///
/// Returns [`BinError::Store`] if the store cannot be opened and
/// [`BinError::Configuration`] if a device is rejected or a transport cannot
/// be built.
pub fn build_ports(config: &GaugeConfig) -> BinResult<Vec<PortRuntime>> {
    let store = open_store(&config.storage)?;
    info!(
        backend = %config.storage.backend,
        path = %config.storage.path.display(),
        "Snapshot store opened"
    );

    let settings = config.polling.manager_settings();
    let mut ports = Vec::new();

    for (i, port) in config.enabled_ports() {
        let connection = Connection::new(&port.transport)
            .map_err(|e| BinError::config(format!("ports[{}].transport: {}", i, e)))?;
        let manager = Arc::new(Manager::new(
            Arc::new(connection),
            Arc::clone(&store),
            settings,
        ));

        for (j, spec) in port.devices.iter().enumerate() {
            manager
                .add_device(spec.clone())
                .map_err(|e| BinError::config(format!("ports[{}].devices[{}]: {}", i, j, e)))?;
        }

        info!(
            port = %port.name,
            transport = %port.transport,
            devices = manager.device_count(),
            "Port configured"
        );
        ports.push(PortRuntime {
            name: port.name.clone(),
            manager,
            connected: false,
        });
    }

    Ok(ports)
}

/// Connects every port. Returns the number of connected ports.
///
/// # Errors
///
/// Returns [`BinError::Initialization`] if ports are configured but none
/// could be connected.
pub async fn connect_ports(ports: &mut [PortRuntime]) -> BinResult<usize> {
    let mut connected = 0;
    for port in ports.iter_mut() {
        match port.manager.connect().await {
            Ok(()) => {
                port.connected = true;
                connected += 1;
            }
            Err(e) => {
                port.connected = false;
                error!(port = %port.name, error = %e, "Port unavailable, its devices will not be polled");
                // Stops the save timers started on registration.
                port.manager.disconnect().await;
            }
        }
    }

    if connected == 0 && !ports.is_empty() {
        return Err(BinError::init("no port could be connected"));
    }
    Ok(connected)
}

/// Disconnects every port.
pub async fn disconnect_all(ports: &[PortRuntime]) {
    for port in ports {
        port.manager.disconnect().await;
    }
}

/// Logs one summary line per port and a warning per unresponsive device.
pub fn log_status(ports: &[PortRuntime]) {
    for port in ports {
        let statuses = port.manager.get_devices_status();
        let responding = statuses.iter().filter(|s| s.is_responding).count();
        info!(
            port = %port.name,
            connected = port.manager.connection().is_connected(),
            polling = port.manager.is_polling(),
            devices = statuses.len(),
            responding,
            "Status"
        );
        for status in statuses.iter().filter(|s| !s.is_responding) {
            warn!(
                port = %port.name,
                device = %status.name,
                slave_id = status.slave_id,
                fail_count = status.fail_count,
                last_error = status.last_error.as_deref().unwrap_or("-"),
                "Device not responding"
            );
        }
    }
}

// =============================================================================
// GaugeRuntime
// =============================================================================

/// Runs the configured ports until shutdown is signaled.
pub struct GaugeRuntime {
    config: Arc<GaugeConfig>,
    shutdown: ShutdownSignal,
    skip_connect: bool,
}

impl GaugeRuntime {
    /// Creates a runtime for a validated configuration.
    pub fn new(config: GaugeConfig) -> Self {
        Self {
            config: Arc::new(config),
            shutdown: ShutdownSignal::new(),
            skip_connect: false,
        }
    }

    /// Builds managers without opening ports or polling.
    pub fn with_skip_connect(mut self, skip: bool) -> Self {
        self.skip_connect = skip;
        self
    }

    /// Handle for requesting shutdown from outside [`run`](Self::run).
    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Runs until a shutdown signal arrives.
    pub async fn run(self) -> BinResult<()> {
        info!(version = gauge_core::VERSION, "Starting gauge");

        let mut ports = build_ports(&self.config)?;

        if self.skip_connect {
            warn!("Skipping port connection, nothing will be polled");
        } else {
            if let Err(e) = connect_ports(&mut ports).await {
                disconnect_all(&ports).await;
                return Err(e);
            }
            for port in ports.iter().filter(|p| p.connected) {
                port.manager.start_polling();
            }
        }

        let ports = Arc::new(ports);
        let reporter = self.spawn_status_reporter(Arc::clone(&ports));

        info!(
            ports = ports.len(),
            connected = ports.iter().filter(|p| p.connected).count(),
            "gauge is running"
        );
        self.shutdown.wait().await;

        info!("Shutdown initiated, disconnecting ports...");
        if let Err(e) = reporter.await {
            warn!(error = %e, "Status reporter ended abnormally");
        }
        disconnect_all(&ports).await;

        info!("gauge shutdown complete");
        Ok(())
    }

    fn spawn_status_reporter(&self, ports: Arc<Vec<PortRuntime>>) -> JoinHandle<()> {
        let period = self.config.runtime.status_interval;
        let coordinator = self.shutdown.clone();
        let mut shutdown = coordinator.subscribe();

        tokio::spawn(async move {
            if coordinator.is_triggered() {
                return;
            }
            let mut ticker = tokio::time::interval(period);
            // The first tick fires immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => log_status(&ports),
                    _ = shutdown.recv() => break,
                }
            }
        })
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for constructing the runtime.
#[derive(Debug, Default)]
pub struct RuntimeBuilder {
    config_path: Option<PathBuf>,
    config: Option<GaugeConfig>,
    skip_connect: bool,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration file path.
    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the configuration directly.
    pub fn config(mut self, config: GaugeConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Skips port connection on startup.
    pub fn skip_connect(mut self, skip: bool) -> Self {
        self.skip_connect = skip;
        self
    }

    /// Builds the runtime, loading the configuration file if none was set.
    pub fn build(self) -> BinResult<GaugeRuntime> {
        let config = match self.config {
            Some(config) => {
                config.validate()?;
                config
            }
            None => {
                let path = self
                    .config_path
                    .ok_or_else(|| BinError::config("No configuration provided"))?;
                load_config(&path)?
            }
        };

        Ok(GaugeRuntime::new(config).with_skip_connect(self.skip_connect))
    }
}

// =============================================================================
// Tests
// =============================================================================
