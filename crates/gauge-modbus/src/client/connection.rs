// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Shared connection to one physical port.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};

use crate::error::ModbusResult;
use crate::types::ModbusConfig;

use super::rtu::ModbusRtuTransport;
use super::tcp::ModbusTcpTransport;
use super::transport::ModbusTransport;

/// One open transport shared by every device on a port.
///
/// The transport sits behind an async mutex, so a read that is in flight
/// when [`disconnect`](Self::disconnect) is called completes (or times out)
/// before the port is closed.
pub struct Connection {
    name: String,
    response_timeout: Duration,
    transport: Mutex<Box<dyn ModbusTransport>>,
    connected: AtomicBool,
}

impl Connection {
    /// Builds a closed connection for `config`.
    pub fn new(config: &ModbusConfig) -> ModbusResult<Self> {
        config.validate()?;

        let transport: Box<dyn ModbusTransport> = match config {
            ModbusConfig::Tcp(tcp) => Box::new(ModbusTcpTransport::new(tcp.clone())),
            ModbusConfig::Rtu(rtu) => Box::new(ModbusRtuTransport::new(rtu.clone())),
        };

        Ok(Self::with_transport(transport, config.response_timeout()))
    }

    /// Wraps an existing transport.
    pub fn with_transport(transport: Box<dyn ModbusTransport>, response_timeout: Duration) -> Self {
        Self {
            name: transport.display_name(),
            response_timeout,
            transport: Mutex::new(transport),
            connected: AtomicBool::new(false),
        }
    }

    /// Display name of the underlying transport.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Per-request response timeout applied on connect.
    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    /// Returns `true` once [`connect`](Self::connect) succeeded and until
    /// [`disconnect`](Self::disconnect).
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Opens the transport.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if the port cannot be opened. The
    /// connection stays closed and is not retried.
    pub async fn connect(&self) -> ModbusResult<()> {
        let mut transport = self.transport.lock().await;
        if self.is_connected() {
            return Ok(());
        }

        if let Err(e) = transport.connect().await {
            tracing::error!(connection = %self.name, error = %e, "Failed to open connection");
            return Err(e);
        }
        transport.set_timeout(self.response_timeout);
        self.connected.store(true, Ordering::Release);

        tracing::info!(
            connection = %self.name,
            timeout = ?self.response_timeout,
            "Connection opened"
        );
        Ok(())
    }

    /// Closes the transport. Never fails.
    pub async fn disconnect(&self) {
        let mut transport = self.transport.lock().await;
        if let Err(e) = transport.disconnect().await {
            tracing::warn!(connection = %self.name, error = %e, "Error while closing connection");
        }
        if self.connected.swap(false, Ordering::AcqRel) {
            tracing::info!(connection = %self.name, "Connection closed");
        }
    }

    /// Exclusive access to the transport for one request.
    pub async fn transport(&self) -> MutexGuard<'_, Box<dyn ModbusTransport>> {
        self.transport.lock().await
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("connected", &self.is_connected())
            .finish()
    }
}
