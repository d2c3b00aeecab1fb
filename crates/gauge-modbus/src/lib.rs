// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # gauge-modbus
//!
//! Modbus master polling for gauge.
//!
//! - **Transports**: RTU over tokio-serial and TCP, both via `tokio-modbus`
//! - **Connection**: one open transport shared by every device on a port
//! - **Reader**: bounded single-register reads decoded with `gauge-core`
//! - **Poller**: sequential poll cycles with failure tracking and probe backoff
//! - **Manager**: device registry, poll loop and save timers of one port
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            Manager                              │
//! │          (registry, poll loop, per-device save timers)          │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Poller ──▶ Reader                           │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Connection ──▶ ModbusTransport                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gauge_modbus::{Connection, Manager, ManagerSettings, ModbusConfig, ModbusRtuConfig};
//!
//! let config = ModbusConfig::Rtu(ModbusRtuConfig::new("/dev/ttyUSB0"));
//! let connection = Arc::new(Connection::new(&config)?);
//! let manager = Manager::new(connection, store, ManagerSettings::default());
//!
//! manager.add_device(spec)?;
//! manager.connect().await?;
//! manager.start_polling();
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod client;
pub mod error;
pub mod manager;
pub mod poller;
pub mod reader;
pub mod types;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use client::{
    Connection, ModbusRtuTransport, ModbusTcpTransport, ModbusTransport, TransportState,
};
pub use error::{
    ConfigurationError, ConnectionError, ModbusError, ModbusResult, OperationError,
    ProtocolError, TimeoutError,
};
pub use manager::{Manager, ManagerSettings, DEFAULT_POLL_INTERVAL};
pub use poller::{CycleSummary, PollOutcome, Poller};
pub use reader::{ReadFailure, ReadResult, ReadSuccess, Reader, TIMEOUT_MARGIN};
pub use types::{DataBits, ModbusConfig, ModbusRtuConfig, ModbusTcpConfig, Parity, StopBits};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
