// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus transports and the shared connection.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Connection                              │
//! │            (one per physical port, shared by devices)           │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      ModbusTransport                            │
//! │                (abstract transport layer)                       │
//! └─────────────────────────────────────────────────────────────────┘
//!            │                                     │
//!            ▼                                     ▼
//! ┌─────────────────────┐             ┌─────────────────────┐
//! │  ModbusRtuTransport │             │  ModbusTcpTransport │
//! │ (tokio-modbus/serial)│            │   (tokio-modbus)    │
//! └─────────────────────┘             └─────────────────────┘
//! ```

mod connection;
mod rtu;
mod tcp;
mod transport;

pub use connection::Connection;
pub use rtu::ModbusRtuTransport;
pub use tcp::ModbusTcpTransport;
pub use transport::{ModbusTransport, TransportState};
