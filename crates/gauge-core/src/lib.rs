// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # gauge-core
//!
//! Protocol-independent core of the gauge Modbus poller.
//!
//! - **Types**: register definitions and the decoded dataset model
//! - **Decoder**: pure conversion of raw register words into values
//! - **Device**: registered devices, failure counters and the swappable dataset
//! - **Store**: append-only snapshot storage traits
//! - **Saver**: per-device periodic snapshot timers
//!
//! ## Architecture
//!
//! ```text
//!                 ┌───────────────┐
//!  raw words ───▶ │    decoder    │ ───▶ DecodedValue
//!                 └───────────────┘
//!                         │
//!                         ▼
//!                 ┌───────────────┐   Arc<DeviceData>   ┌─────────┐   insert   ┌───────────────┐
//!                 │    Device     │ ──────────────────▶ │  Saver  │ ─────────▶ │ SnapshotSink  │
//!                 └───────────────┘                     └─────────┘            └───────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use gauge_core::decoder::decode_register;
//! use gauge_core::types::{DataType, DecodedValue, FunctionCode, Number, RegisterDefinition};
//!
//! let temp = RegisterDefinition::new("Temp", "parameters", FunctionCode::Input, 2, DataType::Int16)
//!     .with_scale(0.1, 1)
//!     .with_unit("°C");
//!
//! let value = decode_register(&temp, &[215]);
//! assert_eq!(value, Some(DecodedValue::Number(Number::Float(21.5))));
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod decoder;
pub mod device;
pub mod error;
pub mod policy;
pub mod saver;
pub mod store;
pub mod types;

// =============================================================================
// Re-exports
// =============================================================================

pub use device::{Device, DeviceHealth, DeviceSpec, DeviceStatus};
pub use error::{CoreError, CoreResult, DecodeError, StoreError, ValidationError};
pub use policy::PollPolicy;
pub use saver::{SaveOutcome, Saver};
pub use store::{
    collection_name, collections_clash, PersistedSnapshot, SnapshotSink, SnapshotStore,
};
pub use types::{
    ByteOrder, DataType, DecodedValue, DeviceData, Endian, FunctionCode, Number,
    RegisterDefinition, RegisterValue, WordOrder,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
