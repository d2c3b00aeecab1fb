// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # gauge-store
//!
//! Snapshot storage backends for gauge.
//!
//! Every backend implements [`gauge_core::SnapshotStore`] and hands out one
//! append-only [`gauge_core::SnapshotSink`] per device.
//!
//! | Backend                  | Persistence          | Feature           |
//! |--------------------------|----------------------|-------------------|
//! | [`MemorySnapshotStore`]  | none                 | always            |
//! | [`JsonLinesSnapshotStore`] | one `.jsonl` file per device | always  |
//! | `RocksDbSnapshotStore`   | single RocksDB       | `rocksdb-backend` |
//!
//! ## Example
//!
//! ```
//! use gauge_store::{open_store, StoreBackend, StoreConfig};
//!
//! let store = open_store(&StoreConfig::new(StoreBackend::Memory)).unwrap();
//! assert_eq!(store.name(), "memory");
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod config;
pub mod jsonl;
pub mod memory;

#[cfg(feature = "rocksdb-backend")]
pub mod rocksdb;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{open_store, StoreBackend, StoreConfig};
pub use jsonl::JsonLinesSnapshotStore;
pub use memory::MemorySnapshotStore;

#[cfg(feature = "rocksdb-backend")]
pub use crate::rocksdb::RocksDbSnapshotStore;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
