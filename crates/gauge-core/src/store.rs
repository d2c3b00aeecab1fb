// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Snapshot storage traits.
//!
//! Storage is append-only and partitioned per device. A [`SnapshotStore`] is
//! opened once at startup; each registered device obtains its own
//! [`SnapshotSink`] handle from it and the saver writes through that handle
//! only.
//!
//! # Example
//!
//! ```rust,ignore
//! use gauge_core::store::{SnapshotStore, PersistedSnapshot};
//!
//! let sink = store.collection("boiler1")?;
//! sink.insert(&PersistedSnapshot::now(1, device.data())).await?;
//! ```

use std::fmt::{Debug, Write};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::types::DeviceData;

/// Local display format of [`PersistedSnapshot::date`].
pub const DATE_FORMAT: &str = "%d.%m.%Y, %H:%M:%S";

// =============================================================================
// PersistedSnapshot
// =============================================================================

/// One persisted copy of a device's dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSnapshot {
    /// Modbus slave address of the device.
    pub slave_id: u8,
    /// Dataset at save time.
    pub data: Arc<DeviceData>,
    /// Local wall-clock time for display.
    pub date: String,
    /// Save instant.
    pub timestamp: DateTime<Utc>,
}

impl PersistedSnapshot {
    /// Builds a snapshot stamped with the given instant.
    pub fn at(slave_id: u8, data: Arc<DeviceData>, timestamp: DateTime<Utc>) -> Self {
        Self {
            slave_id,
            data,
            date: timestamp.with_timezone(&Local).format(DATE_FORMAT).to_string(),
            timestamp,
        }
    }

    /// Builds a snapshot stamped with the current time.
    pub fn now(slave_id: u8, data: Arc<DeviceData>) -> Self {
        Self::at(slave_id, data, Utc::now())
    }
}

// =============================================================================
// Traits
// =============================================================================

/// Write handle for one device's partition.
#[async_trait]
pub trait SnapshotSink: Send + Sync + Debug {
    /// Appends a snapshot.
    async fn insert(&self, snapshot: &PersistedSnapshot) -> Result<(), StoreError>;

    /// Partition name.
    fn collection(&self) -> &str;
}

/// A storage backend holding one partition per device.
pub trait SnapshotStore: Send + Sync + Debug {
    /// Returns the write handle for `device`, creating the partition if needed.
    fn collection(&self, device: &str) -> Result<Arc<dyn SnapshotSink>, StoreError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Maps a device name onto a partition name usable as a file name or key
/// prefix.
///
/// Letters, digits (any script) and `-` are kept. Every other character is
/// written as `_XX` per UTF-8 byte, so distinct names never share a
/// partition. The empty name maps to `_`.
pub fn collection_name(device: &str) -> String {
    if device.is_empty() {
        return "_".to_string();
    }

    let mut name = String::with_capacity(device.len());
    for c in device.chars() {
        if c.is_alphanumeric() || c == '-' {
            name.push(c);
        } else {
            let mut utf8 = [0u8; 4];
            for byte in c.encode_utf8(&mut utf8).bytes() {
                let _ = write!(name, "_{:02X}", byte);
            }
        }
    }
    name
}

/// Returns `true` if two device names would land in the same partition on
/// a case-insensitive file system.
pub fn collections_clash(a: &str, b: &str) -> bool {
    collection_name(a).to_lowercase() == collection_name(b).to_lowercase()
}
