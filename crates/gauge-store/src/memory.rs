// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory snapshot store.
//!
//! Nothing survives the process. Useful for tests, dry runs and the `once`
//! command. With a capacity set, each device keeps only its newest
//! snapshots.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use gauge_core::store::collection_name;
use gauge_core::{PersistedSnapshot, SnapshotSink, SnapshotStore, StoreError};
use parking_lot::RwLock;
use tracing::trace;

// =============================================================================
// MemorySink
// =============================================================================

#[derive(Debug)]
struct MemorySink {
    name: String,
    capacity: Option<usize>,
    entries: RwLock<VecDeque<PersistedSnapshot>>,
}

#[async_trait]
impl SnapshotSink for MemorySink {
    async fn insert(&self, snapshot: &PersistedSnapshot) -> Result<(), StoreError> {
        let mut entries = self.entries.write();
        if let Some(capacity) = self.capacity {
            while entries.len() >= capacity.max(1) {
                entries.pop_front();
            }
        }
        entries.push_back(snapshot.clone());
        trace!(collection = %self.name, len = entries.len(), "Snapshot stored in memory");
        Ok(())
    }

    fn collection(&self) -> &str {
        &self.name
    }
}

// =============================================================================
// MemorySnapshotStore
// =============================================================================

/// Keeps snapshots in per-device queues.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    capacity: Option<usize>,
    collections: RwLock<HashMap<String, Arc<MemorySink>>>,
}

impl MemorySnapshotStore {
    /// Creates an unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store keeping at most `capacity` snapshots per device.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Stored snapshots of `device`, oldest first.
    pub fn snapshots(&self, device: &str) -> Vec<PersistedSnapshot> {
        self.collections
            .read()
            .get(&collection_name(device))
            .map(|sink| sink.entries.read().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of stored snapshots of `device`.
    pub fn len(&self, device: &str) -> usize {
        self.collections
            .read()
            .get(&collection_name(device))
            .map_or(0, |sink| sink.entries.read().len())
    }

    /// Returns `true` if nothing was stored for `device`.
    pub fn is_empty(&self, device: &str) -> bool {
        self.len(device) == 0
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn collection(&self, device: &str) -> Result<Arc<dyn SnapshotSink>, StoreError> {
        let name = collection_name(device);
        let mut collections = self.collections.write();
        let sink = collections.entry(name.clone()).or_insert_with(|| {
            Arc::new(MemorySink {
                name,
                capacity: self.capacity,
                entries: RwLock::new(VecDeque::new()),
            })
        });
        let sink: Arc<dyn SnapshotSink> = Arc::clone(sink) as _;
        Ok(sink)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauge_core::DeviceData;

    fn snapshot(slave_id: u8) -> PersistedSnapshot {
        PersistedSnapshot::now(slave_id, Arc::new(DeviceData::new()))
    }

    #[tokio::test]
    async fn test_partitions_per_device() {
        let store = MemorySnapshotStore::new();
        let a = store.collection("boiler1").unwrap();
        let b = store.collection("boiler2").unwrap();

        a.insert(&snapshot(1)).await.unwrap();
        a.insert(&snapshot(1)).await.unwrap();
        b.insert(&snapshot(2)).await.unwrap();

        assert_eq!(store.len("boiler1"), 2);
        assert_eq!(store.len("boiler2"), 1);
        assert!(store.is_empty("boiler3"));
        assert_eq!(store.snapshots("boiler2")[0].slave_id, 2);
    }

    #[tokio::test]
    async fn test_cyrillic_and_punctuated_names_stay_apart() {
        let store = MemorySnapshotStore::new();
        let boiler = store.collection("Котел").unwrap();
        let pump = store.collection("Насос").unwrap();
        assert_ne!(boiler.collection(), pump.collection());

        boiler.insert(&snapshot(1)).await.unwrap();
        pump.insert(&snapshot(2)).await.unwrap();
        store.collection("boiler 1").unwrap().insert(&snapshot(3)).await.unwrap();
        store.collection("boiler_1").unwrap().insert(&snapshot(4)).await.unwrap();

        let ids = |device| store.snapshots(device).iter().map(|s| s.slave_id).collect::<Vec<_>>();
        assert_eq!(ids("Котел"), vec![1]);
        assert_eq!(ids("Насос"), vec![2]);
        assert_eq!(ids("boiler 1"), vec![3]);
        assert_eq!(ids("boiler_1"), vec![4]);
    }

    #[tokio::test]
    async fn test_same_collection_is_shared() {
        let store = MemorySnapshotStore::new();
        store.collection("pump").unwrap().insert(&snapshot(3)).await.unwrap();
        store.collection("pump").unwrap().insert(&snapshot(3)).await.unwrap();
        assert_eq!(store.len("pump"), 2);
    }

    #[tokio::test]
    async fn test_capacity_drops_oldest() {
        let store = MemorySnapshotStore::with_capacity(2);
        let sink = store.collection("pump").unwrap();
        for slave_id in 1..=3 {
            sink.insert(&snapshot(slave_id)).await.unwrap();
        }

        let kept: Vec<u8> = store.snapshots("pump").iter().map(|s| s.slave_id).collect();
        assert_eq!(kept, vec![2, 3]);
    }
}
