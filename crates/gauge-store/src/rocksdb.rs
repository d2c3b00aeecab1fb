// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! RocksDB snapshot store.
//!
//! All devices share one database. Keys are `{collection}\0{timestamp_nanos:020}`
//! so a prefix scan returns one device's snapshots in time order. Values are
//! the JSON-encoded snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use gauge_core::store::collection_name;
use gauge_core::{PersistedSnapshot, SnapshotSink, SnapshotStore, StoreError};
use rocksdb::{DBCompressionType, Direction, IteratorMode, Options, DB};
use tracing::{debug, info};

#[derive(Debug)]
struct RocksDbSink {
    name: String,
    db: Arc<DB>,
}

fn key_prefix(collection: &str) -> Vec<u8> {
    let mut prefix = collection.as_bytes().to_vec();
    prefix.push(0);
    prefix
}

fn snapshot_key(collection: &str, snapshot: &PersistedSnapshot) -> Vec<u8> {
    let nanos = snapshot.timestamp.timestamp_nanos_opt().unwrap_or(0).max(0);
    let mut key = key_prefix(collection);
    key.extend_from_slice(format!("{:020}", nanos).as_bytes());
    key
}

#[async_trait]
impl SnapshotSink for RocksDbSink {
    async fn insert(&self, snapshot: &PersistedSnapshot) -> Result<(), StoreError> {
        let key = snapshot_key(&self.name, snapshot);
        let value = serde_json::to_vec(snapshot)?;
        let db = Arc::clone(&self.db);

        tokio::task::spawn_blocking(move || {
            db.put(key, value)
                .map_err(|e| StoreError::backend(format!("RocksDB put failed: {}", e)))
        })
        .await
        .map_err(|e| StoreError::backend(format!("Spawn blocking failed: {}", e)))??;

        debug!(collection = %self.name, "Snapshot written to RocksDB");
        Ok(())
    }

    fn collection(&self) -> &str {
        &self.name
    }
}

/// Stores every device's snapshots in a single RocksDB database.
#[derive(Debug)]
pub struct RocksDbSnapshotStore {
    path: PathBuf,
    db: Arc<DB>,
}

impl RocksDbSnapshotStore {
    /// Opens or creates the database at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        std::fs::create_dir_all(&path).map_err(|e| StoreError::io(&path, e))?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(DBCompressionType::Lz4);

        let db = DB::open(&opts, &path)
            .map_err(|e| StoreError::backend(format!("Failed to open RocksDB: {}", e)))?;

        info!(path = %path.display(), "RocksDB snapshot store opened");
        Ok(Self {
            path,
            db: Arc::new(db),
        })
    }

    /// Database directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads back every snapshot of `device`, oldest first.
    pub async fn read_all(&self, device: &str) -> Result<Vec<PersistedSnapshot>, StoreError> {
        let prefix = key_prefix(&collection_name(device));
        let db = Arc::clone(&self.db);

        tokio::task::spawn_blocking(move || -> Result<Vec<PersistedSnapshot>, StoreError> {
            let mut snapshots = Vec::new();
            for item in db.iterator(IteratorMode::From(&prefix, Direction::Forward)) {
                let (key, value) =
                    item.map_err(|e| StoreError::backend(format!("RocksDB scan failed: {}", e)))?;
                if !key.starts_with(&prefix) {
                    break;
                }
                snapshots.push(serde_json::from_slice(&value)?);
            }
            Ok(snapshots)
        })
        .await
        .map_err(|e| StoreError::backend(format!("Spawn blocking failed: {}", e)))?
    }
}

impl SnapshotStore for RocksDbSnapshotStore {
    fn collection(&self, device: &str) -> Result<Arc<dyn SnapshotSink>, StoreError> {
        let sink: Arc<dyn SnapshotSink> = Arc::new(RocksDbSink {
            name: collection_name(device),
            db: Arc::clone(&self.db),
        });
        Ok(sink)
    }

    fn name(&self) -> &str {
        "rocksdb"
    }
}
