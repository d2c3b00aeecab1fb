// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Backend selection.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use gauge_core::{SnapshotStore, StoreError};
use serde::{Deserialize, Serialize};

use crate::jsonl::JsonLinesSnapshotStore;
use crate::memory::MemorySnapshotStore;

fn default_path() -> PathBuf {
    PathBuf::from("./data")
}

/// Available storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Process memory only.
    Memory,
    /// One JSON-lines file per device.
    #[default]
    Jsonl,
    /// Single RocksDB database. Requires the `rocksdb-backend` feature.
    Rocksdb,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Memory => "memory",
            Self::Jsonl => "jsonl",
            Self::Rocksdb => "rocksdb",
        };
        f.write_str(s)
    }
}

/// Storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend kind.
    #[serde(default)]
    pub backend: StoreBackend,

    /// Directory of file-based backends.
    #[serde(default = "default_path")]
    pub path: PathBuf,

    /// Per-device snapshot limit of the memory backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(StoreBackend::default())
    }
}

impl StoreConfig {
    /// Creates a configuration for `backend` at the default path.
    pub fn new(backend: StoreBackend) -> Self {
        Self {
            backend,
            path: default_path(),
            capacity: None,
        }
    }

    /// Sets the directory.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }
}

/// Opens the configured backend.
///
/// # Errors
///
/// Fails if the directory cannot be created, the database cannot be opened,
/// or RocksDB is requested without the `rocksdb-backend` feature.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn SnapshotStore>, StoreError> {
    let store: Arc<dyn SnapshotStore> = match config.backend {
        StoreBackend::Memory => match config.capacity {
            Some(capacity) => Arc::new(MemorySnapshotStore::with_capacity(capacity)),
            None => Arc::new(MemorySnapshotStore::new()),
        },
        StoreBackend::Jsonl => Arc::new(JsonLinesSnapshotStore::open(&config.path)?),
        StoreBackend::Rocksdb => open_rocksdb(config)?,
    };
    Ok(store)
}

#[cfg(feature = "rocksdb-backend")]
fn open_rocksdb(config: &StoreConfig) -> Result<Arc<dyn SnapshotStore>, StoreError> {
    Ok(Arc::new(crate::rocksdb::RocksDbSnapshotStore::open(&config.path)?))
}

#[cfg(not(feature = "rocksdb-backend"))]
fn open_rocksdb(_config: &StoreConfig) -> Result<Arc<dyn SnapshotStore>, StoreError> {
    Err(StoreError::backend(
        "RocksDB backend not available: build with the `rocksdb-backend` feature",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names() {
        let config: StoreConfig =
            serde_json::from_value(serde_json::json!({"backend": "memory"})).unwrap();
        assert_eq!(config.backend, StoreBackend::Memory);
        assert_eq!(config.path, PathBuf::from("./data"));
        assert_eq!(StoreBackend::Jsonl.to_string(), "jsonl");
    }

    #[test]
    fn test_open_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(StoreBackend::Jsonl).with_path(dir.path().join("snapshots"));
        let store = open_store(&config).unwrap();
        assert_eq!(store.name(), "jsonl");
        assert!(dir.path().join("snapshots").is_dir());
    }

    #[cfg(not(feature = "rocksdb-backend"))]
    #[test]
    fn test_rocksdb_requires_feature() {
        let err = open_store(&StoreConfig::new(StoreBackend::Rocksdb)).unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
