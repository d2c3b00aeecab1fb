// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! JSON-lines snapshot store.
//!
//! Each device appends to its own `<dir>/<collection>.jsonl` file, one
//! snapshot document per line. Files are opened per write, so they can be
//! rotated externally while the process runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use gauge_core::store::collection_name;
use gauge_core::{PersistedSnapshot, SnapshotSink, SnapshotStore, StoreError};
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// File extension of collection files.
pub const EXTENSION: &str = "jsonl";

// =============================================================================
// JsonLinesSink
// =============================================================================

#[derive(Debug)]
struct JsonLinesSink {
    name: String,
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

#[async_trait]
impl SnapshotSink for JsonLinesSink {
    async fn insert(&self, snapshot: &PersistedSnapshot) -> Result<(), StoreError> {
        let mut line = serde_json::to_vec(snapshot)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;
        file.write_all(&line)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;
        file.flush().await.map_err(|e| StoreError::io(&self.path, e))?;

        debug!(collection = %self.name, bytes = line.len(), "Snapshot appended");
        Ok(())
    }

    fn collection(&self) -> &str {
        &self.name
    }
}

// =============================================================================
// JsonLinesSnapshotStore
// =============================================================================

/// Appends snapshots to one JSON-lines file per device.
#[derive(Debug)]
pub struct JsonLinesSnapshotStore {
    dir: PathBuf,
    sinks: Mutex<HashMap<String, Arc<JsonLinesSink>>>,
}

impl JsonLinesSnapshotStore {
    /// Opens a store in `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        info!(path = %dir.display(), "JSON-lines snapshot store opened");
        Ok(Self {
            dir,
            sinks: Mutex::new(HashMap::new()),
        })
    }

    /// Storage directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the snapshots of `device`.
    pub fn file_path(&self, device: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", collection_name(device), EXTENSION))
    }

    /// Reads back every snapshot of `device`, oldest first.
    ///
    /// A missing file yields an empty list.
    pub async fn read_all(&self, device: &str) -> Result<Vec<PersistedSnapshot>, StoreError> {
        let path = self.file_path(device);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(StoreError::from))
            .collect()
    }
}

impl SnapshotStore for JsonLinesSnapshotStore {
    fn collection(&self, device: &str) -> Result<Arc<dyn SnapshotSink>, StoreError> {
        let name = collection_name(device);
        let path = self.file_path(device);
        let mut sinks = self.sinks.lock();
        let sink = sinks.entry(name.clone()).or_insert_with(|| {
            Arc::new(JsonLinesSink {
                name,
                path,
                write_lock: tokio::sync::Mutex::new(()),
            })
        });
        let sink: Arc<dyn SnapshotSink> = Arc::clone(sink) as _;
        Ok(sink)
    }

    fn name(&self) -> &str {
        "jsonl"
    }
}
