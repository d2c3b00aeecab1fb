// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core error types.
//!
//! # Error Hierarchy
//!
//! ```text
//! CoreError (root)
//! ├── ValidationError  - Malformed device registration, surfaced to the caller
//! ├── DecodeError      - Register decoding, recovered inside the decoder
//! └── StoreError       - Snapshot persistence, recovered inside the saver
//! ```
//!
//! Read failures never become errors at this level: they are recorded on
//! the device and reflected in its status.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// CoreError
// =============================================================================

/// The root error type for gauge-core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Device registration rejected.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Snapshot storage failed.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

// =============================================================================
// ValidationError
// =============================================================================

/// A device specification that cannot be registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Slave address outside the Modbus unicast range.
    #[error("Invalid slave id {slave_id}: must be in range 1-247")]
    SlaveIdOutOfRange {
        /// Rejected address.
        slave_id: i64,
    },

    /// Device name is empty.
    #[error("Device name must not be empty")]
    EmptyName,

    /// Another device already uses this name.
    #[error("Device name '{name}' is already registered")]
    DuplicateName {
        /// Conflicting name.
        name: String,
    },

    /// The name differs from a registered one only in ways storage cannot
    /// tell apart, such as letter case.
    #[error("Device name '{name}' shares a storage collection with '{existing}'")]
    CollectionClash {
        /// Rejected name.
        name: String,
        /// Name of the registered device.
        existing: String,
    },

    /// Another device already uses this slave address.
    #[error("Slave id {slave_id} is already registered to device '{existing}'")]
    DuplicateSlaveId {
        /// Conflicting address.
        slave_id: u8,
        /// Name of the device holding it.
        existing: String,
    },

    /// Snapshot interval must be positive.
    #[error("Device '{device}' has a zero save interval")]
    ZeroSaveInterval {
        /// Device name.
        device: String,
    },

    /// Two register definitions share a key.
    #[error("Device '{device}' defines register key '{key}' more than once")]
    DuplicateRegisterKey {
        /// Device name.
        device: String,
        /// Repeated key.
        key: String,
    },
}

impl ValidationError {
    /// Creates a slave id range error.
    pub fn slave_id(slave_id: impl Into<i64>) -> Self {
        Self::SlaveIdOutOfRange {
            slave_id: slave_id.into(),
        }
    }
}

// =============================================================================
// DecodeError
// =============================================================================

/// Register words that could not be turned into a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Fewer words than the data type occupies.
    #[error("Insufficient words for {data_type}: expected {expected}, got {actual}")]
    InsufficientWords {
        /// Requested type.
        data_type: String,
        /// Words needed.
        expected: usize,
        /// Words available.
        actual: usize,
    },

    /// The data type has no decoding.
    #[error("Unsupported data type: {0}")]
    UnsupportedType(String),
}

// =============================================================================
// StoreError
// =============================================================================

/// Snapshot persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("I/O error on '{path}': {source}")]
    Io {
        /// Affected path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Snapshot could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Backend-specific failure.
    #[error("Backend error: {0}")]
    Backend(String),

    /// The store has been closed.
    #[error("Store is closed")]
    Closed,
}

impl StoreError {
    /// Creates an I/O error for a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
