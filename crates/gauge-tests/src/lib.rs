// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # gauge Integration Tests
//!
//! Integration tests and shared test utilities for the gauge Modbus poller.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities
//!   - `fixtures`: Reference devices and configuration files
//!   - `mocks`: Scriptable transport and snapshot store
//!   - `assertions`: Dataset assertion helpers
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p gauge-tests
//! cargo test -p gauge-tests --test integration_poller
//! cargo test -p gauge-tests --test integration_saver
//! cargo test -p gauge-tests --test integration_config
//! ```
//!
//! ## Test Categories
//!
//! ### Poller Tests (`integration_poller.rs`)
//! - Register decoding end to end through a manager
//! - Failure threshold, probing and recovery
//! - Poll loop lifecycle and request serialization
//!
//! ### Saver Tests (`integration_saver.rs`)
//! - Snapshot timers per device
//! - Skipping empty and unresponsive devices
//! - Storage failures and file-backed stores
//!
//! ### Config Tests (`integration_config.rs`)
//! - Loading files into managers
//! - Overrides and validation errors
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use gauge_tests::prelude::*;
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_something() {
//!     let (connection, handle) = TransportFixtures::boiler(MockTransport::new(), 1)
//!         .into_connection(Duration::from_secs(1));
//!     // ... test logic
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::assertions::*;
    pub use crate::common::fixtures::*;
    pub use crate::common::mocks::*;
}
