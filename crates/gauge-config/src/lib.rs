// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # gauge-config
//!
//! Configuration management for the gauge Modbus poller.
//!
//! ## Features
//!
//! - **Schema**: ports, their transports and the devices behind them
//! - **Multi-Format Support**: YAML, TOML and JSON files
//! - **Environment Overrides**: `${VAR}` placeholders and `GAUGE_*` variables
//! - **Validation**: errors name the offending field path
//!
//! ## Quick Start
//!
//! ```no_run
//! use gauge_config::loader::load_config;
//!
//! let config = load_config("gauge.yaml").unwrap();
//!
//! for (_, port) in config.enabled_ports() {
//!     println!("{}: {} devices", port.name, port.devices.len());
//! }
//! ```
//!
//! ## Configuration Schema
//!
//! - `logging` - level and output format
//! - `polling` - cycle interval, failure threshold and pacing delays
//! - `storage` - snapshot backend and directory
//! - `runtime` - status summary interval
//! - `ports` - transports and device register maps

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod error;
pub mod loader;
pub mod schema;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_config_str, ConfigFormat, ConfigLoader};
pub use schema::{
    GaugeConfig, LogFormat, LogLevel, LoggingConfig, PollingConfig, PortConfig, RuntimeConfig,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
