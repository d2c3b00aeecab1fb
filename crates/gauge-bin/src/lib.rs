// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # gauge-bin
//!
//! CLI binary of the gauge Modbus poller.
//!
//! - CLI argument parsing with clap
//! - Runtime orchestration: one manager per port
//! - Graceful shutdown on SIGINT, SIGTERM and SIGQUIT
//! - Logging initialization
//!
//! ## Architecture
//!
//! ```text
//!                    ┌─────────────┐
//!                    │   main.rs   │
//!                    └──────┬──────┘
//!                           │
//!                    ┌──────▼──────┐
//!                    │   cli.rs    │
//!                    └──────┬──────┘
//!                           │
//!               ┌───────────┼───────────┐
//!               ▼           ▼           ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │ commands │ │ runtime  │ │ logging  │
//!        └──────────┘ └────┬─────┘ └──────────┘
//!                          │
//!                   ┌──────▼──────┐
//!                   │  shutdown   │
//!                   └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start polling (default command)
//! gauge -c /etc/gauge/gauge.yaml
//!
//! # Validate configuration
//! gauge validate --show-config
//!
//! # Poll every device once and print the status as JSON
//! gauge once
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use runtime::{GaugeRuntime, PortRuntime, RuntimeBuilder};
pub use shutdown::ShutdownSignal;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
