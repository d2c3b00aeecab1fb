// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Errors surfaced by the `gauge` command line.
//!
//! | Exit code | Meaning                                   |
//! |-----------|-------------------------------------------|
//! | 0         | Success                                   |
//! | 1         | Other failure                             |
//! | 2         | Configuration missing or invalid          |
//! | 3         | Initialization failed (store, no port up) |

use thiserror::Error;

/// Result alias for the binary.
pub type BinResult<T> = Result<T, BinError>;

/// Why a `gauge` command stopped.
#[derive(Debug, Error)]
pub enum BinError {
    /// The configuration could not be turned into ports and devices.
    #[error("Bad configuration: {0}")]
    Configuration(String),

    /// Startup failed after the configuration was accepted.
    #[error("Startup failed: {0}")]
    Initialization(String),

    /// Failure while running, e.g. printing a report.
    #[error("{0}")]
    Runtime(String),

    /// Terminal or file I/O.
    #[error("I/O: {0}")]
    Io(String),

    /// The configuration file was rejected by the loader.
    #[error(transparent)]
    Config(#[from] gauge_config::ConfigError),

    /// The snapshot store could not be opened.
    #[error("Snapshot store unavailable: {0}")]
    Store(#[from] gauge_core::StoreError),
}

impl BinError {
    /// [`BinError::Configuration`] with `msg`.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// [`BinError::Initialization`] with `msg`.
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }

    /// Process exit code, see the table in the module docs.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) | Self::Config(_) => 2,
            Self::Initialization(_) | Self::Store(_) => 3,
            Self::Runtime(_) | Self::Io(_) => 1,
        }
    }
}

impl From<std::io::Error> for BinError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BinError {
    fn from(err: serde_json::Error) -> Self {
        Self::Runtime(format!("cannot render JSON: {}", err))
    }
}

// =============================================================================
// Reporting
// =============================================================================

/// Prints `error` and every nested cause to stderr.
pub fn report_error(error: &BinError) {
    eprintln!("gauge: {}", error);

    let mut cause = std::error::Error::source(error);
    while let Some(inner) = cause {
        eprintln!("  because: {}", inner);
        cause = inner.source();
    }
}

/// [`report_error`] followed by [`std::process::exit`].
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_keep_loader_message() {
        let err = BinError::from(gauge_config::ConfigError::validation("ports", "empty"));
        assert_eq!(err.to_string(), "Invalid value at 'ports': empty");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(BinError::config("test").exit_code(), 2);
        assert_eq!(BinError::init("no port").exit_code(), 3);
        assert_eq!(BinError::from(gauge_core::StoreError::Closed).exit_code(), 3);
        assert_eq!(BinError::Runtime("print".into()).exit_code(), 1);
        assert_eq!(
            BinError::from(std::io::Error::new(std::io::ErrorKind::Other, "pipe")).exit_code(),
            1
        );
    }
}
