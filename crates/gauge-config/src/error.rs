// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Errors raised while loading a gauge configuration file.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Why a configuration could not be loaded.
///
/// Validation errors carry the path of the offending field, for example
/// `ports[0].devices[1].slave_id`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file content is not valid YAML, TOML or JSON, or does not match
    /// the schema.
    #[error("Cannot parse '{path}': {message}")]
    Parse {
        /// Configuration file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A value was parsed but is not acceptable.
    #[error("Invalid value at '{field}': {message}")]
    Validation {
        /// Dotted path of the field, e.g. `polling.retries`.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// The file exists but could not be read.
    #[error("Cannot read '{path}': {source}")]
    Io {
        /// Configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No file at the given path.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Requested path.
        path: PathBuf,
    },

    /// A `GAUGE_*` override holds an unusable value.
    #[error("Environment override '{name}' rejected: {message}")]
    InvalidEnvVar {
        /// Variable name including the prefix.
        name: String,
        /// What was expected.
        message: String,
    },

    /// The file extension is not one of yaml, yml, toml or json.
    #[error("Unsupported configuration format '{format}' (expected yaml, yml, toml or json)")]
    UnsupportedFormat {
        /// Offending extension.
        format: String,
    },

    /// Content that failed to deserialize before a file path was known.
    #[error("Malformed configuration: {message}")]
    Serialization {
        /// Deserializer message.
        message: String,
    },
}

impl ConfigError {
    /// Parse failure in `path`.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Rejected value at `field`.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Read failure of `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Missing file.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Unusable override variable.
    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Unknown file extension.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Deserialization failure without a path.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Field path of a validation error.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Returns `true` if the file could not be read at all.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::FileNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display_carries_field_path() {
        let err = ConfigError::validation("ports[0].devices[1].slave_id", "must be in range 1-247");
        assert_eq!(err.field(), Some("ports[0].devices[1].slave_id"));
        assert_eq!(
            err.to_string(),
            "Invalid value at 'ports[0].devices[1].slave_id': must be in range 1-247"
        );
    }

    #[test]
    fn test_is_io() {
        assert!(ConfigError::file_not_found("gauge.yaml").is_io());
        assert!(!ConfigError::serialization("bad").is_io());
    }
}
