// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `run`: Start polling (default)
//! - `validate`: Validate the configuration file
//! - `once`: Poll every device once and print its status
//! - `version`: Show version information

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// gauge - Modbus master polling service
///
/// Polls Modbus RTU and TCP slaves on a fixed schedule, keeps the latest
/// decoded values per device and persists periodic snapshots.
#[derive(Parser, Debug)]
#[command(
    name = "gauge",
    author = "Sylvex <contact@sylvex.io>",
    version = gauge_core::VERSION,
    about = "Modbus master polling service",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "gauge.yaml",
        env = "GAUGE_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error), overrides the config file
    #[arg(short, long, env = "GAUGE_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Log format, overrides the config file
    #[arg(long, env = "GAUGE_LOG_FORMAT", global = true)]
    pub log_format: Option<LogFormat>,

    /// Enable quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands for the gauge CLI.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start polling every enabled port
    ///
    /// This is the default command when no subcommand is specified.
    Run(RunArgs),

    /// Validate the configuration file
    ///
    /// Parses and validates the configuration without opening any port.
    Validate(ValidateArgs),

    /// Poll every device once and print the device status as JSON
    Once(OnceArgs),

    /// Show detailed version information
    Version,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `run` command.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Build managers and register devices without opening ports
    #[arg(long)]
    pub skip_connect: bool,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Default, Clone)]
pub struct ValidateArgs {
    /// Show parsed configuration after validation
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `once` command.
#[derive(Args, Debug, Default, Clone)]
pub struct OnceArgs {
    /// Print compact JSON instead of pretty-printed JSON
    #[arg(long)]
    pub compact: bool,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

impl From<gauge_config::LogFormat> for LogFormat {
    fn from(format: gauge_config::LogFormat) -> Self {
        match format {
            gauge_config::LogFormat::Text => LogFormat::Text,
            gauge_config::LogFormat::Json => LogFormat::Json,
            gauge_config::LogFormat::Compact => LogFormat::Compact,
        }
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective command, defaulting to `Run` if none specified.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Run(RunArgs::default()))
    }

    /// Log level from the flags, falling back to `configured`.
    pub fn effective_log_level<'a>(&'a self, configured: &'a str) -> &'a str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            self.log_level.as_deref().unwrap_or(configured)
        }
    }

    /// Log format from the flags, falling back to `configured`.
    pub fn effective_log_format(&self, configured: gauge_config::LogFormat) -> LogFormat {
        self.log_format.unwrap_or_else(|| configured.into())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command() {
        let cli = Cli::parse_from(["gauge"]);
        assert!(cli.command.is_none());
        assert!(matches!(cli.effective_command(), Commands::Run(_)));
    }

    #[test]
    fn test_run_skip_connect() {
        let cli = Cli::parse_from(["gauge", "run", "--skip-connect"]);
        match cli.command {
            Some(Commands::Run(args)) => assert!(args.skip_connect),
            other => panic!("Expected Run command, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_command() {
        let cli = Cli::parse_from(["gauge", "validate", "--show-config", "-f", "json"]);
        match cli.command {
            Some(Commands::Validate(args)) => {
                assert!(args.show_config);
                assert_eq!(args.format, OutputFormat::Json);
            }
            other => panic!("Expected Validate command, got {:?}", other),
        }
    }

    #[test]
    fn test_once_command() {
        let cli = Cli::parse_from(["gauge", "once", "--compact"]);
        assert!(matches!(cli.command, Some(Commands::Once(OnceArgs { compact: true }))));
    }

    #[test]
    fn test_config_path() {
        let cli = Cli::parse_from(["gauge", "-c", "/etc/gauge/boiler.yaml"]);
        assert_eq!(cli.config, PathBuf::from("/etc/gauge/boiler.yaml"));
    }

    #[test]
    fn test_log_level_falls_back_to_config() {
        let cli = Cli::parse_from(["gauge"]);
        if cli.log_level.is_none() {
            assert_eq!(cli.effective_log_level("error"), "error");
        }

        let cli = Cli::parse_from(["gauge", "-l", "trace"]);
        assert_eq!(cli.effective_log_level("error"), "trace");
    }

    #[test]
    fn test_quiet_and_verbose() {
        let cli = Cli::parse_from(["gauge", "-q"]);
        assert_eq!(cli.effective_log_level("info"), "warn");

        let cli = Cli::parse_from(["gauge", "-v"]);
        assert_eq!(cli.effective_log_level("info"), "debug");
    }

    #[test]
    fn test_log_format_override() {
        let cli = Cli::parse_from(["gauge", "--log-format", "json"]);
        assert_eq!(cli.effective_log_format(gauge_config::LogFormat::Text), LogFormat::Json);
    }
}
