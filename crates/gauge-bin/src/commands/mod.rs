// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `run`: Start polling every enabled port
//! - `validate`: Validate the configuration file
//! - `once`: Poll every device once and print its status
//! - `version`: Show version information

mod once;
mod run;
mod validate;
mod version;

pub use once::once;
pub use run::run;
pub use validate::validate;
pub use version::version;

use gauge_config::{load_config, GaugeConfig};

use crate::cli::{Cli, Commands};
use crate::error::BinResult;
use crate::logging::init_logging;

/// Executes the appropriate command based on CLI arguments.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.effective_command() {
        Commands::Run(args) => run::run(&cli, args).await,
        Commands::Validate(args) => validate::validate(&cli, args),
        Commands::Once(args) => once::once(&cli, args).await,
        Commands::Version => version::version(&cli),
    }
}

/// Loads the configuration and initializes logging from it and the flags.
fn load_and_init_logging(cli: &Cli) -> BinResult<GaugeConfig> {
    let config = load_config(&cli.config)?;
    init_logging(
        cli.effective_log_level(config.logging.level.as_str()),
        cli.effective_log_format(config.logging.format),
    );
    Ok(config)
}
