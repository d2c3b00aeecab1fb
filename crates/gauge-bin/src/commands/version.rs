// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::Cli;
use crate::error::BinResult;

/// Executes the `version` command to display version information.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("gauge - Modbus master polling service");
    println!();
    println!("Version Information:");
    println!("  gauge-bin:    {}", env!("CARGO_PKG_VERSION"));
    println!("  gauge-core:   {}", gauge_core::VERSION);
    println!("  gauge-modbus: {}", gauge_modbus::VERSION);
    println!("  gauge-store:  {}", gauge_store::VERSION);
    println!("  gauge-config: {}", gauge_config::VERSION);
    println!();
    println!("Build Information:");
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
    println!();
    println!("Features:");
    println!(
        "  RocksDB:      {}",
        if cfg!(feature = "rocksdb-backend") { "enabled" } else { "disabled" }
    );
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
