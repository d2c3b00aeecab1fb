// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `once` command.

use serde_json::{Map, Value};
use tracing::info;

use crate::cli::{Cli, OnceArgs};
use crate::error::BinResult;
use crate::runtime::{build_ports, connect_ports, disconnect_all};

/// Polls every device of every connected port once and prints the device
/// status per port as JSON.
pub async fn once(cli: &Cli, args: OnceArgs) -> BinResult<()> {
    let config = super::load_and_init_logging(cli)?;

    let mut ports = build_ports(&config)?;
    if let Err(e) = connect_ports(&mut ports).await {
        disconnect_all(&ports).await;
        return Err(e);
    }

    let mut output = Map::new();
    for port in &ports {
        if port.connected {
            let summary = port.manager.poll_once().await;
            info!(
                port = %port.name,
                polled = summary.polled,
                probed = summary.probed,
                failed = summary.failed,
                "Single cycle finished"
            );
        }
        output.insert(
            port.name.clone(),
            serde_json::to_value(port.manager.get_devices_status())?,
        );
    }
    disconnect_all(&ports).await;

    let output = Value::Object(output);
    if args.compact {
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    Ok(())
}
