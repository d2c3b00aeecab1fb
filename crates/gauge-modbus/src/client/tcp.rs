// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus TCP transport.
//!
//! Used for TCP gateways in front of a serial bus, so several slaves share
//! one socket and the unit id is switched per request.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_modbus::client::{Client, Context as ModbusContext, Reader};
use tokio_modbus::prelude::*;
use tokio_modbus::Error as TokioModbusError;

use crate::error::{ConnectionError, ModbusError, ModbusResult, OperationError, TimeoutError};
use crate::types::ModbusTcpConfig;

use super::transport::{map_exception, map_protocol_error, ModbusTransport, TransportState};

// =============================================================================
// ModbusTcpTransport
// =============================================================================

/// Modbus TCP transport using tokio-modbus.
pub struct ModbusTcpTransport {
    config: ModbusTcpConfig,
    context: std::sync::Mutex<Option<ModbusContext>>,
    slave_id: u8,
    state: TransportState,
}

impl ModbusTcpTransport {
    /// Creates a closed transport.
    pub fn new(config: ModbusTcpConfig) -> Self {
        Self {
            config,
            context: std::sync::Mutex::new(None),
            slave_id: 1,
            state: TransportState::Disconnected,
        }
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &ModbusTcpConfig {
        &self.config
    }

    async fn resolve_address(&self) -> ModbusResult<SocketAddr> {
        let addr_str = self.config.socket_addr();

        if let Ok(addr) = addr_str.parse::<SocketAddr>() {
            return Ok(addr);
        }

        let mut addrs = tokio::net::lookup_host(&addr_str).await.map_err(|e| {
            ModbusError::connection(ConnectionError::DnsResolutionFailed {
                hostname: self.config.host.clone(),
                source: Some(e),
            })
        })?;

        addrs
            .next()
            .ok_or_else(|| ModbusError::connection(ConnectionError::dns_failed(&self.config.host)))
    }

    fn context_slot(&mut self) -> &mut Option<ModbusContext> {
        self.context.get_mut().unwrap_or_else(|e| e.into_inner())
    }

    fn context(&mut self) -> ModbusResult<&mut ModbusContext> {
        self.context_slot()
            .as_mut()
            .ok_or_else(|| ModbusError::connection(ConnectionError::NotConnected))
    }

    fn deadline_error(&self) -> ModbusError {
        ModbusError::timeout(TimeoutError::read(self.config.timeout))
    }

    /// Maps a tokio-modbus error to ModbusError.
    fn map_modbus_error(&self, error: TokioModbusError, address: u16, count: u16) -> ModbusError {
        match error {
            TokioModbusError::Transport(io_error) => match io_error.kind() {
                ErrorKind::ConnectionRefused => ModbusError::connection(ConnectionError::refused(
                    &self.config.host,
                    self.config.port,
                )),
                ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
                    ModbusError::connection(ConnectionError::closed(Some(io_error.to_string())))
                }
                ErrorKind::TimedOut => {
                    ModbusError::timeout(TimeoutError::response(self.config.timeout))
                }
                ErrorKind::NotConnected => ModbusError::connection(ConnectionError::NotConnected),
                ErrorKind::BrokenPipe => ModbusError::connection(ConnectionError::closed(Some(
                    "Broken pipe".to_string(),
                ))),
                _ => ModbusError::operation(OperationError::ReadFailed {
                    address,
                    count,
                    message: io_error.to_string(),
                    source: Some(io_error),
                }),
            },
            TokioModbusError::Protocol(protocol_error) => {
                map_protocol_error(address, count, protocol_error)
            }
        }
    }
}

#[async_trait]
impl ModbusTransport for ModbusTcpTransport {
    async fn connect(&mut self) -> ModbusResult<()> {
        if self.state.is_connected() {
            return Ok(());
        }

        self.state = TransportState::Connecting;

        let slave = Slave(self.slave_id);
        let host = self.config.host.clone();
        let port = self.config.port;
        let nodelay = self.config.tcp_nodelay;

        let connect_future = async {
            let socket_addr = self.resolve_address().await?;
            let stream = TcpStream::connect(socket_addr)
                .await
                .map_err(|e| ModbusError::connection(ConnectionError::refused_with(&host, port, e)))?;
            stream.set_nodelay(nodelay).ok();
            Ok::<_, ModbusError>(tcp::attach_slave(stream, slave))
        };

        let result = timeout(self.config.connect_timeout, connect_future)
            .await
            .map_err(|_| {
                ModbusError::connection(ConnectionError::timed_out(
                    &host,
                    port,
                    self.config.connect_timeout,
                ))
            })
            .and_then(|inner| inner);

        match result {
            Ok(ctx) => {
                *self.context_slot() = Some(ctx);
                self.state = TransportState::Connected;
                tracing::info!(host = %host, port = port, "Connected to Modbus TCP gateway");
                Ok(())
            }
            Err(e) => {
                self.state = TransportState::Disconnected;
                Err(e)
            }
        }
    }

    async fn disconnect(&mut self) -> ModbusResult<()> {
        if let Some(mut ctx) = self.context_slot().take() {
            if let Err(e) = ctx.disconnect().await {
                tracing::warn!(host = %self.config.host, error = %e, "Error closing Modbus TCP connection");
            }
            tracing::debug!(host = %self.config.host, "Disconnected from Modbus TCP gateway");
        }
        self.state = TransportState::Disconnected;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    fn state(&self) -> TransportState {
        self.state
    }

    fn set_slave(&mut self, slave_id: u8) {
        self.slave_id = slave_id;
        if let Some(ctx) = self.context_slot().as_mut() {
            ctx.set_slave(Slave(slave_id));
        }
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.config.timeout = timeout;
    }

    async fn read_coils(&mut self, address: u16, count: u16) -> ModbusResult<Vec<bool>> {
        let deadline = self.config.timeout;
        let result = timeout(deadline, self.context()?.read_coils(address, count)).await;
        result
            .map_err(|_| self.deadline_error())?
            .map_err(|e| self.map_modbus_error(e, address, count))?
            .map_err(|e| map_exception(0x01, e))
    }

    async fn read_discrete_inputs(&mut self, address: u16, count: u16) -> ModbusResult<Vec<bool>> {
        let deadline = self.config.timeout;
        let result = timeout(deadline, self.context()?.read_discrete_inputs(address, count)).await;
        result
            .map_err(|_| self.deadline_error())?
            .map_err(|e| self.map_modbus_error(e, address, count))?
            .map_err(|e| map_exception(0x02, e))
    }

    async fn read_holding_registers(&mut self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        let deadline = self.config.timeout;
        let result = timeout(deadline, self.context()?.read_holding_registers(address, count)).await;
        result
            .map_err(|_| self.deadline_error())?
            .map_err(|e| self.map_modbus_error(e, address, count))?
            .map_err(|e| map_exception(0x03, e))
    }

    async fn read_input_registers(&mut self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        let deadline = self.config.timeout;
        let result = timeout(deadline, self.context()?.read_input_registers(address, count)).await;
        result
            .map_err(|_| self.deadline_error())?
            .map_err(|e| self.map_modbus_error(e, address, count))?
            .map_err(|e| map_exception(0x04, e))
    }

    fn display_name(&self) -> String {
        format!("tcp:{}", self.config.socket_addr())
    }
}

impl std::fmt::Debug for ModbusTcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModbusTcpTransport")
            .field("addr", &self.config.socket_addr())
            .field("slave_id", &self.slave_id)
            .field("state", &self.state)
            .finish()
    }
}
