// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Scripted transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gauge_core::FunctionCode;
use parking_lot::Mutex;

use crate::client::{ModbusTransport, TransportState};
use crate::error::{ConnectionError, ModbusError, ModbusResult, OperationError};

/// Scripted reply to one request.
#[derive(Debug, Clone)]
pub enum Reply {
    Words(Vec<u16>),
    Bits(Vec<bool>),
    Fail(&'static str),
    Timeout,
    Hang,
}

type Key = (u8, FunctionCode, u16);

#[derive(Debug, Default)]
struct Script {
    connects: usize,
    flushes: usize,
    timeout: Option<Duration>,
    refuse_connect: bool,
    connected: bool,
    slave: u8,
    queued: HashMap<Key, VecDeque<Reply>>,
    standing: HashMap<Key, Reply>,
    reads: Vec<Key>,
}

/// Read side of a [`ScriptedTransport`] that survives boxing it.
#[derive(Debug, Clone)]
pub struct Probe(Arc<Mutex<Script>>);

impl Probe {
    pub fn connects(&self) -> usize {
        self.0.lock().connects
    }

    pub fn flushes(&self) -> usize {
        self.0.lock().flushes
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.0.lock().timeout
    }

    pub fn reads(&self) -> usize {
        self.0.lock().reads.len()
    }

    pub fn reads_of(&self, slave: u8) -> usize {
        self.0.lock().reads.iter().filter(|(s, _, _)| *s == slave).count()
    }

    /// Replaces the standing reply for a register.
    pub fn set(&self, slave: u8, fc: FunctionCode, address: u16, reply: Reply) {
        self.0.lock().standing.insert((slave, fc, address), reply);
    }
}

#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> Probe {
        Probe(Arc::clone(&self.script))
    }

    pub fn refuse_connect(self) -> Self {
        self.script.lock().refuse_connect = true;
        self
    }

    /// Answers every request for the register with `reply`.
    pub fn on(self, slave: u8, fc: FunctionCode, address: u16, reply: Reply) -> Self {
        self.probe().set(slave, fc, address, reply);
        self
    }

    /// Answers the next request for the register with `reply`, then falls back.
    pub fn once(self, slave: u8, fc: FunctionCode, address: u16, reply: Reply) -> Self {
        self.script
            .lock()
            .queued
            .entry((slave, fc, address))
            .or_default()
            .push_back(reply);
        self
    }

    async fn next(&self, fc: FunctionCode, address: u16, count: u16) -> ModbusResult<Reply> {
        let reply = {
            let mut script = self.script.lock();
            if !script.connected {
                return Err(ModbusError::not_connected());
            }
            let key = (script.slave, fc, address);
            script.reads.push(key);
            let queued = script.queued.get_mut(&key).and_then(VecDeque::pop_front);
            queued.or_else(|| script.standing.get(&key).cloned())
        };

        match reply {
            Some(Reply::Fail(message)) => Err(ModbusError::operation(OperationError::read_failed(
                address, count, message,
            ))),
            Some(Reply::Timeout) => Err(ModbusError::read_timeout(Duration::from_secs(1))),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ModbusError::read_timeout(Duration::from_secs(3600)))
            }
            Some(reply) => Ok(reply),
            None => Err(ModbusError::exception(fc.read_code(), 0x02)),
        }
    }
}

#[async_trait]
impl ModbusTransport for ScriptedTransport {
    async fn connect(&mut self) -> ModbusResult<()> {
        let mut script = self.script.lock();
        if script.refuse_connect {
            return Err(ModbusError::connection(ConnectionError::refused("scripted", 502)));
        }
        script.connects += 1;
        script.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> ModbusResult<()> {
        self.script.lock().connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.script.lock().connected
    }

    fn state(&self) -> TransportState {
        if self.is_connected() {
            TransportState::Connected
        } else {
            TransportState::Disconnected
        }
    }

    fn set_slave(&mut self, slave_id: u8) {
        self.script.lock().slave = slave_id;
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.script.lock().timeout = Some(timeout);
    }

    async fn read_coils(&mut self, address: u16, count: u16) -> ModbusResult<Vec<bool>> {
        match self.next(FunctionCode::Coil, address, count).await? {
            Reply::Bits(bits) => Ok(bits),
            other => panic!("coil scripted with {:?}", other),
        }
    }

    async fn read_discrete_inputs(&mut self, address: u16, count: u16) -> ModbusResult<Vec<bool>> {
        match self.next(FunctionCode::Discrete, address, count).await? {
            Reply::Bits(bits) => Ok(bits),
            other => panic!("discrete input scripted with {:?}", other),
        }
    }

    async fn read_holding_registers(&mut self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        match self.next(FunctionCode::Holding, address, count).await? {
            Reply::Words(words) => Ok(words),
            other => panic!("holding register scripted with {:?}", other),
        }
    }

    async fn read_input_registers(&mut self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        match self.next(FunctionCode::Input, address, count).await? {
            Reply::Words(words) => Ok(words),
            other => panic!("input register scripted with {:?}", other),
        }
    }

    async fn flush(&mut self) -> ModbusResult<()> {
        self.script.lock().flushes += 1;
        Ok(())
    }

    fn display_name(&self) -> String {
        "scripted".to_string()
    }
}
