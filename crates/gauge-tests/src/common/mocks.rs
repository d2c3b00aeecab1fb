// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Mock implementations for testing.
//!
//! - [`MockTransport`]: a Modbus transport answering from a register map
//! - [`MockHandle`]: control and inspection of a transport after it was boxed
//! - [`RecordingStore`]: a snapshot store with failure injection

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gauge_core::{FunctionCode, PersistedSnapshot, SnapshotSink, SnapshotStore, StoreError};
use gauge_modbus::{
    Connection, ConnectionError, ModbusError, ModbusResult, ModbusTransport, OperationError,
    TransportState,
};
use parking_lot::Mutex;
use tokio::time::Instant;

// =============================================================================
// MockReply
// =============================================================================

/// Reply of a mocked register.
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    /// Register words (FC 03/04).
    Words(Vec<u16>),
    /// Bit values (FC 01/02).
    Bits(Vec<bool>),
    /// Fails with a read error carrying the message.
    Fail(String),
    /// Never answers.
    Hang,
}

/// One request seen by a [`MockTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRecord {
    /// Addressed slave.
    pub slave_id: u8,
    /// Table read.
    pub function_code: FunctionCode,
    /// Start address.
    pub address: u16,
    /// When the request started.
    pub at: Instant,
}

type RegisterKey = (u8, FunctionCode, u16);

#[derive(Debug, Default)]
struct MockState {
    connected: bool,
    refuse_connect: bool,
    slave: u8,
    timeout: Option<Duration>,
    latency: Duration,
    replies: HashMap<RegisterKey, MockReply>,
    offline: HashSet<u8>,
    reads: Vec<ReadRecord>,
    connects: usize,
    disconnects: usize,
    flushes: usize,
}

#[derive(Debug, Default)]
struct Concurrency {
    current: AtomicUsize,
    max: AtomicUsize,
}

/// Decrements the in-flight counter when the request ends or is cancelled.
struct InFlight<'a>(&'a Concurrency);

impl<'a> InFlight<'a> {
    fn enter(concurrency: &'a Concurrency) -> Self {
        let current = concurrency.current.fetch_add(1, Ordering::SeqCst) + 1;
        concurrency.max.fetch_max(current, Ordering::SeqCst);
        Self(concurrency)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

// =============================================================================
// MockTransport
// =============================================================================

/// A Modbus transport that answers from a register map.
///
/// Unmapped registers answer with exception 0x02 (illegal data address).
/// Offline slaves time out immediately.
#[derive(Debug, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    concurrency: Arc<Concurrency>,
}

impl MockTransport {
    /// Creates a transport with an empty register map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle sharing this transport's state.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
            concurrency: Arc::clone(&self.concurrency),
        }
    }

    /// Splits into the transport and its handle.
    pub fn split(self) -> (Self, MockHandle) {
        let handle = self.handle();
        (self, handle)
    }

    /// Maps a register to a reply.
    pub fn with_reply(self, slave_id: u8, fc: FunctionCode, address: u16, reply: MockReply) -> Self {
        self.handle().set_reply(slave_id, fc, address, reply);
        self
    }

    /// Maps holding or input registers to words.
    pub fn with_words(self, slave_id: u8, fc: FunctionCode, address: u16, words: &[u16]) -> Self {
        self.with_reply(slave_id, fc, address, MockReply::Words(words.to_vec()))
    }

    /// Maps coils or discrete inputs to bits.
    pub fn with_bits(self, slave_id: u8, fc: FunctionCode, address: u16, bits: &[bool]) -> Self {
        self.with_reply(slave_id, fc, address, MockReply::Bits(bits.to_vec()))
    }

    /// Adds a fixed delay to every request.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.state.lock().latency = latency;
        self
    }

    /// Makes every connect attempt fail.
    pub fn refusing_connect(self) -> Self {
        self.state.lock().refuse_connect = true;
        self
    }

    /// Wraps the transport in a [`Connection`].
    pub fn into_connection(self, response_timeout: Duration) -> (Arc<Connection>, MockHandle) {
        let handle = self.handle();
        let connection = Connection::with_transport(Box::new(self), response_timeout);
        (Arc::new(connection), handle)
    }

    async fn request(&self, fc: FunctionCode, address: u16, count: u16) -> ModbusResult<MockReply> {
        let (reply, latency, timeout) = {
            let mut state = self.state.lock();
            if !state.connected {
                return Err(ModbusError::not_connected());
            }
            let slave_id = state.slave;
            state.reads.push(ReadRecord {
                slave_id,
                function_code: fc,
                address,
                at: Instant::now(),
            });
            let reply = if state.offline.contains(&slave_id) {
                None
            } else {
                Some(state.replies.get(&(slave_id, fc, address)).cloned())
            };
            (reply, state.latency, state.timeout.unwrap_or(Duration::from_secs(1)))
        };

        let _in_flight = InFlight::enter(&self.concurrency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match reply {
            None => Err(ModbusError::read_timeout(timeout)),
            Some(None) => Err(ModbusError::exception(fc.read_code(), 0x02)),
            Some(Some(MockReply::Fail(message))) => Err(ModbusError::operation(
                OperationError::read_failed(address, count, message),
            )),
            Some(Some(MockReply::Hang)) => {
                std::future::pending::<()>().await;
                Err(ModbusError::read_timeout(timeout))
            }
            Some(Some(reply)) => Ok(reply),
        }
    }

    fn mismatch(fc: FunctionCode, address: u16, count: u16, reply: &MockReply) -> ModbusError {
        ModbusError::operation(OperationError::read_failed(
            address,
            count,
            format!("{} mapped with {:?}", fc.as_str(), reply),
        ))
    }
}

#[async_trait]
impl ModbusTransport for MockTransport {
    async fn connect(&mut self) -> ModbusResult<()> {
        let mut state = self.state.lock();
        if state.refuse_connect {
            return Err(ModbusError::connection(ConnectionError::refused("mock", 502)));
        }
        state.connects += 1;
        state.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> ModbusResult<()> {
        let mut state = self.state.lock();
        if state.connected {
            state.disconnects += 1;
        }
        state.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    fn state(&self) -> TransportState {
        if self.is_connected() {
            TransportState::Connected
        } else {
            TransportState::Disconnected
        }
    }

    fn set_slave(&mut self, slave_id: u8) {
        self.state.lock().slave = slave_id;
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.state.lock().timeout = Some(timeout);
    }

    async fn read_coils(&mut self, address: u16, count: u16) -> ModbusResult<Vec<bool>> {
        match self.request(FunctionCode::Coil, address, count).await? {
            MockReply::Bits(bits) => Ok(bits),
            other => Err(Self::mismatch(FunctionCode::Coil, address, count, &other)),
        }
    }

    async fn read_discrete_inputs(&mut self, address: u16, count: u16) -> ModbusResult<Vec<bool>> {
        match self.request(FunctionCode::Discrete, address, count).await? {
            MockReply::Bits(bits) => Ok(bits),
            other => Err(Self::mismatch(FunctionCode::Discrete, address, count, &other)),
        }
    }

    async fn read_holding_registers(&mut self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        match self.request(FunctionCode::Holding, address, count).await? {
            MockReply::Words(words) => Ok(words),
            other => Err(Self::mismatch(FunctionCode::Holding, address, count, &other)),
        }
    }

    async fn read_input_registers(&mut self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        match self.request(FunctionCode::Input, address, count).await? {
            MockReply::Words(words) => Ok(words),
            other => Err(Self::mismatch(FunctionCode::Input, address, count, &other)),
        }
    }

    async fn flush(&mut self) -> ModbusResult<()> {
        self.state.lock().flushes += 1;
        Ok(())
    }

    fn display_name(&self) -> String {
        "mock".to_string()
    }
}

// =============================================================================
// MockHandle
// =============================================================================

/// Controls and inspects a [`MockTransport`] owned by a connection.
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
    concurrency: Arc<Concurrency>,
}

impl MockHandle {
    /// Replaces the reply of a register.
    pub fn set_reply(&self, slave_id: u8, fc: FunctionCode, address: u16, reply: MockReply) {
        self.state.lock().replies.insert((slave_id, fc, address), reply);
    }

    /// Takes a slave off the bus or brings it back.
    pub fn set_offline(&self, slave_id: u8, offline: bool) {
        let mut state = self.state.lock();
        if offline {
            state.offline.insert(slave_id);
        } else {
            state.offline.remove(&slave_id);
        }
    }

    /// Every request seen so far.
    pub fn reads(&self) -> Vec<ReadRecord> {
        self.state.lock().reads.clone()
    }

    /// Slave ids of every request in order.
    pub fn read_sequence(&self) -> Vec<u8> {
        self.state.lock().reads.iter().map(|r| r.slave_id).collect()
    }

    /// Number of requests addressed to `slave_id`.
    pub fn reads_of(&self, slave_id: u8) -> usize {
        self.state
            .lock()
            .reads
            .iter()
            .filter(|r| r.slave_id == slave_id)
            .count()
    }

    /// Forgets the recorded requests.
    pub fn clear_reads(&self) {
        self.state.lock().reads.clear();
    }

    /// Highest number of requests that were in progress at once.
    pub fn max_in_flight(&self) -> usize {
        self.concurrency.max.load(Ordering::SeqCst)
    }

    /// Successful connect calls.
    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }

    /// Disconnect calls on an open transport.
    pub fn disconnects(&self) -> usize {
        self.state.lock().disconnects
    }

    /// Flushes after failed requests.
    pub fn flushes(&self) -> usize {
        self.state.lock().flushes
    }

    /// Response timeout pushed down by the connection.
    pub fn timeout(&self) -> Option<Duration> {
        self.state.lock().timeout
    }

    /// Returns `true` while the transport is open.
    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }
}

// =============================================================================
// RecordingStore
// =============================================================================

#[derive(Debug, Default)]
struct Recorded {
    snapshots: Mutex<HashMap<String, Vec<PersistedSnapshot>>>,
    attempts: AtomicUsize,
    failing: AtomicBool,
}

#[derive(Debug)]
struct RecordingSink {
    name: String,
    recorded: Arc<Recorded>,
}

#[async_trait]
impl SnapshotSink for RecordingSink {
    async fn insert(&self, snapshot: &PersistedSnapshot) -> Result<(), StoreError> {
        self.recorded.attempts.fetch_add(1, Ordering::SeqCst);
        if self.recorded.failing.load(Ordering::SeqCst) {
            return Err(StoreError::backend("injected write failure"));
        }
        self.recorded
            .snapshots
            .lock()
            .entry(self.name.clone())
            .or_default()
            .push(snapshot.clone());
        Ok(())
    }

    fn collection(&self) -> &str {
        &self.name
    }
}

/// A snapshot store that records inserts and can be told to fail them.
///
/// Partitions are keyed by the raw device name.
#[derive(Debug, Clone, Default)]
pub struct RecordingStore {
    recorded: Arc<Recorded>,
}

impl RecordingStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every insert fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.recorded.failing.store(failing, Ordering::SeqCst);
    }

    /// Snapshots recorded for `device`.
    pub fn snapshots(&self, device: &str) -> Vec<PersistedSnapshot> {
        self.recorded
            .snapshots
            .lock()
            .get(device)
            .cloned()
            .unwrap_or_default()
    }

    /// Insert attempts, successful or not.
    pub fn attempts(&self) -> usize {
        self.recorded.attempts.load(Ordering::SeqCst)
    }
}

impl SnapshotStore for RecordingStore {
    fn collection(&self, device: &str) -> Result<Arc<dyn SnapshotSink>, StoreError> {
        Ok(Arc::new(RecordingSink {
            name: device.to_string(),
            recorded: Arc::clone(&self.recorded),
        }))
    }

    fn name(&self) -> &str {
        "recording"
    }
}
