// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Single register reads.
//!
//! A read addresses the device's slave on the shared transport, issues the
//! request matching the register's function code and decodes the reply. The
//! request is raced against a deadline slightly longer than the transport's
//! own timeout, so a transport that never answers still yields a failure.

use std::sync::Arc;
use std::time::Duration;

use gauge_core::decoder::{decode_register, register_count};
use gauge_core::{DataType, DecodedValue, Device, FunctionCode, RegisterDefinition};
use tokio::time::timeout;

use crate::client::{Connection, ModbusTransport};
use crate::error::{ModbusError, ModbusResult, OperationError};

/// Added to the response timeout to bound a read.
pub const TIMEOUT_MARGIN: Duration = Duration::from_millis(250);

// =============================================================================
// ReadResult
// =============================================================================

/// A decoded register.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadSuccess {
    /// Register key.
    pub key: String,
    /// Register category.
    pub category: String,
    /// Register address.
    pub address: u16,
    /// Declared data type.
    pub data_type: DataType,
    /// Decoded and scaled value; `None` when the words could not be decoded.
    pub value: Option<DecodedValue>,
    /// Display unit.
    pub unit: String,
    /// Lower alarm bound.
    pub min_value: Option<f64>,
    /// Upper alarm bound.
    pub max_value: Option<f64>,
}

/// A register that could not be read.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadFailure {
    /// Register key.
    pub key: String,
    /// Register category.
    pub category: String,
    /// Register address.
    pub address: u16,
    /// Declared data type.
    pub data_type: DataType,
    /// Error text, `"Timeout"` for expired deadlines.
    pub error: String,
}

/// Outcome of one register read.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadResult {
    /// The register was read.
    Success(ReadSuccess),
    /// The read failed.
    Failure(ReadFailure),
}

impl ReadResult {
    /// Returns `true` for [`ReadResult::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Register key.
    pub fn key(&self) -> &str {
        match self {
            Self::Success(s) => &s.key,
            Self::Failure(f) => &f.key,
        }
    }

    /// Error text of a failure.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure(f) => Some(&f.error),
        }
    }

    fn success(register: &RegisterDefinition, value: Option<DecodedValue>) -> Self {
        Self::Success(ReadSuccess {
            key: register.key.clone(),
            category: register.category.clone(),
            address: register.address,
            data_type: register.data_type,
            value,
            unit: register.unit.clone(),
            min_value: register.min_value,
            max_value: register.max_value,
        })
    }

    fn failure(register: &RegisterDefinition, error: &ModbusError) -> Self {
        Self::Failure(ReadFailure {
            key: register.key.clone(),
            category: register.category.clone(),
            address: register.address,
            data_type: register.data_type,
            error: error.to_string(),
        })
    }
}

// =============================================================================
// Reader
// =============================================================================

/// Issues register reads over a shared [`Connection`].
#[derive(Debug, Clone)]
pub struct Reader {
    connection: Arc<Connection>,
    deadline: Duration,
}

impl Reader {
    /// Creates a reader bounded by the connection's response timeout plus
    /// [`TIMEOUT_MARGIN`].
    pub fn new(connection: Arc<Connection>) -> Self {
        let deadline = connection.response_timeout() + TIMEOUT_MARGIN;
        Self {
            connection,
            deadline,
        }
    }

    /// Upper bound of a single read.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Reads and decodes one register of `device`.
    pub async fn read_register(&self, device: &Device, register: &RegisterDefinition) -> ReadResult {
        let count = register_count(register.data_type);
        let mut transport = self.connection.transport().await;
        transport.set_slave(device.slave_id());

        let request = read_words(&mut **transport, register.function_code, register.address, count);
        let outcome = match timeout(self.deadline, request).await {
            Ok(result) => result,
            Err(_) => Err(ModbusError::read_timeout(self.deadline)),
        };

        match outcome {
            Ok(words) => {
                let value = decode_register(register, &words);
                tracing::trace!(
                    device = %device.name(),
                    key = %register.key,
                    words = ?words,
                    value = ?value,
                    "Register read"
                );
                ReadResult::success(register, value)
            }
            Err(e) => {
                if let Err(flush_error) = transport.flush().await {
                    tracing::trace!(
                        error = %flush_error,
                        error_kind = flush_error.category(),
                        "Flush after failed read failed"
                    );
                }
                tracing::debug!(
                    device = %device.name(),
                    slave_id = device.slave_id(),
                    key = %register.key,
                    address = register.address,
                    error_kind = e.category(),
                    error = %e,
                    "Register read failed"
                );
                ReadResult::failure(register, &e)
            }
        }
    }
}

/// Reads `count` items with the primitive for `function_code`.
///
/// Bit tables are widened to one word per bit so every register flows
/// through the same decoder.
async fn read_words(
    transport: &mut dyn ModbusTransport,
    function_code: FunctionCode,
    address: u16,
    count: u16,
) -> ModbusResult<Vec<u16>> {
    let words = match function_code {
        FunctionCode::Holding => transport.read_holding_registers(address, count).await?,
        FunctionCode::Input => transport.read_input_registers(address, count).await?,
        FunctionCode::Coil => bits_to_words(transport.read_coils(address, count).await?),
        FunctionCode::Discrete => {
            bits_to_words(transport.read_discrete_inputs(address, count).await?)
        }
    };

    if words.is_empty() {
        return Err(ModbusError::operation(OperationError::ShortResponse {
            address,
            expected: usize::from(count),
            actual: 0,
        }));
    }
    Ok(words)
}

fn bits_to_words(bits: Vec<bool>) -> Vec<u16> {
    bits.into_iter().map(u16::from).collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use gauge_core::{DeviceSpec, Endian, Number};

    use crate::testing::{Reply, ScriptedTransport};

    async fn reader_for(transport: ScriptedTransport) -> Reader {
        let connection = Arc::new(Connection::with_transport(
            Box::new(transport),
            Duration::from_secs(1),
        ));
        connection.connect().await.unwrap();
        Reader::new(connection)
    }

    fn boiler() -> Device {
        Device::new(DeviceSpec::new(1, "boiler1")).unwrap()
    }

    #[tokio::test]
    async fn test_read_holding_register() {
        let transport =
            ScriptedTransport::new().on(1, FunctionCode::Holding, 0, Reply::Words(vec![150]));
        let reader = reader_for(transport).await;
        let level = RegisterDefinition::new("Level", "parameters", FunctionCode::Holding, 0, DataType::Uint16)
            .with_unit("мм")
            .with_bounds(Some(0.0), Some(500.0));

        match reader.read_register(&boiler(), &level).await {
            ReadResult::Success(s) => {
                assert_eq!(s.value, Some(DecodedValue::Number(Number::Int(150))));
                assert_eq!(s.unit, "мм");
                assert_eq!(s.category, "parameters");
                assert_eq!(s.max_value, Some(500.0));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_float_with_word_swap() {
        let transport = ScriptedTransport::new().on(
            1,
            FunctionCode::Input,
            10,
            Reply::Words(vec![0x4049, 0x0FDB]),
        );
        let reader = reader_for(transport).await;
        let pi = RegisterDefinition::new("Pi", "parameters", FunctionCode::Input, 10, DataType::Float32)
            .with_order(Endian::Big, Endian::Little);

        let result = reader.read_register(&boiler(), &pi).await;
        let ReadResult::Success(s) = result else {
            panic!("read failed: {:?}", result);
        };
        let value = s.value.and_then(|v| v.as_number()).map(|n| n.as_f64()).unwrap();
        assert!((value - std::f64::consts::PI).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_read_coil_with_bit_type() {
        let transport =
            ScriptedTransport::new().on(1, FunctionCode::Coil, 3, Reply::Bits(vec![true]));
        let reader = reader_for(transport).await;
        let pump = RegisterDefinition::new("Pump", "status", FunctionCode::Coil, 3, DataType::Bool);

        let result = reader.read_register(&boiler(), &pump).await;
        let ReadResult::Success(s) = result else {
            panic!("read failed: {:?}", result);
        };
        assert_eq!(s.value, Some(DecodedValue::Bool(true)));
    }

    #[tokio::test]
    async fn test_failure_flushes_transport() {
        let transport =
            ScriptedTransport::new().on(1, FunctionCode::Holding, 0, Reply::Fail("CRC mismatch"));
        let probe = transport.probe();
        let reader = reader_for(transport).await;
        let level = RegisterDefinition::new("Level", "parameters", FunctionCode::Holding, 0, DataType::Uint16);

        let result = reader.read_register(&boiler(), &level).await;
        assert!(!result.is_success());
        assert!(result.error().unwrap().contains("CRC mismatch"));
        assert_eq!(probe.flushes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_transport_times_out() {
        let transport = ScriptedTransport::new().on(1, FunctionCode::Holding, 0, Reply::Hang);
        let reader = reader_for(transport).await;
        let level = RegisterDefinition::new("Level", "parameters", FunctionCode::Holding, 0, DataType::Uint16);

        let started = tokio::time::Instant::now();
        let result = reader.read_register(&boiler(), &level).await;
        assert_eq!(result.error(), Some("Timeout"));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1250) && elapsed < Duration::from_millis(1300));
    }

    #[tokio::test]
    async fn test_addresses_device_slave() {
        let transport = ScriptedTransport::new()
            .on(7, FunctionCode::Holding, 0, Reply::Words(vec![1]));
        let probe = transport.probe();
        let reader = reader_for(transport).await;
        let device = Device::new(DeviceSpec::new(7, "pump")).unwrap();
        let reg = RegisterDefinition::new("A", "p", FunctionCode::Holding, 0, DataType::Uint16);

        assert!(reader.read_register(&device, &reg).await.is_success());
        assert_eq!(probe.reads_of(7), 1);
    }

    #[tokio::test]
    async fn test_not_connected_read_fails() {
        let connection = Arc::new(Connection::with_transport(
            Box::new(ScriptedTransport::new()),
            Duration::from_secs(1),
        ));
        let reader = Reader::new(connection);
        let reg = RegisterDefinition::new("A", "p", FunctionCode::Holding, 0, DataType::Uint16);
        assert!(!reader.read_register(&boiler(), &reg).await.is_success());
    }
}
