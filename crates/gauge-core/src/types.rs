// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Register definitions and decoded value types.
//!
//! A [`RegisterDefinition`] describes where one engineering value lives on a
//! Modbus slave and how its raw words turn into a number. Poll results are
//! collected into a [`DeviceData`] map: category → register key →
//! [`RegisterValue`].
//!
//! # Examples
//!
//! ```
//! use gauge_core::types::{DataType, FunctionCode, RegisterDefinition};
//!
//! let level = RegisterDefinition::new("Level", "parameters", FunctionCode::Holding, 0, DataType::Uint16)
//!     .with_unit("мм");
//! assert_eq!(level.data_type.register_count(), 1);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// FunctionCode
// =============================================================================

/// Selects which Modbus read primitive serves a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionCode {
    /// Holding registers (function code 3).
    #[default]
    #[serde(alias = "holding_register")]
    Holding,
    /// Input registers (function code 4).
    #[serde(alias = "input_register")]
    Input,
    /// Coils (function code 1).
    Coil,
    /// Discrete inputs (function code 2).
    #[serde(alias = "discrete_input")]
    Discrete,
}

impl FunctionCode {
    /// Returns `true` for the single-bit tables (coils and discrete inputs).
    #[inline]
    pub const fn is_bit(&self) -> bool {
        matches!(self, Self::Coil | Self::Discrete)
    }

    /// Returns the Modbus function code used to read this table.
    #[inline]
    pub const fn read_code(&self) -> u8 {
        match self {
            Self::Coil => 0x01,
            Self::Discrete => 0x02,
            Self::Holding => 0x03,
            Self::Input => 0x04,
        }
    }

    /// Returns the lowercase name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Holding => "holding",
            Self::Input => "input",
            Self::Coil => "coil",
            Self::Discrete => "discrete",
        }
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FunctionCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "holding" | "holding_register" | "hr" => Ok(Self::Holding),
            "input" | "input_register" | "ir" => Ok(Self::Input),
            "coil" | "co" => Ok(Self::Coil),
            "discrete" | "discrete_input" | "di" => Ok(Self::Discrete),
            _ => Err(format!("Unknown function code: {}", s)),
        }
    }
}

// =============================================================================
// DataType
// =============================================================================

/// How the raw register words of a definition are interpreted.
///
/// Names that do not match a known type deserialize to [`DataType::Unknown`],
/// which occupies one word and never produces a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Single word, non-zero is `true`.
    Bool,
    /// Signed 16-bit.
    Int16,
    /// Unsigned 16-bit.
    #[default]
    Uint16,
    /// Signed 32-bit over two words.
    Int32,
    /// Unsigned 32-bit over two words.
    Uint32,
    /// IEEE-754 single precision over two words.
    Float32,
    /// IEEE-754 double precision over four words.
    Float64,
    /// Anything else.
    #[serde(other)]
    Unknown,
}

impl DataType {
    /// Number of 16-bit registers occupied by this type.
    #[inline]
    pub const fn register_count(&self) -> u16 {
        match self {
            Self::Bool | Self::Int16 | Self::Uint16 | Self::Unknown => 1,
            Self::Int32 | Self::Uint32 | Self::Float32 => 2,
            Self::Float64 => 4,
        }
    }

    /// Returns `true` for the boolean type.
    #[inline]
    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool)
    }

    /// Returns the lowercase name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int16 => "int16",
            Self::Uint16 => "uint16",
            Self::Int32 => "int32",
            Self::Uint32 => "uint32",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "bool" | "boolean" => Self::Bool,
            "int16" | "i16" => Self::Int16,
            "uint16" | "u16" => Self::Uint16,
            "int32" | "i32" => Self::Int32,
            "uint32" | "u32" => Self::Uint32,
            "float32" | "f32" | "float" => Self::Float32,
            "float64" | "f64" | "double" => Self::Float64,
            _ => Self::Unknown,
        })
    }
}

// =============================================================================
// Endianness
// =============================================================================

/// Order of bytes inside each 16-bit word, or of words inside a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    /// Most significant first.
    #[default]
    Big,
    /// Least significant first.
    Little,
}

impl Endian {
    /// Returns `true` for [`Endian::Little`].
    #[inline]
    pub const fn is_little(&self) -> bool {
        matches!(self, Self::Little)
    }
}

/// Byte order within a register word.
pub type ByteOrder = Endian;

/// Word order across the registers of a multi-word value.
pub type WordOrder = Endian;

// =============================================================================
// RegisterDefinition
// =============================================================================

fn default_scale() -> f64 {
    1.0
}

/// Static description of one polled register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RegisterDefinition {
    /// Parameter name, unique within the device.
    pub key: String,

    /// Presentation group, e.g. `parameters` or `status`.
    pub category: String,

    /// Read primitive.
    #[serde(default)]
    pub function_code: FunctionCode,

    /// Zero-based register or bit address.
    pub address: u16,

    /// Raw value interpretation.
    #[serde(default)]
    pub data_type: DataType,

    /// Byte order within each word.
    #[serde(default)]
    pub byte_order: ByteOrder,

    /// Word order across words.
    #[serde(default)]
    pub word_order: WordOrder,

    /// Multiplier applied after decoding.
    #[serde(default = "default_scale")]
    pub scale: f64,

    /// Fractional digits kept after scaling.
    #[serde(default)]
    pub decimals: u32,

    /// When set, the value is reduced to this bit of the decoded word.
    #[serde(default)]
    pub bit_index: Option<u8>,

    /// Display unit.
    #[serde(default)]
    pub unit: String,

    /// Lower alarm bound, passed through untouched.
    #[serde(default)]
    pub min_value: Option<f64>,

    /// Upper alarm bound, passed through untouched.
    #[serde(default)]
    pub max_value: Option<f64>,
}

impl RegisterDefinition {
    /// Creates a definition with default scaling, big-endian ordering and no unit.
    pub fn new(
        key: impl Into<String>,
        category: impl Into<String>,
        function_code: FunctionCode,
        address: u16,
        data_type: DataType,
    ) -> Self {
        Self {
            key: key.into(),
            category: category.into(),
            function_code,
            address,
            data_type,
            byte_order: Endian::Big,
            word_order: Endian::Big,
            scale: 1.0,
            decimals: 0,
            bit_index: None,
            unit: String::new(),
            min_value: None,
            max_value: None,
        }
    }

    /// Sets the display unit.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Sets scale and rounding.
    pub fn with_scale(mut self, scale: f64, decimals: u32) -> Self {
        self.scale = scale;
        self.decimals = decimals;
        self
    }

    /// Sets byte and word order.
    pub fn with_order(mut self, byte_order: ByteOrder, word_order: WordOrder) -> Self {
        self.byte_order = byte_order;
        self.word_order = word_order;
        self
    }

    /// Reduces the value to a single bit.
    pub fn with_bit(mut self, bit_index: u8) -> Self {
        self.bit_index = Some(bit_index);
        self
    }

    /// Sets the alarm bounds.
    pub fn with_bounds(mut self, min_value: Option<f64>, max_value: Option<f64>) -> Self {
        self.min_value = min_value;
        self.max_value = max_value;
        self
    }

    /// Number of words or bits requested from the device.
    #[inline]
    pub fn register_count(&self) -> u16 {
        self.data_type.register_count()
    }

    /// Returns `true` if a successful read yields a boolean.
    #[inline]
    pub fn yields_boolean(&self) -> bool {
        self.data_type.is_bool() || self.bit_index.is_some()
    }
}

// =============================================================================
// Values
// =============================================================================

/// A decoded numeric value.
///
/// Integers stay integers until scaling produces a fraction, so a raw `150`
/// serializes as `150` rather than `150.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
}

impl Number {
    /// Returns the value as `f64`.
    #[inline]
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
        }
    }

    /// Returns the integer value, if this is an integer.
    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int(v) => Some(v),
            Self::Float(_) => None,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for Number {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Number {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

/// Output of the register decoder before it is shaped for a device's dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecodedValue {
    /// Boolean result.
    Bool(bool),
    /// Numeric result.
    Number(Number),
}

impl DecodedValue {
    /// Returns the boolean, if any.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Number(_) => None,
        }
    }

    /// Returns the number, if any.
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Bool(_) => None,
        }
    }

    /// Returns the value as an integer, treating `true` as `1`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Number(n) => Some(n.as_f64() as i64),
        }
    }
}

/// One entry of a device's dataset.
///
/// Serialized untagged so the stored shapes are exactly `{value, unit}` and
/// `{value}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegisterValue {
    /// A numeric reading and its unit.
    Numeric {
        /// Scaled value, `null` when decoding failed.
        value: Option<Number>,
        /// Display unit.
        unit: String,
    },
    /// A boolean reading.
    Boolean {
        /// Flag value, `null` when decoding failed.
        value: Option<bool>,
    },
}

impl RegisterValue {
    /// Creates a numeric entry.
    pub fn numeric(value: Option<Number>, unit: impl Into<String>) -> Self {
        Self::Numeric {
            value,
            unit: unit.into(),
        }
    }

    /// Creates a boolean entry.
    pub fn boolean(value: Option<bool>) -> Self {
        Self::Boolean { value }
    }

    /// Shapes a decoded value according to its definition.
    pub fn from_reading(definition: &RegisterDefinition, value: Option<DecodedValue>) -> Self {
        if definition.yields_boolean() {
            let flag = value.and_then(|v| match v {
                DecodedValue::Bool(b) => Some(b),
                DecodedValue::Number(n) => Some(n.as_f64() != 0.0),
            });
            Self::boolean(flag)
        } else {
            let number = value.map(|v| match v {
                DecodedValue::Bool(b) => Number::Int(i64::from(b)),
                DecodedValue::Number(n) => n,
            });
            Self::numeric(number, definition.unit.clone())
        }
    }

    /// Numeric value, if this is a numeric entry with a value.
    pub fn number(&self) -> Option<Number> {
        match self {
            Self::Numeric { value, .. } => *value,
            Self::Boolean { .. } => None,
        }
    }

    /// Boolean value, if this is a boolean entry with a value.
    pub fn flag(&self) -> Option<bool> {
        match self {
            Self::Boolean { value } => *value,
            Self::Numeric { .. } => None,
        }
    }
}

/// Register values of one category, keyed by register key.
pub type CategoryData = BTreeMap<String, RegisterValue>;

/// A device's complete dataset: category → register key → value.
pub type DeviceData = BTreeMap<String, CategoryData>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_count() {
        assert_eq!(DataType::Bool.register_count(), 1);
        assert_eq!(DataType::Int16.register_count(), 1);
        assert_eq!(DataType::Uint16.register_count(), 1);
        assert_eq!(DataType::Int32.register_count(), 2);
        assert_eq!(DataType::Uint32.register_count(), 2);
        assert_eq!(DataType::Float32.register_count(), 2);
        assert_eq!(DataType::Float64.register_count(), 4);
        assert_eq!(DataType::Unknown.register_count(), 1);
    }

    #[test]
    fn test_unknown_data_type_deserializes() {
        let dt: DataType = serde_json::from_str("\"string\"").unwrap();
        assert_eq!(dt, DataType::Unknown);
        let dt: DataType = serde_json::from_str("\"float32\"").unwrap();
        assert_eq!(dt, DataType::Float32);
        assert_eq!("double".parse::<DataType>().unwrap(), DataType::Float64);
    }

    #[test]
    fn test_function_code_parsing() {
        assert_eq!("HR".parse::<FunctionCode>().unwrap(), FunctionCode::Holding);
        assert_eq!("discrete_input".parse::<FunctionCode>().unwrap(), FunctionCode::Discrete);
        assert!("write".parse::<FunctionCode>().is_err());
        assert!(FunctionCode::Coil.is_bit());
        assert_eq!(FunctionCode::Input.read_code(), 4);
    }

    #[test]
    fn test_definition_defaults_from_json() {
        let def: RegisterDefinition = serde_json::from_str(
            r#"{"key":"Level","category":"parameters","address":0}"#,
        )
        .unwrap();
        assert_eq!(def.function_code, FunctionCode::Holding);
        assert_eq!(def.data_type, DataType::Uint16);
        assert_eq!(def.scale, 1.0);
        assert_eq!(def.decimals, 0);
        assert_eq!(def.byte_order, Endian::Big);
        assert!(def.bit_index.is_none());
    }

    #[test]
    fn test_register_value_shapes() {
        let numeric = RegisterValue::numeric(Some(Number::Int(150)), "мм");
        assert_eq!(
            serde_json::to_value(&numeric).unwrap(),
            serde_json::json!({"value": 150, "unit": "мм"})
        );

        let flag = RegisterValue::boolean(Some(true));
        assert_eq!(
            serde_json::to_value(&flag).unwrap(),
            serde_json::json!({"value": true})
        );
    }

    #[test]
    fn test_from_reading_uses_boolean_shape_for_bits() {
        let def = RegisterDefinition::new("Alarm", "status", FunctionCode::Holding, 3, DataType::Uint16)
            .with_bit(2)
            .with_unit("ignored");
        let value = RegisterValue::from_reading(&def, Some(DecodedValue::Bool(true)));
        assert_eq!(value, RegisterValue::boolean(Some(true)));
    }
}
