// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Raw register word decoding.
//!
//! Every function here is pure. Decoding never fails loudly: a malformed word
//! slice or an unknown data type yields `None`, so one bad register never
//! aborts the poll of the others.
//!
//! # Multi-word reassembly
//!
//! ```text
//!  words as read        word order        byte order         value
//! ┌──────┬──────┐     ┌──────┬──────┐    ┌──────┬──────┐
//! │ w0   │ w1   │ ──▶ │ w1   │ w0   │ ─▶ │ swap │ swap │ ─▶ w1' | w0' << 16
//! └──────┴──────┘     └──────┴──────┘    └──────┴──────┘
//!                      (little only)      (little only)
//! ```
//!
//! After the optional word reversal the sequence is read least significant
//! word first, so `[0x4049, 0x0FDB]` with little word order is π.
//!
//! # Examples
//!
//! ```
//! use gauge_core::decoder::{decode, extract_bit};
//! use gauge_core::types::{DataType, DecodedValue, Endian, Number};
//!
//! let value = decode(&[0xFF38], DataType::Int16, Endian::Big, Endian::Big);
//! assert_eq!(value, Some(DecodedValue::Number(Number::Int(-200))));
//!
//! assert_eq!(extract_bit(Some(0b10_0000), 5), Some(true));
//! assert_eq!(extract_bit(Some(0b10_0000), 16), None);
//! ```

use crate::error::DecodeError;
use crate::types::{ByteOrder, DataType, DecodedValue, Number, RegisterDefinition, WordOrder};

/// Number of words needed for `data_type`. Unknown types count as one word.
#[inline]
pub fn register_count(data_type: DataType) -> u16 {
    data_type.register_count()
}

/// Decodes raw words into a typed value, returning `None` on any failure.
pub fn decode(
    words: &[u16],
    data_type: DataType,
    byte_order: ByteOrder,
    word_order: WordOrder,
) -> Option<DecodedValue> {
    match try_decode(words, data_type, byte_order, word_order) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::trace!(error = %e, data_type = %data_type, "Register decode failed");
            None
        }
    }
}

/// Decodes raw words into a typed value.
pub fn try_decode(
    words: &[u16],
    data_type: DataType,
    byte_order: ByteOrder,
    word_order: WordOrder,
) -> Result<DecodedValue, DecodeError> {
    let value = match data_type {
        DataType::Bool => DecodedValue::Bool(first_word(words, data_type)? != 0),
        DataType::Int16 => {
            DecodedValue::Number(Number::Int(i64::from(first_word(words, data_type)? as i16)))
        }
        DataType::Uint16 => {
            DecodedValue::Number(Number::Int(i64::from(first_word(words, data_type)?)))
        }
        DataType::Int32 => {
            let raw = assemble(words, data_type, byte_order, word_order)? as u32;
            DecodedValue::Number(Number::Int(i64::from(raw as i32)))
        }
        DataType::Uint32 => {
            let raw = assemble(words, data_type, byte_order, word_order)? as u32;
            DecodedValue::Number(Number::Int(i64::from(raw)))
        }
        DataType::Float32 => {
            let raw = assemble(words, data_type, byte_order, word_order)? as u32;
            DecodedValue::Number(Number::Float(f64::from(f32::from_bits(raw))))
        }
        DataType::Float64 => {
            let raw = assemble(words, data_type, byte_order, word_order)?;
            DecodedValue::Number(Number::Float(f64::from_bits(raw)))
        }
        DataType::Unknown => return Err(DecodeError::UnsupportedType(data_type.to_string())),
    };
    Ok(value)
}

fn first_word(words: &[u16], data_type: DataType) -> Result<u16, DecodeError> {
    words.first().copied().ok_or(DecodeError::InsufficientWords {
        data_type: data_type.to_string(),
        expected: 1,
        actual: 0,
    })
}

/// Reassembles the leading `register_count` words into one integer.
fn assemble(
    words: &[u16],
    data_type: DataType,
    byte_order: ByteOrder,
    word_order: WordOrder,
) -> Result<u64, DecodeError> {
    let count = usize::from(data_type.register_count());
    if words.len() < count {
        return Err(DecodeError::InsufficientWords {
            data_type: data_type.to_string(),
            expected: count,
            actual: words.len(),
        });
    }

    let mut ordered: Vec<u16> = words[..count].to_vec();
    if word_order.is_little() {
        ordered.reverse();
    }

    let value = ordered.iter().enumerate().fold(0u64, |acc, (i, &word)| {
        let word = if byte_order.is_little() {
            word.swap_bytes()
        } else {
            word
        };
        acc | (u64::from(word) << (16 * i))
    });
    Ok(value)
}

/// Returns bit `bit_index` of `value`, or `None` for a missing value or an
/// index outside 0–15.
#[inline]
pub fn extract_bit(value: Option<i64>, bit_index: u8) -> Option<bool> {
    let value = value?;
    if bit_index > 15 {
        return None;
    }
    Some((value >> bit_index) & 1 == 1)
}

/// Multiplies by `scale` and rounds to `decimals` fractional digits.
///
/// `scale == 1` with `decimals == 0` returns the value untouched. Integer
/// inputs stay integers while the result has no fractional part.
pub fn scale_and_round(value: Number, scale: f64, decimals: u32) -> Number {
    if scale == 1.0 && decimals == 0 {
        return value;
    }
    if let Number::Int(raw) = value {
        if scale == 1.0 {
            return Number::Int(raw);
        }
    }

    let scaled = if scale == 1.0 {
        value.as_f64()
    } else {
        value.as_f64() * scale
    };
    let factor = 10f64.powi(decimals.min(15) as i32);
    let rounded = (scaled * factor).round() / factor;

    if rounded.is_finite() && rounded.fract() == 0.0 && decimals == 0 && rounded.abs() < i64::MAX as f64 {
        Number::Int(rounded as i64)
    } else {
        Number::Float(rounded)
    }
}

/// Applies scale and rounding to a numeric value; booleans and `None` pass
/// through unchanged.
pub fn apply_scale_and_round(
    value: Option<DecodedValue>,
    scale: f64,
    decimals: u32,
) -> Option<DecodedValue> {
    match value {
        Some(DecodedValue::Number(n)) => Some(DecodedValue::Number(scale_and_round(n, scale, decimals))),
        other => other,
    }
}

/// Full decoding pipeline for one definition: decode, then either bit
/// extraction or scaling.
pub fn decode_register(definition: &RegisterDefinition, words: &[u16]) -> Option<DecodedValue> {
    let decoded = decode(
        words,
        definition.data_type,
        definition.byte_order,
        definition.word_order,
    );

    match definition.bit_index {
        Some(bit) => extract_bit(decoded.and_then(|v| v.as_i64()), bit).map(DecodedValue::Bool),
        None => apply_scale_and_round(decoded, definition.scale, definition.decimals),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Endian, FunctionCode};

    fn encode(raw: u64, count: usize, byte_order: ByteOrder, word_order: WordOrder) -> Vec<u16> {
        let mut words: Vec<u16> = (0..count)
            .map(|i| {
                let word = (raw >> (16 * i)) as u16;
                if byte_order.is_little() {
                    word.swap_bytes()
                } else {
                    word
                }
            })
            .collect();
        if word_order.is_little() {
            words.reverse();
        }
        words
    }

    fn number(value: Option<DecodedValue>) -> f64 {
        value.and_then(|v| v.as_number()).map(|n| n.as_f64()).unwrap()
    }

    #[test]
    fn test_single_word_types() {
        assert_eq!(
            decode(&[0x8000], DataType::Int16, Endian::Big, Endian::Big),
            Some(DecodedValue::Number(Number::Int(-32768)))
        );
        assert_eq!(
            decode(&[0x8000], DataType::Uint16, Endian::Big, Endian::Big),
            Some(DecodedValue::Number(Number::Int(32768)))
        );
        assert_eq!(
            decode(&[0], DataType::Bool, Endian::Big, Endian::Big),
            Some(DecodedValue::Bool(false))
        );
        assert_eq!(
            decode(&[7], DataType::Bool, Endian::Little, Endian::Little),
            Some(DecodedValue::Bool(true))
        );
    }

    #[test]
    fn test_float32_little_word_order() {
        let value = decode(&[0x4049, 0x0FDB], DataType::Float32, Endian::Big, Endian::Little);
        assert!((number(value) - 3.14159).abs() < 1e-5);
    }

    #[test]
    fn test_multi_word_orders_are_consistent() {
        let orders = [
            (Endian::Big, Endian::Big),
            (Endian::Big, Endian::Little),
            (Endian::Little, Endian::Big),
            (Endian::Little, Endian::Little),
        ];
        for (byte_order, word_order) in orders {
            let words = encode(u64::from((-123_456i32) as u32), 2, byte_order, word_order);
            assert_eq!(number(decode(&words, DataType::Int32, byte_order, word_order)), -123_456.0);

            let words = encode(u64::from(4_000_000_000u32), 2, byte_order, word_order);
            assert_eq!(number(decode(&words, DataType::Uint32, byte_order, word_order)), 4_000_000_000.0);

            let words = encode(u64::from(21.5f32.to_bits()), 2, byte_order, word_order);
            assert_eq!(number(decode(&words, DataType::Float32, byte_order, word_order)), 21.5);

            let words = encode((-0.000_125f64).to_bits(), 4, byte_order, word_order);
            assert_eq!(number(decode(&words, DataType::Float64, byte_order, word_order)), -0.000_125);
        }
    }

    #[test]
    fn test_short_input_returns_none() {
        assert_eq!(decode(&[0x4049], DataType::Float32, Endian::Big, Endian::Big), None);
        assert_eq!(decode(&[1, 2, 3], DataType::Float64, Endian::Big, Endian::Big), None);
        assert_eq!(decode(&[], DataType::Uint16, Endian::Big, Endian::Big), None);
        assert!(matches!(
            try_decode(&[1], DataType::Int32, Endian::Big, Endian::Big),
            Err(DecodeError::InsufficientWords { expected: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn test_unknown_type_returns_none() {
        assert_eq!(register_count(DataType::Unknown), 1);
        assert_eq!(decode(&[42], DataType::Unknown, Endian::Big, Endian::Big), None);
    }

    #[test]
    fn test_extract_bit() {
        assert_eq!(extract_bit(Some(0b0000_0000_0010_0000), 5), Some(true));
        assert_eq!(extract_bit(Some(0b0000_0000_0010_0000), 4), Some(false));
        assert_eq!(extract_bit(Some(0x8000), 15), Some(true));
        assert_eq!(extract_bit(Some(0xFFFF), 16), None);
        assert_eq!(extract_bit(None, 0), None);
    }

    #[test]
    fn test_scale_and_round() {
        assert_eq!(scale_and_round(Number::Float(12.345), 1.0, 1), Number::Float(12.3));
        assert_eq!(scale_and_round(Number::Int(150), 1.0, 0), Number::Int(150));
        assert_eq!(scale_and_round(Number::Int(150), 1.0, 2), Number::Int(150));
        assert_eq!(scale_and_round(Number::Int(235), 0.1, 1), Number::Float(23.5));
        assert_eq!(scale_and_round(Number::Int(15), 10.0, 0), Number::Int(150));
        assert_eq!(scale_and_round(Number::Float(2.6), 1.0, 0), Number::Float(2.6));
    }

    #[test]
    fn test_apply_scale_passes_through_non_numeric() {
        assert_eq!(apply_scale_and_round(None, 0.1, 1), None);
        assert_eq!(
            apply_scale_and_round(Some(DecodedValue::Bool(true)), 0.1, 1),
            Some(DecodedValue::Bool(true))
        );
    }

    #[test]
    fn test_decode_register_bit_takes_precedence() {
        let def = RegisterDefinition::new("Pump", "status", FunctionCode::Holding, 10, DataType::Uint16)
            .with_scale(0.1, 1)
            .with_bit(3);
        assert_eq!(decode_register(&def, &[0b1000]), Some(DecodedValue::Bool(true)));

        let def = def.with_bit(20);
        assert_eq!(decode_register(&def, &[0b1000]), None);
    }

    #[test]
    fn test_decode_register_scales() {
        let def = RegisterDefinition::new("Temp", "parameters", FunctionCode::Input, 0, DataType::Int16)
            .with_scale(0.1, 1);
        assert_eq!(
            decode_register(&def, &[0xFFF6]),
            Some(DecodedValue::Number(Number::Float(-1.0)))
        );
    }
}
