//! Register value codec.
//!
//! Pure conversions between raw 16-bit register words and typed values,
//! given a declared value type, word order and optional linear scale.
//! The four two-register permutations follow the canonical Modbus
//! multi-register byte-order convention and must match it bit for bit.
//!
//! Coil and discrete-input values never pass through here: they travel
//! as `0`/`1` words end to end.

use crate::error::{Result, WireError};
use crate::value::{DecodedValue, ScaleRange, ValueType, WordOrder};

/// Effective permutation for a register pair. Every one of the four is
/// its own inverse, so encode and decode share the same table.
#[derive(Debug, Clone, Copy)]
enum PairOrder {
    Abcd,
    Dcba,
    Badc,
    Cdab,
}

/// `AB`/`BA` act as shorthands for `ABCD`/`DCBA` on two-word types.
fn pair_order(order: WordOrder) -> PairOrder {
    match order {
        WordOrder::AB | WordOrder::ABCD => PairOrder::Abcd,
        WordOrder::BA | WordOrder::DCBA => PairOrder::Dcba,
        WordOrder::BADC => PairOrder::Badc,
        WordOrder::CDAB => PairOrder::Cdab,
    }
}

/// Resolve the byte-swap flag for a single-word type; two-register
/// orders are a configuration error here.
fn single_order(value_type: ValueType, order: WordOrder) -> Result<bool> {
    match order {
        WordOrder::AB => Ok(false),
        WordOrder::BA => Ok(true),
        other => Err(WireError::Config(format!(
            "word order {:?} is not valid for 16-bit type {:?}",
            other, value_type
        ))),
    }
}

fn apply_swap(word: u16, swap: bool) -> u16 {
    if swap {
        word.swap_bytes()
    } else {
        word
    }
}

fn check_word_count(len: usize, value_type: ValueType) -> Result<()> {
    let width = value_type.word_width();
    if len % width != 0 {
        return Err(WireError::Decode(format!(
            "word count {} is not a multiple of {} for {:?}",
            len, width, value_type
        )));
    }
    Ok(())
}

/// Assemble the four constituent bytes of a register pair in the
/// declared order. `a`/`b` are the high word's bytes, `c`/`d` the low
/// word's.
fn pack_pair(hi: u16, lo: u16, order: PairOrder) -> [u8; 4] {
    let [a, b] = hi.to_be_bytes();
    let [c, d] = lo.to_be_bytes();
    match order {
        PairOrder::Abcd => [a, b, c, d],
        PairOrder::Dcba => [d, c, b, a],
        PairOrder::Badc => [b, a, d, c],
        PairOrder::Cdab => [c, d, a, b],
    }
}

/// Inverse of [`pack_pair`]; the permutations are involutions so the
/// same table applies.
fn unpack_pair(bytes: [u8; 4], order: PairOrder) -> [u16; 2] {
    let [a, b, c, d] = bytes;
    let permuted = match order {
        PairOrder::Abcd => [a, b, c, d],
        PairOrder::Dcba => [d, c, b, a],
        PairOrder::Badc => [b, a, d, c],
        PairOrder::Cdab => [c, d, a, b],
    };
    [
        u16::from_be_bytes([permuted[0], permuted[1]]),
        u16::from_be_bytes([permuted[2], permuted[3]]),
    ]
}

/// Validate a type/order combination without touching any data.
///
/// Identity types (`RegisterArray`, `HexString`) ignore the order
/// entirely; two-word types accept any order via the `AB`/`BA`
/// shorthand promotion.
pub fn validate_pair(value_type: ValueType, order: WordOrder) -> Result<()> {
    match value_type {
        ValueType::RegisterArray | ValueType::HexString => Ok(()),
        ValueType::UInt16 | ValueType::Int16 | ValueType::Scale => {
            single_order(value_type, order).map(|_| ())
        }
        ValueType::UInt32 | ValueType::Int32 | ValueType::Float32 => Ok(()),
    }
}

/// Decode raw register words into a typed value.
pub fn decode(
    raw: &[u16],
    value_type: ValueType,
    order: WordOrder,
    scale: Option<&ScaleRange>,
) -> Result<DecodedValue> {
    check_word_count(raw.len(), value_type)?;

    match value_type {
        ValueType::RegisterArray => Ok(DecodedValue::Registers(raw.to_vec())),
        ValueType::HexString => Ok(DecodedValue::Hex(words_to_hex(raw))),
        ValueType::UInt16 => {
            let swap = single_order(value_type, order)?;
            Ok(DecodedValue::UInt16(
                raw.iter().map(|w| apply_swap(*w, swap)).collect(),
            ))
        }
        ValueType::Int16 => {
            let swap = single_order(value_type, order)?;
            Ok(DecodedValue::Int16(
                raw.iter().map(|w| apply_swap(*w, swap) as i16).collect(),
            ))
        }
        ValueType::Scale => {
            let range = scale
                .ok_or_else(|| WireError::Config("scale decode requires a range".to_string()))?;
            range.validate()?;
            let swap = single_order(value_type, order)?;
            Ok(DecodedValue::Scaled(
                raw.iter()
                    .map(|w| range.apply(f64::from(apply_swap(*w, swap) as i16)))
                    .collect(),
            ))
        }
        ValueType::UInt32 => {
            let po = pair_order(order);
            Ok(DecodedValue::UInt32(
                raw.chunks_exact(2)
                    .map(|pair| u32::from_be_bytes(pack_pair(pair[0], pair[1], po)))
                    .collect(),
            ))
        }
        ValueType::Int32 => {
            let po = pair_order(order);
            Ok(DecodedValue::Int32(
                raw.chunks_exact(2)
                    .map(|pair| i32::from_be_bytes(pack_pair(pair[0], pair[1], po)))
                    .collect(),
            ))
        }
        ValueType::Float32 => {
            let po = pair_order(order);
            Ok(DecodedValue::Float32(
                raw.chunks_exact(2)
                    .map(|pair| f32::from_be_bytes(pack_pair(pair[0], pair[1], po)))
                    .collect(),
            ))
        }
    }
}

/// Encode a typed value back into raw register words.
///
/// Exact inverse of [`decode`] for every type except `Hex` and
/// `Scaled`, whose textual and scaled forms are write-input formats
/// mapped back through the same permutation tables.
pub fn encode(
    value: &DecodedValue,
    order: WordOrder,
    scale: Option<&ScaleRange>,
) -> Result<Vec<u16>> {
    match value {
        DecodedValue::Registers(words) => Ok(words.clone()),
        DecodedValue::Hex(hex) => hex_to_words(hex),
        DecodedValue::UInt16(vals) => {
            let swap = single_order(ValueType::UInt16, order)?;
            Ok(vals.iter().map(|v| apply_swap(*v, swap)).collect())
        }
        DecodedValue::Int16(vals) => {
            let swap = single_order(ValueType::Int16, order)?;
            Ok(vals.iter().map(|v| apply_swap(*v as u16, swap)).collect())
        }
        DecodedValue::Scaled(vals) => {
            let range = scale
                .ok_or_else(|| WireError::Config("scale encode requires a range".to_string()))?;
            range.validate()?;
            let swap = single_order(ValueType::Scale, order)?;
            vals.iter()
                .map(|v| {
                    let raw = range.invert(*v)?;
                    Ok(apply_swap(raw.round() as i16 as u16, swap))
                })
                .collect()
        }
        DecodedValue::UInt32(vals) => {
            let po = pair_order(order);
            Ok(vals
                .iter()
                .flat_map(|v| unpack_pair(v.to_be_bytes(), po))
                .collect())
        }
        DecodedValue::Int32(vals) => {
            let po = pair_order(order);
            Ok(vals
                .iter()
                .flat_map(|v| unpack_pair(v.to_be_bytes(), po))
                .collect())
        }
        DecodedValue::Float32(vals) => {
            let po = pair_order(order);
            Ok(vals
                .iter()
                .flat_map(|v| unpack_pair(v.to_be_bytes(), po))
                .collect())
        }
    }
}

/// Render words as a concatenated uppercase hex string, four digits per
/// word, no separators.
pub fn words_to_hex(words: &[u16]) -> String {
    words.iter().map(|w| format!("{:04X}", w)).collect()
}

/// Parse a hex string back into register words.
pub fn hex_to_words(hex: &str) -> Result<Vec<u16>> {
    if hex.is_empty() || hex.len() % 4 != 0 {
        return Err(WireError::Decode(format!(
            "hex string length {} is not a positive multiple of 4",
            hex.len()
        )));
    }
    hex.as_bytes()
        .chunks_exact(4)
        .map(|chunk| {
            let digits = std::str::from_utf8(chunk)
                .map_err(|_| WireError::Decode("hex string is not ASCII".to_string()))?;
            u16::from_str_radix(digits, 16)
                .map_err(|_| WireError::Decode(format!("invalid hex word: {}", digits)))
        })
        .collect()
}
