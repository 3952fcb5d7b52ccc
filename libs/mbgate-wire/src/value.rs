//! Value typing for register reads and writes.
//!
//! A run of raw 16-bit registers only becomes meaningful once a client
//! declares how to interpret it: the value type selects the decode
//! algorithm and word width, the word order selects the byte/word
//! permutation, and an optional scale range maps raw readings into
//! engineering units.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WireError};

/// How a run of raw registers is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ValueType {
    /// Identity: raw unsigned 16-bit words, no reinterpretation.
    #[default]
    #[serde(rename = "register_array")]
    RegisterArray,
    /// Concatenated uppercase hex string, four digits per word.
    #[serde(rename = "hex_string")]
    HexString,
    /// Linear scaling of 16-bit words into an engineering range.
    #[serde(rename = "scale")]
    Scale,
    #[serde(rename = "uint16")]
    UInt16,
    #[serde(rename = "int16")]
    Int16,
    #[serde(rename = "uint32")]
    UInt32,
    #[serde(rename = "int32")]
    Int32,
    #[serde(rename = "float32")]
    Float32,
}

impl ValueType {
    /// Number of 16-bit words consumed per decoded value.
    pub fn word_width(self) -> usize {
        match self {
            ValueType::UInt32 | ValueType::Int32 | ValueType::Float32 => 2,
            _ => 1,
        }
    }

    /// Whether values of this type span two registers.
    pub fn is_double(self) -> bool {
        self.word_width() == 2
    }
}

/// Byte/word permutation convention for reassembling register values.
///
/// `AB`/`BA` apply to single-register values; the four-letter variants
/// apply to register pairs. `AB` and `BA` double as shorthands for
/// `ABCD` and `DCBA` when paired with a two-word value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum WordOrder {
    #[default]
    AB,
    BA,
    ABCD,
    DCBA,
    BADC,
    CDAB,
}

impl WordOrder {
    /// Whether this order names a two-register permutation.
    pub fn is_double(self) -> bool {
        matches!(
            self,
            WordOrder::ABCD | WordOrder::DCBA | WordOrder::BADC | WordOrder::CDAB
        )
    }
}

/// Linear mapping from a raw register domain to an engineering range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleRange {
    /// Domain low bound (raw units).
    #[serde(rename = "a")]
    pub domain_low: f64,
    /// Domain high bound (raw units).
    #[serde(rename = "b")]
    pub domain_high: f64,
    /// Range low bound (engineering units).
    #[serde(rename = "c")]
    pub range_low: f64,
    /// Range high bound (engineering units).
    #[serde(rename = "d")]
    pub range_high: f64,
}

impl ScaleRange {
    /// Scale is undefined on an empty domain.
    pub fn validate(&self) -> Result<()> {
        if self.domain_high == self.domain_low {
            return Err(WireError::Config(format!(
                "scale domain is empty: low == high == {}",
                self.domain_low
            )));
        }
        Ok(())
    }

    /// Map a raw reading into the engineering range.
    pub fn apply(&self, raw: f64) -> f64 {
        self.range_low
            + (raw - self.domain_low) * (self.range_high - self.range_low)
                / (self.domain_high - self.domain_low)
    }

    /// Map an engineering value back to a raw reading (inverse of
    /// [`ScaleRange::apply`]).
    pub fn invert(&self, value: f64) -> Result<f64> {
        if self.range_high == self.range_low {
            return Err(WireError::Config(format!(
                "scale range is empty: low == high == {}",
                self.range_low
            )));
        }
        Ok(self.domain_low
            + (value - self.range_low) * (self.domain_high - self.domain_low)
                / (self.range_high - self.range_low))
    }
}

/// A typed value decoded from raw registers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DecodedValue {
    Registers(Vec<u16>),
    Hex(String),
    Scaled(Vec<f64>),
    UInt16(Vec<u16>),
    Int16(Vec<i16>),
    UInt32(Vec<u32>),
    Int32(Vec<i32>),
    Float32(Vec<f32>),
}

/// Write payload: a scalar for single writes, a word sequence or a hex
/// string for multi writes. The function code decides which shapes are
/// legal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WriteData {
    Scalar(u16),
    Sequence(Vec<u16>),
    Hex(String),
}
