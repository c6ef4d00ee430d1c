//! # Data Types
//!
//! The closed set of scalar types a specification can write, with their size,
//! range, fixed-point scale and little-endian wire encoding.
//!
//! Fixed-point types are stored as `round_half_to_even(value * 2^frac_bits)`
//! in an integer of the type's width; the range check applies to that
//! scaled integer.

use crate::error::{DataSpecError, Result};
use crate::Opcode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A value handed to the generator before it is encoded
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Integer(i128),
    Real(f64),
}

impl Value {
    /// The value as a float, for types that accept fractions
    pub fn as_f64(self) -> f64 {
        match self {
            Value::Integer(v) => v as f64,
            Value::Real(v) => v,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
        }
    }
}

macro_rules! integer_value {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Integer(v as i128)
            }
        })*
    };
}

integer_value!(u8, u16, u32, u64, usize, i8, i16, i32, i64, i128);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Real(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Uint8 = 0,
    Uint16 = 1,
    Uint32 = 2,
    Uint64 = 3,
    Int8 = 4,
    Int16 = 5,
    Int32 = 6,
    Int64 = 7,
    /// Unsigned Q8.8
    U88 = 8,
    /// Unsigned Q16.16
    U1616 = 9,
    /// Unsigned Q32.32
    U3232 = 10,
    /// Signed Q8.7
    S87 = 11,
    /// Signed Q16.15
    S1615 = 12,
    /// Signed Q32.31
    S3231 = 13,
    Float32 = 14,
    Float64 = 15,
    U08 = 16,
    U016 = 17,
    U032 = 18,
    U064 = 19,
    S07 = 20,
    S015 = 21,
    S031 = 22,
    S063 = 23,
}

impl DataType {
    pub const ALL: [DataType; 24] = [
        DataType::Uint8,
        DataType::Uint16,
        DataType::Uint32,
        DataType::Uint64,
        DataType::Int8,
        DataType::Int16,
        DataType::Int32,
        DataType::Int64,
        DataType::U88,
        DataType::U1616,
        DataType::U3232,
        DataType::S87,
        DataType::S1615,
        DataType::S3231,
        DataType::Float32,
        DataType::Float64,
        DataType::U08,
        DataType::U016,
        DataType::U032,
        DataType::U064,
        DataType::S07,
        DataType::S015,
        DataType::S031,
        DataType::S063,
    ];

    /// Try to convert from the id carried in a command word
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    #[inline]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Look up a type id, failing with `UnknownType`
    pub fn from_id(value: u32, command: Opcode) -> Result<Self> {
        u8::try_from(value)
            .ok()
            .and_then(Self::from_u8)
            .ok_or(DataSpecError::UnknownType {
                type_id: value,
                command,
            })
    }

    /// Size on the wire in bytes
    pub const fn size(self) -> u32 {
        match self {
            DataType::Uint8 | DataType::Int8 | DataType::U08 | DataType::S07 => 1,
            DataType::Uint16
            | DataType::Int16
            | DataType::U88
            | DataType::S87
            | DataType::U016
            | DataType::S015 => 2,
            DataType::Uint32
            | DataType::Int32
            | DataType::U1616
            | DataType::S1615
            | DataType::Float32
            | DataType::U032
            | DataType::S031 => 4,
            DataType::Uint64
            | DataType::Int64
            | DataType::U3232
            | DataType::S3231
            | DataType::Float64
            | DataType::U064
            | DataType::S063 => 8,
        }
    }

    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::S87
                | DataType::S1615
                | DataType::S3231
                | DataType::S07
                | DataType::S015
                | DataType::S031
                | DataType::S063
                | DataType::Float32
                | DataType::Float64
        )
    }

    pub const fn is_float(self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    /// Number of fractional bits; zero for integers and floats
    pub const fn frac_bits(self) -> u32 {
        match self {
            DataType::U88 | DataType::U08 => 8,
            DataType::U1616 | DataType::U016 => 16,
            DataType::U3232 | DataType::U032 => 32,
            DataType::U064 => 64,
            DataType::S87 | DataType::S07 => 7,
            DataType::S1615 | DataType::S015 => 15,
            DataType::S3231 | DataType::S031 => 31,
            DataType::S063 => 63,
            _ => 0,
        }
    }

    pub const fn is_fixed_point(self) -> bool {
        self.frac_bits() > 0
    }

    pub const fn is_integer(self) -> bool {
        !self.is_float() && !self.is_fixed_point()
    }

    /// Scale applied to a value before storing it
    pub fn scale(self) -> f64 {
        2f64.powi(self.frac_bits() as i32)
    }

    /// Smallest raw integer the type's storage can hold
    pub const fn raw_min(self) -> i128 {
        if self.is_signed() {
            -(1i128 << (self.size() * 8 - 1))
        } else {
            0
        }
    }

    /// Largest raw integer the type's storage can hold
    pub const fn raw_max(self) -> i128 {
        if self.is_signed() {
            (1i128 << (self.size() * 8 - 1)) - 1
        } else {
            (1i128 << (self.size() * 8)) - 1
        }
    }

    /// Smallest representable value
    pub fn min_value(self) -> f64 {
        match self {
            DataType::Float32 => f32::MIN as f64,
            DataType::Float64 => f64::MIN,
            _ => self.raw_min() as f64 / self.scale(),
        }
    }

    /// Largest representable value
    pub fn max_value(self) -> f64 {
        match self {
            DataType::Float32 => f32::MAX as f64,
            DataType::Float64 => f64::MAX,
            _ => self.raw_max() as f64 / self.scale(),
        }
    }

    fn out_of_range(self, value: Value, command: Opcode) -> DataSpecError {
        DataSpecError::out_of_bounds(
            "value",
            value,
            self.min_value(),
            self.max_value(),
            command,
        )
    }

    /// Integer the value is stored as, before truncation to the wire width
    fn raw_integer(self, value: Value, command: Opcode) -> Result<i128> {
        let raw = if self.is_fixed_point() {
            match value {
                Value::Integer(v) => v
                    .checked_mul(1i128 << self.frac_bits())
                    .ok_or_else(|| self.out_of_range(value, command))?,
                Value::Real(v) => {
                    let scaled = round_half_to_even(v * self.scale());
                    if !scaled.is_finite() {
                        return Err(self.out_of_range(value, command));
                    }
                    scaled as i128
                }
            }
        } else {
            match value {
                Value::Integer(v) => v,
                Value::Real(v) => {
                    if !v.is_finite() || v.fract() != 0.0 {
                        return Err(self.out_of_range(value, command));
                    }
                    v as i128
                }
            }
        };
        if raw < self.raw_min() || raw > self.raw_max() {
            return Err(self.out_of_range(value, command));
        }
        Ok(raw)
    }

    /// Bit pattern of the encoded value in the low `size()` bytes
    pub fn encode_bits(self, value: Value, command: Opcode) -> Result<u64> {
        match self {
            DataType::Float32 => {
                let v = value.as_f64();
                if v.is_finite() && v.abs() > f32::MAX as f64 {
                    return Err(self.out_of_range(value, command));
                }
                Ok((v as f32).to_bits() as u64)
            }
            DataType::Float64 => Ok(value.as_f64().to_bits()),
            _ => {
                let raw = self.raw_integer(value, command)?;
                Ok((raw as u64) & self.bit_mask())
            }
        }
    }

    /// Wire encoding of `value`: exactly `size()` little-endian bytes
    pub fn encode(self, value: Value, command: Opcode) -> Result<Vec<u8>> {
        let bits = self.encode_bits(value, command)?;
        Ok(bits.to_le_bytes()[..self.size() as usize].to_vec())
    }

    /// Mask covering the type's width
    pub const fn bit_mask(self) -> u64 {
        if self.size() == 8 {
            u64::MAX
        } else {
            (1u64 << (self.size() * 8)) - 1
        }
    }

    /// Low word of an encoded value as a register holds it
    ///
    /// Signed types narrower than a word are sign-extended.
    pub const fn register_word(self, bits: u64) -> u32 {
        let width = self.size() * 8;
        if self.is_signed() && width < 32 {
            let shift = 32 - width;
            (((bits as u32) << shift) as i32 >> shift) as u32
        } else {
            bits as u32
        }
    }

    /// Interpret a stored bit pattern for display
    pub fn format_bits(self, bits: u64) -> String {
        let bits = bits & self.bit_mask();
        match self {
            DataType::Float32 => format!("{}", f32::from_bits(bits as u32)),
            DataType::Float64 => format!("{}", f64::from_bits(bits)),
            _ => {
                let raw = if self.is_signed() {
                    let shift = 64 - self.size() * 8;
                    (((bits << shift) as i64) >> shift) as i128
                } else {
                    bits as i128
                };
                if self.is_fixed_point() {
                    format!("{}", raw as f64 / self.scale())
                } else {
                    format!("{raw}")
                }
            }
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            DataType::Uint8 => "UINT8",
            DataType::Uint16 => "UINT16",
            DataType::Uint32 => "UINT32",
            DataType::Uint64 => "UINT64",
            DataType::Int8 => "INT8",
            DataType::Int16 => "INT16",
            DataType::Int32 => "INT32",
            DataType::Int64 => "INT64",
            DataType::U88 => "U88",
            DataType::U1616 => "U1616",
            DataType::U3232 => "U3232",
            DataType::S87 => "S87",
            DataType::S1615 => "S1615",
            DataType::S3231 => "S3231",
            DataType::Float32 => "FLOAT_32",
            DataType::Float64 => "FLOAT_64",
            DataType::U08 => "U08",
            DataType::U016 => "U016",
            DataType::U032 => "U032",
            DataType::U064 => "U064",
            DataType::S07 => "S07",
            DataType::S015 => "S015",
            DataType::S031 => "S031",
            DataType::S063 => "S063",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Round to the nearest integer, ties to even
pub fn round_half_to_even(x: f64) -> f64 {
    let rounded = x.round();
    if (rounded - x).abs() == 0.5 && rounded % 2.0 != 0.0 {
        rounded - x.signum()
    } else {
        rounded
    }
}
