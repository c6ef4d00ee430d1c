//! Closed enumerations carried in the immediate nibble of control-flow,
//! arithmetic, logic and RNG commands.

use crate::error::{DataSpecError, Result};
use crate::Opcode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison used by IF
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    Equal = 0,
    NotEqual = 1,
    LessThanOrEqual = 2,
    LessThan = 3,
    GreaterThanOrEqual = 4,
    GreaterThan = 5,
    IsZero = 6,
    IsNonZero = 7,
}

impl Condition {
    pub fn from_u8(value: u8, command: Opcode) -> Result<Self> {
        Ok(match value {
            0 => Condition::Equal,
            1 => Condition::NotEqual,
            2 => Condition::LessThanOrEqual,
            3 => Condition::LessThan,
            4 => Condition::GreaterThanOrEqual,
            5 => Condition::GreaterThan,
            6 => Condition::IsZero,
            7 => Condition::IsNonZero,
            _ => {
                return Err(DataSpecError::UnknownCondition {
                    condition: value as u32,
                    command,
                })
            }
        })
    }

    /// Whether the condition tests a single value
    pub const fn is_unary(self) -> bool {
        matches!(self, Condition::IsZero | Condition::IsNonZero)
    }

    /// Compare two signed values; `b` is ignored for unary conditions
    pub const fn evaluate(self, a: i32, b: i32) -> bool {
        match self {
            Condition::Equal => a == b,
            Condition::NotEqual => a != b,
            Condition::LessThanOrEqual => a <= b,
            Condition::LessThan => a < b,
            Condition::GreaterThanOrEqual => a >= b,
            Condition::GreaterThan => a > b,
            Condition::IsZero => a == 0,
            Condition::IsNonZero => a != 0,
        }
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            Condition::Equal => "==",
            Condition::NotEqual => "!=",
            Condition::LessThanOrEqual => "<=",
            Condition::LessThan => "<",
            Condition::GreaterThanOrEqual => ">=",
            Condition::GreaterThan => ">",
            Condition::IsZero => "== 0",
            Condition::IsNonZero => "!= 0",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithmeticOperation {
    Add = 0,
    Subtract = 1,
    Multiply = 2,
}

impl ArithmeticOperation {
    pub fn from_u8(value: u8, command: Opcode) -> Result<Self> {
        match value {
            0 => Ok(ArithmeticOperation::Add),
            1 => Ok(ArithmeticOperation::Subtract),
            2 => Ok(ArithmeticOperation::Multiply),
            _ => Err(DataSpecError::InvalidOperation {
                kind: "arithmetic",
                value: value as u32,
                command,
            }),
        }
    }

    /// Apply with wrap-around modulo 2^32
    pub const fn apply(self, a: u32, b: u32, signed: bool) -> u32 {
        if signed {
            let (a, b) = (a as i32, b as i32);
            (match self {
                ArithmeticOperation::Add => a.wrapping_add(b),
                ArithmeticOperation::Subtract => a.wrapping_sub(b),
                ArithmeticOperation::Multiply => a.wrapping_mul(b),
            }) as u32
        } else {
            match self {
                ArithmeticOperation::Add => a.wrapping_add(b),
                ArithmeticOperation::Subtract => a.wrapping_sub(b),
                ArithmeticOperation::Multiply => a.wrapping_mul(b),
            }
        }
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            ArithmeticOperation::Add => "+",
            ArithmeticOperation::Subtract => "-",
            ArithmeticOperation::Multiply => "*",
        }
    }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicOperation {
    LeftShift = 0,
    RightShift = 1,
    Or = 2,
    And = 3,
    Xor = 4,
    Not = 5,
}

impl LogicOperation {
    pub fn from_u8(value: u8, command: Opcode) -> Result<Self> {
        match value {
            0 => Ok(LogicOperation::LeftShift),
            1 => Ok(LogicOperation::RightShift),
            2 => Ok(LogicOperation::Or),
            3 => Ok(LogicOperation::And),
            4 => Ok(LogicOperation::Xor),
            5 => Ok(LogicOperation::Not),
            _ => Err(DataSpecError::InvalidOperation {
                kind: "logic",
                value: value as u32,
                command,
            }),
        }
    }

    pub const fn is_unary(self) -> bool {
        matches!(self, LogicOperation::Not)
    }

    /// Apply on unsigned 32-bit values; shifts of 32 or more give zero
    pub const fn apply(self, a: u32, b: u32) -> u32 {
        match self {
            LogicOperation::LeftShift => {
                if b >= 32 {
                    0
                } else {
                    a << b
                }
            }
            LogicOperation::RightShift => {
                if b >= 32 {
                    0
                } else {
                    a >> b
                }
            }
            LogicOperation::Or => a | b,
            LogicOperation::And => a & b,
            LogicOperation::Xor => a ^ b,
            LogicOperation::Not => !a,
        }
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            LogicOperation::LeftShift => "<<",
            LogicOperation::RightShift => ">>",
            LogicOperation::Or => "|",
            LogicOperation::And => "&",
            LogicOperation::Xor => "^",
            LogicOperation::Not => "~",
        }
    }
}

/// Kind of random number generator behind an RNG slot
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RandomNumberGenerator {
    MersenneTwister = 0,
}

impl RandomNumberGenerator {
    pub fn from_u8(value: u8, command: Opcode) -> Result<Self> {
        match value {
            0 => Ok(RandomNumberGenerator::MersenneTwister),
            _ => Err(DataSpecError::InvalidOperation {
                kind: "random number generator",
                value: value as u32,
                command,
            }),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            RandomNumberGenerator::MersenneTwister => "MERSENNE_TWISTER",
        }
    }
}

/// Distribution kinds a DECLARE_RANDOM_DIST may describe
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RandomDistribution {
    Uniform = 0,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_evaluate() {
        assert!(Condition::LessThan.evaluate(-1, 0));
        assert!(!Condition::GreaterThan.evaluate(-1, 0));
        assert!(Condition::IsZero.evaluate(0, 99));
        assert!(Condition::IsNonZero.evaluate(5, 0));
        assert!(Condition::LessThanOrEqual.evaluate(3, 3));
    }

    #[test]
    fn test_unknown_condition() {
        assert!(matches!(
            Condition::from_u8(8, Opcode::If),
            Err(DataSpecError::UnknownCondition { condition: 8, .. })
        ));
    }

    #[test]
    fn test_arithmetic_wraps() {
        assert_eq!(ArithmeticOperation::Add.apply(u32::MAX, 1, false), 0);
        assert_eq!(ArithmeticOperation::Subtract.apply(0, 1, true), u32::MAX);
        assert_eq!(ArithmeticOperation::Multiply.apply(0x8000_0000, 2, false), 0);
        assert_eq!(ArithmeticOperation::Multiply.apply(-3i32 as u32, 4, true), -12i32 as u32);
    }

    #[test]
    fn test_logic_shifts() {
        assert_eq!(LogicOperation::LeftShift.apply(1, 31), 0x8000_0000);
        assert_eq!(LogicOperation::LeftShift.apply(1, 32), 0);
        assert_eq!(LogicOperation::RightShift.apply(u32::MAX, 40), 0);
        assert_eq!(LogicOperation::Not.apply(0, 123), u32::MAX);
    }

    #[test]
    fn test_invalid_operations() {
        assert!(ArithmeticOperation::from_u8(3, Opcode::ArithOp).is_err());
        assert!(LogicOperation::from_u8(6, Opcode::LogicOp).is_err());
        assert!(RandomNumberGenerator::from_u8(1, Opcode::DeclareRng).is_err());
    }
}
