//! # Data Specification Opcodes
//!
//! Opcodes occupy bits 27-20 of the command word. They are grouped by family:
//! - 0x00-0x07: Housekeeping and allocation (BREAK, NOP, RESERVE, FREE, RNG)
//! - 0x10-0x12: Structure definition
//! - 0x20-0x40: Functions (START_CONSTRUCTOR, END_CONSTRUCTOR, CONSTRUCT)
//! - 0x41-0x43: Region writes
//! - 0x50-0x57: Control flow (focus, loops, conditionals)
//! - 0x60-0x68: Registers, write pointer, arithmetic and logic
//! - 0x70-0x72: Structure and parameter copies
//! - 0x80-0x82: Print
//! - 0xFF: END_SPEC

use serde::{Deserialize, Serialize};
use std::fmt;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    // ========== Housekeeping (0x00-0x07) ==========
    /// Halt the executor with an error
    Break = 0x00,
    Nop = 0x01,
    /// Reserve a memory region
    Reserve = 0x02,
    /// Release a memory region
    Free = 0x03,
    DeclareRng = 0x05,
    DeclareRandomDist = 0x06,
    /// dest = draw from a random distribution
    GetRandomNumber = 0x07,

    // ========== Structures (0x10-0x12) ==========
    StartStruct = 0x10,
    StructElem = 0x11,
    EndStruct = 0x12,

    // ========== Functions (0x20-0x40) ==========
    StartConstructor = 0x20,
    EndConstructor = 0x25,
    Construct = 0x40,

    // ========== Writes (0x41-0x43) ==========
    Write = 0x41,
    WriteArray = 0x42,
    WriteStruct = 0x43,

    // ========== Control flow (0x50-0x57) ==========
    SwitchFocus = 0x50,
    Loop = 0x51,
    BreakLoop = 0x52,
    EndLoop = 0x53,
    If = 0x55,
    Else = 0x56,
    EndIf = 0x57,

    // ========== Registers (0x60-0x68) ==========
    Mv = 0x60,
    GetWrPtr = 0x63,
    SetWrPtr = 0x64,
    AlignWrPtr = 0x65,
    ArithOp = 0x67,
    LogicOp = 0x68,

    // ========== Copies (0x70-0x72) ==========
    CopyStruct = 0x70,
    CopyParam = 0x71,
    WriteParam = 0x72,

    // ========== Print (0x80-0x82) ==========
    PrintVal = 0x80,
    PrintTxt = 0x81,
    PrintStruct = 0x82,

    /// End of the specification; carries a -1 trailer
    EndSpec = 0xFF,
}

impl Opcode {
    /// Try to convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Opcode::Break),
            0x01 => Some(Opcode::Nop),
            0x02 => Some(Opcode::Reserve),
            0x03 => Some(Opcode::Free),
            0x05 => Some(Opcode::DeclareRng),
            0x06 => Some(Opcode::DeclareRandomDist),
            0x07 => Some(Opcode::GetRandomNumber),

            0x10 => Some(Opcode::StartStruct),
            0x11 => Some(Opcode::StructElem),
            0x12 => Some(Opcode::EndStruct),

            0x20 => Some(Opcode::StartConstructor),
            0x25 => Some(Opcode::EndConstructor),
            0x40 => Some(Opcode::Construct),

            0x41 => Some(Opcode::Write),
            0x42 => Some(Opcode::WriteArray),
            0x43 => Some(Opcode::WriteStruct),

            0x50 => Some(Opcode::SwitchFocus),
            0x51 => Some(Opcode::Loop),
            0x52 => Some(Opcode::BreakLoop),
            0x53 => Some(Opcode::EndLoop),
            0x55 => Some(Opcode::If),
            0x56 => Some(Opcode::Else),
            0x57 => Some(Opcode::EndIf),

            0x60 => Some(Opcode::Mv),
            0x63 => Some(Opcode::GetWrPtr),
            0x64 => Some(Opcode::SetWrPtr),
            0x65 => Some(Opcode::AlignWrPtr),
            0x67 => Some(Opcode::ArithOp),
            0x68 => Some(Opcode::LogicOp),

            0x70 => Some(Opcode::CopyStruct),
            0x71 => Some(Opcode::CopyParam),
            0x72 => Some(Opcode::WriteParam),

            0x80 => Some(Opcode::PrintVal),
            0x81 => Some(Opcode::PrintTxt),
            0x82 => Some(Opcode::PrintStruct),

            0xFF => Some(Opcode::EndSpec),

            _ => None,
        }
    }

    /// Convert to u8
    #[inline]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Name as it appears in reports and error messages
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Break => "BREAK",
            Opcode::Nop => "NOP",
            Opcode::Reserve => "RESERVE",
            Opcode::Free => "FREE",
            Opcode::DeclareRng => "DECLARE_RNG",
            Opcode::DeclareRandomDist => "DECLARE_RANDOM_DIST",
            Opcode::GetRandomNumber => "GET_RANDOM_NUMBER",
            Opcode::StartStruct => "START_STRUCT",
            Opcode::StructElem => "STRUCT_ELEM",
            Opcode::EndStruct => "END_STRUCT",
            Opcode::StartConstructor => "START_CONSTRUCTOR",
            Opcode::EndConstructor => "END_CONSTRUCTOR",
            Opcode::Construct => "CONSTRUCT",
            Opcode::Write => "WRITE",
            Opcode::WriteArray => "WRITE_ARRAY",
            Opcode::WriteStruct => "WRITE_STRUCT",
            Opcode::SwitchFocus => "SWITCH_FOCUS",
            Opcode::Loop => "LOOP",
            Opcode::BreakLoop => "BREAK_LOOP",
            Opcode::EndLoop => "END_LOOP",
            Opcode::If => "IF",
            Opcode::Else => "ELSE",
            Opcode::EndIf => "END_IF",
            Opcode::Mv => "MV",
            Opcode::GetWrPtr => "GET_WR_PTR",
            Opcode::SetWrPtr => "SET_WR_PTR",
            Opcode::AlignWrPtr => "ALIGN_WR_PTR",
            Opcode::ArithOp => "ARITH_OP",
            Opcode::LogicOp => "LOGIC_OP",
            Opcode::CopyStruct => "COPY_STRUCT",
            Opcode::CopyParam => "COPY_PARAM",
            Opcode::WriteParam => "WRITE_PARAM",
            Opcode::PrintVal => "PRINT_VAL",
            Opcode::PrintTxt => "PRINT_TXT",
            Opcode::PrintStruct => "PRINT_STRUCT",
            Opcode::EndSpec => "END_SPEC",
        }
    }

    /// Smallest and largest legal value of the length field, in words
    ///
    /// The exact length of a given command also depends on its
    /// register-use flags; handlers check that on top of this range.
    pub const fn length_range(self) -> (u32, u32) {
        match self {
            Opcode::Reserve
            | Opcode::DeclareRng
            | Opcode::WriteArray
            | Opcode::CopyParam
            | Opcode::EndSpec => (2, 2),
            Opcode::StructElem
            | Opcode::Write
            | Opcode::ArithOp
            | Opcode::LogicOp
            | Opcode::WriteParam
            | Opcode::PrintVal => (1, 3),
            Opcode::Construct | Opcode::If | Opcode::Mv | Opcode::SetWrPtr => (1, 2),
            Opcode::Loop => (1, 4),
            Opcode::PrintTxt => (2, 4),
            _ => (1, 1),
        }
    }

    /// Check if this opcode writes into the focused region
    #[inline]
    pub const fn is_write(self) -> bool {
        matches!(self, Opcode::Write | Opcode::WriteArray | Opcode::WriteStruct)
    }

    /// Check if this opcode opens or closes a block
    #[inline]
    pub const fn is_control_flow(self) -> bool {
        matches!(
            self,
            Opcode::Loop
                | Opcode::BreakLoop
                | Opcode::EndLoop
                | Opcode::If
                | Opcode::Else
                | Opcode::EndIf
                | Opcode::StartConstructor
                | Opcode::EndConstructor
                | Opcode::Construct
        )
    }

    /// Check if this opcode only produces diagnostic output
    #[inline]
    pub const fn is_print(self) -> bool {
        matches!(self, Opcode::PrintVal | Opcode::PrintTxt | Opcode::PrintStruct)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for value in 0..=255u8 {
            if let Some(opcode) = Opcode::from_u8(value) {
                assert_eq!(opcode.to_u8(), value);
            }
        }
    }

    #[test]
    fn test_unassigned_opcodes() {
        assert_eq!(Opcode::from_u8(0x04), None);
        assert_eq!(Opcode::from_u8(0x44), None);
        assert_eq!(Opcode::from_u8(0xFE), None);
    }

    #[test]
    fn test_table_values() {
        assert_eq!(Opcode::Reserve.to_u8(), 0x02);
        assert_eq!(Opcode::WriteArray.to_u8(), 0x42);
        assert_eq!(Opcode::ArithOp.to_u8(), 0x67);
        assert_eq!(Opcode::EndSpec.to_u8(), 0xFF);
    }

    #[test]
    fn test_length_ranges() {
        assert_eq!(Opcode::EndSpec.length_range(), (2, 2));
        assert_eq!(Opcode::Loop.length_range(), (1, 4));
        assert_eq!(Opcode::PrintTxt.length_range(), (2, 4));
        assert_eq!(Opcode::Nop.length_range(), (1, 1));
    }

    #[test]
    fn test_families() {
        assert!(Opcode::WriteStruct.is_write());
        assert!(!Opcode::WriteParam.is_write());
        assert!(Opcode::Else.is_control_flow());
        assert!(Opcode::PrintTxt.is_print());
    }

    #[test]
    fn test_display() {
        assert_eq!(Opcode::GetRandomNumber.to_string(), "GET_RANDOM_NUMBER");
        assert_eq!(format!("{}", Opcode::Mv), "MV");
    }
}
