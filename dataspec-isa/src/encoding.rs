//! # Command Word Encoding
//!
//! Constants and helpers for packing and unpacking the 32-bit command word.
//!
//! ```text
//! bits 31-30  length - 1 (1..4 words)
//! bits 29-28  reserved, zero
//! bits 27-20  opcode
//! bit  19     signed flag (ARITH_OP)
//! bits 18-16  register use: dest, src1, src2
//! bits 15-12  dest register, or data length / structure id
//! bits 11-8   src1 register, or region / repeat count
//! bits 7-4    src2 register
//! bits 3-0    opcode-specific immediate
//! ```

use crate::error::{DataSpecError, Result};
use crate::Opcode;
use std::fmt;

// ============================================================================
// Bit Position Constants
// ============================================================================

/// Length field: bits 30-31 (words - 1)
pub const LENGTH_SHIFT: u32 = 30;

/// Opcode field: bits 20-27
pub const OPCODE_SHIFT: u32 = 20;

/// ARITH_OP signed flag: bit 19
pub const SIGNED_SHIFT: u32 = 19;

/// Register-use nibble: bits 16-18
pub const USAGE_SHIFT: u32 = 16;

/// Destination register field: bits 12-15
pub const DEST_SHIFT: u32 = 12;

/// Source register 1 field: bits 8-11
pub const SRC1_SHIFT: u32 = 8;

/// Source register 2 field: bits 4-7
pub const SRC2_SHIFT: u32 = 4;

/// Data length field (log2 of bytes): bits 12-13
pub const DATA_LEN_SHIFT: u32 = 12;

/// RESERVE unfilled flag: bit 7
pub const UNFILLED_SHIFT: u32 = 7;

/// RESERVE shrink flag: bit 6
pub const SHRINK_SHIFT: u32 = 6;

/// SET_WR_PTR relative flag: bit 0
pub const RELATIVE_SHIFT: u32 = 0;

/// START_CONSTRUCTOR function id: bits 11-15
pub const CONSTRUCTOR_ID_SHIFT: u32 = 11;

/// CONSTRUCT function id: bits 8-12
pub const CONSTRUCT_ID_SHIFT: u32 = 8;

/// START_CONSTRUCTOR argument count: bits 8-10
pub const ARG_COUNT_SHIFT: u32 = 8;

/// Bits per argument in the CONSTRUCT parameter word
pub const ARG_ID_BITS: u32 = 6;

/// COPY_PARAM destination element: bits 8-15 of the second word
pub const PARAM_DEST_SHIFT: u32 = 8;

// ============================================================================
// Field Masks
// ============================================================================

pub const LENGTH_MASK: u32 = 0x3;
pub const OPCODE_MASK: u32 = 0xFF;
pub const USAGE_MASK: u32 = 0x7;
pub const REGISTER_MASK: u32 = 0xF;
pub const NIBBLE_MASK: u32 = 0xF;
pub const BYTE_MASK: u32 = 0xFF;
pub const DATA_LEN_MASK: u32 = 0x3;
pub const FUNCTION_ID_MASK: u32 = 0x1F;
pub const ARG_COUNT_MASK: u32 = 0x7;
pub const READ_ONLY_MASK: u32 = 0x1F;
pub const ALIGN_MASK: u32 = 0x1F;
pub const ARG_ID_MASK: u32 = 0x3F;

// ============================================================================
// Register-Use Nibble
// ============================================================================

pub const NO_REGS: u32 = 0x0;
pub const SRC2_ONLY: u32 = 0x1;
pub const SRC1_ONLY: u32 = 0x2;
pub const SRC1_AND_SRC2: u32 = 0x3;
pub const DEST_ONLY: u32 = 0x4;
pub const DEST_AND_SRC2: u32 = 0x5;
pub const DEST_AND_SRC1: u32 = 0x6;
pub const ALL_REGS: u32 = 0x7;

const USE_DEST: u32 = DEST_ONLY << USAGE_SHIFT;
const USE_SRC1: u32 = SRC1_ONLY << USAGE_SHIFT;
const USE_SRC2: u32 = SRC2_ONLY << USAGE_SHIFT;

// ============================================================================
// Field Extraction Functions
// ============================================================================

/// Extract the length in words (1-4)
#[inline]
pub const fn extract_length(word: u32) -> u32 {
    ((word >> LENGTH_SHIFT) & LENGTH_MASK) + 1
}

/// Extract the raw opcode byte
#[inline]
pub const fn extract_opcode(word: u32) -> u8 {
    ((word >> OPCODE_SHIFT) & OPCODE_MASK) as u8
}

/// Extract the register-use nibble
#[inline]
pub const fn extract_usage(word: u32) -> u32 {
    (word >> USAGE_SHIFT) & USAGE_MASK
}

#[inline]
pub const fn extract_dest(word: u32) -> u8 {
    ((word >> DEST_SHIFT) & REGISTER_MASK) as u8
}

#[inline]
pub const fn extract_src1(word: u32) -> u8 {
    ((word >> SRC1_SHIFT) & REGISTER_MASK) as u8
}

#[inline]
pub const fn extract_src2(word: u32) -> u8 {
    ((word >> SRC2_SHIFT) & REGISTER_MASK) as u8
}

/// Extract bits 3-0
#[inline]
pub const fn extract_nibble(word: u32) -> u8 {
    (word & NIBBLE_MASK) as u8
}

/// Extract bits 7-0
#[inline]
pub const fn extract_low_byte(word: u32) -> u8 {
    (word & BYTE_MASK) as u8
}

/// Extract the data length in bytes from bits 13-12
#[inline]
pub const fn extract_data_len(word: u32) -> u32 {
    1 << ((word >> DATA_LEN_SHIFT) & DATA_LEN_MASK)
}

// ============================================================================
// Command Word
// ============================================================================

/// A 32-bit command word
///
/// Built up with the `with_*` methods by the generator and taken apart with
/// the accessors by the executor and disassembler.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandWord(u32);

impl CommandWord {
    /// Start a command word for `opcode` occupying `length` words (1-4)
    #[inline]
    pub const fn new(opcode: Opcode, length: u32) -> Self {
        Self(
            (((length - 1) & LENGTH_MASK) << LENGTH_SHIFT)
                | ((opcode.to_u8() as u32) << OPCODE_SHIFT),
        )
    }

    /// Replace the length field
    #[inline]
    pub const fn with_length(self, length: u32) -> Self {
        Self(
            (self.0 & !(LENGTH_MASK << LENGTH_SHIFT))
                | (((length - 1) & LENGTH_MASK) << LENGTH_SHIFT),
        )
    }

    #[inline]
    pub const fn from_raw(word: u32) -> Self {
        Self(word)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Set the destination register and its use flag
    #[inline]
    pub const fn with_dest(self, register: u8) -> Self {
        Self(self.0 | USE_DEST | (((register as u32) & REGISTER_MASK) << DEST_SHIFT))
    }

    /// Set source register 1 and its use flag
    #[inline]
    pub const fn with_src1(self, register: u8) -> Self {
        Self(self.0 | USE_SRC1 | (((register as u32) & REGISTER_MASK) << SRC1_SHIFT))
    }

    /// Set source register 2 and its use flag
    #[inline]
    pub const fn with_src2(self, register: u8) -> Self {
        Self(self.0 | USE_SRC2 | (((register as u32) & REGISTER_MASK) << SRC2_SHIFT))
    }

    /// OR a masked value into an arbitrary field
    #[inline]
    pub const fn with_field(self, shift: u32, mask: u32, value: u32) -> Self {
        Self(self.0 | ((value & mask) << shift))
    }

    /// Set a single flag bit when `on`
    #[inline]
    pub const fn with_flag(self, shift: u32, on: bool) -> Self {
        if on {
            Self(self.0 | (1 << shift))
        } else {
            self
        }
    }

    /// Set the data length field from a byte count of 1, 2, 4 or 8
    #[inline]
    pub const fn with_data_len(self, bytes: u32) -> Self {
        self.with_field(DATA_LEN_SHIFT, DATA_LEN_MASK, bytes.trailing_zeros())
    }

    #[inline]
    pub const fn length(self) -> u32 {
        extract_length(self.0)
    }

    #[inline]
    pub const fn opcode_byte(self) -> u8 {
        extract_opcode(self.0)
    }

    #[inline]
    pub fn opcode(self) -> Option<Opcode> {
        Opcode::from_u8(self.opcode_byte())
    }

    #[inline]
    pub const fn usage(self) -> u32 {
        extract_usage(self.0)
    }

    #[inline]
    pub const fn uses_dest(self) -> bool {
        self.0 & USE_DEST != 0
    }

    #[inline]
    pub const fn uses_src1(self) -> bool {
        self.0 & USE_SRC1 != 0
    }

    #[inline]
    pub const fn uses_src2(self) -> bool {
        self.0 & USE_SRC2 != 0
    }

    #[inline]
    pub const fn dest(self) -> u8 {
        extract_dest(self.0)
    }

    #[inline]
    pub const fn src1(self) -> u8 {
        extract_src1(self.0)
    }

    #[inline]
    pub const fn src2(self) -> u8 {
        extract_src2(self.0)
    }

    #[inline]
    pub const fn nibble(self) -> u8 {
        extract_nibble(self.0)
    }

    #[inline]
    pub const fn low_byte(self) -> u8 {
        extract_low_byte(self.0)
    }

    #[inline]
    pub const fn data_len(self) -> u32 {
        extract_data_len(self.0)
    }

    #[inline]
    pub const fn field(self, shift: u32, mask: u32) -> u32 {
        (self.0 >> shift) & mask
    }

    #[inline]
    pub const fn flag(self, shift: u32) -> bool {
        (self.0 >> shift) & 1 != 0
    }

    /// Resolve the opcode and check the length field against its legal range
    pub fn decode(self) -> Result<Opcode> {
        let opcode = self.opcode().ok_or_else(|| {
            DataSpecError::syntax(format!("{:#04x}", self.opcode_byte()), "unknown opcode")
        })?;
        let (min, max) = opcode.length_range();
        let length = self.length();
        if length < min || length > max {
            return Err(DataSpecError::syntax(
                opcode,
                format!("length {length} outside {min}..={max}"),
            ));
        }
        Ok(opcode)
    }

    /// Fail unless the length field equals `expected`
    pub fn expect_length(self, opcode: Opcode, expected: u32) -> Result<()> {
        if self.length() != expected {
            return Err(DataSpecError::syntax(
                opcode,
                format!("expected length {expected}, found {}", self.length()),
            ));
        }
        Ok(())
    }

    #[inline]
    pub const fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

impl fmt::Debug for CommandWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandWord({:#010x})", self.0)
    }
}

impl From<CommandWord> for u32 {
    fn from(word: CommandWord) -> u32 {
        word.0
    }
}
