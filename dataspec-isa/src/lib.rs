//! # Data Specification Instruction Set
//!
//! Shared vocabulary of the data specification toolchain: the 32-bit command
//! word layout, the closed data type table, the fixed-capacity slot tables and
//! the error taxonomy used by both the generator and the executor.
//!
//! ## Command word
//!
//! ```text
//! 31  30 29 28 27      20 19   16 15  12 11   8 7    4 3    0
//! [len-1][ 0 ][ opcode  ][ usage ][ dest ][ src1 ][ src2 ][ imm ]
//! ```
//!
//! A command occupies one to four little-endian words; `WRITE_ARRAY` is
//! followed by a payload that is not counted in the length field.

pub mod data_type;
pub mod encoding;
pub mod error;
pub mod opcode;
pub mod operation;
pub mod reader;
pub mod slots;

pub use data_type::{DataType, Value};
pub use encoding::CommandWord;
pub use error::{DataSpecError, Result, SlotKind};
pub use opcode::Opcode;
pub use operation::{ArithmeticOperation, Condition, LogicOperation, RandomNumberGenerator};
pub use reader::{DecodedCommand, SpecReader};
pub use slots::SlotTable;

/// Magic number identifying a data specification stream
pub const DSG_MAGIC_NUM: u32 = 0x5B7C_A17E;

/// Magic number at the start of every executed image
pub const APPDATA_MAGIC_NUM: u32 = 0xAD13_0AD6;

/// Image format version written after the magic number
pub const DSE_VERSION: u32 = 0x0001_0000;

pub const MAX_REGISTERS: usize = 16;
pub const MAX_MEM_REGIONS: usize = 16;
pub const MAX_STRUCT_SLOTS: usize = 16;
pub const MAX_STRUCT_ELEMENTS: usize = 255;
pub const MAX_PACKSPEC_SLOTS: usize = 16;
pub const MAX_CONSTRUCTORS: usize = 16;
pub const MAX_PARAM_LISTS: usize = 16;
pub const MAX_RNGS: usize = 16;
pub const MAX_RANDOM_DISTS: usize = 16;

/// Most arguments a function may declare
pub const MAX_FUNCTION_ARGUMENTS: usize = 5;

/// Most bytes of text a single PRINT_TXT can carry
pub const MAX_PRINT_TEXT_BYTES: usize = 12;

pub const BYTES_PER_WORD: usize = 4;

/// Size of magic number plus version
pub const APP_PTR_TABLE_HEADER_BYTE_SIZE: usize = 8;

/// Header plus one pointer per memory region (72 bytes)
pub const APP_PTR_TABLE_BYTE_SIZE: usize =
    APP_PTR_TABLE_HEADER_BYTE_SIZE + MAX_MEM_REGIONS * BYTES_PER_WORD;

/// Trailing word every END_SPEC must carry
pub const END_SPEC_EXECUTOR: i32 = -1;

/// SDRAM available to one core, the default bound on region sizes
pub const DEFAULT_SDRAM_BYTES: u32 = 123_469_792;

/// Round a byte count up to the next whole word
#[inline]
pub const fn round_up_to_word(bytes: u32) -> u32 {
    bytes.saturating_add(3) & !3
}
