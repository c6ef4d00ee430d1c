//! # Error Types for Data Specifications
//!
//! One closed taxonomy shared by the generator and the executor. Every
//! variant carries enough context to report the failing command without a
//! stack trace.

use crate::data_type::DataType;
use crate::opcode::Opcode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

/// Family of a numbered slot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotKind {
    Region,
    Structure,
    Rng,
    RandomDistribution,
    Function,
    Parameter,
    Register,
}

impl SlotKind {
    /// Name used for the slot id in out-of-bounds reports
    pub const fn id_name(self) -> &'static str {
        match self {
            SlotKind::Region => "memory region",
            SlotKind::Structure => "structure id",
            SlotKind::Rng => "rng id",
            SlotKind::RandomDistribution => "random distribution id",
            SlotKind::Function => "function id",
            SlotKind::Parameter => "parameter index",
            SlotKind::Register => "register id",
        }
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SlotKind::Region => "region",
            SlotKind::Structure => "structure",
            SlotKind::Rng => "rng",
            SlotKind::RandomDistribution => "random distribution",
            SlotKind::Function => "function",
            SlotKind::Parameter => "parameter",
            SlotKind::Register => "register",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum DataSpecError {
    // Collaborator I/O
    #[error("Failed to read data specification: {0}")]
    DataRead(#[source] io::Error),

    #[error("Failed to write data specification: {0}")]
    DataWrite(#[source] io::Error),

    // Decoding
    #[error("Syntax error in command {command}: {reason}")]
    SyntaxError { command: String, reason: String },

    // Validation
    #[error(
        "Requesting value {value} for parameter {param} whose allowed range is from {min} to {max} during command {command}"
    )]
    ParameterOutOfBounds {
        param: &'static str,
        value: String,
        min: String,
        max: String,
        command: Opcode,
    },

    #[error("{kind} {id} was already allocated")]
    SlotInUse { kind: SlotKind, id: u32 },

    #[error("Using unallocated {kind} {id} during command {command}")]
    NotAllocated {
        kind: SlotKind,
        id: u32,
        command: Opcode,
    },

    // Region state
    #[error("No region has been selected for writing during command {command}")]
    NoRegionSelected { command: Opcode },

    #[error("Region {region} is unfilled and cannot be written to during command {command}")]
    RegionUnfilled { region: u32, command: Opcode },

    #[error(
        "Region {region} with size {size} has no room for {allocated} bytes during command {command}"
    )]
    RegionExhausted {
        region: u32,
        size: u32,
        allocated: u64,
        command: Opcode,
    },

    #[error("Space available: {space_available}, space requested: {space_required}")]
    NoMore {
        space_available: u32,
        space_required: u32,
    },

    #[error(
        "Offset {offset} is outside region {region} of size {size} during command {command}"
    )]
    RegionOutOfBounds {
        region: u32,
        size: u32,
        offset: i64,
        command: Opcode,
    },

    // Type table
    #[error("Unknown data type {type_id} during command {command}")]
    UnknownType { type_id: u32, command: Opcode },

    #[error("Unknown data length {size} during command {command}")]
    UnknownTypeLength { size: u32, command: Opcode },

    #[error("Invalid size {size} for data type {data_type} during command {command}")]
    InvalidSize {
        data_type: DataType,
        size: u32,
        command: Opcode,
    },

    #[error("Type mismatch during command {command}")]
    TypeMismatch { command: Opcode },

    // Operations
    #[error("Invalid {kind} operation {value} during command {command}")]
    InvalidOperation {
        kind: &'static str,
        value: u32,
        command: Opcode,
    },

    #[error("Unknown condition {condition} during command {command}")]
    UnknownCondition { condition: u32, command: Opcode },

    #[error("Command {command} is not valid here")]
    InvalidCommand { command: Opcode },

    // Functions
    #[error("Duplicate structure among arguments {args:?} of command {command}")]
    DuplicateParameter { command: Opcode, args: Vec<u8> },

    #[error("Function {function} takes {expected} arguments but {actual} were given")]
    WrongParameterNumber {
        function: u32,
        expected: usize,
        actual: usize,
    },

    // Termination
    #[error("Executing BREAK instruction at offset {pc} of {file}")]
    ExecuteBreak { pc: usize, file: String },

    #[error("Image needs {required} bytes but only {available} are available")]
    TablePointerOutOfMemory { available: u32, required: u32 },

    #[error("The data specification writer has been closed")]
    DataUndefinedWriter,

    #[error("Command {name} is not implemented")]
    UnimplementedCommand { name: &'static str },
}

impl DataSpecError {
    /// Build a `SyntaxError` for the given command
    pub fn syntax(command: impl fmt::Display, reason: impl Into<String>) -> Self {
        DataSpecError::SyntaxError {
            command: command.to_string(),
            reason: reason.into(),
        }
    }

    /// Build a `ParameterOutOfBounds` from displayable bounds
    pub fn out_of_bounds(
        param: &'static str,
        value: impl fmt::Display,
        min: impl fmt::Display,
        max: impl fmt::Display,
        command: Opcode,
    ) -> Self {
        DataSpecError::ParameterOutOfBounds {
            param,
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
            command,
        }
    }

    /// Check if this error came from a byte-stream collaborator rather
    /// than from the specification itself
    pub fn is_io(&self) -> bool {
        matches!(self, DataSpecError::DataRead(_) | DataSpecError::DataWrite(_))
    }
}

pub type Result<T> = std::result::Result<T, DataSpecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DataSpecError::SlotInUse {
            kind: SlotKind::Region,
            id: 3,
        };
        assert_eq!(err.to_string(), "region 3 was already allocated");

        let err = DataSpecError::NoMore {
            space_available: 0,
            space_required: 4,
        };
        assert_eq!(err.to_string(), "Space available: 0, space requested: 4");

        let err = DataSpecError::UnknownTypeLength {
            size: 3,
            command: Opcode::Write,
        };
        assert_eq!(err.to_string(), "Unknown data length 3 during command WRITE");
    }

    #[test]
    fn test_out_of_bounds_display() {
        let err = DataSpecError::out_of_bounds("memory size", 500, 1, 400, Opcode::Reserve);
        assert_eq!(
            err.to_string(),
            "Requesting value 500 for parameter memory size whose allowed range is from 1 to 400 during command RESERVE"
        );
    }

    #[test]
    fn test_syntax_helper() {
        let err = DataSpecError::syntax(Opcode::EndSpec, "trailer must be -1");
        assert!(matches!(
            err,
            DataSpecError::SyntaxError { ref command, .. } if command == "END_SPEC"
        ));
    }

    #[test]
    fn test_is_io() {
        let err = DataSpecError::DataRead(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(err.is_io());
        assert!(!DataSpecError::DataUndefinedWriter.is_io());
    }

    #[test]
    fn test_slot_kind_names() {
        assert_eq!(SlotKind::RandomDistribution.to_string(), "random distribution");
        assert_eq!(SlotKind::Region.id_name(), "memory region");
    }
}
