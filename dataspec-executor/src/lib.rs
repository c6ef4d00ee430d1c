//! # Data Specification Executor
//!
//! Runs a data specification stream and produces the memory image it
//! describes.
//!
//! The executor holds 16 registers, 16 memory regions with their own write
//! pointers, and the structure, RNG, distribution and function tables. It
//! stops at END_SPEC and lays out the header, the pointer table and the
//! region data.
//!
//! ## Example
//!
//! ```rust
//! use dataspec_executor::{Executor, ExecutorConfig};
//! use dataspec_generator::{DataType, Generator, GeneratorConfig, Operand, RegionOptions};
//!
//! let mut generator = Generator::new(Vec::new(), GeneratorConfig::default());
//! generator.reserve_memory_region(0, 8, RegionOptions::default()).unwrap();
//! generator.switch_write_focus(Operand::from(0u8)).unwrap();
//! generator.write_value(7u32, DataType::Uint32).unwrap();
//! generator.end_specification(true).unwrap();
//! let (spec, _) = generator.into_writers();
//!
//! let result = Executor::new(&spec, ExecutorConfig::new(400)).run().unwrap();
//! assert_eq!(result.image.len(), 72 + 8);
//! assert_eq!(result.region_data(0).unwrap()[..4], [7, 0, 0, 0]);
//! ```

pub mod execute;
pub mod image;
pub mod memory;
pub mod rng;
pub mod state;
pub mod vm;

pub use execute::Flow;
pub use image::build_image;
pub use memory::{MemoryRegion, RegionState};
pub use state::ExecutorState;
pub use vm::{ExecutionResult, Executor, ExecutorConfig, TraceEntry};

use dataspec_isa::{DataSpecError, Result};
use std::io::Read;

/// Simple execution helper
///
/// Runs a specification with the default configuration and returns the image.
pub fn run(spec: &[u8]) -> Result<Vec<u8>> {
    Ok(Executor::new(spec, ExecutorConfig::default()).run()?.image)
}

/// Read a whole specification from `reader` and run it
pub fn run_from_reader<R: Read>(mut reader: R, config: ExecutorConfig) -> Result<ExecutionResult> {
    let mut spec = Vec::new();
    reader
        .read_to_end(&mut spec)
        .map_err(DataSpecError::DataRead)?;
    Executor::new(&spec, config).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataspec_isa::{CommandWord, Opcode};
    use std::io;

    fn words(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn test_run_helper() {
        let spec = words(&[CommandWord::new(Opcode::EndSpec, 2).raw(), u32::MAX]);
        assert_eq!(run(&spec).unwrap().len(), 72);
    }

    #[test]
    fn test_run_from_reader() {
        let spec = words(&[
            CommandWord::new(Opcode::Reserve, 2).raw(),
            4,
            CommandWord::new(Opcode::EndSpec, 2).raw(),
            u32::MAX,
        ]);
        let result = run_from_reader(io::Cursor::new(spec), ExecutorConfig::new(400)).unwrap();
        assert_eq!(result.image.len(), 76);
        assert_eq!(result.regions[0].map(|r| r.size), Some(4));
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn test_read_failure_is_io() {
        let err = run_from_reader(FailingReader, ExecutorConfig::default()).unwrap_err();
        assert!(err.is_io());
    }
}
