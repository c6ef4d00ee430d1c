//! # Data Specification Disassembler
//!
//! Turn an encoded data specification back into text, one line per command,
//! using the notation of the generator's report. Decoding stops after
//! END_SPEC.
//!
//! ## Example
//!
//! ```rust
//! use dataspec_disassembler::listing;
//! use dataspec_generator::{Generator, GeneratorConfig, RegionOptions};
//!
//! let mut generator = Generator::new(Vec::new(), GeneratorConfig::default());
//! generator.reserve_memory_region(1, 64, RegionOptions::default()).unwrap();
//! generator.end_specification(true).unwrap();
//! let (spec, _) = generator.into_writers();
//!
//! let text = listing(&spec).unwrap();
//! assert_eq!(text, "00000000. RESERVE memRegion=1 size=64\n00000008. END_SPEC\n");
//! ```

pub mod decoder;
pub mod disassembler;
pub mod formatter;

pub use decoder::{decode, Instruction};
pub use disassembler::{decode_all, disassemble, listing, Line};
pub use formatter::format;
