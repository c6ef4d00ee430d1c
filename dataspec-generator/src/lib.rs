//! Data Specification Generator
//!
//! Build a data specification stream through a validated API. Every call is
//! checked against the generator's slot state before any byte is written.
//!
//! ## Example
//!
//! ```rust
//! use dataspec_generator::{DataType, Generator, GeneratorConfig, RegionOptions};
//!
//! let mut generator = Generator::new(Vec::new(), GeneratorConfig::default());
//! generator.reserve_memory_region(0, 16, RegionOptions::default()).unwrap();
//! generator.switch_write_focus(0u8.into()).unwrap();
//! generator.write_value(42u32, DataType::Uint32).unwrap();
//! generator.end_specification(true).unwrap();
//!
//! let (spec, _) = generator.into_writers();
//! assert_eq!(spec.len(), 28);
//! ```

pub mod config;
pub mod encoder;
pub mod generator;
pub mod operand;

pub use config::{ConfigError, GeneratorConfig};
pub use generator::Generator;
pub use operand::{Operand, ParameterTarget, RegionOptions, StructElement};

pub use dataspec_isa::{
    ArithmeticOperation, Condition, DataSpecError, DataType, LogicOperation,
    RandomNumberGenerator, Result, Value,
};
