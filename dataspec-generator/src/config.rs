//! # Generator Configuration
//!
//! The only bound the generator enforces from outside the specification is
//! the largest region it will agree to reserve.

use dataspec_isa::DEFAULT_SDRAM_BYTES;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeneratorConfig {
    /// Largest size, in bytes, accepted by RESERVE
    pub max_region_size: u32,
}

impl GeneratorConfig {
    /// Default configuration: the SDRAM of one core
    pub const DEFAULT: Self = Self {
        max_region_size: DEFAULT_SDRAM_BYTES,
    };

    /// Create a new configuration with validation
    pub const fn new(max_region_size: u32) -> Result<Self, ConfigError> {
        if max_region_size == 0 {
            return Err(ConfigError::ZeroRegionSize);
        }
        if max_region_size % 4 != 0 {
            return Err(ConfigError::UnalignedRegionSize(max_region_size));
        }
        Ok(Self { max_region_size })
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for GeneratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GeneratorConfig(max_region_size={})", self.max_region_size)
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("maximum region size must be positive")]
    ZeroRegionSize,

    #[error("maximum region size {0} is not a whole number of words")]
    UnalignedRegionSize(u32),
}
