//! Memory regions

use dataspec_isa::{DataSpecError, Opcode, Result};
use serde::{Deserialize, Serialize};

/// One reserved region of the output image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    size: u32,
    unfilled: bool,
    shrink: bool,
    /// Empty for unfilled regions
    buffer: Vec<u8>,
    write_pointer: u32,
    max_write_pointer: u32,
}

/// Snapshot of a region's bookkeeping, without its data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionState {
    pub size: u32,
    pub unfilled: bool,
    pub write_pointer: u32,
    pub max_write_pointer: u32,
}

impl MemoryRegion {
    pub fn new(size: u32, unfilled: bool, shrink: bool) -> Self {
        let buffer = if unfilled {
            Vec::new()
        } else {
            vec![0; size as usize]
        };
        MemoryRegion {
            size,
            unfilled,
            shrink,
            buffer,
            write_pointer: 0,
            max_write_pointer: 0,
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn is_unfilled(&self) -> bool {
        self.unfilled
    }

    pub fn shrink(&self) -> bool {
        self.shrink
    }

    pub fn write_pointer(&self) -> u32 {
        self.write_pointer
    }

    pub fn max_write_pointer(&self) -> u32 {
        self.max_write_pointer
    }

    /// Bytes left between the write pointer and the end of the region
    pub fn remaining(&self) -> u32 {
        self.size - self.write_pointer
    }

    /// Region contents; empty for unfilled regions
    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    pub fn state(&self) -> RegionState {
        RegionState {
            size: self.size,
            unfilled: self.unfilled,
            write_pointer: self.write_pointer,
            max_write_pointer: self.max_write_pointer,
        }
    }

    /// Copy `bytes` in at the write pointer and advance it
    pub fn write(&mut self, bytes: &[u8], region: u8, command: Opcode) -> Result<()> {
        if self.unfilled {
            return Err(DataSpecError::RegionUnfilled {
                region: region as u32,
                command,
            });
        }
        if bytes.len() as u64 > self.remaining() as u64 {
            return Err(DataSpecError::NoMore {
                space_available: self.remaining(),
                space_required: u32::try_from(bytes.len()).unwrap_or(u32::MAX),
            });
        }
        let start = self.write_pointer as usize;
        self.buffer[start..start + bytes.len()].copy_from_slice(bytes);
        self.move_to(self.write_pointer + bytes.len() as u32);
        Ok(())
    }

    /// Place the write pointer at `offset`, which must lie within `0..=size`
    pub fn seek(&mut self, offset: i64, region: u8, command: Opcode) -> Result<()> {
        if offset < 0 || offset > self.size as i64 {
            return Err(DataSpecError::RegionOutOfBounds {
                region: region as u32,
                size: self.size,
                offset,
                command,
            });
        }
        self.move_to(offset as u32);
        Ok(())
    }

    fn move_to(&mut self, offset: u32) {
        self.write_pointer = offset;
        self.max_write_pointer = self.max_write_pointer.max(offset);
    }
}
