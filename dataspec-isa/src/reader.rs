//! Random-access reader over an encoded specification
//!
//! The executor needs to jump backwards (END_LOOP) and scan forwards
//! (BREAK_LOOP, IF, START_CONSTRUCTOR), so the whole stream is held in memory
//! and addressed by byte offset.

use crate::encoding::CommandWord;
use crate::error::{DataSpecError, Result};
use crate::{round_up_to_word, Opcode, BYTES_PER_WORD};
use std::io;

/// A command word together with where it was found
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedCommand {
    /// Byte offset of the command word
    pub offset: usize,
    pub word: CommandWord,
    pub opcode: Opcode,
}

#[derive(Clone, Debug)]
pub struct SpecReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> SpecReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    pub fn is_at_end(&self) -> bool {
        self.position >= self.bytes.len()
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.position)
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self
            .position
            .checked_add(count)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| {
                DataSpecError::DataRead(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "{count} bytes requested at offset {} but only {} remain",
                        self.position,
                        self.remaining()
                    ),
                ))
            })?;
        let slice = &self.bytes[self.position..end];
        self.position = end;
        Ok(slice)
    }

    pub fn read_word(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(BYTES_PER_WORD)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_word()? as i32)
    }

    /// Read two words as one little-endian 64-bit value
    pub fn read_u64(&mut self) -> Result<u64> {
        let low = self.read_word()? as u64;
        let high = self.read_word()? as u64;
        Ok(low | (high << 32))
    }

    /// Read an immediate of 4 or 8 bytes, as selected by the command length
    pub fn read_value(&mut self, wide: bool) -> Result<u64> {
        if wide {
            self.read_u64()
        } else {
            Ok(self.read_word()? as u64)
        }
    }

    /// Read and validate the next command word
    pub fn read_command(&mut self) -> Result<DecodedCommand> {
        let offset = self.position;
        let word = CommandWord::from_raw(self.read_word()?);
        let opcode = word.decode()?;
        Ok(DecodedCommand {
            offset,
            word,
            opcode,
        })
    }

    /// Move past the operands of a command whose word has just been read
    pub fn skip_operands(&mut self, command: &DecodedCommand) -> Result<()> {
        let operand_words = command.word.length() as usize - 1;
        if command.opcode == Opcode::WriteArray {
            let count = self.read_word()?;
            let payload = count as u64 * command.word.nibble() as u64;
            let padded = round_up_to_word(u32::try_from(payload).map_err(|_| {
                DataSpecError::syntax(Opcode::WriteArray, "payload larger than 4 GiB")
            })?);
            self.read_bytes(padded as usize)?;
        } else {
            self.read_bytes(operand_words * BYTES_PER_WORD)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn test_read_words() {
        let bytes = words(&[1, 0xFFFF_FFFF, 2, 3]);
        let mut reader = SpecReader::new(&bytes);
        assert_eq!(reader.read_word().unwrap(), 1);
        assert_eq!(reader.read_i32().unwrap(), -1);
        assert_eq!(reader.read_u64().unwrap(), (3u64 << 32) | 2);
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_truncated_stream() {
        let bytes = [0u8; 3];
        let mut reader = SpecReader::new(&bytes);
        assert!(matches!(reader.read_word(), Err(DataSpecError::DataRead(_))));
    }

    #[test]
    fn test_read_command() {
        let bytes = words(&[CommandWord::new(Opcode::EndSpec, 2).raw(), u32::MAX]);
        let mut reader = SpecReader::new(&bytes);
        let command = reader.read_command().unwrap();
        assert_eq!(command.opcode, Opcode::EndSpec);
        assert_eq!(command.offset, 0);
        reader.skip_operands(&command).unwrap();
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_skip_write_array_payload() {
        // three UINT8 elements padded to one word
        let mut bytes = words(&[CommandWord::new(Opcode::WriteArray, 2).with_field(0, 0xF, 1).raw(), 3]);
        bytes.extend_from_slice(&[1, 2, 3, 0]);
        bytes.extend(words(&[CommandWord::new(Opcode::Nop, 1).raw()]));
        let mut reader = SpecReader::new(&bytes);
        let command = reader.read_command().unwrap();
        reader.skip_operands(&command).unwrap();
        assert_eq!(reader.read_command().unwrap().opcode, Opcode::Nop);
    }
}
