//! Command decoder

use dataspec_isa::{
    round_up_to_word, CommandWord, DataSpecError, Opcode, Result, SpecReader, BYTES_PER_WORD,
};

/// One command together with its operand words
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Byte offset of the command word
    pub offset: usize,
    pub word: CommandWord,
    pub opcode: Opcode,
    /// Words counted by the length field, after the command word
    pub operands: Vec<u32>,
    /// WRITE_ARRAY element bytes, without padding
    pub payload: Vec<u8>,
}

impl Instruction {
    /// Bytes the command occupies in the stream, padding included
    pub fn encoded_len(&self) -> usize {
        (1 + self.operands.len()) * BYTES_PER_WORD
            + round_up_to_word(self.payload.len() as u32) as usize
    }
}

/// Decode the command at the reader's position and step past it
pub fn decode(reader: &mut SpecReader<'_>) -> Result<Instruction> {
    let command = reader.read_command()?;
    let operands = (1..command.word.length())
        .map(|_| reader.read_word())
        .collect::<Result<Vec<_>>>()?;

    let payload = match (command.opcode, operands.first()) {
        (Opcode::WriteArray, Some(&count)) => {
            let bytes = u32::try_from(count as u64 * command.word.nibble() as u64).map_err(|_| {
                DataSpecError::syntax(Opcode::WriteArray, "payload larger than 4 GiB")
            })?;
            let padded = reader.read_bytes(round_up_to_word(bytes) as usize)?;
            padded[..bytes as usize].to_vec()
        }
        _ => Vec::new(),
    };

    Ok(Instruction {
        offset: command.offset,
        word: command.word,
        opcode: command.opcode,
        operands,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn test_decode_with_operands() {
        let bytes = words(&[CommandWord::new(Opcode::Reserve, 2).raw(), 100]);
        let mut reader = SpecReader::new(&bytes);
        let instr = decode(&mut reader).unwrap();
        assert_eq!(instr.opcode, Opcode::Reserve);
        assert_eq!(instr.operands, vec![100]);
        assert_eq!(instr.encoded_len(), 8);
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_decode_write_array_payload() {
        let mut bytes = words(&[CommandWord::new(Opcode::WriteArray, 2).with_field(0, 0xF, 2).raw(), 3]);
        bytes.extend_from_slice(&[1, 0, 2, 0, 3, 0, 0, 0]);
        let mut reader = SpecReader::new(&bytes);
        let instr = decode(&mut reader).unwrap();
        assert_eq!(instr.payload, vec![1, 0, 2, 0, 3, 0]);
        assert_eq!(instr.encoded_len(), 16);
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_decode_truncated() {
        let bytes = words(&[CommandWord::new(Opcode::Reserve, 2).raw()]);
        let mut reader = SpecReader::new(&bytes);
        assert!(matches!(decode(&mut reader), Err(DataSpecError::DataRead(_))));
    }

    #[test]
    fn test_decode_unknown_opcode() {
        let bytes = words(&[0x0990_0000]);
        let mut reader = SpecReader::new(&bytes);
        assert!(matches!(
            decode(&mut reader),
            Err(DataSpecError::SyntaxError { .. })
        ));
    }
}
