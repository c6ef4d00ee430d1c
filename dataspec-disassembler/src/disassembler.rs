//! Main disassembler logic

use crate::decoder::{decode, Instruction};
use crate::formatter::format;
use dataspec_isa::{Opcode, Result, SpecReader};
use std::fmt;

const INDENT: &str = "   ";

/// One disassembled command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Byte offset of the command word
    pub offset: usize,
    /// Block nesting level
    pub depth: usize,
    pub text: String,
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}. {}{}", self.offset, INDENT.repeat(self.depth), self.text)
    }
}

/// Decode every command up to and including END_SPEC
///
/// Bytes after END_SPEC are ignored. A stream that ends without END_SPEC
/// gives the lines decoded so far.
pub fn decode_all(spec: &[u8]) -> Result<Vec<Instruction>> {
    let mut reader = SpecReader::new(spec);
    let mut instructions = Vec::new();
    while !reader.is_at_end() {
        let instr = decode(&mut reader)?;
        let done = instr.opcode == Opcode::EndSpec;
        instructions.push(instr);
        if done {
            break;
        }
    }
    Ok(instructions)
}

/// Disassemble a stream into `(offset, text)` lines
pub fn disassemble(spec: &[u8]) -> Result<Vec<Line>> {
    let mut depth = 0usize;
    let lines = decode_all(spec)?
        .iter()
        .map(|instr| {
            let line_depth = match instr.opcode {
                Opcode::EndLoop | Opcode::EndIf | Opcode::EndStruct | Opcode::EndConstructor => {
                    depth = depth.saturating_sub(1);
                    depth
                }
                Opcode::Else => depth.saturating_sub(1),
                Opcode::Loop | Opcode::If | Opcode::StartStruct | Opcode::StartConstructor => {
                    depth += 1;
                    depth - 1
                }
                _ => depth,
            };
            Line {
                offset: instr.offset,
                depth: line_depth,
                text: format(instr),
            }
        })
        .collect();
    Ok(lines)
}

/// Disassemble into a listing, one line per command
pub fn listing(spec: &[u8]) -> Result<String> {
    let mut output = String::new();
    for line in disassemble(spec)? {
        output.push_str(&line.to_string());
        output.push('\n');
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataspec_isa::CommandWord;

    fn words(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn test_disassemble_simple() {
        let spec = words(&[
            CommandWord::new(Opcode::Nop, 1).raw(),
            CommandWord::new(Opcode::EndSpec, 2).raw(),
            u32::MAX,
        ]);
        let lines = disassemble(&spec).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].offset, 4);
        assert_eq!(lines[1].to_string(), "00000004. END_SPEC");
    }

    #[test]
    fn test_stops_after_end_spec() {
        let mut spec = words(&[CommandWord::new(Opcode::EndSpec, 2).raw(), u32::MAX]);
        spec.extend_from_slice(&[0xFF; 3]);
        assert_eq!(disassemble(&spec).unwrap().len(), 1);
    }

    #[test]
    fn test_block_indentation() {
        let spec = words(&[
            CommandWord::new(Opcode::If, 1).with_src1(0).with_field(0, 0xF, 6).raw(),
            CommandWord::new(Opcode::Nop, 1).raw(),
            CommandWord::new(Opcode::Else, 1).raw(),
            CommandWord::new(Opcode::Nop, 1).raw(),
            CommandWord::new(Opcode::EndIf, 1).raw(),
        ]);
        let depths: Vec<usize> = disassemble(&spec).unwrap().iter().map(|l| l.depth).collect();
        assert_eq!(depths, vec![0, 1, 0, 1, 0]);
        assert_eq!(listing(&spec).unwrap().lines().nth(1), Some("00000004.    NOP"));
    }
}
