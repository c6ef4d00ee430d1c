//! Command encoding
//!
//! Every generator call is turned into one or more [`Emission`]s: the exact
//! bytes for the spec stream and the line for the optional report. The
//! length field is filled in from the operand words, so a command can never
//! disagree with what follows it.

use dataspec_isa::{round_up_to_word, CommandWord, BYTES_PER_WORD};

/// Effect of a command on report indentation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Indent {
    Keep,
    /// Line printed at the current depth, later lines one deeper
    Open,
    /// Line printed one level shallower
    Close,
    /// Line printed one level shallower, later lines back at the current depth
    Reopen,
}

#[derive(Clone, Debug)]
pub struct Emission {
    word: CommandWord,
    operands: Vec<u8>,
    payload: Vec<u8>,
    text: String,
    indent: Indent,
}

impl Emission {
    pub fn command(word: CommandWord, text: impl Into<String>) -> Self {
        Self {
            word,
            operands: Vec::new(),
            payload: Vec::new(),
            text: text.into(),
            indent: Indent::Keep,
        }
    }

    /// Append one operand word
    pub fn word(mut self, word: u32) -> Self {
        self.operands.extend_from_slice(&word.to_le_bytes());
        self
    }

    /// Append a value of one or two words
    pub fn value_bits(mut self, bits: u64, wide: bool) -> Self {
        if wide {
            self.operands.extend_from_slice(&bits.to_le_bytes());
        } else {
            self.operands.extend_from_slice(&(bits as u32).to_le_bytes());
        }
        self
    }

    /// Append bytes as operand words, zero-padded to a word boundary
    pub fn padded_operand(mut self, bytes: &[u8]) -> Self {
        self.operands.extend_from_slice(bytes);
        let padded = round_up_to_word(self.operands.len() as u32) as usize;
        self.operands.resize(padded, 0);
        self
    }

    /// Append a payload that follows the command but is not counted in its length
    pub fn payload(mut self, bytes: Vec<u8>) -> Self {
        self.payload = bytes;
        self
    }

    pub fn indent(mut self, indent: Indent) -> Self {
        self.indent = indent;
        self
    }

    /// Length field value: the command word plus its operand words
    pub fn length(&self) -> u32 {
        1 + (self.operands.len() / BYTES_PER_WORD) as u32
    }

    pub fn command_word(&self) -> CommandWord {
        self.word.with_length(self.length())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn indent_change(&self) -> Indent {
        self.indent
    }

    /// Bytes for the spec stream
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(BYTES_PER_WORD + self.operands.len() + self.payload.len());
        bytes.extend_from_slice(&self.command_word().to_le_bytes());
        bytes.extend_from_slice(&self.operands);
        bytes.extend_from_slice(&self.payload);
        bytes
    }
}

/// Report line for a command at byte offset `counter`
pub fn report_line(counter: u32, depth: usize, text: &str) -> String {
    format!("{counter:08X}. {}{text}", "   ".repeat(depth))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataspec_isa::Opcode;

    #[test]
    fn test_length_follows_operands() {
        let emission = Emission::command(CommandWord::new(Opcode::Loop, 1).with_field(0, 0xF, 2), "LOOP")
            .word(0)
            .word(10)
            .word(1);
        assert_eq!(emission.length(), 4);
        assert_eq!(emission.command_word().length(), 4);
        assert_eq!(emission.to_bytes().len(), 16);
    }

    #[test]
    fn test_payload_not_counted() {
        let emission = Emission::command(CommandWord::new(Opcode::WriteArray, 1), "WRITE_ARRAY")
            .word(3)
            .payload(vec![0; 12]);
        assert_eq!(emission.length(), 2);
        assert_eq!(emission.to_bytes().len(), 20);
    }

    #[test]
    fn test_padded_operand() {
        let emission = Emission::command(CommandWord::new(Opcode::PrintTxt, 1), "PRINT_TXT")
            .padded_operand(b"hello");
        assert_eq!(emission.length(), 3);
        assert_eq!(&emission.to_bytes()[4..], b"hello\0\0\0");
    }

    #[test]
    fn test_wide_value() {
        let emission = Emission::command(CommandWord::new(Opcode::Write, 1), "WRITE")
            .value_bits(0x7D, true);
        assert_eq!(emission.length(), 3);
    }

    #[test]
    fn test_report_line() {
        assert_eq!(report_line(0x1C, 2, "NOP"), "0000001C.       NOP");
        assert_eq!(report_line(0, 0, "END_SPEC"), "00000000. END_SPEC");
    }
}
