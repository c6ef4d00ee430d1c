//! Command formatting, in the same notation as the generator's report

use crate::decoder::Instruction;
use dataspec_isa::encoding::{
    ALIGN_MASK, ARG_COUNT_MASK, ARG_COUNT_SHIFT, ARG_ID_BITS, ARG_ID_MASK, BYTE_MASK,
    CONSTRUCTOR_ID_SHIFT, CONSTRUCT_ID_SHIFT, DEST_SHIFT, FUNCTION_ID_MASK, NIBBLE_MASK,
    PARAM_DEST_SHIFT, READ_ONLY_MASK, RELATIVE_SHIFT, SHRINK_SHIFT, SIGNED_SHIFT, SRC1_SHIFT,
    UNFILLED_SHIFT,
};
use dataspec_isa::{
    ArithmeticOperation, Condition, DataType, LogicOperation, Opcode, RandomNumberGenerator,
};
use std::slice;

/// Operand words in the order the command consumes them
struct Immediates<'a> {
    words: slice::Iter<'a, u32>,
}

impl<'a> Immediates<'a> {
    fn new(instr: &'a Instruction) -> Self {
        Self {
            words: instr.operands.iter(),
        }
    }

    fn word(&mut self) -> String {
        match self.words.next() {
            Some(w) => w.to_string(),
            None => String::from("?"),
        }
    }

    fn signed(&mut self) -> String {
        match self.words.next() {
            Some(&w) => (w as i32).to_string(),
            None => String::from("?"),
        }
    }

    /// Remaining words as one hexadecimal value, low word first
    fn hex(&mut self) -> String {
        let words: Vec<u32> = self.words.by_ref().copied().collect();
        match words.as_slice() {
            [] => String::from("?"),
            [low] => format!("{low:#010x}"),
            [low, high, ..] => format!("{:#018x}", (*high as u64) << 32 | *low as u64),
        }
    }

    /// A register when `uses` is set, otherwise the next word
    fn operand(&mut self, uses: bool, register: u8, signed: bool) -> String {
        if uses {
            format!("reg[{register}]")
        } else if signed {
            self.signed()
        } else {
            self.word()
        }
    }
}

fn register_or(uses: bool, register: u8, literal: u32) -> String {
    if uses {
        format!("reg[{register}]")
    } else {
        literal.to_string()
    }
}

fn data_type_name(id: u8) -> String {
    match DataType::from_u8(id) {
        Some(data_type) => data_type.name().to_string(),
        None => format!("?{id}"),
    }
}

fn condition(instr: &Instruction) -> Option<Condition> {
    Condition::from_u8(instr.word.nibble(), instr.opcode).ok()
}

/// Format an instruction as one line of text
pub fn format(instr: &Instruction) -> String {
    let word = instr.word;
    let mut imm = Immediates::new(instr);

    match instr.opcode {
        // ========== Housekeeping ==========
        Opcode::Break => "BREAK".to_string(),
        Opcode::Nop => "NOP".to_string(),
        Opcode::Reserve => {
            let mut text = format!("RESERVE memRegion={} size={}", word.nibble(), imm.word());
            if word.flag(UNFILLED_SHIFT) {
                text.push_str(" UNFILLED");
            }
            if word.flag(SHRINK_SHIFT) {
                text.push_str(" SHRINK");
            }
            text
        }
        Opcode::Free => format!("FREE memRegion={}", word.nibble()),
        Opcode::DeclareRng => {
            let kind = word.field(SRC1_SHIFT, NIBBLE_MASK) as u8;
            let source = match RandomNumberGenerator::from_u8(kind, instr.opcode) {
                Ok(rng) => rng.name().to_string(),
                Err(_) => format!("?{kind}"),
            };
            format!(
                "DECLARE_RNG id={} source={source} seed={}",
                word.field(DEST_SHIFT, NIBBLE_MASK),
                imm.word()
            )
        }
        Opcode::DeclareRandomDist => format!(
            "DECLARE_RANDOM_DIST distId={} structId={}",
            word.field(SRC1_SHIFT, NIBBLE_MASK),
            word.nibble()
        ),
        Opcode::GetRandomNumber => format!(
            "GET_RANDOM_NUMBER distId={} dest=reg[{}]",
            word.nibble(),
            word.dest()
        ),

        // ========== Structures ==========
        Opcode::StartStruct => format!("START_STRUCT id={}", word.nibble()),
        Opcode::StructElem => {
            let id = word.low_byte();
            let mut text = format!("STRUCT_ELEM {}", data_type_name(id));
            if !instr.operands.is_empty() {
                let bits = instr
                    .operands
                    .iter()
                    .rev()
                    .fold(0u64, |acc, &w| acc << 32 | w as u64);
                match DataType::from_u8(id) {
                    Some(data_type) => text.push_str(&format!(" = {}", data_type.format_bits(bits))),
                    None => text.push_str(&format!(" = {bits:#x}")),
                }
            }
            text
        }
        Opcode::EndStruct => "END_STRUCT".to_string(),

        // ========== Functions ==========
        Opcode::StartConstructor => format!(
            "START_CONSTRUCTOR id={} nArgs={} readOnlyMask={:#x}",
            word.field(CONSTRUCTOR_ID_SHIFT, FUNCTION_ID_MASK),
            word.field(ARG_COUNT_SHIFT, ARG_COUNT_MASK),
            word.field(0, READ_ONLY_MASK)
        ),
        Opcode::EndConstructor => "END_CONSTRUCTOR".to_string(),
        Opcode::Construct => {
            let id = word.field(CONSTRUCT_ID_SHIFT, FUNCTION_ID_MASK);
            let args: Vec<u32> = match instr.operands.first() {
                Some(&packed) => {
                    let count = (0..5u32)
                        .rev()
                        .find(|i| (packed >> (ARG_ID_BITS * i)) & ARG_ID_MASK != 0)
                        .map_or(1, |i| i + 1);
                    (0..count)
                        .map(|i| (packed >> (ARG_ID_BITS * i)) & ARG_ID_MASK)
                        .collect()
                }
                None => Vec::new(),
            };
            format!("CONSTRUCT id={id} args={args:?}")
        }

        // ========== Writes ==========
        Opcode::Write => {
            let data = if word.uses_src1() {
                format!("reg[{}]", word.src1())
            } else {
                imm.hex()
            };
            let repeats = register_or(word.uses_src2(), word.src2(), word.low_byte() as u32);
            format!(
                "WRITE data={data} bytes={} repeats={repeats}",
                word.data_len()
            )
        }
        Opcode::WriteArray => format!(
            "WRITE_ARRAY {} elements bytes={}",
            imm.word(),
            word.nibble()
        ),
        Opcode::WriteStruct => format!(
            "WRITE_STRUCT id={} repeats={}",
            word.nibble(),
            register_or(word.uses_src1(), word.src1(), word.field(SRC1_SHIFT, NIBBLE_MASK))
        ),
        Opcode::SwitchFocus => format!(
            "SWITCH_FOCUS memRegion={}",
            register_or(word.uses_src1(), word.src1(), word.field(SRC1_SHIFT, NIBBLE_MASK))
        ),

        // ========== Control flow ==========
        Opcode::Loop => {
            let start = imm.operand(word.uses_dest(), word.dest(), true);
            let end = imm.operand(word.uses_src1(), word.src1(), true);
            let increment = imm.operand(word.uses_src2(), word.src2(), true);
            format!(
                "LOOP counter=reg[{}] start={start} end={end} increment={increment}",
                word.nibble()
            )
        }
        Opcode::BreakLoop => "BREAK_LOOP".to_string(),
        Opcode::EndLoop => "END_LOOP".to_string(),
        Opcode::If => match condition(instr) {
            Some(cond) if cond.is_unary() => format!("IF reg[{}] {cond}", word.src1()),
            Some(cond) => format!(
                "IF reg[{}] {cond} {}",
                word.src1(),
                imm.operand(word.uses_src2(), word.src2(), true)
            ),
            None => format!("IF reg[{}] ?{}", word.src1(), word.nibble()),
        },
        Opcode::Else => "ELSE".to_string(),
        Opcode::EndIf => "END_IF".to_string(),

        // ========== Registers ==========
        Opcode::Mv => format!(
            "MV reg[{}] = {}",
            word.dest(),
            imm.operand(word.uses_src1(), word.src1(), false)
        ),
        Opcode::GetWrPtr => format!("GET_WR_PTR dest=reg[{}]", word.dest()),
        Opcode::SetWrPtr => {
            let relative = word.flag(RELATIVE_SHIFT);
            let address = imm.operand(word.uses_src1(), word.src1(), relative);
            let mode = if relative { "RELATIVE" } else { "ABSOLUTE" };
            format!("SET_WR_PTR {address} {mode}")
        }
        Opcode::AlignWrPtr => {
            let block = register_or(word.uses_src1(), word.src1(), word.field(0, ALIGN_MASK));
            let mut text = format!("ALIGN_WR_PTR to 2^{block} bytes");
            if word.uses_dest() {
                text.push_str(&format!(" returning to reg[{}]", word.dest()));
            }
            text
        }
        Opcode::ArithOp => {
            let signed = word.flag(SIGNED_SHIFT);
            let symbol = match ArithmeticOperation::from_u8(word.nibble(), instr.opcode) {
                Ok(operation) => operation.symbol().to_string(),
                Err(_) => format!("?{}", word.nibble()),
            };
            let a = imm.operand(word.uses_src1(), word.src1(), signed);
            let b = imm.operand(word.uses_src2(), word.src2(), signed);
            let kind = if signed { "signed" } else { "unsigned" };
            format!("ARITH_OP reg[{}] = {a} {symbol} {b} ({kind})", word.dest())
        }
        Opcode::LogicOp => match LogicOperation::from_u8(word.nibble(), instr.opcode) {
            Ok(LogicOperation::Not) => format!(
                "LOGIC_OP reg[{}] = ~{}",
                word.dest(),
                imm.operand(word.uses_src1(), word.src1(), false)
            ),
            Ok(operation) => {
                let a = imm.operand(word.uses_src1(), word.src1(), false);
                let b = imm.operand(word.uses_src2(), word.src2(), false);
                format!("LOGIC_OP reg[{}] = {a} {} {b}", word.dest(), operation.symbol())
            }
            Err(_) => format!("LOGIC_OP reg[{}] ?{}", word.dest(), word.nibble()),
        },

        // ========== Copies ==========
        Opcode::CopyStruct => {
            let source = register_or(word.uses_src1(), word.src1(), word.field(SRC1_SHIFT, NIBBLE_MASK));
            let destination = register_or(word.uses_dest(), word.dest(), word.field(DEST_SHIFT, NIBBLE_MASK));
            format!("COPY_STRUCT {source} to {destination}")
        }
        Opcode::CopyParam => {
            let indices = instr.operands.first().copied().unwrap_or(0);
            let source_index = indices & BYTE_MASK;
            let source = format!("struct[{}].[{source_index}]", word.field(SRC1_SHIFT, NIBBLE_MASK));
            if word.uses_dest() {
                format!("COPY_PARAM {source} to reg[{}]", word.dest())
            } else {
                format!(
                    "COPY_PARAM {source} to struct[{}].[{}]",
                    word.field(DEST_SHIFT, NIBBLE_MASK),
                    (indices >> PARAM_DEST_SHIFT) & BYTE_MASK
                )
            }
        }
        Opcode::WriteParam => {
            let value = if word.uses_src1() {
                format!("reg[{}]", word.src1())
            } else {
                imm.hex()
            };
            format!(
                "WRITE_PARAM struct[{}].[{}] = {value}",
                word.field(DEST_SHIFT, NIBBLE_MASK),
                word.low_byte()
            )
        }

        // ========== Print ==========
        Opcode::PrintVal => {
            let value = if word.uses_src1() {
                format!("reg[{}]", word.src1())
            } else {
                imm.hex()
            };
            format!("PRINT_VAL {value} bytes={}", word.data_len())
        }
        Opcode::PrintTxt => {
            let len = word.low_byte() as usize + 1;
            let bytes: Vec<u8> = instr.operands.iter().flat_map(|w| w.to_le_bytes()).collect();
            let text = String::from_utf8_lossy(&bytes[..len.min(bytes.len())]);
            format!("PRINT_TXT \"{}\"", text.escape_debug())
        }
        Opcode::PrintStruct => format!(
            "PRINT_STRUCT {}",
            register_or(word.uses_src1(), word.src1(), word.nibble() as u32)
        ),

        Opcode::EndSpec => "END_SPEC".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataspec_isa::CommandWord;

    fn instr(word: CommandWord, operands: &[u32]) -> Instruction {
        Instruction {
            offset: 0,
            word,
            opcode: word.opcode().unwrap(),
            operands: operands.to_vec(),
            payload: Vec::new(),
        }
    }

    #[test]
    fn test_format_reserve() {
        let word = CommandWord::new(Opcode::Reserve, 2)
            .with_field(0, NIBBLE_MASK, 3)
            .with_flag(UNFILLED_SHIFT, true);
        assert_eq!(format(&instr(word, &[100])), "RESERVE memRegion=3 size=100 UNFILLED");
    }

    #[test]
    fn test_format_write_immediate_and_register() {
        let word = CommandWord::new(Opcode::Write, 2)
            .with_data_len(4)
            .with_field(0, BYTE_MASK, 1);
        assert_eq!(
            format(&instr(word, &[10])),
            "WRITE data=0x0000000a bytes=4 repeats=1"
        );

        let word = CommandWord::new(Opcode::Write, 1)
            .with_data_len(8)
            .with_src1(2)
            .with_src2(3);
        assert_eq!(format(&instr(word, &[])), "WRITE data=reg[2] bytes=8 repeats=reg[3]");
    }

    #[test]
    fn test_format_loop_mixed_operands() {
        let word = CommandWord::new(Opcode::Loop, 3)
            .with_field(0, NIBBLE_MASK, 1)
            .with_src1(4);
        assert_eq!(
            format(&instr(word, &[(-2i32) as u32, 1])),
            "LOOP counter=reg[1] start=-2 end=reg[4] increment=1"
        );
    }

    #[test]
    fn test_format_conditions() {
        let unary = CommandWord::new(Opcode::If, 1)
            .with_src1(2)
            .with_field(0, NIBBLE_MASK, Condition::IsZero as u32);
        assert_eq!(format(&instr(unary, &[])), "IF reg[2] == 0");

        let binary = CommandWord::new(Opcode::If, 2)
            .with_src1(2)
            .with_field(0, NIBBLE_MASK, Condition::LessThan as u32);
        assert_eq!(format(&instr(binary, &[(-5i32) as u32])), "IF reg[2] < -5");
    }

    #[test]
    fn test_format_arith_signed() {
        let word = CommandWord::new(Opcode::ArithOp, 2)
            .with_dest(1)
            .with_src1(0)
            .with_flag(SIGNED_SHIFT, true)
            .with_field(0, NIBBLE_MASK, ArithmeticOperation::Multiply as u32);
        assert_eq!(
            format(&instr(word, &[(-3i32) as u32])),
            "ARITH_OP reg[1] = reg[0] * -3 (signed)"
        );
    }

    #[test]
    fn test_format_copy_param_to_structure() {
        let word = CommandWord::new(Opcode::CopyParam, 2)
            .with_field(DEST_SHIFT, NIBBLE_MASK, 1)
            .with_field(SRC1_SHIFT, NIBBLE_MASK, 0);
        assert_eq!(
            format(&instr(word, &[(2 << PARAM_DEST_SHIFT) | 1])),
            "COPY_PARAM struct[0].[1] to struct[1].[2]"
        );
    }

    #[test]
    fn test_format_construct_arguments() {
        let word = CommandWord::new(Opcode::Construct, 2).with_field(CONSTRUCT_ID_SHIFT, FUNCTION_ID_MASK, 4);
        // second argument is structure 0
        let packed = 3 | (7 << (2 * ARG_ID_BITS));
        assert_eq!(format(&instr(word, &[packed])), "CONSTRUCT id=4 args=[3, 0, 7]");
    }

    #[test]
    fn test_format_print_text() {
        let word = CommandWord::new(Opcode::PrintTxt, 3).with_field(0, BYTE_MASK, 4);
        let operands = [u32::from_le_bytes(*b"hell"), u32::from_le_bytes([b'o', 0, 0, 0])];
        assert_eq!(format(&instr(word, &operands)), "PRINT_TXT \"hello\"");
    }

    #[test]
    fn test_format_unknown_data_type() {
        let word = CommandWord::new(Opcode::StructElem, 1).with_field(0, BYTE_MASK, 0xEE);
        assert_eq!(format(&instr(word, &[])), "STRUCT_ELEM ?238");
    }
}
