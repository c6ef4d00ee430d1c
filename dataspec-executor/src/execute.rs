//! Command execution
//!
//! One handler per opcode. The operand words counted in the length field are
//! read before dispatch; anything past them (WRITE_ARRAY payloads, the
//! elements of a structure, skipped blocks) is read from the stream by the
//! handler itself.

use crate::memory::MemoryRegion;
use crate::rng::{MersenneTwister, UniformDistribution};
use crate::state::{Element, ExecutorState, Function, LoopFrame, Structure};
use crate::vm::ExecutorConfig;
use dataspec_isa::encoding::*;
use dataspec_isa::operation::RandomDistribution;
use dataspec_isa::{
    round_up_to_word, ArithmeticOperation, CommandWord, Condition, DataSpecError, DataType,
    DecodedCommand, LogicOperation, Opcode, RandomNumberGenerator, Result, SpecReader,
    END_SPEC_EXECUTOR, MAX_FUNCTION_ARGUMENTS, MAX_STRUCT_ELEMENTS,
};
use tracing::{debug, info, warn};

/// What the main loop does after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Halt,
}

/// Operand words that follow a command word
struct Operands {
    opcode: Opcode,
    words: Vec<u32>,
    next: usize,
}

impl Operands {
    fn read(command: &DecodedCommand, reader: &mut SpecReader<'_>) -> Result<Self> {
        let count = command.word.length() as usize - 1;
        let words = (0..count)
            .map(|_| reader.read_word())
            .collect::<Result<Vec<_>>>()?;
        Ok(Operands {
            opcode: command.opcode,
            words,
            next: 0,
        })
    }

    fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn word(&mut self) -> Result<u32> {
        let word = self
            .words
            .get(self.next)
            .copied()
            .ok_or_else(|| DataSpecError::syntax(self.opcode, "missing operand word"))?;
        self.next += 1;
        Ok(word)
    }

    /// One word, or two for a wide value (low word first)
    fn value(&mut self, wide: bool) -> Result<u64> {
        let low = self.word()? as u64;
        if wide {
            Ok(low | ((self.word()? as u64) << 32))
        } else {
            Ok(low)
        }
    }

    /// Register contents when `uses` is set, otherwise the next word
    fn operand(&mut self, uses: bool, register: u8, state: &ExecutorState) -> Result<u32> {
        if uses {
            Ok(state.read_reg(register))
        } else {
            self.word()
        }
    }

    /// Every remaining word as little-endian bytes
    fn take_bytes(&mut self) -> Vec<u8> {
        let bytes = self.words[self.next..]
            .iter()
            .flat_map(|w| w.to_le_bytes())
            .collect();
        self.next = self.words.len();
        bytes
    }

    /// Fail if the length field promised more words than the command used
    fn finish(&self) -> Result<()> {
        if self.next != self.words.len() {
            return Err(DataSpecError::syntax(
                self.opcode,
                format!(
                    "{} operand words present but {} used",
                    self.words.len(),
                    self.next
                ),
            ));
        }
        Ok(())
    }
}

/// Execute one decoded command
pub fn execute(
    command: &DecodedCommand,
    reader: &mut SpecReader<'_>,
    state: &mut ExecutorState,
    config: &ExecutorConfig,
) -> Result<Flow> {
    debug!(
        offset = command.offset,
        command = %command.opcode,
        word = %format_args!("{:#010x}", command.word.raw()),
        "execute"
    );
    let mut ops = Operands::read(command, reader)?;
    let word = command.word;

    match command.opcode {
        Opcode::Break => {
            return Err(DataSpecError::ExecuteBreak {
                pc: command.offset,
                file: config.source_name.clone(),
            })
        }
        Opcode::Nop => {}

        // ========== Allocation ==========
        Opcode::Reserve => reserve(word, &mut ops, state, config)?,
        Opcode::Free => free(word, state)?,
        Opcode::DeclareRng => declare_rng(word, &mut ops, state)?,
        Opcode::DeclareRandomDist => declare_random_distribution(word, state)?,
        Opcode::GetRandomNumber => get_random_number(word, state)?,

        // ========== Structures ==========
        Opcode::StartStruct => define_structure(word, reader, state)?,
        Opcode::StructElem | Opcode::EndStruct => {
            return Err(DataSpecError::InvalidCommand {
                command: command.opcode,
            })
        }
        Opcode::CopyStruct => copy_structure(word, state)?,
        Opcode::CopyParam => copy_parameter(word, &mut ops, state)?,
        Opcode::WriteParam => write_parameter(word, &mut ops, state)?,

        // ========== Functions ==========
        Opcode::StartConstructor => define_function(word, reader, state)?,
        Opcode::EndConstructor => {
            let resume = state.leave_call(Opcode::EndConstructor)?;
            reader.seek(resume);
        }
        Opcode::Construct => construct(word, &mut ops, reader, state)?,

        // ========== Writes ==========
        Opcode::Write => write(word, &mut ops, state)?,
        Opcode::WriteArray => write_array(word, &mut ops, reader, state)?,
        Opcode::WriteStruct => write_structure(word, state)?,
        Opcode::SwitchFocus => switch_focus(word, state)?,

        // ========== Loops and conditionals ==========
        Opcode::Loop => start_loop(word, &mut ops, reader, state)?,
        Opcode::BreakLoop => break_loop(reader, state)?,
        Opcode::EndLoop => end_loop(reader, state)?,
        Opcode::If => start_conditional(word, &mut ops, reader, state)?,
        Opcode::Else => {
            leave_conditional(Opcode::Else, state)?;
            skip_block(reader, Opcode::If, Opcode::EndIf, false)?;
        }
        Opcode::EndIf => leave_conditional(Opcode::EndIf, state)?,

        // ========== Registers and the write pointer ==========
        Opcode::Mv => {
            let dest = destination(word, Opcode::Mv)?;
            let value = ops.operand(word.uses_src1(), word.src1(), state)?;
            state.write_reg(dest, value);
        }
        Opcode::GetWrPtr => {
            let dest = destination(word, Opcode::GetWrPtr)?;
            let (_, region) = state.focused_region(Opcode::GetWrPtr)?;
            let pointer = region.write_pointer();
            state.write_reg(dest, pointer);
        }
        Opcode::SetWrPtr => set_write_pointer(word, &mut ops, state)?,
        Opcode::AlignWrPtr => align_write_pointer(word, state)?,
        Opcode::ArithOp => {
            let dest = destination(word, Opcode::ArithOp)?;
            let operation = ArithmeticOperation::from_u8(word.nibble(), Opcode::ArithOp)?;
            let a = ops.operand(word.uses_src1(), word.src1(), state)?;
            let b = ops.operand(word.uses_src2(), word.src2(), state)?;
            state.write_reg(dest, operation.apply(a, b, word.flag(SIGNED_SHIFT)));
        }
        Opcode::LogicOp => {
            let dest = destination(word, Opcode::LogicOp)?;
            let operation = LogicOperation::from_u8(word.nibble(), Opcode::LogicOp)?;
            let a = ops.operand(word.uses_src1(), word.src1(), state)?;
            let b = if operation.is_unary() {
                0
            } else {
                ops.operand(word.uses_src2(), word.src2(), state)?
            };
            state.write_reg(dest, operation.apply(a, b));
        }

        // ========== Print ==========
        Opcode::PrintVal => {
            let size = word.data_len();
            let bits = if word.uses_src1() {
                state.read_reg(word.src1()) as u64
            } else {
                ops.value(size == 8)?
            };
            info!(
                value = %format_args!("{bits:#0width$x}", width = 2 + 2 * size as usize),
                bytes = size,
                "PRINT_VAL"
            );
        }
        Opcode::PrintTxt => print_text(word, &mut ops)?,
        Opcode::PrintStruct => {
            let id = if word.uses_src1() {
                state.read_reg(word.src1())
            } else {
                word.nibble() as u32
            };
            for (index, element) in state.structure(id, Opcode::PrintStruct)?.iter().enumerate() {
                info!(
                    structure = id,
                    element = index,
                    data_type = %element.data_type,
                    value = %element.data_type.format_bits(element.bits),
                    "PRINT_STRUCT"
                );
            }
        }

        Opcode::EndSpec => {
            let trailer = ops.word()? as i32;
            ops.finish()?;
            if trailer != END_SPEC_EXECUTOR {
                return Err(DataSpecError::syntax(
                    Opcode::EndSpec,
                    format!("trailer {trailer} is not {END_SPEC_EXECUTOR}"),
                ));
            }
            return Ok(Flow::Halt);
        }
    }

    ops.finish()?;
    Ok(Flow::Continue)
}

// ============================================================================
// Allocation
// ============================================================================

fn reserve(
    word: CommandWord,
    ops: &mut Operands,
    state: &mut ExecutorState,
    config: &ExecutorConfig,
) -> Result<()> {
    let command = Opcode::Reserve;
    let region = word.nibble() as u32;
    let unfilled = word.flag(UNFILLED_SHIFT);
    let shrink = word.flag(SHRINK_SHIFT);
    let size = round_up_to_word(ops.word()?);

    state.regions.ensure_free(region, command)?;
    let available = config.space_available.saturating_sub(state.space_allocated);
    if size == 0 || size > available {
        return Err(DataSpecError::out_of_bounds(
            "memory size",
            size,
            1,
            available,
            command,
        ));
    }
    if shrink {
        warn!(region, size, "shrink is not supported; region reserved at full size");
    }
    state
        .regions
        .allocate(region, MemoryRegion::new(size, unfilled, shrink), command)?;
    state.space_allocated += size;
    Ok(())
}

fn free(word: CommandWord, state: &mut ExecutorState) -> Result<()> {
    let region = word.nibble();
    let freed = state.regions.free(region as u32, Opcode::Free)?;
    state.space_allocated -= freed.size();
    if state.current_region == Some(region) {
        state.current_region = None;
    }
    Ok(())
}

fn declare_rng(word: CommandWord, ops: &mut Operands, state: &mut ExecutorState) -> Result<()> {
    let command = Opcode::DeclareRng;
    let id = word.dest() as u32;
    RandomNumberGenerator::from_u8(word.src1(), command)?;
    let seed = ops.word()?;
    state.rngs.allocate(id, MersenneTwister::new(seed), command)?;
    Ok(())
}

/// DECLARE_RANDOM_DIST reads its parameters from a structure of
/// `distType, rngID, param1, param2`
fn declare_random_distribution(word: CommandWord, state: &mut ExecutorState) -> Result<()> {
    let command = Opcode::DeclareRandomDist;
    let id = word.src1() as u32;
    state.distributions.ensure_free(id, command)?;

    let parameters = state.structure(word.nibble() as u32, command)?;
    let [kind, rng, min, max] = parameters.as_slice() else {
        return Err(DataSpecError::syntax(
            command,
            format!("expected 4 distribution parameters, found {}", parameters.len()),
        ));
    };
    if kind.bits != RandomDistribution::Uniform as u64 {
        return Err(DataSpecError::InvalidOperation {
            kind: "random distribution",
            value: kind.bits as u32,
            command,
        });
    }
    let rng = rng.bits as u32;
    state.rngs.ensure_allocated(rng, command)?;
    let (min, max) = (min.bits as u32 as i32, max.bits as u32 as i32);
    if min > max {
        return Err(DataSpecError::out_of_bounds(
            "distribution minimum",
            min,
            i32::MIN,
            max,
            command,
        ));
    }

    state.distributions.allocate(
        id,
        UniformDistribution {
            rng: rng as u8,
            min,
            max,
        },
        command,
    )?;
    Ok(())
}

fn get_random_number(word: CommandWord, state: &mut ExecutorState) -> Result<()> {
    let command = Opcode::GetRandomNumber;
    let dest = destination(word, command)?;
    let distribution = *state.distributions.get(word.nibble() as u32, command)?;
    let draw = state
        .rngs
        .get_mut(distribution.rng as u32, command)?
        .next_u32();
    state.write_reg(dest, distribution.sample(draw) as u32);
    Ok(())
}

// ============================================================================
// Structures
// ============================================================================

/// START_STRUCT: consume STRUCT_ELEM commands up to END_STRUCT
fn define_structure(
    word: CommandWord,
    reader: &mut SpecReader<'_>,
    state: &mut ExecutorState,
) -> Result<()> {
    let command = Opcode::StartStruct;
    let id = word.nibble() as u32;
    state.structures.ensure_free(id, command)?;

    let mut elements = Structure::new();
    loop {
        let element = reader.read_command()?;
        let mut ops = Operands::read(&element, reader)?;
        match element.opcode {
            Opcode::StructElem => {
                let data_type = DataType::from_id(element.word.low_byte() as u32, element.opcode)?;
                let bits = if ops.is_empty() {
                    0
                } else {
                    ops.value(data_type.size() == 8)?
                };
                ops.finish()?;
                if elements.len() == MAX_STRUCT_ELEMENTS {
                    return Err(DataSpecError::out_of_bounds(
                        "number of structure elements",
                        elements.len() + 1,
                        1,
                        MAX_STRUCT_ELEMENTS,
                        command,
                    ));
                }
                elements.push(Element::new(data_type, bits));
            }
            Opcode::EndStruct => {
                ops.finish()?;
                break;
            }
            other => {
                return Err(DataSpecError::syntax(
                    command,
                    format!("{other} inside definition of structure {id}"),
                ))
            }
        }
    }

    if elements.is_empty() {
        return Err(DataSpecError::out_of_bounds(
            "number of structure elements",
            0,
            1,
            MAX_STRUCT_ELEMENTS,
            command,
        ));
    }
    state.structures.allocate(id, elements, command)?;
    Ok(())
}

fn copy_structure(word: CommandWord, state: &mut ExecutorState) -> Result<()> {
    let command = Opcode::CopyStruct;
    let source = if word.uses_src1() {
        state.read_reg(word.src1())
    } else {
        word.src1() as u32
    };
    let destination = if word.uses_dest() {
        state.read_reg(word.dest())
    } else {
        word.dest() as u32
    };
    state.structures.check_id(source, command)?;
    state.structures.check_id(destination, command)?;
    if source == destination {
        return Err(DataSpecError::DuplicateParameter {
            command,
            args: vec![source as u8, destination as u8],
        });
    }

    let copy = state.structure(source, command)?.clone();
    if state.structures.replace(destination, copy, command)?.is_some() {
        warn!(source, destination, "COPY_STRUCT overwrote an allocated structure");
    }
    Ok(())
}

fn copy_parameter(word: CommandWord, ops: &mut Operands, state: &mut ExecutorState) -> Result<()> {
    let command = Opcode::CopyParam;
    let indices = ops.word()?;
    let source_index = (indices & BYTE_MASK) as u8;
    let destination_index = ((indices >> PARAM_DEST_SHIFT) & BYTE_MASK) as u8;
    let source = word.src1() as u32;
    let element = state.element(source, source_index, command)?;

    if word.uses_dest() {
        state.write_reg(word.dest(), element.bits as u32);
        return Ok(());
    }

    let destination = word.dest() as u32;
    if destination == source && destination_index == source_index {
        return Err(DataSpecError::DuplicateParameter {
            command,
            args: vec![destination as u8, destination_index],
        });
    }
    let target = state.element_mut(destination, destination_index, command)?;
    if target.data_type != element.data_type {
        return Err(DataSpecError::TypeMismatch { command });
    }
    *target = element;
    Ok(())
}

fn write_parameter(word: CommandWord, ops: &mut Operands, state: &mut ExecutorState) -> Result<()> {
    let command = Opcode::WriteParam;
    let id = word.dest() as u32;
    let index = word.low_byte();
    let data_type = state.element(id, index, command)?.data_type;
    let bits = if word.uses_src1() {
        let value = state.read_reg(word.src1());
        if data_type.is_signed() {
            value as i32 as i64 as u64
        } else {
            value as u64
        }
    } else {
        ops.value(data_type.size() == 8)?
    };
    *state.element_mut(id, index, command)? = Element::new(data_type, bits);
    Ok(())
}

// ============================================================================
// Functions
// ============================================================================

/// START_CONSTRUCTOR: remember where the body starts and step over it
fn define_function(
    word: CommandWord,
    reader: &mut SpecReader<'_>,
    state: &mut ExecutorState,
) -> Result<()> {
    let command = Opcode::StartConstructor;
    if !state.calls.is_empty() {
        return Err(DataSpecError::InvalidCommand { command });
    }
    let id = word.field(CONSTRUCTOR_ID_SHIFT, FUNCTION_ID_MASK);
    let arity = word.field(ARG_COUNT_SHIFT, ARG_COUNT_MASK) as usize;
    if arity > MAX_FUNCTION_ARGUMENTS {
        return Err(DataSpecError::out_of_bounds(
            "number of arguments",
            arity,
            0,
            MAX_FUNCTION_ARGUMENTS,
            command,
        ));
    }
    state.functions.ensure_free(id, command)?;

    let body = reader.position();
    skip_block(reader, Opcode::StartConstructor, Opcode::EndConstructor, false)?;
    state.functions.allocate(
        id,
        Function {
            id: id as u8,
            body,
            arity,
            read_only: word.field(0, READ_ONLY_MASK),
        },
        command,
    )?;
    Ok(())
}

fn construct(
    word: CommandWord,
    ops: &mut Operands,
    reader: &mut SpecReader<'_>,
    state: &mut ExecutorState,
) -> Result<()> {
    let command = Opcode::Construct;
    let id = word.field(CONSTRUCT_ID_SHIFT, FUNCTION_ID_MASK);
    let function = *state.functions.get(id, command)?;
    if state.calls.iter().any(|frame| frame.function.id == function.id) {
        return Err(DataSpecError::InvalidCommand { command });
    }

    let arguments: Vec<u8> = if ops.is_empty() {
        Vec::new()
    } else {
        let packed = ops.word()?;
        let supplied = (1..=MAX_FUNCTION_ARGUMENTS)
            .rev()
            .find(|&n| (packed >> (ARG_ID_BITS * (n as u32 - 1))) & ARG_ID_MASK != 0)
            .unwrap_or(1)
            .max(function.arity);
        (0..supplied)
            .map(|i| ((packed >> (ARG_ID_BITS * i as u32)) & ARG_ID_MASK) as u8)
            .collect()
    };
    if arguments.len() != function.arity {
        return Err(DataSpecError::WrongParameterNumber {
            function: id,
            expected: function.arity,
            actual: arguments.len(),
        });
    }
    for (i, argument) in arguments.iter().enumerate() {
        if arguments[..i].contains(argument) {
            return Err(DataSpecError::DuplicateParameter {
                command,
                args: arguments.clone(),
            });
        }
    }

    state.enter_call(function, arguments, reader.position(), command)?;
    reader.seek(function.body);
    Ok(())
}

// ============================================================================
// Writes
// ============================================================================

/// Append `repeats` copies of `element` at the focused region's write pointer
fn write_repeated(
    state: &mut ExecutorState,
    element: &[u8],
    repeats: u32,
    command: Opcode,
) -> Result<()> {
    let (id, region) = state.focused_region(command)?;
    if region.is_unfilled() {
        return Err(DataSpecError::RegionUnfilled {
            region: id as u32,
            command,
        });
    }
    let required = element.len() as u64 * repeats as u64;
    if required > region.remaining() as u64 {
        return Err(DataSpecError::NoMore {
            space_available: region.remaining(),
            space_required: u32::try_from(required).unwrap_or(u32::MAX),
        });
    }
    region.write(&element.repeat(repeats as usize), id, command)
}

fn write(word: CommandWord, ops: &mut Operands, state: &mut ExecutorState) -> Result<()> {
    let size = word.data_len() as usize;
    let repeats = if word.uses_src2() {
        state.read_reg(word.src2())
    } else {
        word.low_byte() as u32
    };
    let bits = if word.uses_src1() {
        let value = state.read_reg(word.src1());
        if size == 8 {
            value as i32 as i64 as u64
        } else {
            value as u64
        }
    } else {
        ops.value(size == 8)?
    };
    write_repeated(state, &bits.to_le_bytes()[..size], repeats, Opcode::Write)
}

fn write_array(
    word: CommandWord,
    ops: &mut Operands,
    reader: &mut SpecReader<'_>,
    state: &mut ExecutorState,
) -> Result<()> {
    let command = Opcode::WriteArray;
    let size = word.nibble() as u32;
    if !matches!(size, 1 | 2 | 4 | 8) {
        return Err(DataSpecError::UnknownTypeLength { size, command });
    }
    let count = ops.word()?;
    let total = u32::try_from(count as u64 * size as u64)
        .map_err(|_| DataSpecError::syntax(command, "payload larger than 4 GiB"))?;
    let payload = reader.read_bytes(round_up_to_word(total) as usize)?;
    write_repeated(state, &payload[..total as usize], 1, command)
}

fn write_structure(word: CommandWord, state: &mut ExecutorState) -> Result<()> {
    let command = Opcode::WriteStruct;
    let repeats = if word.uses_src1() {
        state.read_reg(word.src1())
    } else {
        word.src1() as u32
    };
    let bytes: Vec<u8> = state
        .structure(word.nibble() as u32, command)?
        .iter()
        .flat_map(Element::to_bytes)
        .collect();
    write_repeated(state, &bytes, repeats, command)
}

fn switch_focus(word: CommandWord, state: &mut ExecutorState) -> Result<()> {
    let command = Opcode::SwitchFocus;
    let id = if word.uses_src1() {
        state.read_reg(word.src1())
    } else {
        word.src1() as u32
    };
    if state.regions.get(id, command)?.is_unfilled() {
        return Err(DataSpecError::RegionUnfilled { region: id, command });
    }
    state.current_region = Some(id as u8);
    Ok(())
}

// ============================================================================
// Loops and conditionals
// ============================================================================

fn start_loop(
    word: CommandWord,
    ops: &mut Operands,
    reader: &mut SpecReader<'_>,
    state: &mut ExecutorState,
) -> Result<()> {
    let counter = word.nibble();
    let start = ops.operand(word.uses_dest(), word.dest(), state)?;
    let end = ops.operand(word.uses_src1(), word.src1(), state)?;
    let increment = ops.operand(word.uses_src2(), word.src2(), state)?;
    state.write_reg(counter, start);

    let frame = LoopFrame {
        counter,
        body: reader.position(),
        end,
        increment,
        signed: !word.uses_src1(),
        exit: None,
        conditional_depth: state.conditional_depth,
    };
    if frame.continues(start) {
        state.loops.push(frame);
    } else {
        skip_block(reader, Opcode::Loop, Opcode::EndLoop, false)?;
    }
    Ok(())
}

/// Index of the innermost loop the current call may close
fn innermost_loop(state: &ExecutorState, command: Opcode) -> Result<usize> {
    let floor = state.calls.last().map_or(0, |call| call.loop_depth);
    if state.loops.len() <= floor {
        return Err(DataSpecError::InvalidCommand { command });
    }
    Ok(state.loops.len() - 1)
}

fn end_loop(reader: &mut SpecReader<'_>, state: &mut ExecutorState) -> Result<()> {
    let index = innermost_loop(state, Opcode::EndLoop)?;
    let frame = state.loops[index];
    let value = state.read_reg(frame.counter).wrapping_add(frame.increment);
    state.write_reg(frame.counter, value);
    if frame.continues(value) {
        state.loops[index].exit = Some(reader.position());
        reader.seek(frame.body);
    } else {
        state.loops.pop();
    }
    Ok(())
}

fn break_loop(reader: &mut SpecReader<'_>, state: &mut ExecutorState) -> Result<()> {
    let index = innermost_loop(state, Opcode::BreakLoop)?;
    let frame = state.loops.remove(index);
    state.conditional_depth = frame.conditional_depth;
    match frame.exit {
        Some(exit) => reader.seek(exit),
        None => {
            skip_block(reader, Opcode::Loop, Opcode::EndLoop, false)?;
        }
    }
    Ok(())
}

fn start_conditional(
    word: CommandWord,
    ops: &mut Operands,
    reader: &mut SpecReader<'_>,
    state: &mut ExecutorState,
) -> Result<()> {
    let command = Opcode::If;
    if !word.uses_src1() {
        return Err(DataSpecError::syntax(command, "tested register required"));
    }
    let condition = Condition::from_u8(word.nibble(), command)?;
    let value = state.read_reg(word.src1()) as i32;
    let operand = if condition.is_unary() {
        0
    } else {
        ops.operand(word.uses_src2(), word.src2(), state)? as i32
    };

    if condition.evaluate(value, operand)
        || skip_block(reader, Opcode::If, Opcode::EndIf, true)? == Opcode::Else
    {
        state.conditional_depth += 1;
    }
    Ok(())
}

/// Close the innermost IF or ELSE body
fn leave_conditional(command: Opcode, state: &mut ExecutorState) -> Result<()> {
    let call_floor = state.calls.last().map_or(0, |call| call.conditional_depth);
    let loop_floor = state.loops.last().map_or(0, |frame| frame.conditional_depth);
    if state.conditional_depth <= call_floor.max(loop_floor) {
        return Err(DataSpecError::InvalidCommand { command });
    }
    state.conditional_depth -= 1;
    Ok(())
}

/// Scan forward past the block closed by `closer`, honouring nesting
///
/// Returns the opcode that ended the scan: `closer`, or ELSE when
/// `stop_at_else` is set and the block has one.
fn skip_block(
    reader: &mut SpecReader<'_>,
    opener: Opcode,
    closer: Opcode,
    stop_at_else: bool,
) -> Result<Opcode> {
    let mut depth = 0usize;
    loop {
        if reader.is_at_end() {
            return Err(DataSpecError::syntax(opener, format!("no matching {closer}")));
        }
        let command = reader.read_command()?;
        reader.skip_operands(&command)?;
        match command.opcode {
            opcode if opcode == opener => depth += 1,
            opcode if opcode == closer => {
                if depth == 0 {
                    return Ok(opcode);
                }
                depth -= 1;
            }
            Opcode::Else if stop_at_else && depth == 0 => return Ok(Opcode::Else),
            Opcode::EndSpec => {
                return Err(DataSpecError::syntax(opener, format!("no matching {closer}")))
            }
            _ => {}
        }
    }
}

// ============================================================================
// Registers and the write pointer
// ============================================================================

fn destination(word: CommandWord, command: Opcode) -> Result<u8> {
    if !word.uses_dest() {
        return Err(DataSpecError::syntax(command, "destination register required"));
    }
    Ok(word.dest())
}

fn set_write_pointer(word: CommandWord, ops: &mut Operands, state: &mut ExecutorState) -> Result<()> {
    let command = Opcode::SetWrPtr;
    let address = ops.operand(word.uses_src1(), word.src1(), state)?;
    let (id, region) = state.focused_region(command)?;
    let target = if word.flag(RELATIVE_SHIFT) {
        region.write_pointer() as i64 + address as i32 as i64
    } else {
        address as i64
    };
    region.seek(target, id, command)
}

fn align_write_pointer(word: CommandWord, state: &mut ExecutorState) -> Result<()> {
    let command = Opcode::AlignWrPtr;
    let log_block_size = if word.uses_src1() {
        state.read_reg(word.src1())
    } else {
        word.field(0, ALIGN_MASK)
    };
    if log_block_size > 31 {
        return Err(DataSpecError::out_of_bounds(
            "log block size",
            log_block_size,
            0,
            31,
            command,
        ));
    }

    let block = 1u64 << log_block_size;
    let (id, region) = state.focused_region(command)?;
    let aligned = (region.write_pointer() as u64).div_ceil(block) * block;
    region.seek(aligned as i64, id, command)?;
    let pointer = region.write_pointer();
    if word.uses_dest() {
        state.write_reg(word.dest(), pointer);
    }
    Ok(())
}

// ============================================================================
// Print
// ============================================================================

fn print_text(word: CommandWord, ops: &mut Operands) -> Result<()> {
    let length = word.low_byte() as usize + 1;
    let bytes = ops.take_bytes();
    if round_up_to_word(length as u32) as usize != bytes.len() {
        return Err(DataSpecError::syntax(
            Opcode::PrintTxt,
            format!("{length} bytes of text in {} operand bytes", bytes.len()),
        ));
    }
    info!(text = %String::from_utf8_lossy(&bytes[..length]), "PRINT_TXT");
    Ok(())
}
