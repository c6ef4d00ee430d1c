//! Data specification generator
//!
//! Accepts high-level calls, validates them against its own slot state and
//! the data type ranges, and appends the encoded commands to the spec
//! writer. A failing call emits nothing and changes no state.

use crate::config::GeneratorConfig;
use crate::encoder::{report_line, Emission, Indent};
use crate::operand::{Operand, ParameterTarget, RegionOptions, StructElement};
use dataspec_isa::encoding::*;
use dataspec_isa::{
    round_up_to_word, ArithmeticOperation, CommandWord, Condition, DataSpecError, DataType,
    LogicOperation, Opcode, RandomNumberGenerator, Result, SlotKind, SlotTable, Value,
    END_SPEC_EXECUTOR, MAX_CONSTRUCTORS, MAX_FUNCTION_ARGUMENTS, MAX_MEM_REGIONS,
    MAX_PRINT_TEXT_BYTES, MAX_RANDOM_DISTS, MAX_REGISTERS, MAX_RNGS, MAX_STRUCT_ELEMENTS,
    MAX_STRUCT_SLOTS,
};
use std::io::{self, Write};
use tracing::trace;

#[derive(Clone, Copy, Debug)]
struct RegionInfo {
    size: u32,
    unfilled: bool,
}

/// Element types of a structure; `None` when copied from a source the
/// generator cannot see
type StructShape = Option<Vec<DataType>>;

/// Where writes go, as far as the generator can tell
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Focus {
    Unset,
    Region(u8),
    /// Selected through a register
    Dynamic,
}

/// Block nesting saved while a function body is being defined
#[derive(Clone, Debug)]
struct FunctionFrame {
    id: u8,
    arity: usize,
    outer_focus: Focus,
    outer_loop_depth: usize,
    outer_conditionals: Vec<bool>,
}

pub struct Generator<W: Write, R: Write = io::Sink> {
    spec_writer: W,
    report_writer: Option<R>,
    config: GeneratorConfig,
    closed: bool,
    instruction_counter: u32,
    indent: usize,

    regions: SlotTable<RegionInfo>,
    structures: SlotTable<StructShape>,
    rngs: SlotTable<RandomNumberGenerator>,
    distributions: SlotTable<u8>,
    functions: SlotTable<usize>,

    focus: Focus,
    loop_depth: usize,
    /// One entry per open IF; true once its ELSE has been emitted
    conditionals: Vec<bool>,
    function: Option<FunctionFrame>,
}

impl<W: Write> Generator<W> {
    /// Create a generator without a report
    pub fn new(spec_writer: W, config: GeneratorConfig) -> Self {
        Generator::build(spec_writer, None, config)
    }
}

impl<W: Write, R: Write> Generator<W, R> {
    /// Create a generator that also writes a human-readable report
    pub fn with_report(spec_writer: W, report_writer: R, config: GeneratorConfig) -> Self {
        Generator::build(spec_writer, Some(report_writer), config)
    }

    fn build(spec_writer: W, report_writer: Option<R>, config: GeneratorConfig) -> Self {
        Self {
            spec_writer,
            report_writer,
            config,
            closed: false,
            instruction_counter: 0,
            indent: 0,
            regions: SlotTable::new(SlotKind::Region, MAX_MEM_REGIONS),
            structures: SlotTable::new(SlotKind::Structure, MAX_STRUCT_SLOTS),
            rngs: SlotTable::new(SlotKind::Rng, MAX_RNGS),
            distributions: SlotTable::new(SlotKind::RandomDistribution, MAX_RANDOM_DISTS),
            functions: SlotTable::new(SlotKind::Function, MAX_CONSTRUCTORS),
            focus: Focus::Unset,
            loop_depth: 0,
            conditionals: Vec::new(),
            function: None,
        }
    }

    // ========================================================================
    // State queries
    // ========================================================================

    /// Bytes emitted so far
    pub fn instruction_counter(&self) -> u32 {
        self.instruction_counter
    }

    /// Reserved size of every region slot, `None` where nothing is reserved
    pub fn region_sizes(&self) -> Vec<Option<u32>> {
        self.regions.iter().map(|r| r.map(|info| info.size)).collect()
    }

    /// Region selected by the last literal SWITCH_FOCUS
    pub fn current_region(&self) -> Option<u8> {
        match self.focus {
            Focus::Region(region) => Some(region),
            _ => None,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Give back the writers
    pub fn into_writers(self) -> (W, Option<R>) {
        (self.spec_writer, self.report_writer)
    }

    // ========================================================================
    // Emission
    // ========================================================================

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(DataSpecError::DataUndefinedWriter);
        }
        Ok(())
    }

    fn emit(&mut self, emission: Emission) -> Result<()> {
        self.emit_all(vec![emission])
    }

    /// Write a command sequence with a single write, then report each command
    fn emit_all(&mut self, emissions: Vec<Emission>) -> Result<()> {
        self.ensure_open()?;
        let encoded: Vec<Vec<u8>> = emissions.iter().map(Emission::to_bytes).collect();
        self.spec_writer
            .write_all(&encoded.concat())
            .map_err(DataSpecError::DataWrite)?;

        for (emission, bytes) in emissions.iter().zip(&encoded) {
            self.record(emission, bytes.len() as u32)?;
        }
        Ok(())
    }

    fn record(&mut self, emission: &Emission, size: u32) -> Result<()> {
        if matches!(emission.indent_change(), Indent::Close | Indent::Reopen) {
            self.indent = self.indent.saturating_sub(1);
        }
        if let Some(report) = self.report_writer.as_mut() {
            let line = report_line(self.instruction_counter, self.indent, emission.text());
            writeln!(report, "{line}").map_err(DataSpecError::DataWrite)?;
        }
        if matches!(emission.indent_change(), Indent::Open | Indent::Reopen) {
            self.indent += 1;
        }

        trace!(
            offset = self.instruction_counter,
            command = emission.text(),
            "emitted"
        );
        self.instruction_counter = self.instruction_counter.wrapping_add(size);
        Ok(())
    }

    // ========================================================================
    // Validation helpers
    // ========================================================================

    fn require_focus(&self, command: Opcode) -> Result<()> {
        // a function body runs with whatever region its caller selected
        if self.function.is_none() && self.focus == Focus::Unset {
            return Err(DataSpecError::NoRegionSelected { command });
        }
        Ok(())
    }

    /// Element types of a structure, or `None` when unknown here
    fn structure(&self, id: u8, command: Opcode) -> Result<Option<&[DataType]>> {
        self.structures.check_id(id as u32, command)?;
        if let Some(frame) = &self.function {
            if (id as usize) < frame.arity {
                return Ok(None);
            }
        }
        Ok(self.structures.get(id as u32, command)?.as_deref())
    }

    /// Type of one structure element, or `None` when unknown here
    fn structure_element(&self, id: u8, index: u8, command: Opcode) -> Result<Option<DataType>> {
        match self.structure(id, command)? {
            None => Ok(None),
            Some(types) => types
                .get(index as usize)
                .copied()
                .map(Some)
                .ok_or(DataSpecError::NotAllocated {
                    kind: SlotKind::Parameter,
                    id: index as u32,
                    command,
                }),
        }
    }

    fn structure_emissions(
        &self,
        id: u8,
        elements: &[StructElement],
        command: Opcode,
    ) -> Result<Vec<Emission>> {
        self.structures.ensure_free(id as u32, command)?;
        if elements.is_empty() || elements.len() > MAX_STRUCT_ELEMENTS {
            return Err(DataSpecError::out_of_bounds(
                "number of structure elements",
                elements.len(),
                1,
                MAX_STRUCT_ELEMENTS,
                command,
            ));
        }

        let mut emissions = Vec::with_capacity(elements.len() + 2);
        emissions.push(
            Emission::command(
                CommandWord::new(Opcode::StartStruct, 1).with_field(0, NIBBLE_MASK, id as u32),
                format!("START_STRUCT id={id}"),
            )
            .indent(Indent::Open),
        );
        for element in elements {
            let data_type = element.data_type;
            let word =
                CommandWord::new(Opcode::StructElem, 1).with_field(0, BYTE_MASK, data_type.to_u8() as u32);
            let mut text = format!("STRUCT_ELEM {data_type}");
            let bits = match element.value {
                Some(value) => {
                    text.push_str(&format!(" = {value}"));
                    Some(data_type.encode_bits(value, Opcode::StructElem)?)
                }
                None => None,
            };
            if let Some(label) = &element.label {
                text.push_str(&format!(" ({label})"));
            }
            let emission = Emission::command(word, text);
            emissions.push(match bits {
                Some(bits) => emission.value_bits(bits, data_type.size() == 8),
                None => emission,
            });
        }
        emissions.push(
            Emission::command(
                CommandWord::new(Opcode::EndStruct, 1),
                format!("END_STRUCT id={id}"),
            )
            .indent(Indent::Close),
        );
        Ok(emissions)
    }

    // ========================================================================
    // Housekeeping
    // ========================================================================

    /// Write a line to the report only
    pub fn comment(&mut self, text: &str) -> Result<()> {
        self.ensure_open()?;
        if let Some(report) = self.report_writer.as_mut() {
            writeln!(report, "{text}").map_err(DataSpecError::DataWrite)?;
        }
        Ok(())
    }

    /// Emit BREAK, which stops the executor with an error
    pub fn execute_break(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.emit(Emission::command(CommandWord::new(Opcode::Break, 1), "BREAK"))
    }

    pub fn no_operation(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.emit(Emission::command(CommandWord::new(Opcode::Nop, 1), "NOP"))
    }

    // ========================================================================
    // Memory regions
    // ========================================================================

    /// Reserve `size` bytes, rounded up to a whole word, as region `region`
    pub fn reserve_memory_region(
        &mut self,
        region: u8,
        size: u32,
        options: RegionOptions,
    ) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::Reserve;
        self.regions.ensure_free(region as u32, command)?;
        let rounded = round_up_to_word(size);
        if rounded == 0 || rounded > self.config.max_region_size {
            return Err(DataSpecError::out_of_bounds(
                "memory size",
                size,
                1,
                self.config.max_region_size,
                command,
            ));
        }

        let word = CommandWord::new(command, 1)
            .with_field(0, NIBBLE_MASK, region as u32)
            .with_flag(UNFILLED_SHIFT, options.unfilled)
            .with_flag(SHRINK_SHIFT, options.shrink);
        let mut text = format!("RESERVE memRegion={region} size={rounded}");
        if let Some(label) = &options.label {
            text.push_str(&format!(" label='{label}'"));
        }
        if options.unfilled {
            text.push_str(" UNFILLED");
        }
        if options.shrink {
            text.push_str(" SHRINK");
        }
        self.emit(Emission::command(word, text).word(rounded))?;
        self.regions.allocate(
            region as u32,
            RegionInfo {
                size: rounded,
                unfilled: options.unfilled,
            },
            command,
        )?;
        Ok(())
    }

    pub fn free_memory_region(&mut self, region: u8) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::Free;
        self.regions.ensure_allocated(region as u32, command)?;
        let word = CommandWord::new(command, 1).with_field(0, NIBBLE_MASK, region as u32);
        self.emit(Emission::command(word, format!("FREE memRegion={region}")))?;
        self.regions.free(region as u32, command)?;
        if self.focus == Focus::Region(region) {
            self.focus = Focus::Unset;
        }
        Ok(())
    }

    // ========================================================================
    // Random numbers
    // ========================================================================

    pub fn declare_random_number_generator(
        &mut self,
        rng_id: u8,
        rng_type: RandomNumberGenerator,
        seed: u32,
    ) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::DeclareRng;
        self.rngs.ensure_free(rng_id as u32, command)?;
        let word = CommandWord::new(command, 1)
            .with_field(DEST_SHIFT, NIBBLE_MASK, rng_id as u32)
            .with_field(SRC1_SHIFT, NIBBLE_MASK, rng_type as u32);
        let text = format!("DECLARE_RNG id={rng_id} source={} seed={seed}", rng_type.name());
        self.emit(Emission::command(word, text).word(seed))?;
        self.rngs.allocate(rng_id as u32, rng_type, command)?;
        Ok(())
    }

    /// Declare a uniform distribution over `[min, max]` drawing from `rng_id`
    ///
    /// The parameters travel in structure `structure_id`, which is defined
    /// here and stays allocated afterwards.
    pub fn declare_uniform_random_distribution(
        &mut self,
        distribution_id: u8,
        structure_id: u8,
        rng_id: u8,
        min: f64,
        max: f64,
    ) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::DeclareRandomDist;
        self.distributions.ensure_free(distribution_id as u32, command)?;
        self.rngs.ensure_allocated(rng_id as u32, command)?;
        if min > max {
            return Err(DataSpecError::out_of_bounds(
                "distribution minimum",
                min,
                DataType::S1615.min_value(),
                max,
                command,
            ));
        }

        let elements = [
            StructElement::new(DataType::Uint32)
                .with_value(0u32)
                .with_label("distType"),
            StructElement::new(DataType::Uint32)
                .with_value(rng_id)
                .with_label("rngID"),
            StructElement::new(DataType::S1615)
                .with_value(min)
                .with_label("param1"),
            StructElement::new(DataType::S1615)
                .with_value(max)
                .with_label("param2"),
        ];
        let mut emissions = self.structure_emissions(structure_id, &elements, command)?;
        let word = CommandWord::new(command, 1)
            .with_field(SRC1_SHIFT, NIBBLE_MASK, distribution_id as u32)
            .with_field(0, NIBBLE_MASK, structure_id as u32);
        emissions.push(Emission::command(
            word,
            format!("DECLARE_RANDOM_DIST distId={distribution_id} structId={structure_id}"),
        ));
        self.emit_all(emissions)?;

        let shape = elements.iter().map(|e| e.data_type).collect();
        self.structures
            .allocate(structure_id as u32, Some(shape), command)?;
        self.distributions
            .allocate(distribution_id as u32, rng_id, command)?;
        Ok(())
    }

    /// Draw from a distribution into a register
    pub fn call_random_distribution(&mut self, distribution_id: u8, register_id: u8) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::GetRandomNumber;
        self.distributions
            .ensure_allocated(distribution_id as u32, command)?;
        check_register(register_id, command)?;
        let word = CommandWord::new(command, 1)
            .with_dest(register_id)
            .with_field(0, NIBBLE_MASK, distribution_id as u32);
        self.emit(Emission::command(
            word,
            format!("GET_RANDOM_NUMBER distId={distribution_id} dest=reg[{register_id}]"),
        ))
    }

    // ========================================================================
    // Structures
    // ========================================================================

    pub fn define_structure(&mut self, structure_id: u8, elements: &[StructElement]) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::StartStruct;
        let emissions = self.structure_emissions(structure_id, elements, command)?;
        self.emit_all(emissions)?;
        let shape = elements.iter().map(|e| e.data_type).collect();
        self.structures
            .allocate(structure_id as u32, Some(shape), command)?;
        Ok(())
    }

    /// Overwrite one element of a structure (WRITE_PARAM)
    pub fn set_structure_value(
        &mut self,
        structure_id: u8,
        parameter_index: u8,
        value: Operand,
        data_type: DataType,
    ) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::WriteParam;
        if let Some(element_type) = self.structure_element(structure_id, parameter_index, command)? {
            if element_type != data_type {
                return Err(DataSpecError::TypeMismatch { command });
            }
        }

        let word = CommandWord::new(command, 1)
            .with_field(DEST_SHIFT, NIBBLE_MASK, structure_id as u32)
            .with_field(0, BYTE_MASK, parameter_index as u32);
        let text = format!("WRITE_PARAM struct[{structure_id}].[{parameter_index}] = {value}");
        let emission = match value {
            Operand::Register(register) => {
                check_register(register, command)?;
                Emission::command(word.with_src1(register), text)
            }
            Operand::Immediate(v) => {
                let bits = data_type.encode_bits(v, command)?;
                Emission::command(word, text).value_bits(bits, data_type.size() == 8)
            }
        };
        self.emit(emission)
    }

    /// Write every element of a structure to the current region
    pub fn write_structure(&mut self, structure_id: u8, repeats: Operand) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::WriteStruct;
        self.require_focus(command)?;
        self.structure(structure_id, command)?;

        let mut word = CommandWord::new(command, 1).with_field(0, NIBBLE_MASK, structure_id as u32);
        word = match repeats {
            Operand::Register(register) => word.with_src1(check_register(register, command)?),
            Operand::Immediate(v) => {
                let n = literal(v, "repeats", 1, 15, command)?;
                word.with_field(SRC1_SHIFT, NIBBLE_MASK, n as u32)
            }
        };
        self.emit(Emission::command(
            word,
            format!("WRITE_STRUCT id={structure_id} repeats={repeats}"),
        ))
    }

    /// Copy a whole structure into another slot or a register-selected slot
    pub fn copy_structure(&mut self, source: Operand, destination: Operand) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::CopyStruct;
        let mut word = CommandWord::new(command, 1);

        let mut shape: StructShape = None;
        let mut source_id = None;
        word = match source {
            Operand::Register(register) => word.with_src1(check_register(register, command)?),
            Operand::Immediate(v) => {
                let id = literal(v, "structure id", 0, MAX_STRUCT_SLOTS as i128 - 1, command)? as u8;
                shape = self.structure(id, command)?.map(<[DataType]>::to_vec);
                source_id = Some(id);
                word.with_field(SRC1_SHIFT, NIBBLE_MASK, id as u32)
            }
        };

        let mut allocate = None;
        word = match destination {
            Operand::Register(register) => word.with_dest(check_register(register, command)?),
            Operand::Immediate(v) => {
                let id = literal(v, "structure id", 0, MAX_STRUCT_SLOTS as i128 - 1, command)? as u8;
                if source_id == Some(id) {
                    return Err(DataSpecError::DuplicateParameter {
                        command,
                        args: vec![id, id],
                    });
                }
                self.structures.ensure_free(id as u32, command)?;
                allocate = Some(id);
                word.with_field(DEST_SHIFT, NIBBLE_MASK, id as u32)
            }
        };

        self.emit(Emission::command(
            word,
            format!("COPY_STRUCT {source} to {destination}"),
        ))?;
        if let Some(id) = allocate {
            self.structures.allocate(id as u32, shape, command)?;
        }
        Ok(())
    }

    /// Copy one structure element into another structure or a register
    pub fn copy_structure_parameter(
        &mut self,
        source_structure_id: u8,
        source_parameter_index: u8,
        destination: ParameterTarget,
    ) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::CopyParam;
        let source_type =
            self.structure_element(source_structure_id, source_parameter_index, command)?;

        let mut word =
            CommandWord::new(command, 1).with_field(SRC1_SHIFT, NIBBLE_MASK, source_structure_id as u32);
        let (destination_index, text) = match destination {
            ParameterTarget::Register(register) => {
                word = word.with_dest(check_register(register, command)?);
                (
                    0,
                    format!(
                        "COPY_PARAM struct[{source_structure_id}].[{source_parameter_index}] to reg[{register}]"
                    ),
                )
            }
            ParameterTarget::Structure { id, index } => {
                if id == source_structure_id && index == source_parameter_index {
                    return Err(DataSpecError::DuplicateParameter {
                        command,
                        args: vec![id, index],
                    });
                }
                let destination_type = self.structure_element(id, index, command)?;
                if let (Some(a), Some(b)) = (source_type, destination_type) {
                    if a != b {
                        return Err(DataSpecError::TypeMismatch { command });
                    }
                }
                word = word.with_field(DEST_SHIFT, NIBBLE_MASK, id as u32);
                (
                    index,
                    format!(
                        "COPY_PARAM struct[{source_structure_id}].[{source_parameter_index}] to struct[{id}].[{index}]"
                    ),
                )
            }
        };
        let indices =
            ((destination_index as u32) << PARAM_DEST_SHIFT) | source_parameter_index as u32;
        self.emit(Emission::command(word, text).word(indices))
    }

    // ========================================================================
    // Functions
    // ========================================================================

    /// Open a function body; `argument_by_value[i]` marks argument `i` as
    /// read-only for the duration of a call
    pub fn start_function(&mut self, function_id: u8, argument_by_value: &[bool]) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::StartConstructor;
        if self.function.is_some() {
            return Err(DataSpecError::InvalidCommand { command });
        }
        self.functions.ensure_free(function_id as u32, command)?;
        let arity = argument_by_value.len();
        if arity > MAX_FUNCTION_ARGUMENTS {
            return Err(DataSpecError::out_of_bounds(
                "number of arguments",
                arity,
                0,
                MAX_FUNCTION_ARGUMENTS,
                command,
            ));
        }

        let read_only_mask = argument_by_value
            .iter()
            .enumerate()
            .fold(0u32, |mask, (i, by_value)| mask | ((*by_value as u32) << i));
        let word = CommandWord::new(command, 1)
            .with_field(CONSTRUCTOR_ID_SHIFT, FUNCTION_ID_MASK, function_id as u32)
            .with_field(ARG_COUNT_SHIFT, ARG_COUNT_MASK, arity as u32)
            .with_field(0, READ_ONLY_MASK, read_only_mask);
        self.emit(
            Emission::command(
                word,
                format!(
                    "START_CONSTRUCTOR id={function_id} nArgs={arity} readOnlyMask={read_only_mask:#x}"
                ),
            )
            .indent(Indent::Open),
        )?;

        self.functions.allocate(function_id as u32, arity, command)?;
        self.function = Some(FunctionFrame {
            id: function_id,
            arity,
            outer_focus: self.focus,
            outer_loop_depth: self.loop_depth,
            outer_conditionals: std::mem::take(&mut self.conditionals),
        });
        self.loop_depth = 0;
        Ok(())
    }

    pub fn end_function(&mut self) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::EndConstructor;
        if self.function.is_none() || self.loop_depth > 0 || !self.conditionals.is_empty() {
            return Err(DataSpecError::InvalidCommand { command });
        }
        self.emit(
            Emission::command(CommandWord::new(command, 1), "END_CONSTRUCTOR")
                .indent(Indent::Close),
        )?;
        if let Some(frame) = self.function.take() {
            self.focus = frame.outer_focus;
            self.loop_depth = frame.outer_loop_depth;
            self.conditionals = frame.outer_conditionals;
        }
        Ok(())
    }

    /// Run a function with the given structures as its arguments
    pub fn call_function(&mut self, function_id: u8, structure_ids: &[u8]) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::Construct;
        let arity = *self.functions.get(function_id as u32, command)?;
        if matches!(&self.function, Some(frame) if frame.id == function_id) {
            return Err(DataSpecError::InvalidCommand { command });
        }
        if structure_ids.len() != arity {
            return Err(DataSpecError::WrongParameterNumber {
                function: function_id as u32,
                expected: arity,
                actual: structure_ids.len(),
            });
        }
        for (i, id) in structure_ids.iter().enumerate() {
            if structure_ids[..i].contains(id) {
                return Err(DataSpecError::DuplicateParameter {
                    command,
                    args: structure_ids.to_vec(),
                });
            }
            self.structure(*id, command)?;
        }

        let word = CommandWord::new(command, 1).with_field(
            CONSTRUCT_ID_SHIFT,
            FUNCTION_ID_MASK,
            function_id as u32,
        );
        let text = format!("CONSTRUCT id={function_id} args={structure_ids:?}");
        let mut emission = Emission::command(word, text);
        if !structure_ids.is_empty() {
            let packed = structure_ids
                .iter()
                .enumerate()
                .fold(0u32, |packed, (i, &id)| {
                    packed | ((id as u32 & ARG_ID_MASK) << (ARG_ID_BITS * i as u32))
                });
            emission = emission.word(packed);
        }
        self.emit(emission)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    pub fn write_value(&mut self, value: impl Into<Value>, data_type: DataType) -> Result<()> {
        self.write_repeated_value(value, Operand::from(1u8), data_type)
    }

    /// Write `value` `repeats` times; `repeats` is 1-255 or a register
    pub fn write_repeated_value(
        &mut self,
        value: impl Into<Value>,
        repeats: Operand,
        data_type: DataType,
    ) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::Write;
        let value = value.into();
        self.require_focus(command)?;
        let bits = data_type.encode_bits(value, command)?;
        let word = with_repeats(
            CommandWord::new(command, 1).with_data_len(data_type.size()),
            repeats,
            command,
        )?;
        self.emit(
            Emission::command(
                word,
                format!("WRITE data={value} dataType={data_type} repeats={repeats}"),
            )
            .value_bits(bits, data_type.size() == 8),
        )
    }

    /// Write the contents of a register, truncated or sign-extended to the
    /// size of `data_type`
    pub fn write_value_from_register(
        &mut self,
        register_id: u8,
        repeats: Operand,
        data_type: DataType,
    ) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::Write;
        self.require_focus(command)?;
        check_register(register_id, command)?;
        let word = with_repeats(
            CommandWord::new(command, 1)
                .with_src1(register_id)
                .with_data_len(data_type.size()),
            repeats,
            command,
        )?;
        self.emit(Emission::command(
            word,
            format!("WRITE data=reg[{register_id}] dataType={data_type} repeats={repeats}"),
        ))
    }

    /// Write packed elements; the total size must be a whole number of words
    pub fn write_array<V: Into<Value> + Copy>(&mut self, values: &[V], data_type: DataType) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::WriteArray;
        self.require_focus(command)?;
        let total = values.len() as u64 * data_type.size() as u64;
        if total % 4 != 0 || total > u32::MAX as u64 {
            return Err(DataSpecError::UnknownTypeLength {
                size: total.min(u32::MAX as u64) as u32,
                command,
            });
        }

        let mut payload = Vec::with_capacity(total as usize);
        for value in values {
            payload.extend(data_type.encode((*value).into(), command)?);
        }
        let word = CommandWord::new(command, 1).with_field(0, NIBBLE_MASK, data_type.size());
        self.emit(
            Emission::command(
                word,
                format!("WRITE_ARRAY {} elements dataType={data_type}", values.len()),
            )
            .word(values.len() as u32)
            .payload(payload),
        )
    }

    // ========================================================================
    // Control flow
    // ========================================================================

    pub fn switch_write_focus(&mut self, region: Operand) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::SwitchFocus;
        let (word, focus) = match region {
            Operand::Register(register) => (
                CommandWord::new(command, 1).with_src1(check_register(register, command)?),
                Focus::Dynamic,
            ),
            Operand::Immediate(v) => {
                let id = literal(v, "memory region", 0, MAX_MEM_REGIONS as i128 - 1, command)? as u8;
                let info = self.regions.get(id as u32, command)?;
                if info.unfilled {
                    return Err(DataSpecError::RegionUnfilled {
                        region: id as u32,
                        command,
                    });
                }
                (
                    CommandWord::new(command, 1).with_field(SRC1_SHIFT, NIBBLE_MASK, id as u32),
                    Focus::Region(id),
                )
            }
        };
        self.emit(Emission::command(word, format!("SWITCH_FOCUS memRegion={region}")))?;
        self.focus = focus;
        Ok(())
    }

    /// Open a counted loop: `counter = start; do { body; counter += increment } while counter < end`
    pub fn start_loop(
        &mut self,
        counter_register_id: u8,
        start: Operand,
        end: Operand,
        increment: Operand,
    ) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::Loop;
        check_register(counter_register_id, command)?;
        let mut word = CommandWord::new(command, 1).with_field(0, NIBBLE_MASK, counter_register_id as u32);
        let mut immediates = Vec::new();
        let placements: [(Operand, fn(CommandWord, u8) -> CommandWord); 3] = [
            (start, CommandWord::with_dest),
            (end, CommandWord::with_src1),
            (increment, CommandWord::with_src2),
        ];
        for (operand, place) in placements {
            match operand {
                Operand::Register(register) => {
                    word = place(word, check_register(register, command)?);
                }
                Operand::Immediate(v) => immediates.push(signed_word(v, "loop bound", command)?),
            }
        }

        let text = format!(
            "LOOP counter=reg[{counter_register_id}] start={start} end={end} increment={increment}"
        );
        let emission = immediates
            .into_iter()
            .fold(Emission::command(word, text), Emission::word)
            .indent(Indent::Open);
        self.emit(emission)?;
        self.loop_depth += 1;
        Ok(())
    }

    pub fn break_loop(&mut self) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::BreakLoop;
        if self.loop_depth == 0 {
            return Err(DataSpecError::InvalidCommand { command });
        }
        self.emit(Emission::command(CommandWord::new(command, 1), "BREAK_LOOP"))
    }

    pub fn end_loop(&mut self) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::EndLoop;
        if self.loop_depth == 0 {
            return Err(DataSpecError::InvalidCommand { command });
        }
        self.emit(
            Emission::command(CommandWord::new(command, 1), "END_LOOP").indent(Indent::Close),
        )?;
        self.loop_depth -= 1;
        Ok(())
    }

    /// Open a conditional block; unary conditions take no `value`
    pub fn start_conditional(
        &mut self,
        register_id: u8,
        condition: Condition,
        value: Option<Operand>,
    ) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::If;
        check_register(register_id, command)?;
        let word = CommandWord::new(command, 1)
            .with_src1(register_id)
            .with_field(0, NIBBLE_MASK, condition as u32);
        let emission = match (condition.is_unary(), value) {
            (true, None) => Emission::command(word, format!("IF reg[{register_id}] {condition}")),
            (false, Some(operand)) => {
                let text = format!("IF reg[{register_id}] {condition} {operand}");
                match operand {
                    Operand::Register(register) => {
                        Emission::command(word.with_src2(check_register(register, command)?), text)
                    }
                    Operand::Immediate(v) => {
                        Emission::command(word, text).word(signed_word(v, "condition value", command)?)
                    }
                }
            }
            (true, Some(_)) => {
                return Err(DataSpecError::syntax(
                    command,
                    format!("condition {condition} takes no operand"),
                ))
            }
            (false, None) => {
                return Err(DataSpecError::syntax(
                    command,
                    format!("condition {condition} needs an operand"),
                ))
            }
        };
        self.emit(emission.indent(Indent::Open))?;
        self.conditionals.push(false);
        Ok(())
    }

    pub fn else_conditional(&mut self) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::Else;
        if self.conditionals.last() != Some(&false) {
            return Err(DataSpecError::InvalidCommand { command });
        }
        self.emit(Emission::command(CommandWord::new(command, 1), "ELSE").indent(Indent::Reopen))?;
        if let Some(else_seen) = self.conditionals.last_mut() {
            *else_seen = true;
        }
        Ok(())
    }

    pub fn end_conditional(&mut self) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::EndIf;
        if self.conditionals.is_empty() {
            return Err(DataSpecError::InvalidCommand { command });
        }
        self.emit(Emission::command(CommandWord::new(command, 1), "END_IF").indent(Indent::Close))?;
        self.conditionals.pop();
        Ok(())
    }

    // ========================================================================
    // Registers and the write pointer
    // ========================================================================

    /// MV: load a register from another register or a literal of at most 4 bytes
    pub fn set_register_value(
        &mut self,
        register_id: u8,
        value: Operand,
        data_type: DataType,
    ) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::Mv;
        check_register(register_id, command)?;
        let word = CommandWord::new(command, 1).with_dest(register_id);
        let text = format!("MV reg[{register_id}] = {value}");
        let emission = match value {
            Operand::Register(source) => {
                check_register(source, command)?;
                if source == register_id {
                    return Err(DataSpecError::DuplicateParameter {
                        command,
                        args: vec![register_id, source],
                    });
                }
                Emission::command(word.with_src1(source), text)
            }
            Operand::Immediate(v) => {
                if data_type.size() > 4 {
                    return Err(DataSpecError::InvalidSize {
                        data_type,
                        size: data_type.size(),
                        command,
                    });
                }
                let bits = data_type.encode_bits(v, command)?;
                Emission::command(word, text).word(data_type.register_word(bits))
            }
        };
        self.emit(emission)
    }

    /// GET_WR_PTR: store the current write pointer in a register
    pub fn save_write_pointer(&mut self, register_id: u8) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::GetWrPtr;
        self.require_focus(command)?;
        check_register(register_id, command)?;
        self.emit(Emission::command(
            CommandWord::new(command, 1).with_dest(register_id),
            format!("GET_WR_PTR dest=reg[{register_id}]"),
        ))
    }

    pub fn set_write_pointer(&mut self, address: Operand, relative: bool) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::SetWrPtr;
        self.require_focus(command)?;
        let word = CommandWord::new(command, 1).with_flag(RELATIVE_SHIFT, relative);
        let mode = if relative { "RELATIVE" } else { "ABSOLUTE" };
        let text = format!("SET_WR_PTR {address} {mode}");
        let emission = match address {
            Operand::Register(register) => {
                Emission::command(word.with_src1(check_register(register, command)?), text)
            }
            Operand::Immediate(v) if relative => {
                Emission::command(word, text).word(signed_word(v, "write pointer offset", command)?)
            }
            Operand::Immediate(v) => {
                let offset = literal(v, "write pointer", 0, u32::MAX as i128, command)? as u32;
                if let (Focus::Region(region), None) = (self.focus, &self.function) {
                    let size = self.regions.get(region as u32, command)?.size;
                    if offset > size {
                        return Err(DataSpecError::RegionOutOfBounds {
                            region: region as u32,
                            size,
                            offset: offset as i64,
                            command,
                        });
                    }
                }
                Emission::command(word, text).word(offset)
            }
        };
        self.emit(emission)
    }

    /// Round the write pointer up to a multiple of `2^log_block_size`
    pub fn align_write_pointer(
        &mut self,
        log_block_size: Operand,
        return_register_id: Option<u8>,
    ) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::AlignWrPtr;
        self.require_focus(command)?;
        let mut word = match log_block_size {
            Operand::Register(register) => {
                CommandWord::new(command, 1).with_src1(check_register(register, command)?)
            }
            Operand::Immediate(v) => {
                let k = literal(v, "log block size", 0, 31, command)?;
                CommandWord::new(command, 1).with_field(0, ALIGN_MASK, k as u32)
            }
        };
        let mut text = format!("ALIGN_WR_PTR to 2^{log_block_size} bytes");
        if let Some(register) = return_register_id {
            word = word.with_dest(check_register(register, command)?);
            text.push_str(&format!(" returning to reg[{register}]"));
        }
        self.emit(Emission::command(word, text))
    }

    /// ARITH_OP: `dest = op1 <operation> op2`, wrapping at 32 bits
    pub fn call_arithmetic_operation(
        &mut self,
        destination_id: u8,
        operand_1: Operand,
        operation: ArithmeticOperation,
        operand_2: Operand,
        signed: bool,
    ) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::ArithOp;
        check_register(destination_id, command)?;
        let word = CommandWord::new(command, 1)
            .with_dest(destination_id)
            .with_flag(SIGNED_SHIFT, signed)
            .with_field(0, NIBBLE_MASK, operation as u32);
        let kind = if signed { "signed" } else { "unsigned" };
        let text = format!(
            "ARITH_OP reg[{destination_id}] = {operand_1} {} {operand_2} ({kind})",
            operation.symbol()
        );
        let emission = binary_operands(word, text, operand_1, Some(operand_2), signed, command)?;
        self.emit(emission)
    }

    /// LOGIC_OP with two operands; use [`Generator::logical_not`] for NOT
    pub fn call_logic_operation(
        &mut self,
        destination_id: u8,
        operand_1: Operand,
        operation: LogicOperation,
        operand_2: Operand,
    ) -> Result<()> {
        self.ensure_open()?;
        if operation.is_unary() {
            return Err(DataSpecError::InvalidOperation {
                kind: "binary logic",
                value: operation as u32,
                command: Opcode::LogicOp,
            });
        }
        self.logic(destination_id, operand_1, operation, Some(operand_2))
    }

    pub fn logical_not(&mut self, destination_id: u8, operand: Operand) -> Result<()> {
        self.ensure_open()?;
        self.logic(destination_id, operand, LogicOperation::Not, None)
    }

    fn logic(
        &mut self,
        destination_id: u8,
        operand_1: Operand,
        operation: LogicOperation,
        operand_2: Option<Operand>,
    ) -> Result<()> {
        let command = Opcode::LogicOp;
        check_register(destination_id, command)?;
        let word = CommandWord::new(command, 1)
            .with_dest(destination_id)
            .with_field(0, NIBBLE_MASK, operation as u32);
        let text = match operand_2 {
            Some(operand_2) => format!(
                "LOGIC_OP reg[{destination_id}] = {operand_1} {} {operand_2}",
                operation.symbol()
            ),
            None => format!("LOGIC_OP reg[{destination_id}] = ~{operand_1}"),
        };
        let emission = binary_operands(word, text, operand_1, operand_2, false, command)?;
        self.emit(emission)
    }

    // ========================================================================
    // Print
    // ========================================================================

    pub fn print_value(&mut self, value: Operand, data_type: DataType) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::PrintVal;
        let word = CommandWord::new(command, 1).with_data_len(data_type.size());
        let text = format!("PRINT_VAL {value} dataType={data_type}");
        let emission = match value {
            Operand::Register(register) => {
                Emission::command(word.with_src1(check_register(register, command)?), text)
            }
            Operand::Immediate(v) => {
                let bits = data_type.encode_bits(v, command)?;
                Emission::command(word, text).value_bits(bits, data_type.size() == 8)
            }
        };
        self.emit(emission)
    }

    pub fn print_text(&mut self, text: &str) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::PrintTxt;
        let bytes = text.as_bytes();
        if bytes.is_empty() || bytes.len() > MAX_PRINT_TEXT_BYTES {
            return Err(DataSpecError::out_of_bounds(
                "text length",
                bytes.len(),
                1,
                MAX_PRINT_TEXT_BYTES,
                command,
            ));
        }
        let word = CommandWord::new(command, 1).with_field(0, BYTE_MASK, bytes.len() as u32 - 1);
        self.emit(Emission::command(word, format!("PRINT_TXT \"{text}\"")).padded_operand(bytes))
    }

    pub fn print_struct(&mut self, structure: Operand) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::PrintStruct;
        let word = match structure {
            Operand::Register(register) => {
                CommandWord::new(command, 1).with_src1(check_register(register, command)?)
            }
            Operand::Immediate(v) => {
                let id = literal(v, "structure id", 0, MAX_STRUCT_SLOTS as i128 - 1, command)? as u8;
                self.structure(id, command)?;
                CommandWord::new(command, 1).with_field(0, NIBBLE_MASK, id as u32)
            }
        };
        self.emit(Emission::command(word, format!("PRINT_STRUCT {structure}")))
    }

    // ========================================================================
    // End
    // ========================================================================

    /// Emit END_SPEC; with `close` the writers are flushed and the generator
    /// refuses any further call
    pub fn end_specification(&mut self, close: bool) -> Result<()> {
        self.ensure_open()?;
        let command = Opcode::EndSpec;
        self.emit(
            Emission::command(CommandWord::new(command, 1), "END_SPEC")
                .word(END_SPEC_EXECUTOR as u32),
        )?;
        if close {
            self.spec_writer.flush().map_err(DataSpecError::DataWrite)?;
            if let Some(report) = self.report_writer.as_mut() {
                report.flush().map_err(DataSpecError::DataWrite)?;
            }
            self.closed = true;
        }
        Ok(())
    }
}

// ============================================================================
// Operand helpers
// ============================================================================

fn check_register(id: u8, command: Opcode) -> Result<u8> {
    if id as usize >= MAX_REGISTERS {
        return Err(DataSpecError::out_of_bounds(
            SlotKind::Register.id_name(),
            id,
            0,
            MAX_REGISTERS - 1,
            command,
        ));
    }
    Ok(id)
}

/// Whole number within `[min, max]`
fn literal(value: Value, param: &'static str, min: i128, max: i128, command: Opcode) -> Result<i128> {
    let whole = match value {
        Value::Integer(v) => Some(v),
        Value::Real(v) if v.is_finite() && v.fract() == 0.0 => Some(v as i128),
        Value::Real(_) => None,
    };
    match whole {
        Some(v) if v >= min && v <= max => Ok(v),
        _ => Err(DataSpecError::out_of_bounds(param, value, min, max, command)),
    }
}

fn signed_word(value: Value, param: &'static str, command: Opcode) -> Result<u32> {
    Ok(literal(value, param, i32::MIN as i128, i32::MAX as i128, command)? as i32 as u32)
}

fn unsigned_word(value: Value, param: &'static str, command: Opcode) -> Result<u32> {
    Ok(literal(value, param, 0, u32::MAX as i128, command)? as u32)
}

/// Set the repeat count of a WRITE: a register in src2 or a literal low byte
fn with_repeats(word: CommandWord, repeats: Operand, command: Opcode) -> Result<CommandWord> {
    match repeats {
        Operand::Register(register) => Ok(word.with_src2(check_register(register, command)?)),
        Operand::Immediate(v) => {
            let n = literal(v, "repeats", 1, 255, command)?;
            Ok(word.with_field(0, BYTE_MASK, n as u32))
        }
    }
}

/// Place two operands in src1/src2 or as trailing immediates
fn binary_operands(
    mut word: CommandWord,
    text: String,
    operand_1: Operand,
    operand_2: Option<Operand>,
    signed: bool,
    command: Opcode,
) -> Result<Emission> {
    let immediate = |v: Value| {
        if signed {
            signed_word(v, "operand", command)
        } else {
            unsigned_word(v, "operand", command)
        }
    };
    let mut immediates = Vec::with_capacity(2);
    match operand_1 {
        Operand::Register(register) => word = word.with_src1(check_register(register, command)?),
        Operand::Immediate(v) => immediates.push(immediate(v)?),
    }
    match operand_2 {
        Some(Operand::Register(register)) => {
            word = word.with_src2(check_register(register, command)?)
        }
        Some(Operand::Immediate(v)) => immediates.push(immediate(v)?),
        None => {}
    }
    Ok(immediates
        .into_iter()
        .fold(Emission::command(word, text), Emission::word))
}
