//! Executor main loop

use crate::execute::{execute, Flow};
use crate::image::build_image;
use crate::memory::{MemoryRegion, RegionState};
use crate::state::ExecutorState;
use dataspec_isa::{
    DataSpecError, Opcode, Result, SpecReader, APP_PTR_TABLE_BYTE_SIZE,
    APP_PTR_TABLE_HEADER_BYTE_SIZE, DEFAULT_SDRAM_BYTES, MAX_REGISTERS,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Executor configuration
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Bytes the whole image may occupy; also bounds the sum of RESERVE sizes
    pub space_available: u32,

    /// Name reported when a BREAK is executed
    pub source_name: String,

    /// Record every executed command in [`ExecutionResult::trace`]
    pub trace_commands: bool,
}

impl ExecutorConfig {
    pub fn new(space_available: u32) -> Self {
        Self {
            space_available,
            ..Self::default()
        }
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = name.into();
        self
    }

    pub fn with_trace(mut self, trace_commands: bool) -> Self {
        self.trace_commands = trace_commands;
        self
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            space_available: DEFAULT_SDRAM_BYTES,
            source_name: String::from("<memory>"),
            trace_commands: false,
        }
    }
}

/// One executed command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub offset: usize,
    pub opcode: Opcode,
    pub word: u32,
}

/// Execution result
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Header, pointer table and region data
    pub image: Vec<u8>,

    /// Bookkeeping of every region slot at END_SPEC
    pub regions: Vec<Option<RegionState>>,

    pub registers: [u32; MAX_REGISTERS],

    pub commands_executed: u64,

    /// Executed commands in order (if tracing enabled)
    pub trace: Vec<TraceEntry>,
}

impl ExecutionResult {
    /// Pointer table entries as written to the image
    pub fn pointer_table(&self) -> Vec<u32> {
        self.image[APP_PTR_TABLE_HEADER_BYTE_SIZE..APP_PTR_TABLE_BYTE_SIZE]
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    /// Bytes of region `id` inside the image
    pub fn region_data(&self, id: usize) -> Option<&[u8]> {
        let size = self.regions.get(id)?.as_ref()?.size as usize;
        let start = *self.pointer_table().get(id)? as usize;
        self.image.get(start..start + size)
    }
}

/// Data specification executor
pub struct Executor<'a> {
    reader: SpecReader<'a>,
    state: ExecutorState,
    config: ExecutorConfig,
    trace: Vec<TraceEntry>,
    commands_executed: u64,
    halted: bool,
}

impl<'a> Executor<'a> {
    pub fn new(spec: &'a [u8], config: ExecutorConfig) -> Self {
        Self {
            reader: SpecReader::new(spec),
            state: ExecutorState::new(),
            config,
            trace: Vec::new(),
            commands_executed: 0,
            halted: false,
        }
    }

    /// Get current state (for debugging)
    pub fn state(&self) -> &ExecutorState {
        &self.state
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Decode and execute the next command
    pub fn step(&mut self) -> Result<Flow> {
        if self.halted {
            return Ok(Flow::Halt);
        }
        if self.reader.is_at_end() {
            return Err(DataSpecError::syntax(
                self.config.source_name.as_str(),
                "stream ended without END_SPEC",
            ));
        }

        let command = self.reader.read_command()?;
        if self.config.trace_commands {
            self.trace.push(TraceEntry {
                offset: command.offset,
                opcode: command.opcode,
                word: command.word.raw(),
            });
        }
        let flow = execute(&command, &mut self.reader, &mut self.state, &self.config)?;
        self.commands_executed += 1;
        self.halted = flow == Flow::Halt;
        Ok(flow)
    }

    /// Run until END_SPEC and build the image
    pub fn run(mut self) -> Result<ExecutionResult> {
        while self.step()? == Flow::Continue {}

        let image = build_image(&self.state.regions, self.config.space_available)?;
        debug!(
            commands = self.commands_executed,
            image_bytes = image.len(),
            "execution finished"
        );
        Ok(ExecutionResult {
            image,
            regions: self
                .state
                .regions
                .iter()
                .map(|region| region.map(MemoryRegion::state))
                .collect(),
            registers: self.state.registers,
            commands_executed: self.commands_executed,
            trace: self.trace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataspec_isa::CommandWord;

    fn end_spec() -> Vec<u8> {
        [CommandWord::new(Opcode::EndSpec, 2).raw(), u32::MAX]
            .iter()
            .flat_map(|w| w.to_le_bytes())
            .collect()
    }

    #[test]
    fn test_end_spec_only() {
        let spec = end_spec();
        let result = Executor::new(&spec, ExecutorConfig::new(400)).run().unwrap();
        assert_eq!(result.image.len(), APP_PTR_TABLE_BYTE_SIZE);
        assert_eq!(result.commands_executed, 1);
        assert_eq!(result.pointer_table(), vec![0; 16]);
        assert!(result.trace.is_empty());
    }

    #[test]
    fn test_missing_end_spec() {
        let spec = CommandWord::new(Opcode::Nop, 1).to_le_bytes();
        assert!(matches!(
            Executor::new(&spec, ExecutorConfig::default()).run(),
            Err(DataSpecError::SyntaxError { .. })
        ));
    }

    #[test]
    fn test_step_after_halt() {
        let spec = end_spec();
        let mut executor = Executor::new(&spec, ExecutorConfig::default().with_trace(true));
        assert_eq!(executor.step().unwrap(), Flow::Halt);
        assert!(executor.is_halted());
        assert_eq!(executor.step().unwrap(), Flow::Halt);
        assert_eq!(executor.trace.len(), 1);
        assert_eq!(executor.trace[0].opcode, Opcode::EndSpec);
    }
}
