//! Executor state

use crate::memory::MemoryRegion;
use crate::rng::{MersenneTwister, UniformDistribution};
use dataspec_isa::{
    DataSpecError, DataType, Opcode, Result, SlotKind, SlotTable, MAX_CONSTRUCTORS,
    MAX_MEM_REGIONS, MAX_RANDOM_DISTS, MAX_REGISTERS, MAX_RNGS, MAX_STRUCT_SLOTS,
};

/// One element of a defined structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element {
    pub data_type: DataType,
    /// Encoded value, masked to the type's width
    pub bits: u64,
}

impl Element {
    pub fn new(data_type: DataType, bits: u64) -> Self {
        Element {
            data_type,
            bits: bits & data_type.bit_mask(),
        }
    }

    /// Little-endian wire bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bits.to_le_bytes()[..self.data_type.size() as usize].to_vec()
    }
}

pub type Structure = Vec<Element>;

/// A function body recorded by START_CONSTRUCTOR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Function {
    pub id: u8,
    /// Stream offset of the first command of the body
    pub body: usize,
    pub arity: usize,
    pub read_only: u32,
}

impl Function {
    pub fn is_read_only(&self, argument: usize) -> bool {
        self.read_only & (1 << argument) != 0
    }
}

/// An active LOOP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopFrame {
    pub counter: u8,
    /// Stream offset of the first command of the body
    pub body: usize,
    pub end: u32,
    pub increment: u32,
    /// Compare as signed; set when `end` was an immediate
    pub signed: bool,
    /// Offset just past the matching END_LOOP, once seen
    pub exit: Option<usize>,
    /// Conditional depth when the loop was entered
    pub conditional_depth: usize,
}

impl LoopFrame {
    /// Whether another iteration runs with the counter at `value`
    pub fn continues(&self, value: u32) -> bool {
        if self.signed {
            (value as i32) < (self.end as i32)
        } else {
            value < self.end
        }
    }
}

/// An active CONSTRUCT
#[derive(Debug, Clone)]
pub struct CallFrame {
    pub function: Function,
    pub arguments: Vec<u8>,
    /// Copies of read-only arguments as they were at the call
    pub saved: Vec<Option<Structure>>,
    pub return_to: usize,
    pub loop_depth: usize,
    pub conditional_depth: usize,
}

#[derive(Debug, Clone)]
pub struct ExecutorState {
    pub registers: [u32; MAX_REGISTERS],
    pub regions: SlotTable<MemoryRegion>,
    pub structures: SlotTable<Structure>,
    pub rngs: SlotTable<MersenneTwister>,
    pub distributions: SlotTable<UniformDistribution>,
    pub functions: SlotTable<Function>,
    pub current_region: Option<u8>,
    /// Sum of reserved region sizes
    pub space_allocated: u32,
    pub loops: Vec<LoopFrame>,
    /// Number of IF or ELSE bodies currently being executed
    pub conditional_depth: usize,
    pub calls: Vec<CallFrame>,
}

impl ExecutorState {
    pub fn new() -> Self {
        ExecutorState {
            registers: [0; MAX_REGISTERS],
            regions: SlotTable::new(SlotKind::Region, MAX_MEM_REGIONS),
            structures: SlotTable::new(SlotKind::Structure, MAX_STRUCT_SLOTS),
            rngs: SlotTable::new(SlotKind::Rng, MAX_RNGS),
            distributions: SlotTable::new(SlotKind::RandomDistribution, MAX_RANDOM_DISTS),
            functions: SlotTable::new(SlotKind::Function, MAX_CONSTRUCTORS),
            current_region: None,
            space_allocated: 0,
            loops: Vec::new(),
            conditional_depth: 0,
            calls: Vec::new(),
        }
    }

    #[inline]
    pub fn read_reg(&self, id: u8) -> u32 {
        self.registers[id as usize & (MAX_REGISTERS - 1)]
    }

    #[inline]
    pub fn write_reg(&mut self, id: u8, value: u32) {
        self.registers[id as usize & (MAX_REGISTERS - 1)] = value;
    }

    /// Region selected by SWITCH_FOCUS
    pub fn focused_region(&mut self, command: Opcode) -> Result<(u8, &mut MemoryRegion)> {
        let id = self
            .current_region
            .ok_or(DataSpecError::NoRegionSelected { command })?;
        let region = self.regions.get_mut(id as u32, command)?;
        Ok((id, region))
    }

    /// Structure slot addressed by a structure id
    pub fn structure(&self, id: u32, command: Opcode) -> Result<&Structure> {
        self.structures.get(id, command)
    }

    /// One element of a structure
    pub fn element(&self, id: u32, index: u8, command: Opcode) -> Result<Element> {
        self.structure(id, command)?
            .get(index as usize)
            .copied()
            .ok_or(DataSpecError::NotAllocated {
                kind: SlotKind::Parameter,
                id: index as u32,
                command,
            })
    }

    pub fn element_mut(&mut self, id: u32, index: u8, command: Opcode) -> Result<&mut Element> {
        self.structures
            .get_mut(id, command)?
            .get_mut(index as usize)
            .ok_or(DataSpecError::NotAllocated {
                kind: SlotKind::Parameter,
                id: index as u32,
                command,
            })
    }

    /// Enter a function: argument `i` is swapped into structure slot `i`
    pub fn enter_call(
        &mut self,
        function: Function,
        arguments: Vec<u8>,
        return_to: usize,
        command: Opcode,
    ) -> Result<()> {
        let mut saved = Vec::with_capacity(arguments.len());
        for (i, &argument) in arguments.iter().enumerate() {
            let structure = self.structures.get(argument as u32, command)?;
            saved.push(function.is_read_only(i).then(|| structure.clone()));
            self.structures.swap(i as u32, argument as u32, command)?;
        }
        self.calls.push(CallFrame {
            function,
            arguments,
            saved,
            return_to,
            loop_depth: self.loops.len(),
            conditional_depth: self.conditional_depth,
        });
        Ok(())
    }

    /// Leave the innermost function, returning the offset to resume at
    ///
    /// Read-only arguments get their saved contents back, then each
    /// argument is swapped out of its slot in call order.
    pub fn leave_call(&mut self, command: Opcode) -> Result<usize> {
        let frame = self
            .calls
            .pop()
            .ok_or(DataSpecError::InvalidCommand { command })?;

        for (i, (&argument, saved)) in frame.arguments.iter().zip(frame.saved).enumerate() {
            if let Some(structure) = saved {
                self.structures.set(i as u32, Some(structure), command)?;
            }
            self.structures.swap(i as u32, argument as u32, command)?;
        }

        self.loops.truncate(frame.loop_depth);
        self.conditional_depth = frame.conditional_depth;
        Ok(frame.return_to)
    }
}

impl Default for ExecutorState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word_structure(value: u64) -> Structure {
        vec![Element::new(DataType::Uint32, value)]
    }

    #[test]
    fn test_registers() {
        let mut state = ExecutorState::new();
        state.write_reg(15, 0xDEAD_BEEF);
        assert_eq!(state.read_reg(15), 0xDEAD_BEEF);
        assert_eq!(state.read_reg(0), 0);
    }

    #[test]
    fn test_element_masks_value() {
        let element = Element::new(DataType::Uint8, 0x1FF);
        assert_eq!(element.bits, 0xFF);
        assert_eq!(element.to_bytes(), vec![0xFF]);
    }

    #[test]
    fn test_loop_comparison() {
        let frame = LoopFrame {
            counter: 0,
            body: 0,
            end: 5,
            increment: 1,
            signed: true,
            exit: None,
            conditional_depth: 0,
        };
        assert!(frame.continues(4));
        assert!(!frame.continues(5));
        assert!(frame.continues(u32::MAX)); // -1 < 5
        let unsigned = LoopFrame {
            signed: false,
            ..frame
        };
        assert!(!unsigned.continues(u32::MAX));
    }

    #[test]
    fn test_call_maps_and_writes_back() {
        let mut state = ExecutorState::new();
        state
            .structures
            .allocate(5, word_structure(1), Opcode::StartStruct)
            .unwrap();
        state
            .structures
            .allocate(6, word_structure(2), Opcode::StartStruct)
            .unwrap();
        let function = Function {
            id: 0,
            body: 0,
            arity: 2,
            read_only: 0b10,
        };
        state
            .enter_call(function, vec![5, 6], 40, Opcode::Construct)
            .unwrap();
        assert_eq!(state.element(0, 0, Opcode::WriteStruct).unwrap().bits, 1);
        assert_eq!(state.element(1, 0, Opcode::WriteStruct).unwrap().bits, 2);

        state.element_mut(0, 0, Opcode::WriteParam).unwrap().bits = 10;
        state.element_mut(1, 0, Opcode::WriteParam).unwrap().bits = 20;

        assert_eq!(state.leave_call(Opcode::EndConstructor).unwrap(), 40);
        assert_eq!(state.element(5, 0, Opcode::WriteStruct).unwrap().bits, 10);
        // argument 1 is read-only
        assert_eq!(state.element(6, 0, Opcode::WriteStruct).unwrap().bits, 2);
        assert!(!state.structures.is_allocated(0));
        assert!(!state.structures.is_allocated(1));
    }

    #[test]
    fn test_call_swaps_argument_slots() {
        let mut state = ExecutorState::new();
        state
            .structures
            .allocate(0, word_structure(1), Opcode::StartStruct)
            .unwrap();
        state
            .structures
            .allocate(5, word_structure(5), Opcode::StartStruct)
            .unwrap();
        let function = Function {
            id: 0,
            body: 0,
            arity: 1,
            read_only: 0,
        };
        state
            .enter_call(function, vec![5], 8, Opcode::Construct)
            .unwrap();
        assert_eq!(state.element(0, 0, Opcode::WriteStruct).unwrap().bits, 5);
        assert_eq!(state.element(5, 0, Opcode::WriteStruct).unwrap().bits, 1);

        state.element_mut(5, 0, Opcode::WriteParam).unwrap().bits = 99;
        state.leave_call(Opcode::EndConstructor).unwrap();
        assert_eq!(state.element(0, 0, Opcode::WriteStruct).unwrap().bits, 99);
        assert_eq!(state.element(5, 0, Opcode::WriteStruct).unwrap().bits, 5);
    }

    #[test]
    fn test_leave_without_call() {
        let mut state = ExecutorState::new();
        assert!(matches!(
            state.leave_call(Opcode::EndConstructor),
            Err(DataSpecError::InvalidCommand { .. })
        ));
    }
}
