//! Fixed-capacity slot tables
//!
//! Every numbered namespace of a specification (regions, structures, RNGs,
//! distributions, functions) is a table of `Option<T>` that owns the
//! allocation and lookup checks.

use crate::error::{DataSpecError, Result, SlotKind};
use crate::Opcode;

#[derive(Clone, Debug)]
pub struct SlotTable<T> {
    kind: SlotKind,
    slots: Vec<Option<T>>,
}

impl<T> SlotTable<T> {
    pub fn new(kind: SlotKind, capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { kind, slots }
    }

    pub fn kind(&self) -> SlotKind {
        self.kind
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Validate an id against the table's capacity
    pub fn check_id(&self, id: u32, command: Opcode) -> Result<usize> {
        let index = id as usize;
        if index >= self.slots.len() {
            return Err(DataSpecError::out_of_bounds(
                self.kind.id_name(),
                id,
                0,
                self.slots.len() - 1,
                command,
            ));
        }
        Ok(index)
    }

    pub fn is_allocated(&self, id: u32) -> bool {
        matches!(self.slots.get(id as usize), Some(Some(_)))
    }

    /// Fail unless the slot is free
    pub fn ensure_free(&self, id: u32, command: Opcode) -> Result<()> {
        let index = self.check_id(id, command)?;
        if self.slots[index].is_some() {
            return Err(DataSpecError::SlotInUse {
                kind: self.kind,
                id,
            });
        }
        Ok(())
    }

    /// Fail unless the slot holds a value
    pub fn ensure_allocated(&self, id: u32, command: Opcode) -> Result<()> {
        self.get(id, command).map(|_| ())
    }

    pub fn allocate(&mut self, id: u32, value: T, command: Opcode) -> Result<&mut T> {
        self.ensure_free(id, command)?;
        Ok(self.slots[id as usize].insert(value))
    }

    pub fn get(&self, id: u32, command: Opcode) -> Result<&T> {
        let index = self.check_id(id, command)?;
        self.slots[index].as_ref().ok_or(DataSpecError::NotAllocated {
            kind: self.kind,
            id,
            command,
        })
    }

    pub fn get_mut(&mut self, id: u32, command: Opcode) -> Result<&mut T> {
        let index = self.check_id(id, command)?;
        let kind = self.kind;
        self.slots[index].as_mut().ok_or(DataSpecError::NotAllocated {
            kind,
            id,
            command,
        })
    }

    /// Empty an allocated slot, returning what it held
    pub fn free(&mut self, id: u32, command: Opcode) -> Result<T> {
        let index = self.check_id(id, command)?;
        self.slots[index].take().ok_or(DataSpecError::NotAllocated {
            kind: self.kind,
            id,
            command,
        })
    }

    /// Store a value whether or not the slot was occupied
    pub fn replace(&mut self, id: u32, value: T, command: Opcode) -> Result<Option<T>> {
        let index = self.check_id(id, command)?;
        Ok(self.slots[index].replace(value))
    }

    /// Exchange two slots, allocated or not
    pub fn swap(&mut self, a: u32, b: u32, command: Opcode) -> Result<()> {
        let a = self.check_id(a, command)?;
        let b = self.check_id(b, command)?;
        self.slots.swap(a, b);
        Ok(())
    }

    /// Overwrite a slot with an allocated or empty state
    pub fn set(&mut self, id: u32, value: Option<T>, command: Opcode) -> Result<Option<T>> {
        let index = self.check_id(id, command)?;
        Ok(std::mem::replace(&mut self.slots[index], value))
    }

    /// Contents of a slot without the allocation check
    pub fn slot(&self, id: u32) -> Option<&T> {
        self.slots.get(id as usize).and_then(Option::as_ref)
    }

    /// Iterate over every slot in id order
    pub fn iter(&self) -> impl Iterator<Item = Option<&T>> {
        self.slots.iter().map(Option::as_ref)
    }

    /// Iterate over allocated slots with their ids
    pub fn allocated(&self) -> impl Iterator<Item = (u32, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|value| (id as u32, value)))
    }
}
