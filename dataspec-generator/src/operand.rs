//! Arguments accepted by the generator API

use dataspec_isa::{DataType, Value};
use std::fmt;

/// A value that is either read from a register or given literally
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Operand {
    Register(u8),
    Immediate(Value),
}

impl Operand {
    pub fn register(id: u8) -> Self {
        Operand::Register(id)
    }

    pub fn immediate(value: impl Into<Value>) -> Self {
        Operand::Immediate(value.into())
    }

    pub fn is_register(&self) -> bool {
        matches!(self, Operand::Register(_))
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Register(id) => write!(f, "reg[{id}]"),
            Operand::Immediate(value) => write!(f, "{value}"),
        }
    }
}

macro_rules! immediate_operand {
    ($($t:ty),*) => {
        $(impl From<$t> for Operand {
            fn from(v: $t) -> Self {
                Operand::Immediate(Value::from(v))
            }
        })*
    };
}

immediate_operand!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Immediate(value)
    }
}

/// One element of a structure definition
#[derive(Clone, Debug, PartialEq)]
pub struct StructElement {
    pub data_type: DataType,
    pub value: Option<Value>,
    pub label: Option<String>,
}

impl StructElement {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            value: None,
            label: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Optional attributes of a region reservation
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegionOptions {
    pub label: Option<String>,
    /// Reserve space without filling it; the executor emits zeros
    pub unfilled: bool,
    /// Informational only
    pub shrink: bool,
}

impl RegionOptions {
    pub fn unfilled() -> Self {
        Self {
            unfilled: true,
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_shrink(mut self, shrink: bool) -> Self {
        self.shrink = shrink;
        self
    }
}

/// Where COPY_PARAM puts the copied element
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParameterTarget {
    Structure { id: u8, index: u8 },
    Register(u8),
}
