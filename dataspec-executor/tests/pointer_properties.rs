//! Property tests for write pointer bookkeeping

use dataspec_executor::{Executor, ExecutorConfig};
use dataspec_generator::{DataType, Generator, GeneratorConfig, Operand, RegionOptions, Value};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
struct Write {
    data_type: DataType,
    value: u64,
    repeats: u8,
}

impl Write {
    fn value(&self) -> Value {
        match self.data_type {
            DataType::Uint8 => Value::from(self.value as u8),
            DataType::Uint16 => Value::from(self.value as u16),
            DataType::Uint32 => Value::from(self.value as u32),
            _ => Value::from(self.value),
        }
    }

    fn expected_bytes(&self) -> Vec<u8> {
        let size = self.data_type.size() as usize;
        let bytes = &self.value.to_le_bytes()[..size];
        bytes.repeat(self.repeats as usize)
    }
}

fn arb_write() -> impl Strategy<Value = Write> {
    let types = prop_oneof![
        Just(DataType::Uint8),
        Just(DataType::Uint16),
        Just(DataType::Uint32),
        Just(DataType::Uint64),
    ];
    (types, any::<u64>(), 1u8..5).prop_map(|(data_type, value, repeats)| Write {
        data_type,
        value,
        repeats,
    })
}

fn run_writes(writes: &[Write], region_size: u32) -> dataspec_executor::ExecutionResult {
    let mut generator = Generator::new(Vec::new(), GeneratorConfig::default());
    generator
        .reserve_memory_region(0, region_size, RegionOptions::default())
        .unwrap();
    generator.switch_write_focus(Operand::from(0u8)).unwrap();
    for write in writes {
        generator
            .write_repeated_value(write.value(), Operand::from(write.repeats), write.data_type)
            .unwrap();
    }
    generator.end_specification(true).unwrap();
    let (spec, _) = generator.into_writers();
    Executor::new(&spec, ExecutorConfig::new(4096)).run().unwrap()
}

proptest! {
    #[test]
    fn test_pointer_advances_by_bytes_written(writes in prop::collection::vec(arb_write(), 1..20)) {
        let expected: Vec<u8> = writes.iter().flat_map(Write::expected_bytes).collect();
        let region_size = (expected.len() as u32 + 3) & !3;

        let result = run_writes(&writes, region_size);
        let region = result.regions[0].unwrap();
        prop_assert_eq!(region.write_pointer as usize, expected.len());
        prop_assert_eq!(region.max_write_pointer as usize, expected.len());

        let data = result.region_data(0).unwrap();
        prop_assert_eq!(&data[..expected.len()], &expected[..]);
        prop_assert!(data[expected.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_overflowing_write_fails(start in 1u32..=8) {
        let mut generator = Generator::new(Vec::new(), GeneratorConfig::default());
        generator.reserve_memory_region(0, 8, RegionOptions::default()).unwrap();
        generator.switch_write_focus(Operand::from(0u8)).unwrap();
        generator.set_write_pointer(Operand::from(start), false).unwrap();
        generator.write_value(0u64, DataType::Uint64).unwrap();
        generator.end_specification(true).unwrap();
        let (spec, _) = generator.into_writers();
        prop_assert!(Executor::new(&spec, ExecutorConfig::new(4096)).run().is_err());
    }
}
