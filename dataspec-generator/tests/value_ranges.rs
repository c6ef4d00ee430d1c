//! Property tests for value validation in WRITE

use dataspec_generator::{DataType, Generator, GeneratorConfig, RegionOptions};
use proptest::prelude::*;

fn focused() -> Generator<Vec<u8>> {
    let mut g = Generator::new(Vec::new(), GeneratorConfig::default());
    g.reserve_memory_region(0, 1024, RegionOptions::default())
        .unwrap();
    g.switch_write_focus(0u8.into()).unwrap();
    g
}

proptest! {
    #[test]
    fn uint16_accepts_exactly_its_range(v in -100_000i64..200_000) {
        let mut g = focused();
        let accepted = g.write_value(v, DataType::Uint16).is_ok();
        prop_assert_eq!(accepted, (0..=0xFFFF).contains(&v));
    }

    #[test]
    fn int8_payload_is_twos_complement(v in i8::MIN..=i8::MAX) {
        let mut g = focused();
        let start = g.instruction_counter() as usize;
        g.write_value(v, DataType::Int8).unwrap();
        let (spec, _) = g.into_writers();
        let operand = u32::from_le_bytes([
            spec[start + 4], spec[start + 5], spec[start + 6], spec[start + 7],
        ]);
        prop_assert_eq!(operand, v as u8 as u32);
    }

    #[test]
    fn reserve_rounds_to_words(size in 1u32..10_000) {
        let mut g = Generator::new(Vec::new(), GeneratorConfig::default());
        g.reserve_memory_region(5, size, RegionOptions::default()).unwrap();
        let reserved = g.region_sizes()[5].unwrap();
        prop_assert!(reserved >= size);
        prop_assert_eq!(reserved % 4, 0);
        prop_assert!(reserved - size < 4);
    }
}
