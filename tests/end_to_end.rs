//! End-to-end tests for the data specification toolchain
//!
//! Each scenario builds a specification with the generator, runs it through
//! the executor with a 400 byte budget, and checks the resulting image.

use dataspec_disassembler::disassemble;
use dataspec_executor::{ExecutionResult, Executor, ExecutorConfig};
use dataspec_generator::{
    DataSpecError, DataType, Generator, GeneratorConfig, Operand, RegionOptions,
};
use dataspec_isa::{CommandWord, Opcode, APPDATA_MAGIC_NUM, DSE_VERSION};

fn spec_of(body: impl FnOnce(&mut Generator<Vec<u8>>) -> dataspec_generator::Result<()>) -> Vec<u8> {
    let mut generator = Generator::new(Vec::new(), GeneratorConfig::default());
    body(&mut generator).expect("generation failed");
    generator.end_specification(true).expect("END_SPEC failed");
    generator.into_writers().0
}

fn execute(spec: &[u8]) -> dataspec_generator::Result<ExecutionResult> {
    Executor::new(spec, ExecutorConfig::new(400)).run()
}

fn word(bytes: &[u8], index: usize) -> u32 {
    let at = index * 4;
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_trivial_specification() {
    let spec = spec_of(|_| Ok(()));
    assert_eq!(spec.len(), 8);

    let result = execute(&spec).unwrap();
    assert_eq!(result.image.len(), 72);
    assert_eq!(word(&result.image, 0), APPDATA_MAGIC_NUM);
    assert_eq!(word(&result.image, 1), DSE_VERSION);
    assert!(result.image[8..].iter().all(|&b| b == 0));
}

#[test]
fn test_simple_layout() {
    let spec = spec_of(|g| {
        g.reserve_memory_region(0, 100, RegionOptions::default())?;
        g.reserve_memory_region(1, 200, RegionOptions::unfilled())?;
        g.reserve_memory_region(2, 4, RegionOptions::default())?;
        g.switch_write_focus(Operand::from(0u8))?;
        g.write_array(&[0u32, 1, 2], DataType::Uint32)?;
        g.set_write_pointer(Operand::from(20u32), false)?;
        g.write_value(4u32, DataType::Uint32)?;
        g.switch_write_focus(Operand::from(2u8))?;
        g.write_value(3u32, DataType::Uint32)?;
        g.set_write_pointer(Operand::from(0u32), false)?;
        g.write_value(10u32, DataType::Uint32)
    });

    let result = execute(&spec).unwrap();
    assert_eq!(result.image.len(), 376);

    let mut table = vec![72, 172, 372];
    table.resize(16, 0);
    assert_eq!(result.pointer_table(), table);

    assert_eq!(
        &result.region_data(0).unwrap()[..24],
        &[0, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0]
    );
    assert_eq!(result.region_data(2).unwrap(), &[0x0A, 0, 0, 0]);
    assert!(result.region_data(1).unwrap().iter().all(|&b| b == 0));
}

#[test]
fn test_register_arithmetic() {
    let spec = spec_of(|g| {
        g.reserve_memory_region(0, 44, RegionOptions::default())?;
        g.switch_write_focus(Operand::from(0u8))?;
        for k in [0x3132_3341u32, 0x3132_3342, 0x3132_3344, 0x3132_3347, 0x3132_334B] {
            g.set_register_value(3, Operand::from(k), DataType::Uint32)?;
            g.write_value_from_register(3, Operand::from(1u8), DataType::Uint32)?;
        }
        g.set_register_value(2, Operand::from(24u32), DataType::Uint32)?;
        g.set_write_pointer(Operand::register(2), false)?;
        g.write_array(&[0x61u8, 0x62, 0x63, 0x64], DataType::Uint8)?;
        g.set_register_value(5, Operand::from(4u32), DataType::Uint32)?;
        g.write_repeated_value(0x70u8, Operand::register(5), DataType::Uint8)?;
        g.write_value(0x7Di64, DataType::Int64)
    });

    let result = execute(&spec).unwrap();
    let mut expected = b"A321B321D321G321K321".to_vec();
    expected.extend_from_slice(&[0; 4]);
    expected.extend_from_slice(b"abcdpppp");
    expected.extend_from_slice(&[0x7D, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(result.region_data(0).unwrap(), &expected[..]);
}

#[test]
fn test_region_overflow() {
    let spec = spec_of(|g| {
        g.reserve_memory_region(0, 4, RegionOptions::default())?;
        g.switch_write_focus(Operand::from(0u8))?;
        g.write_value(1u32, DataType::Uint32)?;
        g.write_value(2u32, DataType::Uint32)
    });

    assert!(matches!(
        execute(&spec),
        Err(DataSpecError::NoMore {
            space_available: 0,
            space_required: 4
        })
    ));
}

#[test]
fn test_reserve_beyond_configured_maximum() {
    let mut generator = Generator::new(Vec::new(), GeneratorConfig::new(400).unwrap());
    let err = generator
        .reserve_memory_region(7, 404, RegionOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        DataSpecError::ParameterOutOfBounds {
            param: "memory size",
            ..
        }
    ));
    // nothing was written for the rejected command
    assert_eq!(generator.instruction_counter(), 0);
    assert_eq!(generator.region_sizes()[7], None);
}

#[test]
fn test_bad_end_spec_trailer() {
    for trailer in [0u32, 1, 0xFFFF_FFFE, 0x7FFF_FFFF] {
        let spec: Vec<u8> = [CommandWord::new(Opcode::EndSpec, 2).raw(), trailer]
            .iter()
            .flat_map(|w| w.to_le_bytes())
            .collect();
        assert!(
            matches!(execute(&spec), Err(DataSpecError::SyntaxError { .. })),
            "trailer {trailer:#x} accepted"
        );
    }
}

// ============================================================================
// Across all three tools
// ============================================================================

#[test]
fn test_generate_execute_disassemble() {
    let spec = spec_of(|g| {
        g.reserve_memory_region(3, 16, RegionOptions::default().with_label("weights"))?;
        g.switch_write_focus(Operand::from(3u8))?;
        g.start_loop(0, Operand::from(0u32), Operand::from(4u32), Operand::from(1u32))?;
        g.call_arithmetic_operation(
            1,
            Operand::register(0),
            dataspec_generator::ArithmeticOperation::Multiply,
            Operand::from(3u32),
            false,
        )?;
        g.write_value_from_register(1, Operand::from(1u8), DataType::Uint32)?;
        g.end_loop()
    });

    let result = execute(&spec).unwrap();
    let values: Vec<u32> = (0..4).map(|i| word(result.region_data(3).unwrap(), i)).collect();
    assert_eq!(values, vec![0, 3, 6, 9]);
    assert_eq!(result.pointer_table()[3], 72);

    let lines = disassemble(&spec).unwrap();
    let mnemonics: Vec<&str> = lines
        .iter()
        .map(|l| l.text.split(' ').next().unwrap_or(""))
        .collect();
    assert_eq!(
        mnemonics,
        vec!["RESERVE", "SWITCH_FOCUS", "LOOP", "ARITH_OP", "WRITE", "END_LOOP", "END_SPEC"]
    );
}

#[test]
fn test_generator_report_lines_up_with_stream() {
    let mut generator =
        Generator::with_report(Vec::new(), Vec::new(), GeneratorConfig::default());
    generator.comment("header").unwrap();
    generator
        .reserve_memory_region(0, 8, RegionOptions::default())
        .unwrap();
    generator.switch_write_focus(Operand::from(0u8)).unwrap();
    generator.write_value(1.5, DataType::S1615).unwrap();
    generator.end_specification(true).unwrap();
    let (spec, report) = generator.into_writers();
    let report = String::from_utf8(report.unwrap()).unwrap();

    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines[0], "header");
    assert!(lines[1].starts_with("00000000. RESERVE"));
    assert!(lines[2].starts_with("00000008. SWITCH_FOCUS"));
    assert!(lines[3].starts_with("0000000C. WRITE"));
    assert_eq!(lines[4], "00000014. END_SPEC");
    assert_eq!(spec.len(), 0x14 + 8);

    let result = execute(&spec).unwrap();
    assert_eq!(result.region_data(0).unwrap()[..4], 49152u32.to_le_bytes());
}
