//! Integration tests for the data specification generator
//!
//! Drives the public API end to end and checks the emitted stream with the
//! instruction-set reader.

use dataspec_generator::{
    Condition, DataSpecError, DataType, Generator, GeneratorConfig, Operand, ParameterTarget,
    RegionOptions, StructElement,
};
use dataspec_isa::{Opcode, SlotKind, SpecReader};

fn generator() -> Generator<Vec<u8>, Vec<u8>> {
    Generator::with_report(Vec::new(), Vec::new(), GeneratorConfig::default())
}

/// Opcodes of every command in a stream
fn opcodes(spec: &[u8]) -> Vec<Opcode> {
    let mut reader = SpecReader::new(spec);
    let mut opcodes = Vec::new();
    while !reader.is_at_end() {
        let command = reader.read_command().unwrap();
        reader.skip_operands(&command).unwrap();
        opcodes.push(command.opcode);
    }
    opcodes
}

// ============================================================================
// Streams
// ============================================================================

#[test]
fn test_minimal_stream() {
    let mut g = generator();
    g.end_specification(true).unwrap();
    let (spec, report) = g.into_writers();
    assert_eq!(spec, vec![0x00, 0x00, 0xF0, 0x4F, 0xFF, 0xFF, 0xFF, 0xFF]);
    assert_eq!(String::from_utf8(report.unwrap()).unwrap(), "00000000. END_SPEC\n");
}

#[test]
fn test_stream_is_parseable() {
    let mut g = generator();
    g.reserve_memory_region(0, 64, RegionOptions::default().with_label("params"))
        .unwrap();
    g.reserve_memory_region(1, 32, RegionOptions::unfilled()).unwrap();
    g.switch_write_focus(0u8.into()).unwrap();
    g.define_structure(
        0,
        &[
            StructElement::new(DataType::Uint16).with_value(3u16),
            StructElement::new(DataType::S1615).with_value(0.5),
        ],
    )
    .unwrap();
    g.start_loop(0, 0i32.into(), 4i32.into(), 1i32.into()).unwrap();
    g.start_conditional(0, Condition::Equal, Some(2i32.into()))
        .unwrap();
    g.write_structure(0, 1u8.into()).unwrap();
    g.else_conditional().unwrap();
    g.write_value_from_register(0, 1u8.into(), DataType::Uint32)
        .unwrap();
    g.end_conditional().unwrap();
    g.end_loop().unwrap();
    g.write_array(&[1u16, 2, 3, 4], DataType::Uint16).unwrap();
    g.print_text("done").unwrap();
    g.end_specification(true).unwrap();

    let counter = g.instruction_counter();
    let (spec, _) = g.into_writers();
    assert_eq!(spec.len() as u32, counter);
    assert_eq!(
        opcodes(&spec),
        vec![
            Opcode::Reserve,
            Opcode::Reserve,
            Opcode::SwitchFocus,
            Opcode::StartStruct,
            Opcode::StructElem,
            Opcode::StructElem,
            Opcode::EndStruct,
            Opcode::Loop,
            Opcode::If,
            Opcode::WriteStruct,
            Opcode::Else,
            Opcode::Write,
            Opcode::EndIf,
            Opcode::EndLoop,
            Opcode::WriteArray,
            Opcode::PrintTxt,
            Opcode::EndSpec,
        ]
    );
}

#[test]
fn test_report_indentation() {
    let mut g = generator();
    g.start_conditional(1, Condition::IsZero, None).unwrap();
    g.no_operation().unwrap();
    g.else_conditional().unwrap();
    g.no_operation().unwrap();
    g.end_conditional().unwrap();
    let (_, report) = g.into_writers();
    let report = String::from_utf8(report.unwrap()).unwrap();
    assert_eq!(
        report,
        "00000000. IF reg[1] == 0\n\
         00000004.    NOP\n\
         00000008. ELSE\n\
         0000000C.    NOP\n\
         00000010. END_IF\n"
    );
}

#[test]
fn test_without_report() {
    let mut g = Generator::new(Vec::new(), GeneratorConfig::default());
    g.comment("ignored").unwrap();
    g.no_operation().unwrap();
    let (spec, report) = g.into_writers();
    assert_eq!(spec.len(), 4);
    assert!(report.is_none());
}

// ============================================================================
// Rejected calls leave no trace
// ============================================================================

#[test]
fn test_failed_call_writes_nothing() {
    let mut g = generator();
    g.reserve_memory_region(0, 8, RegionOptions::default()).unwrap();
    g.switch_write_focus(0u8.into()).unwrap();
    let before = g.instruction_counter();

    assert!(g.write_value(256u32, DataType::Uint8).is_err());
    assert!(g.write_value(1.5, DataType::Int32).is_err());
    assert!(g.switch_write_focus(3u8.into()).is_err());
    assert!(g.write_structure(9, 1u8.into()).is_err());
    assert!(g.print_struct(2u8.into()).is_err());

    assert_eq!(g.instruction_counter(), before);
    assert_eq!(g.current_region(), Some(0));
    let (spec, _) = g.into_writers();
    assert_eq!(spec.len() as u32, before);
}

#[test]
fn test_register_out_of_range() {
    let mut g = generator();
    assert!(matches!(
        g.set_register_value(16, 1u32.into(), DataType::Uint32),
        Err(DataSpecError::ParameterOutOfBounds {
            param: "register id",
            ..
        })
    ));
}

#[test]
fn test_region_slot_out_of_range() {
    let mut g = generator();
    assert!(matches!(
        g.reserve_memory_region(16, 4, RegionOptions::default()),
        Err(DataSpecError::ParameterOutOfBounds { .. })
    ));
}

#[test]
fn test_copy_structure_allocates_destination() {
    let mut g = generator();
    g.define_structure(0, &[StructElement::new(DataType::Int32).with_value(-7)])
        .unwrap();
    g.copy_structure(0u8.into(), 3u8.into()).unwrap();
    assert!(matches!(
        g.copy_structure(0u8.into(), 3u8.into()),
        Err(DataSpecError::SlotInUse {
            kind: SlotKind::Structure,
            id: 3
        })
    ));
    assert!(matches!(
        g.copy_structure(0u8.into(), 0u8.into()),
        Err(DataSpecError::DuplicateParameter { .. })
    ));
    // the copy carries the element types of its source
    g.set_structure_value(3, 0, 5i32.into(), DataType::Int32)
        .unwrap();
    assert!(g
        .set_structure_value(3, 0, 5u32.into(), DataType::Uint32)
        .is_err());
}

#[test]
fn test_copy_parameter() {
    let mut g = generator();
    g.define_structure(
        0,
        &[
            StructElement::new(DataType::Uint32).with_value(1u32),
            StructElement::new(DataType::Uint32).with_value(2u32),
            StructElement::new(DataType::Int8).with_value(3i8),
        ],
    )
    .unwrap();
    g.copy_structure_parameter(0, 0, ParameterTarget::Structure { id: 0, index: 1 })
        .unwrap();
    g.copy_structure_parameter(0, 2, ParameterTarget::Register(4))
        .unwrap();
    assert!(matches!(
        g.copy_structure_parameter(0, 0, ParameterTarget::Structure { id: 0, index: 2 }),
        Err(DataSpecError::TypeMismatch { .. })
    ));
    assert!(matches!(
        g.copy_structure_parameter(0, 1, ParameterTarget::Structure { id: 0, index: 1 }),
        Err(DataSpecError::DuplicateParameter { .. })
    ));
}

#[test]
fn test_function_body_restores_focus() {
    let mut g = generator();
    g.reserve_memory_region(2, 8, RegionOptions::default()).unwrap();
    g.switch_write_focus(2u8.into()).unwrap();
    g.start_function(0, &[false]).unwrap();
    g.switch_write_focus(Operand::register(1)).unwrap();
    assert_eq!(g.current_region(), None);
    g.end_function().unwrap();
    assert_eq!(g.current_region(), Some(2));
}

#[test]
fn test_function_must_close_its_blocks() {
    let mut g = generator();
    g.start_function(1, &[]).unwrap();
    g.start_loop(0, 0i32.into(), 1i32.into(), 1i32.into()).unwrap();
    assert!(g.end_function().is_err());
    g.end_loop().unwrap();
    g.end_function().unwrap();
    assert!(matches!(
        g.call_function(1, &[2]),
        Err(DataSpecError::WrongParameterNumber {
            function: 1,
            expected: 0,
            actual: 1
        })
    ));
    g.call_function(1, &[]).unwrap();
}

#[test]
fn test_call_undefined_function() {
    let mut g = generator();
    assert!(matches!(
        g.call_function(4, &[]),
        Err(DataSpecError::NotAllocated {
            kind: SlotKind::Function,
            id: 4,
            ..
        })
    ));
}

#[test]
fn test_open_after_non_closing_end() {
    let mut g = generator();
    g.end_specification(false).unwrap();
    g.no_operation().unwrap();
    assert!(!g.is_closed());
}

#[test]
fn test_align_bounds() {
    let mut g = generator();
    g.reserve_memory_region(0, 64, RegionOptions::default()).unwrap();
    g.switch_write_focus(0u8.into()).unwrap();
    g.align_write_pointer(31u8.into(), Some(2)).unwrap();
    assert!(g.align_write_pointer(32u8.into(), None).is_err());
    g.align_write_pointer(Operand::register(1), None).unwrap();
}
