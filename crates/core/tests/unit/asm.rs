//! Assembler Unit Tests.
//!
//! Verifies encodings produced for base instructions and pseudo-instructions,
//! label resolution in both directions, and the diagnostics reported for bad
//! source.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;
use stepwise_core::isa::abi::REG_NAMES;
use stepwise_core::isa::asm::assemble;
use stepwise_core::isa::disasm::disassemble;

const BASE: u64 = 0x4000;

fn words(source: &str) -> Vec<u32> {
    assemble(source, BASE)
        .unwrap()
        .iter()
        .map(|insn| u32::from_le_bytes(insn.bytes[..4].try_into().unwrap()))
        .collect()
}

fn error_line(source: &str) -> usize {
    assemble(source, BASE).unwrap_err().line
}

// ══════════════════════════════════════════════════════════
// 1. Single-word encodings
// ══════════════════════════════════════════════════════════

#[rstest]
#[case("add a0, a1, a2", 0x00C5_8533)]
#[case("sub a0, a1, a2", 0x40C5_8533)]
#[case("addi a0, zero, 10", 0x00A0_0513)]
#[case("addi a0, zero, -1", 0xFFF0_0513)]
#[case("slli a0, a0, 3", 0x0035_1513)]
#[case("sd ra, 8(sp)", 0x0011_3423)]
#[case("ld ra, 8(sp)", 0x0081_3083)]
#[case("ecall", 0x0000_0073)]
#[case("ebreak", 0x0010_0073)]
#[case("ret", 0x0000_8067)]
#[case("nop", 0x0000_0013)]
#[case("li a0, 1", 0x0010_0513)]
#[case("mv a0, a1", 0x0005_8513)]
#[case("mul a0, a1, a2", 0x02C5_8533)]
#[case("addw a0, a1, a2", 0x00C5_853B)]
fn encodes_single_word(#[case] source: &str, #[case] expected: u32) {
    assert_eq!(words(source), [expected]);
}

#[test]
fn mnemonics_are_case_insensitive() {
    assert_eq!(words("ADDI a0, zero, 10"), words("addi a0, zero, 10"));
}

// ══════════════════════════════════════════════════════════
// 2. li expansion
// ══════════════════════════════════════════════════════════

#[test]
fn li_beyond_twelve_bits_expands_to_lui_addiw() {
    // lui a0, 0x12 ; addiw a0, a0, 0x345
    assert_eq!(words("li a0, 0x12345"), [0x0001_2537, 0x3455_051B]);
}

#[test]
fn li_compensates_for_negative_low_part() {
    let insns = assemble("li a0, 0x800", BASE).unwrap();
    assert_eq!(insns.len(), 2);
    assert_eq!(insns[0].text(), "lui a0, 0x1");
    assert_eq!(insns[1].text(), "addiw a0, a0, -2048");
}

#[test]
fn li_outside_i32_is_rejected() {
    let err = assemble("li a0, 0x100000000", BASE).unwrap_err();
    assert_eq!(err.line, 1);
    assert!(err.message.contains("32 bits"), "unexpected message: {err}");
}

#[test]
fn expansion_shifts_following_labels() {
    let source = "li t0, 0x12345\nj done\ndone:\nnop\n";
    let insns = assemble(source, BASE).unwrap();
    assert_eq!(insns.len(), 4);
    assert_eq!(insns[2].text(), "j 0x400c");
    assert_eq!(insns[3].address, 0x400C);
}

// ══════════════════════════════════════════════════════════
// 3. Labels and targets
// ══════════════════════════════════════════════════════════

#[test]
fn backward_branch_to_label() {
    let source = "loop:\n    addi t0, t0, -1\n    bnez t0, loop\n";
    assert_eq!(words(source), [0xFFF2_8293, 0xFE02_9EE3]);
}

#[test]
fn forward_jump_to_label() {
    let insns = assemble("j end\nnop\nend: nop", BASE).unwrap();
    assert_eq!(words("j end\nnop\nend: nop")[0], 0x0080_006F);
    assert_eq!(insns[0].text(), "j 0x4008");
}

#[test]
fn numeric_targets_are_absolute() {
    let insns = assemble("beq a0, a1, 0x4010", BASE).unwrap();
    assert_eq!(insns[0].text(), "beq a0, a1, 0x4010");
    assert_eq!(words("j 0x4000"), [0x0000_006F]);
}

#[test]
fn call_is_a_single_jal_through_ra() {
    let insns = assemble("call f\nnop\nf: ret", BASE).unwrap();
    assert_eq!(insns.len(), 3);
    assert_eq!(insns[0].text(), "jal ra, 0x4008");
}

#[test]
fn several_labels_on_one_line() {
    let insns = assemble("a: b: nop\nj b", BASE).unwrap();
    assert_eq!(insns[1].text(), "j 0x4000");
}

// ══════════════════════════════════════════════════════════
// 4. Layout of the output
// ══════════════════════════════════════════════════════════

#[test]
fn addresses_are_consecutive_from_base() {
    let insns = assemble("# header\nli a0, 1 ; trailing\n\necall\n", BASE).unwrap();
    let addresses: Vec<u64> = insns.iter().map(|i| i.address).collect();
    assert_eq!(addresses, [BASE, BASE + 4]);
    assert_eq!(insns[1].end(), BASE + 8);
}

#[test]
fn instruction_display_shows_address_bytes_and_text() {
    let insns = assemble("li a0, 1", BASE).unwrap();
    assert_eq!(insns[0].to_string(), "0x00004000  13051000  li a0, 1");
}

#[test]
fn empty_source_assembles_to_nothing() {
    assert!(assemble("", BASE).unwrap().is_empty());
    assert!(assemble("# only a comment\n\nlabel:\n", BASE).unwrap().is_empty());
}

// ══════════════════════════════════════════════════════════
// 5. Diagnostics
// ══════════════════════════════════════════════════════════

#[rstest]
#[case("nop\nfrobnicate a0\n", 2)]
#[case("nop\nnop\nj nowhere\n", 3)]
#[case("x: nop\nx: nop\n", 2)]
#[case("addi a0, a0, 4096\n", 1)]
#[case("add a0, a1\n", 1)]
#[case("lw a0, 4(q9)\n", 1)]
#[case("a0: nop\n", 1)]
#[case("nop a0\n", 1)]
#[case("beq a0, a1, 0x4003\n", 1)]
fn reports_line_of_first_error(#[case] source: &str, #[case] line: usize) {
    assert_eq!(error_line(source), line);
}

#[test]
fn error_display_names_the_line() {
    let err = assemble("nop\nbogus\n", BASE).unwrap_err();
    assert_eq!(err.to_string(), "line 2: unknown mnemonic 'bogus'");
}

// ══════════════════════════════════════════════════════════
// 6. Encoder and decoder agreement
// ══════════════════════════════════════════════════════════

fn reg() -> impl Strategy<Value = &'static str> {
    prop::sample::select(REG_NAMES.to_vec())
}

/// Assembles one line and disassembles the word it produced.
fn reassembled(source: &str) -> String {
    let word = words(source)[0];
    let (mnemonic, operands) = disassemble(word, BASE).unwrap();
    format!("{mnemonic} {operands}")
}

proptest! {
    #[test]
    fn register_forms_disassemble_to_their_source(
        op in prop::sample::select(vec!["add", "sub", "and", "or", "xor", "sll", "srl", "sra", "slt", "sltu", "mul", "div", "rem"]),
        rd in reg(),
        rs1 in reg(),
        rs2 in reg(),
    ) {
        let source = format!("{op} {rd}, {rs1}, {rs2}");
        prop_assert_eq!(reassembled(&source), source);
    }

    #[test]
    fn memory_forms_disassemble_to_their_source(
        op in prop::sample::select(vec!["ld", "lw", "lbu", "sd", "sw", "sb"]),
        reg_a in reg(),
        base in reg(),
        offset in -2048i64..2048,
    ) {
        let source = format!("{op} {reg_a}, {offset}({base})");
        prop_assert_eq!(reassembled(&source), source);
    }

    #[test]
    fn branch_targets_survive_reassembly(
        op in prop::sample::select(vec!["beq", "bne", "blt", "bge", "bltu", "bgeu"]),
        rs1 in reg(),
        rs2 in reg(),
        words_away in -1024i64..1024,
    ) {
        let target = BASE.wrapping_add_signed(words_away * 4);
        let source = format!("{op} {rs1}, {rs2}, {target:#x}");
        prop_assert_eq!(reassembled(&source), source);
    }
}
