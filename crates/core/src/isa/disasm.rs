//! Instruction disassembler for the RV64IM subset.
//!
//! Produces a `(mnemonic, operands)` pair per word, using ABI register names
//! and the common aliases (`nop`, `li`, `mv`, `j`, `ret`). Branch and jump
//! targets are rendered as absolute addresses.

use crate::isa::abi::reg_name;
use crate::isa::decode::decode;
use crate::isa::encoding::{funct3, funct7, mext, opcodes, system};
use crate::isa::fields::Decoded;

/// Disassembles the word at `address`, or `None` if it is not a recognised encoding.
pub fn disassemble(inst: u32, address: u64) -> Option<(String, String)> {
    let d = decode(inst);
    let (rd, rs1, rs2) = (reg_name(d.rd), reg_name(d.rs1), reg_name(d.rs2));
    let imm = d.imm;

    let pair = match d.opcode {
        opcodes::OP_LUI => ("lui".into(), format!("{rd}, {:#x}", (imm >> 12) & 0xF_FFFF)),
        opcodes::OP_AUIPC => ("auipc".into(), format!("{rd}, {:#x}", (imm >> 12) & 0xF_FFFF)),
        opcodes::OP_JAL => {
            let target = address.wrapping_add(imm as u64);
            if d.rd == 0 {
                ("j".into(), format!("{target:#x}"))
            } else {
                ("jal".into(), format!("{rd}, {target:#x}"))
            }
        }
        opcodes::OP_JALR if d.funct3 == funct3::JALR => {
            if d.rd == 0 && d.rs1 == 1 && imm == 0 {
                ("ret".into(), String::new())
            } else {
                ("jalr".into(), format!("{rd}, {imm}({rs1})"))
            }
        }
        opcodes::OP_BRANCH => {
            let mn = match d.funct3 {
                funct3::BEQ => "beq",
                funct3::BNE => "bne",
                funct3::BLT => "blt",
                funct3::BGE => "bge",
                funct3::BLTU => "bltu",
                funct3::BGEU => "bgeu",
                _ => return None,
            };
            let target = address.wrapping_add(imm as u64);
            (mn.into(), format!("{rs1}, {rs2}, {target:#x}"))
        }
        opcodes::OP_LOAD => {
            let mn = match d.funct3 {
                funct3::LB => "lb",
                funct3::LH => "lh",
                funct3::LW => "lw",
                funct3::LD => "ld",
                funct3::LBU => "lbu",
                funct3::LHU => "lhu",
                funct3::LWU => "lwu",
                _ => return None,
            };
            (mn.into(), format!("{rd}, {imm}({rs1})"))
        }
        opcodes::OP_STORE => {
            let mn = match d.funct3 {
                funct3::SB => "sb",
                funct3::SH => "sh",
                funct3::SW => "sw",
                funct3::SD => "sd",
                _ => return None,
            };
            (mn.into(), format!("{rs2}, {imm}({rs1})"))
        }
        opcodes::OP_IMM => op_imm(&d, false)?,
        opcodes::OP_IMM_32 => op_imm(&d, true)?,
        opcodes::OP_REG => op_reg(&d, false)?,
        opcodes::OP_REG_32 => op_reg(&d, true)?,
        opcodes::OP_MISC_MEM if d.funct3 == funct3::FENCE => ("fence".into(), String::new()),
        opcodes::OP_SYSTEM => match inst {
            system::ECALL => ("ecall".into(), String::new()),
            system::EBREAK => ("ebreak".into(), String::new()),
            _ => return None,
        },
        _ => return None,
    };
    Some(pair)
}

fn op_imm(d: &Decoded, word: bool) -> Option<(String, String)> {
    let (rd, rs1) = (reg_name(d.rd), reg_name(d.rs1));
    let suffix = if word { "w" } else { "" };
    let imm = d.imm;
    let shamt = if word { imm & 0x1F } else { imm & 0x3F };

    let mn = match d.funct3 {
        funct3::ADD_SUB if !word && d.rs1 == 0 && d.rd == 0 && imm == 0 => {
            return Some(("nop".into(), String::new()));
        }
        funct3::ADD_SUB if !word && d.rs1 == 0 => return Some(("li".into(), format!("{rd}, {imm}"))),
        funct3::ADD_SUB if !word && imm == 0 => return Some(("mv".into(), format!("{rd}, {rs1}"))),
        funct3::ADD_SUB => "addi",
        funct3::SLL => return Some((format!("slli{suffix}"), format!("{rd}, {rs1}, {shamt}"))),
        funct3::SRL_SRA => {
            let mn = if (imm >> 10) & 1 == 0 { "srli" } else { "srai" };
            return Some((format!("{mn}{suffix}"), format!("{rd}, {rs1}, {shamt}")));
        }
        _ if word => return None,
        funct3::SLT => "slti",
        funct3::SLTU => "sltiu",
        funct3::XOR => "xori",
        funct3::OR => "ori",
        _ => "andi",
    };
    Some((format!("{mn}{suffix}"), format!("{rd}, {rs1}, {imm}")))
}

fn op_reg(d: &Decoded, word: bool) -> Option<(String, String)> {
    let operands = format!("{}, {}, {}", reg_name(d.rd), reg_name(d.rs1), reg_name(d.rs2));
    let suffix = if word { "w" } else { "" };

    let mn = if d.funct7 == mext::FUNCT7 {
        match d.funct3 {
            mext::MUL => "mul",
            mext::MULH if !word => "mulh",
            mext::MULHSU if !word => "mulhsu",
            mext::MULHU if !word => "mulhu",
            mext::DIV => "div",
            mext::DIVU => "divu",
            mext::REM => "rem",
            mext::REMU => "remu",
            _ => return None,
        }
    } else {
        match (d.funct3, d.funct7) {
            (funct3::ADD_SUB, funct7::BASE) => "add",
            (funct3::ADD_SUB, funct7::ALT) => "sub",
            (funct3::SLL, funct7::BASE) => "sll",
            (funct3::SRL_SRA, funct7::BASE) => "srl",
            (funct3::SRL_SRA, funct7::ALT) => "sra",
            _ if word => return None,
            (funct3::SLT, funct7::BASE) => "slt",
            (funct3::SLTU, funct7::BASE) => "sltu",
            (funct3::XOR, funct7::BASE) => "xor",
            (funct3::OR, funct7::BASE) => "or",
            (funct3::AND, funct7::BASE) => "and",
            _ => return None,
        }
    };
    Some((format!("{mn}{suffix}"), operands))
}
