//! Second pass: statement to machine words.
//!
//! Each base instruction maps to one format helper (R, I, S, B, U, J).
//! Pseudo instructions expand here; only `li` can emit more than one word.

use std::collections::HashMap;

use crate::isa::abi::{REG_RA, REG_ZERO};
use crate::isa::asm::AsmError;
use crate::isa::asm::parser::{Operand, Statement};
use crate::isa::encoding::{funct3, funct7, mext, opcodes, system};

/// Label name to absolute address.
pub type SymbolTable = HashMap<String, u64>;

/// Encoding of `fence iorw, iorw`.
const FENCE_ALL: u32 = 0x0FF0_000F;

/// Returns the number of words `stmt` will encode to.
pub fn word_count(stmt: &Statement, line: usize) -> Result<usize, AsmError> {
    if stmt.mnemonic != "li" {
        return Ok(1);
    }
    match stmt.operands.as_slice() {
        [Operand::Register(_), Operand::Immediate(v)] if fits_signed(*v, 12) => Ok(1),
        [Operand::Register(_), Operand::Immediate(v)] if i32::try_from(*v).is_ok() => Ok(2),
        [Operand::Register(_), Operand::Immediate(v)] => Err(AsmError::new(
            line,
            format!("immediate {v:#x} does not fit in 32 bits"),
        )),
        _ => Err(AsmError::new(line, "li expects a register and an immediate")),
    }
}

/// Encodes `stmt` located at `address`.
pub fn encode(
    stmt: &Statement,
    address: u64,
    symbols: &SymbolTable,
    line: usize,
) -> Result<Vec<u32>, AsmError> {
    let ctx = Ctx { stmt, address, symbols, line };
    let ops = stmt.operands.as_slice();
    let m = stmt.mnemonic.as_str();

    if let Some(word) = ctx.r_type(m)? {
        return Ok(vec![word]);
    }

    let word = match m {
        "addi" | "slti" | "sltiu" | "xori" | "ori" | "andi" | "addiw" => {
            let (rd, rs1, imm) = ctx.reg_reg_imm()?;
            let f3 = match m {
                "addi" | "addiw" => funct3::ADD_SUB,
                "slti" => funct3::SLT,
                "sltiu" => funct3::SLTU,
                "xori" => funct3::XOR,
                "ori" => funct3::OR,
                _ => funct3::AND,
            };
            let op = if m == "addiw" { opcodes::OP_IMM_32 } else { opcodes::OP_IMM };
            i_type(op, rd, f3, rs1, ctx.imm12(imm)?)
        }
        "slli" | "srli" | "srai" | "slliw" | "srliw" | "sraiw" => {
            let (rd, rs1, shamt) = ctx.reg_reg_imm()?;
            let word = m.ends_with('w');
            let limit = if word { 32 } else { 64 };
            if !(0..limit).contains(&shamt) {
                return Err(ctx.error(format!("shift amount {shamt} out of range")));
            }
            let f3 = if m.starts_with("sll") { funct3::SLL } else { funct3::SRL_SRA };
            let hi = if m.starts_with("sra") { 0x400 } else { 0 };
            let op = if word { opcodes::OP_IMM_32 } else { opcodes::OP_IMM };
            i_type(op, rd, f3, rs1, shamt as u32 | hi)
        }
        "lb" | "lh" | "lw" | "ld" | "lbu" | "lhu" | "lwu" => {
            let (rd, offset, base) = ctx.reg_mem()?;
            let f3 = match m {
                "lb" => funct3::LB,
                "lh" => funct3::LH,
                "lw" => funct3::LW,
                "ld" => funct3::LD,
                "lbu" => funct3::LBU,
                "lhu" => funct3::LHU,
                _ => funct3::LWU,
            };
            i_type(opcodes::OP_LOAD, rd, f3, base, ctx.imm12(offset)?)
        }
        "sb" | "sh" | "sw" | "sd" => {
            let (rs2, offset, base) = ctx.reg_mem()?;
            let f3 = match m {
                "sb" => funct3::SB,
                "sh" => funct3::SH,
                "sw" => funct3::SW,
                _ => funct3::SD,
            };
            s_type(f3, base, rs2, ctx.imm12(offset)?)
        }
        "beq" | "bne" | "blt" | "bge" | "bltu" | "bgeu" => {
            let [Operand::Register(rs1), Operand::Register(rs2), target] = ops else {
                return Err(ctx.error(format!("{m} expects two registers and a target")));
            };
            let f3 = match m {
                "beq" => funct3::BEQ,
                "bne" => funct3::BNE,
                "blt" => funct3::BLT,
                "bge" => funct3::BGE,
                "bltu" => funct3::BLTU,
                _ => funct3::BGEU,
            };
            b_type(f3, *rs1, *rs2, ctx.branch_offset(target, 13)?)
        }
        "beqz" | "bnez" => {
            let [Operand::Register(rs1), target] = ops else {
                return Err(ctx.error(format!("{m} expects a register and a target")));
            };
            let f3 = if m == "beqz" { funct3::BEQ } else { funct3::BNE };
            b_type(f3, *rs1, REG_ZERO, ctx.branch_offset(target, 13)?)
        }
        "jal" => match ops {
            [target] => j_type(REG_RA, ctx.branch_offset(target, 21)?),
            [Operand::Register(rd), target] => j_type(*rd, ctx.branch_offset(target, 21)?),
            _ => return Err(ctx.error("jal expects [rd,] target")),
        },
        "j" | "call" => {
            let [target] = ops else {
                return Err(ctx.error(format!("{m} expects a target")));
            };
            let rd = if m == "call" { REG_RA } else { REG_ZERO };
            j_type(rd, ctx.branch_offset(target, 21)?)
        }
        "jalr" => {
            let (rd, rs1, imm) = match ops {
                [Operand::Register(rs1)] => (REG_RA, *rs1, 0),
                [Operand::Register(rd), Operand::Memory { offset, base }] => (*rd, *base, *offset),
                [Operand::Register(rd), Operand::Register(rs1), Operand::Immediate(imm)] => {
                    (*rd, *rs1, *imm)
                }
                _ => return Err(ctx.error("jalr expects rd, offset(rs1)")),
            };
            i_type(opcodes::OP_JALR, rd, funct3::JALR, rs1, ctx.imm12(imm)?)
        }
        "jr" => {
            let [Operand::Register(rs1)] = ops else {
                return Err(ctx.error("jr expects a register"));
            };
            i_type(opcodes::OP_JALR, REG_ZERO, funct3::JALR, *rs1, 0)
        }
        "ret" => {
            ctx.no_operands()?;
            i_type(opcodes::OP_JALR, REG_ZERO, funct3::JALR, REG_RA, 0)
        }
        "lui" | "auipc" => {
            let [Operand::Register(rd), Operand::Immediate(imm)] = ops else {
                return Err(ctx.error(format!("{m} expects a register and an immediate")));
            };
            if !(0..=0xF_FFFF).contains(imm) {
                return Err(ctx.error(format!("upper immediate {imm:#x} out of range")));
            }
            let op = if m == "lui" { opcodes::OP_LUI } else { opcodes::OP_AUIPC };
            u_type(op, *rd, (*imm as u32) << 12)
        }
        "li" => return ctx.load_immediate(),
        "nop" => {
            ctx.no_operands()?;
            i_type(opcodes::OP_IMM, REG_ZERO, funct3::ADD_SUB, REG_ZERO, 0)
        }
        "mv" | "not" | "neg" | "seqz" | "snez" => {
            let [Operand::Register(rd), Operand::Register(rs)] = ops else {
                return Err(ctx.error(format!("{m} expects two registers")));
            };
            let (rd, rs) = (*rd, *rs);
            match m {
                "mv" => i_type(opcodes::OP_IMM, rd, funct3::ADD_SUB, rs, 0),
                "not" => i_type(opcodes::OP_IMM, rd, funct3::XOR, rs, 0xFFF),
                "seqz" => i_type(opcodes::OP_IMM, rd, funct3::SLTU, rs, 1),
                "neg" => r_type(opcodes::OP_REG, rd, funct3::ADD_SUB, REG_ZERO, rs, funct7::ALT),
                _ => r_type(opcodes::OP_REG, rd, funct3::SLTU, REG_ZERO, rs, funct7::BASE),
            }
        }
        "ecall" | "ebreak" | "fence" => {
            ctx.no_operands()?;
            match m {
                "ecall" => system::ECALL,
                "ebreak" => system::EBREAK,
                _ => FENCE_ALL,
            }
        }
        other => return Err(ctx.error(format!("unknown mnemonic '{other}'"))),
    };
    Ok(vec![word])
}

struct Ctx<'a> {
    stmt: &'a Statement,
    address: u64,
    symbols: &'a SymbolTable,
    line: usize,
}

impl Ctx<'_> {
    fn error(&self, message: impl Into<String>) -> AsmError {
        AsmError::new(self.line, message)
    }

    fn no_operands(&self) -> Result<(), AsmError> {
        if self.stmt.operands.is_empty() {
            Ok(())
        } else {
            Err(self.error(format!("{} takes no operands", self.stmt.mnemonic)))
        }
    }

    fn reg_reg_imm(&self) -> Result<(usize, usize, i64), AsmError> {
        match self.stmt.operands.as_slice() {
            [Operand::Register(rd), Operand::Register(rs1), Operand::Immediate(imm)] => {
                Ok((*rd, *rs1, *imm))
            }
            _ => Err(self.error(format!(
                "{} expects rd, rs1, immediate",
                self.stmt.mnemonic
            ))),
        }
    }

    fn reg_mem(&self) -> Result<(usize, i64, usize), AsmError> {
        match self.stmt.operands.as_slice() {
            [Operand::Register(reg), Operand::Memory { offset, base }] => Ok((*reg, *offset, *base)),
            _ => Err(self.error(format!(
                "{} expects a register and offset(base)",
                self.stmt.mnemonic
            ))),
        }
    }

    fn imm12(&self, value: i64) -> Result<u32, AsmError> {
        if fits_signed(value, 12) {
            Ok((value as u32) & 0xFFF)
        } else {
            Err(self.error(format!("immediate {value} does not fit in 12 bits")))
        }
    }

    /// Resolves a label or absolute address to a pc-relative offset of `bits` width.
    fn branch_offset(&self, target: &Operand, bits: u32) -> Result<i64, AsmError> {
        let absolute = match target {
            Operand::Label(name) => *self
                .symbols
                .get(name)
                .ok_or_else(|| self.error(format!("undefined label '{name}'")))?,
            Operand::Immediate(addr) => *addr as u64,
            _ => return Err(self.error("expected a label or address")),
        };
        let offset = absolute.wrapping_sub(self.address) as i64;
        if offset & 1 != 0 || !fits_signed(offset, bits) {
            return Err(self.error(format!("target {absolute:#x} is out of range")));
        }
        Ok(offset)
    }

    fn r_type(&self, m: &str) -> Result<Option<u32>, AsmError> {
        let (base, word) = m.strip_suffix('w').map_or((m, false), |b| (b, true));
        let (f3, f7) = match base {
            "add" => (funct3::ADD_SUB, funct7::BASE),
            "sub" => (funct3::ADD_SUB, funct7::ALT),
            "sll" => (funct3::SLL, funct7::BASE),
            "srl" => (funct3::SRL_SRA, funct7::BASE),
            "sra" => (funct3::SRL_SRA, funct7::ALT),
            "mul" => (mext::MUL, mext::FUNCT7),
            "div" => (mext::DIV, mext::FUNCT7),
            "divu" => (mext::DIVU, mext::FUNCT7),
            "rem" => (mext::REM, mext::FUNCT7),
            "remu" => (mext::REMU, mext::FUNCT7),
            _ if word => return Ok(None),
            "slt" => (funct3::SLT, funct7::BASE),
            "sltu" => (funct3::SLTU, funct7::BASE),
            "xor" => (funct3::XOR, funct7::BASE),
            "or" => (funct3::OR, funct7::BASE),
            "and" => (funct3::AND, funct7::BASE),
            "mulh" => (mext::MULH, mext::FUNCT7),
            "mulhsu" => (mext::MULHSU, mext::FUNCT7),
            "mulhu" => (mext::MULHU, mext::FUNCT7),
            _ => return Ok(None),
        };
        let [Operand::Register(rd), Operand::Register(rs1), Operand::Register(rs2)] =
            self.stmt.operands.as_slice()
        else {
            return Err(self.error(format!("{m} expects three registers")));
        };
        let op = if word { opcodes::OP_REG_32 } else { opcodes::OP_REG };
        Ok(Some(r_type(op, *rd, f3, *rs1, *rs2, f7)))
    }

    fn load_immediate(&self) -> Result<Vec<u32>, AsmError> {
        let [Operand::Register(rd), Operand::Immediate(value)] = self.stmt.operands.as_slice()
        else {
            return Err(self.error("li expects a register and an immediate"));
        };
        let (rd, value) = (*rd, *value);
        if fits_signed(value, 12) {
            return Ok(vec![i_type(
                opcodes::OP_IMM,
                rd,
                funct3::ADD_SUB,
                REG_ZERO,
                (value as u32) & 0xFFF,
            )]);
        }
        if i32::try_from(value).is_err() {
            return Err(self.error(format!("immediate {value:#x} does not fit in 32 bits")));
        }
        // lui loads hi << 12 sign-extended; addiw adds the signed low part
        let lo = ((value << 52) >> 52) as i32;
        let hi = (value as i32).wrapping_sub(lo) as u32;
        Ok(vec![
            u_type(opcodes::OP_LUI, rd, hi & 0xFFFF_F000),
            i_type(opcodes::OP_IMM_32, rd, funct3::ADD_SUB, rd, (lo as u32) & 0xFFF),
        ])
    }
}

const fn fits_signed(value: i64, bits: u32) -> bool {
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << (bits - 1)) - 1;
    value >= min && value <= max
}

const fn r_type(op: u32, rd: usize, f3: u32, rs1: usize, rs2: usize, f7: u32) -> u32 {
    (f7 << 25) | ((rs2 as u32) << 20) | ((rs1 as u32) << 15) | (f3 << 12) | ((rd as u32) << 7) | op
}

const fn i_type(op: u32, rd: usize, f3: u32, rs1: usize, imm12: u32) -> u32 {
    ((imm12 & 0xFFF) << 20) | ((rs1 as u32) << 15) | (f3 << 12) | ((rd as u32) << 7) | op
}

const fn s_type(f3: u32, rs1: usize, rs2: usize, imm12: u32) -> u32 {
    ((imm12 >> 5) << 25)
        | ((rs2 as u32) << 20)
        | ((rs1 as u32) << 15)
        | (f3 << 12)
        | ((imm12 & 0x1F) << 7)
        | opcodes::OP_STORE
}

const fn b_type(f3: u32, rs1: usize, rs2: usize, offset: i64) -> u32 {
    let imm = offset as u32;
    (((imm >> 12) & 1) << 31)
        | (((imm >> 5) & 0x3F) << 25)
        | ((rs2 as u32) << 20)
        | ((rs1 as u32) << 15)
        | (f3 << 12)
        | (((imm >> 1) & 0xF) << 8)
        | (((imm >> 11) & 1) << 7)
        | opcodes::OP_BRANCH
}

const fn u_type(op: u32, rd: usize, upper: u32) -> u32 {
    (upper & 0xFFFF_F000) | ((rd as u32) << 7) | op
}

const fn j_type(rd: usize, offset: i64) -> u32 {
    let imm = offset as u32;
    (((imm >> 20) & 1) << 31)
        | (((imm >> 1) & 0x3FF) << 21)
        | (((imm >> 11) & 1) << 20)
        | (((imm >> 12) & 0xFF) << 12)
        | ((rd as u32) << 7)
        | opcodes::OP_JAL
}
