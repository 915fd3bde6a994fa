//! Integer ALU for the interpreter.
//!
//! Covers the RV64I register/immediate operations and the M extension. Word
//! (`W`-suffix) variants operate on the low 32 bits and sign-extend the result
//! from bit 31.

use crate::isa::encoding::{funct3, funct7, mext};

/// Shift amount mask for 64-bit shifts.
const SHAMT_MASK_64: u64 = 0x3F;

/// Shift amount mask for word shifts.
const SHAMT_MASK_32: u32 = 0x1F;

/// Integer operations supported by the interpreter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AluOp {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Shift left logical.
    Sll,
    /// Set less than (signed).
    Slt,
    /// Set less than (unsigned).
    Sltu,
    /// Bitwise exclusive or.
    Xor,
    /// Shift right logical.
    Srl,
    /// Shift right arithmetic.
    Sra,
    /// Bitwise or.
    Or,
    /// Bitwise and.
    And,
    /// Multiply, low half.
    Mul,
    /// Multiply high, signed × signed.
    Mulh,
    /// Multiply high, signed × unsigned.
    Mulhsu,
    /// Multiply high, unsigned × unsigned.
    Mulhu,
    /// Signed division.
    Div,
    /// Unsigned division.
    Divu,
    /// Signed remainder.
    Rem,
    /// Unsigned remainder.
    Remu,
}

impl AluOp {
    /// Selects the operation of an `OP`/`OP-32` instruction.
    pub const fn from_reg(f3: u32, f7: u32) -> Option<Self> {
        if f7 == mext::FUNCT7 {
            return Some(match f3 {
                mext::MUL => Self::Mul,
                mext::MULH => Self::Mulh,
                mext::MULHSU => Self::Mulhsu,
                mext::MULHU => Self::Mulhu,
                mext::DIV => Self::Div,
                mext::DIVU => Self::Divu,
                mext::REM => Self::Rem,
                _ => Self::Remu,
            });
        }
        let alt = f7 == funct7::ALT;
        if !alt && f7 != funct7::BASE {
            return None;
        }
        Some(match (f3, alt) {
            (funct3::ADD_SUB, false) => Self::Add,
            (funct3::ADD_SUB, true) => Self::Sub,
            (funct3::SRL_SRA, false) => Self::Srl,
            (funct3::SRL_SRA, true) => Self::Sra,
            (_, true) => return None,
            (funct3::SLL, _) => Self::Sll,
            (funct3::SLT, _) => Self::Slt,
            (funct3::SLTU, _) => Self::Sltu,
            (funct3::XOR, _) => Self::Xor,
            (funct3::OR, _) => Self::Or,
            _ => Self::And,
        })
    }

    /// Selects the operation of an `OP-IMM`/`OP-IMM-32` instruction.
    ///
    /// `imm` is the sign-extended I-type immediate; bit 10 distinguishes `srai` from `srli`.
    pub const fn from_imm(f3: u32, imm: i64) -> Self {
        match f3 {
            funct3::ADD_SUB => Self::Add,
            funct3::SLL => Self::Sll,
            funct3::SLT => Self::Slt,
            funct3::SLTU => Self::Sltu,
            funct3::XOR => Self::Xor,
            funct3::SRL_SRA if (imm >> 10) & 1 != 0 => Self::Sra,
            funct3::SRL_SRA => Self::Srl,
            funct3::OR => Self::Or,
            _ => Self::And,
        }
    }

    /// Returns `true` if the operation exists in a word (`W`) form.
    pub const fn has_word_form(self) -> bool {
        matches!(
            self,
            Self::Add
                | Self::Sub
                | Self::Sll
                | Self::Srl
                | Self::Sra
                | Self::Mul
                | Self::Div
                | Self::Divu
                | Self::Rem
                | Self::Remu
        )
    }
}

/// Sign-extends the low 32 bits of `v`.
#[inline]
const fn sext32(v: u32) -> u64 {
    v as i32 as i64 as u64
}

/// Runs one ALU operation.
///
/// Division by zero and signed overflow follow the RISC-V rules: quotient
/// all-ones, remainder the dividend, `MIN / -1 == MIN`.
pub fn execute(op: AluOp, a: u64, b: u64, word: bool) -> u64 {
    if word {
        return execute_word(op, a as u32, b as u32);
    }
    match op {
        AluOp::Add => a.wrapping_add(b),
        AluOp::Sub => a.wrapping_sub(b),
        AluOp::Sll => a.wrapping_shl((b & SHAMT_MASK_64) as u32),
        AluOp::Slt => u64::from((a as i64) < (b as i64)),
        AluOp::Sltu => u64::from(a < b),
        AluOp::Xor => a ^ b,
        AluOp::Srl => a.wrapping_shr((b & SHAMT_MASK_64) as u32),
        AluOp::Sra => ((a as i64) >> (b & SHAMT_MASK_64)) as u64,
        AluOp::Or => a | b,
        AluOp::And => a & b,
        AluOp::Mul => a.wrapping_mul(b),
        // Signed operands go through i64 so negative values sign-extend into i128.
        AluOp::Mulh => ((i128::from(a as i64) * i128::from(b as i64)) >> 64) as u64,
        AluOp::Mulhsu => ((i128::from(a as i64) * (u128::from(b) as i128)) >> 64) as u64,
        AluOp::Mulhu => ((u128::from(a) * u128::from(b)) >> 64) as u64,
        AluOp::Div if b == 0 => u64::MAX,
        AluOp::Div => (a as i64).wrapping_div(b as i64) as u64,
        AluOp::Divu if b == 0 => u64::MAX,
        AluOp::Divu => a / b,
        AluOp::Rem if b == 0 => a,
        AluOp::Rem => (a as i64).wrapping_rem(b as i64) as u64,
        AluOp::Remu if b == 0 => a,
        AluOp::Remu => a % b,
    }
}

fn execute_word(op: AluOp, a: u32, b: u32) -> u64 {
    let shamt = b & SHAMT_MASK_32;
    match op {
        AluOp::Add => sext32(a.wrapping_add(b)),
        AluOp::Sub => sext32(a.wrapping_sub(b)),
        AluOp::Sll => sext32(a.wrapping_shl(shamt)),
        AluOp::Srl => sext32(a.wrapping_shr(shamt)),
        AluOp::Sra => sext32(((a as i32) >> shamt) as u32),
        AluOp::Mul => sext32(a.wrapping_mul(b)),
        AluOp::Div if b == 0 => u64::MAX,
        AluOp::Div => sext32((a as i32).wrapping_div(b as i32) as u32),
        AluOp::Divu if b == 0 => u64::MAX,
        AluOp::Divu => sext32(a / b),
        // REMW/REMUW by zero return the sign-extended low word of the dividend.
        AluOp::Rem if b == 0 => sext32(a),
        AluOp::Rem => sext32((a as i32).wrapping_rem(b as i32) as u32),
        AluOp::Remu if b == 0 => sext32(a),
        AluOp::Remu => sext32(a % b),
        other => execute(other, u64::from(a), u64::from(b), false),
    }
}
