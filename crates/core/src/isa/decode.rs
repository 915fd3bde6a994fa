//! Instruction decoder.
//!
//! Splits a 32-bit word into a [`Decoded`] record, reassembling and
//! sign-extending the immediate of the I, S, B, U and J formats.

use crate::isa::encoding::opcodes;
use crate::isa::fields::{Decoded, InstructionBits};

/// Decodes one instruction word. Unknown opcodes decode with a zero immediate.
pub fn decode(inst: u32) -> Decoded {
    let opcode = inst.opcode();
    let imm = match opcode {
        opcodes::OP_IMM
        | opcodes::OP_IMM_32
        | opcodes::OP_LOAD
        | opcodes::OP_JALR
        | opcodes::OP_SYSTEM => imm_i(inst),
        opcodes::OP_STORE => imm_s(inst),
        opcodes::OP_BRANCH => imm_b(inst),
        opcodes::OP_LUI | opcodes::OP_AUIPC => imm_u(inst),
        opcodes::OP_JAL => imm_j(inst),
        _ => 0,
    };

    Decoded {
        raw: inst,
        opcode,
        rd: inst.rd(),
        rs1: inst.rs1(),
        rs2: inst.rs2(),
        funct3: inst.funct3(),
        funct7: inst.funct7(),
        imm,
    }
}

/// `imm[11:0]` in bits 20-31.
fn imm_i(inst: u32) -> i64 {
    i64::from((inst as i32) >> 20)
}

/// `imm[11:5]` in bits 25-31, `imm[4:0]` in bits 7-11.
fn imm_s(inst: u32) -> i64 {
    let v = ((inst >> 25) << 5) | ((inst >> 7) & 0x1F);
    sign_extend(v, 12)
}

/// Branch offset, always even.
fn imm_b(inst: u32) -> i64 {
    let v = (((inst >> 31) & 1) << 12)
        | (((inst >> 7) & 1) << 11)
        | (((inst >> 25) & 0x3F) << 5)
        | (((inst >> 8) & 0xF) << 1);
    sign_extend(v, 13)
}

/// Upper 20 bits, already shifted into place.
fn imm_u(inst: u32) -> i64 {
    i64::from((inst & 0xFFFF_F000) as i32)
}

/// Jump offset, always even.
fn imm_j(inst: u32) -> i64 {
    let v = (((inst >> 31) & 1) << 20)
        | (((inst >> 12) & 0xFF) << 12)
        | (((inst >> 20) & 1) << 11)
        | (((inst >> 21) & 0x3FF) << 1);
    sign_extend(v, 21)
}

/// Sign-extends the low `bits` bits of `val`.
const fn sign_extend(val: u32, bits: u32) -> i64 {
    let shift = 32 - bits;
    (((val << shift) as i32) >> shift) as i64
}
