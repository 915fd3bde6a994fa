//! Opcode and function-code constants for the RV64IM subset.

/// Major opcodes (bits 0-6).
pub mod opcodes {
    /// Load upper immediate.
    pub const OP_LUI: u32 = 0b0110111;
    /// Add upper immediate to PC.
    pub const OP_AUIPC: u32 = 0b0010111;
    /// Jump and link.
    pub const OP_JAL: u32 = 0b1101111;
    /// Jump and link register.
    pub const OP_JALR: u32 = 0b1100111;
    /// Conditional branches.
    pub const OP_BRANCH: u32 = 0b1100011;
    /// Integer loads.
    pub const OP_LOAD: u32 = 0b0000011;
    /// Integer stores.
    pub const OP_STORE: u32 = 0b0100011;
    /// Register-immediate arithmetic.
    pub const OP_IMM: u32 = 0b0010011;
    /// Register-register arithmetic.
    pub const OP_REG: u32 = 0b0110011;
    /// Word register-immediate arithmetic.
    pub const OP_IMM_32: u32 = 0b0011011;
    /// Word register-register arithmetic.
    pub const OP_REG_32: u32 = 0b0111011;
    /// Fences.
    pub const OP_MISC_MEM: u32 = 0b0001111;
    /// `ecall`, `ebreak`.
    pub const OP_SYSTEM: u32 = 0b1110011;
}

/// `funct3` values of the base integer set.
pub mod funct3 {
    /// `beq`.
    pub const BEQ: u32 = 0b000;
    /// `bne`.
    pub const BNE: u32 = 0b001;
    /// `blt`.
    pub const BLT: u32 = 0b100;
    /// `bge`.
    pub const BGE: u32 = 0b101;
    /// `bltu`.
    pub const BLTU: u32 = 0b110;
    /// `bgeu`.
    pub const BGEU: u32 = 0b111;

    /// `lb`.
    pub const LB: u32 = 0b000;
    /// `lh`.
    pub const LH: u32 = 0b001;
    /// `lw`.
    pub const LW: u32 = 0b010;
    /// `ld`.
    pub const LD: u32 = 0b011;
    /// `lbu`.
    pub const LBU: u32 = 0b100;
    /// `lhu`.
    pub const LHU: u32 = 0b101;
    /// `lwu`.
    pub const LWU: u32 = 0b110;

    /// `sb`.
    pub const SB: u32 = 0b000;
    /// `sh`.
    pub const SH: u32 = 0b001;
    /// `sw`.
    pub const SW: u32 = 0b010;
    /// `sd`.
    pub const SD: u32 = 0b011;

    /// `add`/`sub` and `addi`.
    pub const ADD_SUB: u32 = 0b000;
    /// `sll`.
    pub const SLL: u32 = 0b001;
    /// `slt`.
    pub const SLT: u32 = 0b010;
    /// `sltu`.
    pub const SLTU: u32 = 0b011;
    /// `xor`.
    pub const XOR: u32 = 0b100;
    /// Logical and arithmetic right shifts.
    pub const SRL_SRA: u32 = 0b101;
    /// `or`.
    pub const OR: u32 = 0b110;
    /// `and`.
    pub const AND: u32 = 0b111;

    /// `jalr`.
    pub const JALR: u32 = 0b000;
    /// `fence`.
    pub const FENCE: u32 = 0b000;
    /// `ecall`/`ebreak`.
    pub const PRIV: u32 = 0b000;
}

/// `funct7` values distinguishing base and alternate encodings.
pub mod funct7 {
    /// `add`, `srl` and most others.
    pub const BASE: u32 = 0b0000000;
    /// `sub`, `sra`.
    pub const ALT: u32 = 0b0100000;
}

/// Multiply/divide extension.
pub mod mext {
    /// `funct7` shared by every M instruction.
    pub const FUNCT7: u32 = 0b0000001;

    /// `mul`.
    pub const MUL: u32 = 0b000;
    /// `mulh`.
    pub const MULH: u32 = 0b001;
    /// `mulhsu`.
    pub const MULHSU: u32 = 0b010;
    /// `mulhu`.
    pub const MULHU: u32 = 0b011;
    /// `div`.
    pub const DIV: u32 = 0b100;
    /// `divu`.
    pub const DIVU: u32 = 0b101;
    /// `rem`.
    pub const REM: u32 = 0b110;
    /// `remu`.
    pub const REMU: u32 = 0b111;
}

/// Full encodings of the system instructions.
pub mod system {
    /// Environment call.
    pub const ECALL: u32 = 0x0000_0073;
    /// Breakpoint.
    pub const EBREAK: u32 = 0x0010_0073;
}

/// Interrupt number reported for `ecall` when no syscall hook is installed.
pub const INTNO_ECALL: u32 = 8;

/// Interrupt number reported for `ebreak`.
pub const INTNO_BREAKPOINT: u32 = 3;
