//! Field extraction from 32-bit instruction words.

/// Opcode field mask (bits 0-6).
pub const OPCODE_MASK: u32 = 0x7F;
/// Register field mask (5 bits).
pub const REG_MASK: u32 = 0x1F;
/// `funct3` field mask.
pub const FUNCT3_MASK: u32 = 0x7;
/// `funct7` field mask.
pub const FUNCT7_MASK: u32 = 0x7F;

/// Accessors for the fixed-position fields of an encoded instruction.
pub trait InstructionBits {
    /// Bits 0-6.
    fn opcode(&self) -> u32;
    /// Destination register, bits 7-11.
    fn rd(&self) -> usize;
    /// First source register, bits 15-19.
    fn rs1(&self) -> usize;
    /// Second source register, bits 20-24.
    fn rs2(&self) -> usize;
    /// Bits 12-14.
    fn funct3(&self) -> u32;
    /// Bits 25-31.
    fn funct7(&self) -> u32;
}

impl InstructionBits for u32 {
    #[inline(always)]
    fn opcode(&self) -> u32 {
        self & OPCODE_MASK
    }

    #[inline(always)]
    fn rd(&self) -> usize {
        ((self >> 7) & REG_MASK) as usize
    }

    #[inline(always)]
    fn rs1(&self) -> usize {
        ((self >> 15) & REG_MASK) as usize
    }

    #[inline(always)]
    fn rs2(&self) -> usize {
        ((self >> 20) & REG_MASK) as usize
    }

    #[inline(always)]
    fn funct3(&self) -> u32 {
        (self >> 12) & FUNCT3_MASK
    }

    #[inline(always)]
    fn funct7(&self) -> u32 {
        (self >> 25) & FUNCT7_MASK
    }
}

/// An instruction word split into its fields, immediate already sign-extended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Decoded {
    /// Raw encoding.
    pub raw: u32,
    /// Major opcode.
    pub opcode: u32,
    /// Destination register index.
    pub rd: usize,
    /// First source register index.
    pub rs1: usize,
    /// Second source register index.
    pub rs2: usize,
    /// `funct3`.
    pub funct3: u32,
    /// `funct7`.
    pub funct7: u32,
    /// Immediate for the instruction's format; zero for R-type.
    pub imm: i64,
}
