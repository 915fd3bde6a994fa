//! RV64IM architecture backend.

use crate::engine::interp::REG_PC;
use crate::engine::{Engine, EngineError, Interpreter, RegisterId};
use crate::isa::abi::{REG_NAMES, reg_index};
use crate::isa::asm::{self, AsmError};
use crate::isa::disasm::disassemble;
use crate::isa::Instruction;

use super::Architecture;

/// Register set: the 32 ABI names followed by `pc`.
const REGISTERS: [&str; 33] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6", "pc",
];

/// 64-bit RISC-V with the M extension, backed by [`Interpreter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RiscV64;

impl RiscV64 {
    /// Creates the backend.
    pub const fn new() -> Self {
        Self
    }
}

impl Architecture for RiscV64 {
    fn name(&self) -> &'static str {
        "rv64"
    }

    fn registers(&self) -> &[&'static str] {
        &REGISTERS
    }

    fn pc(&self) -> &'static str {
        "pc"
    }

    fn sp(&self) -> &'static str {
        "sp"
    }

    fn engine_register(&self, name: &str) -> Option<RegisterId> {
        if name == "pc" {
            return Some(REG_PC);
        }
        reg_index(name).map(|idx| idx as RegisterId)
    }

    fn assemble(&self, source: &str, base: u64) -> Result<Vec<Instruction>, AsmError> {
        asm::assemble(source, base)
    }

    fn disassemble<'a>(
        &'a self,
        code: &'a [u8],
        base: u64,
    ) -> Box<dyn Iterator<Item = Instruction> + 'a> {
        Box::new(
            code.chunks_exact(4)
                .enumerate()
                .map_while(move |(i, chunk)| {
                    let bytes: [u8; 4] = chunk.try_into().ok()?;
                    let address = base + 4 * i as u64;
                    let (mnemonic, operands) = disassemble(u32::from_le_bytes(bytes), address)?;
                    Some(Instruction {
                        address,
                        bytes: bytes.to_vec(),
                        mnemonic,
                        operands,
                    })
                }),
        )
    }

    fn create_engine(&self) -> Result<Box<dyn Engine>, EngineError> {
        Ok(Box::new(Interpreter::new()))
    }

    fn has_syscall_hook(&self) -> bool {
        true
    }
}

// The register table mirrors the ABI names plus the program counter.
const _: () = assert!(REGISTERS.len() == REG_NAMES.len() + 1);
