//! Architecture backends.
//!
//! An [`Architecture`] supplies everything the session needs to know about an
//! instruction set: its register names, which of them are the program counter
//! and stack pointer, how names map to engine register ids, an assembler, a
//! disassembler and a factory for a matching engine.

/// The RV64IM backend.
pub mod riscv;

use std::fmt;

use crate::engine::{Engine, EngineError, RegisterId};
use crate::isa::Instruction;
use crate::isa::asm::AsmError;
use crate::memory::MemorySection;

pub use riscv::RiscV64;

/// Backend capabilities for one instruction set.
pub trait Architecture: Send + Sync + fmt::Debug {
    /// Short display name, e.g. `"rv64"`.
    fn name(&self) -> &'static str;

    /// Every register, in display order.
    fn registers(&self) -> &[&'static str];

    /// Name of the program counter register.
    fn pc(&self) -> &'static str;

    /// Name of the stack pointer register.
    fn sp(&self) -> &'static str;

    /// Engine id for a register name, or `None` if the engine has no such register.
    fn engine_register(&self, name: &str) -> Option<RegisterId>;

    /// Assembles `source` with the first instruction at `base`.
    ///
    /// # Errors
    ///
    /// Returns the first diagnostic.
    fn assemble(&self, source: &str, base: u64) -> Result<Vec<Instruction>, AsmError>;

    /// Lazily disassembles `code` loaded at `base`; the sequence ends at the
    /// first word that does not decode.
    fn disassemble<'a>(
        &'a self,
        code: &'a [u8],
        base: u64,
    ) -> Box<dyn Iterator<Item = Instruction> + 'a>;

    /// Creates a fresh engine for this instruction set.
    ///
    /// # Errors
    ///
    /// Fails if the engine cannot be initialised.
    fn create_engine(&self) -> Result<Box<dyn Engine>, EngineError>;

    /// Whether the session should install a syscall hook.
    fn has_syscall_hook(&self) -> bool {
        false
    }

    /// Pseudo-registers that only exist to seed segment selectors.
    ///
    /// These are synthesised at setup and never pushed to the engine directly.
    fn selector_registers(&self) -> &[&'static str] {
        &[]
    }

    /// Derives selector register values from the reserved sections.
    fn synthesize_selectors(
        &self,
        _text: &MemorySection,
        _data: &MemorySection,
        _stack: &MemorySection,
    ) -> Vec<(&'static str, u64)> {
        Vec::new()
    }
}
