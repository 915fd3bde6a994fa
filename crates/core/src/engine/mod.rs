//! CPU emulation engine boundary.
//!
//! The session never executes instructions itself; it drives an [`Engine`].
//! This module provides:
//! 1. **Capability Set:** The [`Engine`] trait (map/unmap, memory and register access,
//!    hooks, blocking run, stop).
//! 2. **Hooks:** [`HookKind`], [`HookEvent`] and [`HookCallback`] for block, code,
//!    interrupt, memory and syscall notifications fired inside a run.
//! 3. **Faults:** [`Fault`] (machine fault with a numeric code) and [`EngineError`].
//! 4. **Interpreter:** [`Interpreter`], the built-in RV64IM engine.

/// Integer ALU operations used by the interpreter.
pub mod alu;

/// Execution faults and engine errors.
pub mod fault;

/// RV64IM interpreter implementing [`Engine`].
pub mod interp;

/// Page-granular region map backing the interpreter's address space.
pub mod memory;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::memory::Permission;

pub use fault::{EngineError, Fault};
pub use interp::Interpreter;

/// Engine-specific register identifier.
pub type RegisterId = u32;

/// The classes of execution events an engine can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Entry into a new basic block.
    Block,
    /// Every instruction, before it executes.
    Code,
    /// Interrupts and exceptions (software interrupts, breakpoints).
    Interrupt,
    /// Data loads.
    MemRead,
    /// Data stores.
    MemWrite,
    /// The architecture's system-call instruction.
    Syscall,
}

/// One event delivered to a hook callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookEvent<'a> {
    /// A basic block starts at `address`.
    Block {
        /// First instruction of the block.
        address: u64,
    },
    /// The instruction at `address` is about to execute.
    Code {
        /// Instruction address.
        address: u64,
        /// Raw instruction bytes.
        bytes: &'a [u8],
    },
    /// Interrupt number `number` was raised.
    Interrupt {
        /// Architecture-specific interrupt number.
        number: u32,
    },
    /// A load of `size` bytes from `address`.
    MemRead {
        /// Effective address.
        address: u64,
        /// Access width in bytes.
        size: usize,
    },
    /// A store of `size` bytes of `value` to `address`.
    MemWrite {
        /// Effective address.
        address: u64,
        /// Access width in bytes.
        size: usize,
        /// Stored value (zero-extended).
        value: u64,
    },
    /// The system-call instruction at `address` was executed.
    Syscall {
        /// Address of the system-call instruction.
        address: u64,
    },
}

impl HookEvent<'_> {
    /// The hook class this event is delivered to.
    pub const fn kind(&self) -> HookKind {
        match self {
            Self::Block { .. } => HookKind::Block,
            Self::Code { .. } => HookKind::Code,
            Self::Interrupt { .. } => HookKind::Interrupt,
            Self::MemRead { .. } => HookKind::MemRead,
            Self::MemWrite { .. } => HookKind::MemWrite,
            Self::Syscall { .. } => HookKind::Syscall,
        }
    }
}

/// Callback invoked synchronously, inside the engine's run loop.
pub type HookCallback = Box<dyn for<'a> FnMut(&HookEvent<'a>) + Send>;

/// Handle identifying an installed hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(pub usize);

/// Cloneable request-to-stop flag shared with a running engine.
///
/// The handle is usable from any thread, including while another thread is
/// blocked inside [`Engine::emu_start`].
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Creates a handle with no stop pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the engine to abort its current run loop at the next instruction boundary.
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` if a stop has been requested and not yet consumed.
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clears a pending request.
    ///
    /// The session clears the flag before dispatching a run; engines clear it
    /// when a run ends because of it.
    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The capability set of an embedded CPU emulation engine.
///
/// Engines are not safe for concurrent invocation; the session serializes all
/// access behind a lock. Only the [`StopHandle`] may be used concurrently.
pub trait Engine: Send + fmt::Debug {
    /// Maps `size` bytes at `address` with the given rights.
    ///
    /// # Errors
    ///
    /// Fails if the region is not page-aligned or overlaps an existing mapping.
    fn mem_map(&mut self, address: u64, size: u64, perms: Permission) -> Result<(), EngineError>;

    /// Unmaps a region previously mapped with the same `address` and `size`.
    ///
    /// # Errors
    ///
    /// Fails if no mapping matches.
    fn mem_unmap(&mut self, address: u64, size: u64) -> Result<(), EngineError>;

    /// Reads `size` bytes starting at `address`, ignoring permissions.
    ///
    /// # Errors
    ///
    /// Fails if any byte of the range is unmapped.
    fn mem_read(&self, address: u64, size: usize) -> Result<Vec<u8>, EngineError>;

    /// Writes `data` at `address`, ignoring permissions.
    ///
    /// # Errors
    ///
    /// Fails if any byte of the range is unmapped.
    fn mem_write(&mut self, address: u64, data: &[u8]) -> Result<(), EngineError>;

    /// Reads a register.
    ///
    /// # Errors
    ///
    /// Fails on an unknown register id.
    fn reg_read(&self, reg: RegisterId) -> Result<u64, EngineError>;

    /// Writes a register.
    ///
    /// # Errors
    ///
    /// Fails on an unknown register id.
    fn reg_write(&mut self, reg: RegisterId, value: u64) -> Result<(), EngineError>;

    /// Installs a hook for one event class.
    ///
    /// # Errors
    ///
    /// Fails if the engine does not support that event class.
    fn add_hook(&mut self, kind: HookKind, callback: HookCallback) -> Result<HookId, EngineError>;

    /// Runs from `begin` until the program counter reaches `until`, `count`
    /// instructions have executed (`0` means unbounded) or a stop is requested.
    ///
    /// Blocks the calling thread. Hooks fire on this thread.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Fault`] when execution raises a machine fault. The
    /// program counter is left at the faulting address.
    fn emu_start(&mut self, begin: u64, until: u64, count: usize) -> Result<(), EngineError>;

    /// Returns a handle that stops an in-progress [`emu_start`](Self::emu_start).
    fn stop_handle(&self) -> StopHandle;
}
