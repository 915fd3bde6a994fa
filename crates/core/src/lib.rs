//! Assemble-and-step emulation workbench library.
//!
//! This crate lays out memory, assembles a snippet and runs it one instruction
//! at a time or to the end, with the following:
//! 1. **Session:** Lifecycle state machine, register cache, observers and the
//!    execution driver with pluggable runners.
//! 2. **Memory:** Named, permissioned sections and the default layout.
//! 3. **Engine:** The engine capability trait, hooks, faults and a built-in
//!    RV64IM interpreter.
//! 4. **ISA:** RV64IM decoding, disassembly and a two-pass assembler.
//! 5. **Architecture:** The backend trait and the RV64 backend.
//! 6. **Support:** Configuration, errors and hook statistics.

/// Architecture backends (register set, assembler, disassembler, engine factory).
pub mod arch;
/// Common types and constants (errors, section names, default layout).
pub mod common;
/// Workbench configuration (general policy, layout).
pub mod config;
/// Engine boundary (capability trait, hooks, faults) and the interpreter.
pub mod engine;
/// RV64IM instruction set (encoding, decode, disasm, assembler).
pub mod isa;
/// Memory sections and layouts.
pub mod memory;
/// Emulation session (state machine, registers, observers, driver, runners).
pub mod session;
/// Hook counters.
pub mod stats;

/// Root configuration type; use `Config::default()` or parse JSON.
pub use crate::config::Config;
/// Library error and result alias.
pub use crate::common::{EmulatorError, Result};
/// Session type and its lifecycle state.
pub use crate::session::{Context, EmulatorState, Session};
