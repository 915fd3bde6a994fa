//! Execution fault and engine error definitions.
//!
//! This module defines how an engine reports failure. It provides:
//! 1. **Fault Representation:** [`Fault`] covers every machine fault the run loop can raise,
//!    with the faulting address or encoding attached.
//! 2. **Fault Codes:** Stable numeric codes (the numbering used by common embedded
//!    emulation libraries) so hosts can match on them.
//! 3. **Engine Errors:** [`EngineError`] for host-side misuse (bad mapping, unknown register)
//!    and for execution faults surfaced from [`Engine::emu_start`](super::Engine::emu_start).

use std::fmt;

use thiserror::Error;

use super::RegisterId;

/// Machine faults raised while executing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Fault {
    /// Load from an unmapped address.
    ReadUnmapped(u64),
    /// Store to an unmapped address.
    WriteUnmapped(u64),
    /// Instruction fetch from an unmapped address.
    FetchUnmapped(u64),
    /// The fetched word is not a supported instruction.
    InvalidInstruction(u32),
    /// Store to a region without write permission.
    WriteProtected(u64),
    /// Load from a region without read permission.
    ReadProtected(u64),
    /// Instruction fetch from a region without execute permission.
    FetchProtected(u64),
    /// Misaligned load.
    ReadUnaligned(u64),
    /// Misaligned store.
    WriteUnaligned(u64),
    /// Misaligned instruction fetch.
    FetchUnaligned(u64),
    /// An interrupt was raised with no handler installed.
    UnhandledInterrupt(u32),
}

impl Fault {
    /// Numeric fault code.
    pub const fn code(self) -> u32 {
        match self {
            Self::ReadUnmapped(_) => 6,
            Self::WriteUnmapped(_) => 7,
            Self::FetchUnmapped(_) => 8,
            Self::InvalidInstruction(_) => 10,
            Self::WriteProtected(_) => 12,
            Self::ReadProtected(_) => 13,
            Self::FetchProtected(_) => 14,
            Self::ReadUnaligned(_) => 16,
            Self::WriteUnaligned(_) => 17,
            Self::FetchUnaligned(_) => 18,
            Self::UnhandledInterrupt(_) => 21,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadUnmapped(addr) => write!(f, "read from unmapped memory ({addr:#x})"),
            Self::WriteUnmapped(addr) => write!(f, "write to unmapped memory ({addr:#x})"),
            Self::FetchUnmapped(addr) => write!(f, "fetch from unmapped memory ({addr:#x})"),
            Self::InvalidInstruction(inst) => write!(f, "invalid instruction ({inst:#010x})"),
            Self::WriteProtected(addr) => write!(f, "write to write-protected memory ({addr:#x})"),
            Self::ReadProtected(addr) => write!(f, "read from non-readable memory ({addr:#x})"),
            Self::FetchProtected(addr) => write!(f, "fetch from non-executable memory ({addr:#x})"),
            Self::ReadUnaligned(addr) => write!(f, "unaligned read ({addr:#x})"),
            Self::WriteUnaligned(addr) => write!(f, "unaligned write ({addr:#x})"),
            Self::FetchUnaligned(addr) => write!(f, "unaligned fetch ({addr:#x})"),
            Self::UnhandledInterrupt(n) => write!(f, "unhandled interrupt #{n}"),
        }
    }
}

impl std::error::Error for Fault {}

/// Errors returned by [`Engine`](super::Engine) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A mapping request was not page aligned or had zero size.
    #[error("invalid mapping request at {address:#x} (size {size:#x})")]
    InvalidMapping {
        /// Requested base address.
        address: u64,
        /// Requested size.
        size: u64,
    },

    /// A mapping request overlaps an existing region.
    #[error("mapping at {address:#x} (size {size:#x}) overlaps an existing region")]
    MapOverlap {
        /// Requested base address.
        address: u64,
        /// Requested size.
        size: u64,
    },

    /// A host-side access touched unmapped memory.
    #[error("address {0:#x} is not mapped")]
    Unmapped(u64),

    /// The register id is not known to the engine.
    #[error("unknown register id {0}")]
    InvalidRegister(RegisterId),

    /// Execution raised a machine fault.
    #[error("{0}")]
    Fault(#[from] Fault),
}

impl EngineError {
    /// Numeric code; execution faults report their [`Fault::code`], other errors
    /// use the generic argument/mapping codes.
    pub const fn code(&self) -> u32 {
        match self {
            Self::Fault(fault) => fault.code(),
            Self::InvalidMapping { .. } | Self::InvalidRegister(_) => 15,
            Self::MapOverlap { .. } => 11,
            Self::Unmapped(_) => 6,
        }
    }
}
