//! Session error taxonomy.
//!
//! Every fallible operation of the workbench returns [`EmulatorError`]. It provides:
//! 1. **Layout errors:** Missing, duplicated or malformed memory sections.
//! 2. **Build errors:** Assembly diagnostics and code that does not fit the text section.
//! 3. **Execution errors:** Engine faults raised during a run, with the pc/sp at the fault.
//! 4. **Usage errors:** Operations requested outside the state window they require.
//!
//! Setup and compile failures are recoverable: they leave the session in its prior
//! stable state. [`EmulatorError::AmbiguousSection`] is a consistency violation and
//! aborts the operation that found it.

use thiserror::Error;

use crate::engine::EngineError;
use crate::session::EmulatorState;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EmulatorError>;

/// Errors reported by the emulation session and its collaborators.
#[derive(Debug, Error)]
pub enum EmulatorError {
    /// One of `text`, `data` or `stack` is absent from the layout at setup time.
    #[error("missing required section '{0}'")]
    MissingRequiredSection(String),

    /// More than one section shares the same name.
    #[error("too many sections named '{0}'")]
    AmbiguousSection(String),

    /// A section lookup referenced a name that is not in the layout.
    #[error("section '{0}' not found")]
    SectionNotFound(String),

    /// A section failed validation (empty name, zero size, oversized content, ...).
    #[error("invalid section '{name}': {reason}")]
    InvalidSection {
        /// Name of the rejected section.
        name: String,
        /// Human-readable reason.
        reason: String,
    },

    /// The source text failed to compile or produced no instruction.
    #[error("assembly failed: {0}")]
    Assembly(String),

    /// The compiled code does not fit into the `text` section.
    #[error("compiled code is {size} bytes but the text section only holds {capacity}")]
    CodeOverflow {
        /// Number of compiled bytes.
        size: usize,
        /// Size of the text section in bytes.
        capacity: u64,
    },

    /// The engine raised while executing; the session was forced to `Finished`.
    #[error("engine fault {code} ({reason}) at pc={pc:#x}, sp={sp:#x}")]
    EngineFault {
        /// Machine fault code reported by the engine.
        code: u32,
        /// Program counter when the fault was raised.
        pc: u64,
        /// Stack pointer when the fault was raised.
        sp: u64,
        /// Engine description of the fault.
        reason: String,
    },

    /// An engine call failed outside of execution (mapping, register access, ...).
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The operation is not valid in the current session state.
    #[error("{operation} is not allowed while the emulator is {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// State of the session when the operation was requested.
        state: EmulatorState,
    },

    /// The register name is not part of the architecture's register set.
    #[error("unknown register '{0}'")]
    UnknownRegister(String),

    /// The configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl EmulatorError {
    /// Builds an [`EmulatorError::InvalidState`] for `operation` in `state`.
    pub(crate) const fn invalid_state(operation: &'static str, state: EmulatorState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Returns `true` for errors that signal a broken invariant rather than bad input.
    pub const fn is_consistency_violation(&self) -> bool {
        matches!(self, Self::AmbiguousSection(_))
    }
}
