//! Common types and constants shared by every layer of the workbench.
//!
//! This module provides:
//! 1. **Error Handling:** The session-level [`EmulatorError`] taxonomy and the crate [`Result`] alias.
//! 2. **Constants:** Reserved section names, the default memory layout and engine page size.

/// Common constants (reserved section names, default layout, page size).
pub mod constants;

/// Error types for the session, memory model and assembler boundary.
pub mod error;

pub use error::{EmulatorError, Result};
