//! Memory section model.
//!
//! A session's address space is a list of named, permissioned, contiguous
//! sections. This module provides:
//! 1. **Sections:** [`MemorySection`] and its [`Permission`] flag set, validated on construction.
//! 2. **Layout:** [`MemoryLayout`], the ordered section list with name lookup and
//!    reserved-section checks, plus the default three-section layout.

/// Section list, lookup and the default layout.
pub mod layout;

/// A single mapped region and its permission flags.
pub mod section;

pub use layout::MemoryLayout;
pub use section::{MemorySection, Permission};
