//! Workbench-wide constants.
//!
//! The default layout places three sections back to back starting at
//! [`TEXT_BASE`]: code, data and a stack four times the size of the others.

/// Name of the section holding assembled code.
pub const TEXT_SECTION: &str = "text";

/// Name of the read/write data section.
pub const DATA_SECTION: &str = "data";

/// Name of the stack section; the initial stack pointer lands in its middle.
pub const STACK_SECTION: &str = "stack";

/// The sections that must exist exactly once before a session can be armed.
pub const RESERVED_SECTIONS: [&str; 3] = [TEXT_SECTION, DATA_SECTION, STACK_SECTION];

/// Granularity of engine mappings (4 KiB).
///
/// Section addresses and sizes must be multiples of this value.
pub const PAGE_SIZE: u64 = 0x1000;

/// Largest size a single section may declare (256 MiB).
pub const MAX_SECTION_SIZE: u64 = 0x1000_0000;

/// Base address of the default `text` section.
pub const TEXT_BASE: u64 = 0x0000_4000;

/// Size of the default `text` section (4 KiB).
pub const TEXT_SIZE: u64 = 0x1000;

/// Base address of the default `data` section, immediately after `text`.
pub const DATA_BASE: u64 = TEXT_BASE + TEXT_SIZE;

/// Size of the default `data` section (4 KiB).
pub const DATA_SIZE: u64 = 0x1000;

/// Base address of the default `stack` section, immediately after `data`.
pub const STACK_BASE: u64 = DATA_BASE + DATA_SIZE;

/// Size of the default `stack` section (16 KiB).
pub const STACK_SIZE: u64 = 0x4000;
