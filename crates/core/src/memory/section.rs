//! Memory section definition.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use crate::common::{EmulatorError, Result};

bitflags! {
    /// Access rights of a mapped region.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Permission: u8 {
        /// Loads are allowed.
        const READ = 0b001;
        /// Stores are allowed.
        const WRITE = 0b010;
        /// Instruction fetches are allowed.
        const EXEC = 0b100;
    }
}

impl fmt::Display for Permission {
    /// Formats as a `rwx` triplet, with `-` for missing rights.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |p: Self, c: char| if self.contains(p) { c } else { '-' };
        write!(
            f,
            "{}{}{}",
            flag(Self::READ, 'r'),
            flag(Self::WRITE, 'w'),
            flag(Self::EXEC, 'x')
        )
    }
}

impl FromStr for Permission {
    type Err = EmulatorError;

    /// Parses `READ|WRITE|EXEC` style lists (case-insensitive, `|` or `,` separated).
    ///
    /// An empty string yields no permission at all.
    fn from_str(s: &str) -> Result<Self> {
        let mut perm = Self::empty();
        for part in s.split(['|', ',']).map(str::trim).filter(|p| !p.is_empty()) {
            perm |= match part.to_ascii_uppercase().as_str() {
                "READ" | "R" => Self::READ,
                "WRITE" | "W" => Self::WRITE,
                "EXEC" | "EXECUTE" | "X" => Self::EXEC,
                "ALL" | "RWX" => Self::all(),
                other => {
                    return Err(EmulatorError::InvalidSection {
                        name: String::new(),
                        reason: format!("unknown permission '{other}'"),
                    });
                }
            };
        }
        Ok(perm)
    }
}

/// One named region of the emulated address space.
///
/// Sections are identified by name. The optional `content` is written into the
/// engine right after the region is mapped and must fit within `size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySection {
    name: String,
    address: u64,
    size: u64,
    permission: Permission,
    content: Option<Vec<u8>>,
}

impl MemorySection {
    /// Creates an empty section.
    ///
    /// # Errors
    ///
    /// Returns [`EmulatorError::InvalidSection`] if the name is empty, the size is
    /// zero, or the region wraps around the end of the 64-bit address space.
    pub fn new(name: impl Into<String>, address: u64, size: u64, permission: Permission) -> Result<Self> {
        let name = name.into();
        let invalid = |reason: &str| EmulatorError::InvalidSection {
            name: name.clone(),
            reason: reason.to_string(),
        };
        if name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if size == 0 {
            return Err(invalid("size must not be zero"));
        }
        if address.checked_add(size).is_none() {
            return Err(invalid("region wraps around the address space"));
        }
        Ok(Self {
            name,
            address,
            size,
            permission,
            content: None,
        })
    }

    /// Builds one of the constant default sections, skipping validation.
    pub(super) fn builtin(name: &str, address: u64, size: u64, permission: Permission) -> Self {
        Self {
            name: name.to_string(),
            address,
            size,
            permission,
            content: None,
        }
    }

    /// Attaches initial content to the section.
    ///
    /// # Errors
    ///
    /// Returns [`EmulatorError::InvalidSection`] if `content` is larger than the section.
    pub fn with_content(mut self, content: Vec<u8>) -> Result<Self> {
        if content.len() as u64 > self.size {
            return Err(EmulatorError::InvalidSection {
                name: self.name,
                reason: format!("content of {} bytes exceeds size {:#x}", content.len(), self.size),
            });
        }
        self.content = Some(content);
        Ok(self)
    }

    /// Section name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base address.
    pub const fn address(&self) -> u64 {
        self.address
    }

    /// Size in bytes.
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// First address past the end of the section.
    pub const fn end(&self) -> u64 {
        self.address + self.size
    }

    /// Access rights.
    pub const fn permission(&self) -> Permission {
        self.permission
    }

    /// Initial content, if any.
    pub fn content(&self) -> Option<&[u8]> {
        self.content.as_deref()
    }

    /// Returns `true` if `address` falls inside the section.
    pub const fn contains(&self, address: u64) -> bool {
        address >= self.address && address < self.end()
    }

    /// Returns `true` if the two sections share at least one byte.
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.address < other.end() && other.address < self.end()
    }
}

impl fmt::Display for MemorySection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{:#x}-{:#x}) {}",
            self.name,
            self.address,
            self.end(),
            self.permission
        )
    }
}
