//! Ordered list of memory sections.
//!
//! The layout is the session's memory *configuration*: it is replaced as a
//! whole (reset or user edit), never mutated section by section, and it is
//! materialized into the engine only at setup.

use std::fmt;

use crate::common::constants::{
    DATA_BASE, DATA_SECTION, DATA_SIZE, MAX_SECTION_SIZE, PAGE_SIZE, RESERVED_SECTIONS, STACK_BASE,
    STACK_SECTION, STACK_SIZE, TEXT_BASE, TEXT_SECTION, TEXT_SIZE,
};
use crate::common::{EmulatorError, Result};

use super::section::{MemorySection, Permission};

/// The sections of one session, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryLayout {
    sections: Vec<MemorySection>,
}

impl MemoryLayout {
    /// Wraps an explicit section list.
    pub const fn new(sections: Vec<MemorySection>) -> Self {
        Self { sections }
    }

    /// The built-in layout: `text` (4 KiB, r-x), `data` (4 KiB, rw-), `stack` (16 KiB, rw-).
    pub fn default_layout() -> Self {
        let rx = Permission::READ | Permission::EXEC;
        let rw = Permission::READ | Permission::WRITE;
        Self::new(vec![
            MemorySection::builtin(TEXT_SECTION, TEXT_BASE, TEXT_SIZE, rx),
            MemorySection::builtin(DATA_SECTION, DATA_BASE, DATA_SIZE, rw),
            MemorySection::builtin(STACK_SECTION, STACK_BASE, STACK_SIZE, rw),
        ])
    }

    /// Looks up the unique section called `name`.
    ///
    /// # Errors
    ///
    /// * [`EmulatorError::SectionNotFound`] if no section has that name.
    /// * [`EmulatorError::AmbiguousSection`] if more than one does.
    pub fn find(&self, name: &str) -> Result<&MemorySection> {
        let mut matches = self.sections.iter().filter(|s| s.name() == name);
        let first = matches
            .next()
            .ok_or_else(|| EmulatorError::SectionNotFound(name.to_string()))?;
        if matches.next().is_some() {
            return Err(EmulatorError::AmbiguousSection(name.to_string()));
        }
        Ok(first)
    }

    /// Like [`find`](Self::find), but a missing section is reported as
    /// [`EmulatorError::MissingRequiredSection`].
    ///
    /// # Errors
    ///
    /// Fails if the section is absent or duplicated.
    pub fn require(&self, name: &str) -> Result<&MemorySection> {
        self.find(name).map_err(|e| match e {
            EmulatorError::SectionNotFound(n) => EmulatorError::MissingRequiredSection(n),
            other => other,
        })
    }

    /// Checks that each reserved section exists exactly once.
    ///
    /// # Errors
    ///
    /// Reports the first reserved section that is missing or duplicated.
    pub fn check_reserved(&self) -> Result<()> {
        for name in RESERVED_SECTIONS {
            let _ = self.require(name)?;
        }
        Ok(())
    }

    /// Checks that no two sections share an address range.
    ///
    /// # Errors
    ///
    /// Returns [`EmulatorError::InvalidSection`] naming the second section of the first
    /// overlapping pair.
    pub fn check_overlaps(&self) -> Result<()> {
        for (i, a) in self.sections.iter().enumerate() {
            if let Some(b) = self.sections[i + 1..].iter().find(|b| a.overlaps(b)) {
                return Err(EmulatorError::InvalidSection {
                    name: b.name().to_string(),
                    reason: format!("overlaps section '{}'", a.name()),
                });
            }
        }
        Ok(())
    }

    /// Checks that every section is page-aligned, no larger than
    /// [`MAX_SECTION_SIZE`], and that none overlap.
    ///
    /// Reserved sections are not required here; that is checked at setup.
    ///
    /// # Errors
    ///
    /// Returns [`EmulatorError::InvalidSection`] for the first offending section.
    pub fn validate(&self) -> Result<()> {
        for s in &self.sections {
            let reason = if s.address() % PAGE_SIZE != 0 || s.size() % PAGE_SIZE != 0 {
                format!("address and size must be multiples of {PAGE_SIZE:#x}")
            } else if s.size() > MAX_SECTION_SIZE {
                format!("size {:#x} exceeds the {MAX_SECTION_SIZE:#x} limit", s.size())
            } else {
                continue;
            };
            return Err(EmulatorError::InvalidSection {
                name: s.name().to_string(),
                reason,
            });
        }
        self.check_overlaps()
    }

    /// The lowest base address in the layout, if any section exists.
    pub fn lowest_address(&self) -> Option<u64> {
        self.sections.iter().map(MemorySection::address).min()
    }

    /// The sections in declaration order.
    pub fn sections(&self) -> &[MemorySection] {
        &self.sections
    }

    /// Iterates over the sections in declaration order.
    pub fn iter(&self) -> std::slice::Iter<'_, MemorySection> {
        self.sections.iter()
    }

    /// Number of sections.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Returns `true` if the layout has no section.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Returns the section containing `address`, if any.
    pub fn section_at(&self, address: u64) -> Option<&MemorySection> {
        self.sections.iter().find(|s| s.contains(address))
    }
}

impl From<Vec<MemorySection>> for MemoryLayout {
    fn from(sections: Vec<MemorySection>) -> Self {
        Self::new(sections)
    }
}

impl<'a> IntoIterator for &'a MemoryLayout {
    type Item = &'a MemorySection;
    type IntoIter = std::slice::Iter<'a, MemorySection>;

    fn into_iter(self) -> Self::IntoIter {
        self.sections.iter()
    }
}

impl fmt::Display for MemoryLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{section}")?;
        }
        Ok(())
    }
}
