//! Register cache.
//!
//! Holds the last known value of every architecture register. Reads are
//! refreshed from a [`RegisterSource`] only when the caller supplies one, which
//! the session does exactly when the engine exists and the state is
//! execution-capable.

use crate::common::{EmulatorError, Result};

/// Something that can report the live value of a register.
pub trait RegisterSource {
    /// Live value of `name`, or `None` if it cannot be read.
    fn read_register(&self, name: &str) -> Option<u64>;
}

/// Name-ordered register values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterCache {
    entries: Vec<(&'static str, u64)>,
}

impl RegisterCache {
    /// Creates a cache with every register zero.
    pub fn new(names: &[&'static str]) -> Self {
        Self {
            entries: names.iter().map(|&n| (n, 0)).collect(),
        }
    }

    /// Zeroes every entry.
    pub fn reset(&mut self) {
        for (_, value) in &mut self.entries {
            *value = 0;
        }
    }

    fn slot(&mut self, name: &str) -> Result<&mut u64> {
        self.entries
            .iter_mut()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| EmulatorError::UnknownRegister(name.to_string()))
    }

    /// Returns the value of `name`, first pulling it from `source` if given.
    ///
    /// # Errors
    ///
    /// [`EmulatorError::UnknownRegister`] if `name` is not in the set.
    pub fn get(&mut self, name: &str, source: Option<&dyn RegisterSource>) -> Result<u64> {
        let slot = self.slot(name)?;
        if let Some(value) = source.and_then(|s| s.read_register(name)) {
            *slot = value;
        }
        Ok(*slot)
    }

    /// Returns the stored value without consulting any source.
    ///
    /// # Errors
    ///
    /// [`EmulatorError::UnknownRegister`] if `name` is not in the set.
    pub fn cached(&self, name: &str) -> Result<u64> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
            .ok_or_else(|| EmulatorError::UnknownRegister(name.to_string()))
    }

    /// Stores `value` for `name`.
    ///
    /// # Errors
    ///
    /// [`EmulatorError::UnknownRegister`] if `name` is not in the set.
    pub fn set(&mut self, name: &str, value: u64) -> Result<()> {
        *self.slot(name)? = value;
        Ok(())
    }

    /// Pulls every register that `source` can read.
    pub fn refresh_all(&mut self, source: &dyn RegisterSource) {
        for (name, value) in &mut self.entries {
            if let Some(v) = source.read_register(name) {
                *value = v;
            }
        }
    }

    /// Register names in display order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(n, _)| *n)
    }

    /// `(name, value)` pairs in display order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.entries.iter().copied()
    }

    /// Number of registers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` for an empty register set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
