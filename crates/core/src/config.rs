//! Workbench configuration.
//!
//! This module defines the JSON configuration accepted by the library and the
//! CLI. It provides:
//! 1. **General:** Execution policy (step or free-run) and trace switches.
//! 2. **Layout:** The memory sections a session starts with.
//!
//! Every field is defaulted, so `{}` yields the default layout in free-run mode.

use serde::{Deserialize, Serialize};

use crate::common::constants::{
    DATA_BASE, DATA_SECTION, DATA_SIZE, STACK_BASE, STACK_SECTION, STACK_SIZE, TEXT_BASE,
    TEXT_SECTION, TEXT_SIZE,
};
use crate::common::Result;
use crate::memory::{MemoryLayout, MemorySection, Permission};

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Execution policy and tracing.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Initial memory layout.
    #[serde(default = "Config::default_layout")]
    pub layout: Vec<SectionConfig>,
}

impl Config {
    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`EmulatorError::Config`](crate::EmulatorError::Config) on malformed JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Builds the memory layout described by `layout`.
    ///
    /// # Errors
    ///
    /// Fails on an unparsable permission string or an invalid section.
    pub fn memory_layout(&self) -> Result<MemoryLayout> {
        self.layout
            .iter()
            .map(SectionConfig::to_section)
            .collect::<Result<Vec<_>>>()
            .map(MemoryLayout::new)
    }

    fn default_layout() -> Vec<SectionConfig> {
        vec![
            SectionConfig::new(TEXT_SECTION, TEXT_BASE, TEXT_SIZE, "READ|EXEC"),
            SectionConfig::new(DATA_SECTION, DATA_BASE, DATA_SIZE, "READ|WRITE"),
            SectionConfig::new(STACK_SECTION, STACK_BASE, STACK_SIZE, "READ|WRITE"),
        ]
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            layout: Self::default_layout(),
        }
    }
}

/// General settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Run one instruction per run request instead of the whole code window.
    #[serde(default)]
    pub step_mode: bool,

    /// Trace every executed instruction (disassembly at `trace` level).
    #[serde(default)]
    pub trace_instructions: bool,

    /// Log memory reads and writes at `debug` level.
    #[serde(default = "GeneralConfig::default_trace_memory")]
    pub trace_memory: bool,
}

impl GeneralConfig {
    fn default_trace_memory() -> bool {
        true
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            step_mode: false,
            trace_instructions: false,
            trace_memory: Self::default_trace_memory(),
        }
    }
}

/// One section of the configured layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionConfig {
    /// Section name.
    pub name: String,
    /// Base address.
    pub address: u64,
    /// Size in bytes.
    pub size: u64,
    /// Permission string such as `"READ|EXEC"`.
    pub permission: String,
    /// Initial bytes written after mapping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<u8>>,
}

impl SectionConfig {
    fn new(name: &str, address: u64, size: u64, permission: &str) -> Self {
        Self {
            name: name.to_string(),
            address,
            size,
            permission: permission.to_string(),
            content: None,
        }
    }

    /// Converts to a validated [`MemorySection`].
    ///
    /// # Errors
    ///
    /// Fails on an invalid permission string, name, size or oversized content.
    pub fn to_section(&self) -> Result<MemorySection> {
        let permission: Permission = self.permission.parse()?;
        let section = MemorySection::new(self.name.clone(), self.address, self.size, permission)?;
        match &self.content {
            Some(bytes) => section.with_content(bytes.clone()),
            None => Ok(section),
        }
    }
}
