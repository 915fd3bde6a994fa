//! RV64IM instruction set support.
//!
//! Encoding tables, decoder and disassembler, plus the two-pass assembler used
//! by the RV64 architecture backend.
//!
//! # Coverage
//!
//! * RV64I base integer set (no CSR instructions).
//! * M extension (multiply/divide).
//! * `ecall`, `ebreak`, `fence`.

/// ABI register names.
pub mod abi;

/// Two-pass assembler.
pub mod asm;

/// Word decoder.
pub mod decode;

/// Disassembler.
pub mod disasm;

/// Opcode and function-code constants.
pub mod encoding;

/// Bit-field accessors and the decoded record.
pub mod fields;

use std::fmt;

use serde::Serialize;

/// One machine instruction at a known address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instruction {
    /// Address of the first byte.
    pub address: u64,
    /// Encoded bytes, little-endian.
    pub bytes: Vec<u8>,
    /// Mnemonic, lower case.
    pub mnemonic: String,
    /// Operand text, empty when there is none.
    pub operands: String,
}

impl Instruction {
    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` for an instruction with no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Address one past the last byte.
    pub fn end(&self) -> u64 {
        self.address + self.bytes.len() as u64
    }

    /// Mnemonic and operands as a single assembly line.
    pub fn text(&self) -> String {
        if self.operands.is_empty() {
            self.mnemonic.clone()
        } else {
            format!("{} {}", self.mnemonic, self.operands)
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}  ", self.address)?;
        for b in &self.bytes {
            write!(f, "{b:02x}")?;
        }
        write!(f, "  {}", self.text())
    }
}
