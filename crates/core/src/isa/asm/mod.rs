//! Two-pass RV64IM assembler.
//!
//! Pass 1 parses every line and assigns addresses, building the symbol table.
//! Pass 2 encodes each statement with labels resolved and disassembles the
//! resulting words into [`Instruction`] records.

/// Second-pass encoder.
pub mod encoder;

/// Line parser.
pub mod parser;

use thiserror::Error;

use crate::isa::Instruction;
use crate::isa::disasm::disassemble;
use encoder::{SymbolTable, encode, word_count};
use parser::parse_source;

/// An assembly diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct AsmError {
    /// 1-based source line.
    pub line: usize,
    /// What went wrong.
    pub message: String,
}

impl AsmError {
    /// Creates a diagnostic for `line`.
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Assembles `source` with the first instruction at `base`.
///
/// Source without any instruction assembles to an empty list; callers decide
/// whether that is an error.
pub fn assemble(source: &str, base: u64) -> Result<Vec<Instruction>, AsmError> {
    let lines = parse_source(source)?;

    let mut symbols = SymbolTable::new();
    let mut defined_at = std::collections::HashMap::new();
    let mut addresses = Vec::with_capacity(lines.len());
    let mut pc = base;
    for parsed in &lines {
        for label in &parsed.labels {
            if let Some(first) = defined_at.insert(label.clone(), parsed.line) {
                return Err(AsmError::new(
                    parsed.line,
                    format!("duplicate label '{label}' (first defined at line {first})"),
                ));
            }
            let _ = symbols.insert(label.clone(), pc);
        }
        addresses.push(pc);
        if let Some(stmt) = &parsed.statement {
            let words = word_count(stmt, parsed.line)?;
            pc = pc
                .checked_add(4 * words as u64)
                .ok_or_else(|| AsmError::new(parsed.line, "address overflow"))?;
        }
    }

    let mut out = Vec::new();
    for (parsed, &address) in lines.iter().zip(&addresses) {
        let Some(stmt) = &parsed.statement else {
            continue;
        };
        let words = encode(stmt, address, &symbols, parsed.line)?;
        for (i, word) in words.into_iter().enumerate() {
            let at = address + 4 * i as u64;
            let (mnemonic, operands) = disassemble(word, at)
                .unwrap_or_else(|| (stmt.mnemonic.clone(), String::new()));
            out.push(Instruction {
                address: at,
                bytes: word.to_le_bytes().to_vec(),
                mnemonic,
                operands,
            });
        }
    }
    Ok(out)
}
