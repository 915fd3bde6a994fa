//! Source line parser.
//!
//! Turns each line into an optional label list and an optional statement
//! (mnemonic plus operands). Comments start with `#` or `;`.

use crate::isa::abi::reg_index;
use crate::isa::asm::AsmError;

/// A parsed operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Integer register index.
    Register(usize),
    /// Numeric literal.
    Immediate(i64),
    /// `offset(base)` memory operand.
    Memory {
        /// Signed displacement.
        offset: i64,
        /// Base register index.
        base: usize,
    },
    /// Reference to a label, resolved in the second pass.
    Label(String),
}

/// One statement: the lower-cased mnemonic and its operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Mnemonic, lower case.
    pub mnemonic: String,
    /// Operands in source order.
    pub operands: Vec<Operand>,
}

/// A source line after parsing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedLine {
    /// 1-based line number.
    pub line: usize,
    /// Labels defined on this line.
    pub labels: Vec<String>,
    /// Instruction on this line, if any.
    pub statement: Option<Statement>,
}

/// Parses every line of `source`.
pub fn parse_source(source: &str) -> Result<Vec<ParsedLine>, AsmError> {
    source
        .lines()
        .enumerate()
        .map(|(idx, text)| parse_line(text, idx + 1))
        .collect()
}

/// Parses a single line.
pub fn parse_line(text: &str, line: usize) -> Result<ParsedLine, AsmError> {
    let mut rest = strip_comment(text).trim();
    let mut parsed = ParsedLine { line, ..ParsedLine::default() };

    while let Some((head, tail)) = split_label(rest) {
        if !is_identifier(head) {
            return Err(AsmError::new(line, format!("invalid label '{head}'")));
        }
        if reg_index(head).is_some() {
            return Err(AsmError::new(line, format!("label '{head}' shadows a register")));
        }
        parsed.labels.push(head.to_string());
        rest = tail.trim_start();
    }

    if rest.is_empty() {
        return Ok(parsed);
    }

    let (mnemonic, operand_text) = rest
        .split_once(char::is_whitespace)
        .map_or((rest, ""), |(m, o)| (m, o.trim()));

    let operands = if operand_text.is_empty() {
        Vec::new()
    } else {
        operand_text
            .split(',')
            .map(|raw| parse_operand(raw.trim(), line))
            .collect::<Result<Vec<_>, _>>()?
    };

    parsed.statement = Some(Statement {
        mnemonic: mnemonic.to_ascii_lowercase(),
        operands,
    });
    Ok(parsed)
}

fn strip_comment(text: &str) -> &str {
    text.find(['#', ';']).map_or(text, |pos| &text[..pos])
}

/// Splits `name: rest` when the text before the first colon is a single token.
fn split_label(text: &str) -> Option<(&str, &str)> {
    let (head, tail) = text.split_once(':')?;
    let head = head.trim();
    if head.is_empty() || head.contains(char::is_whitespace) {
        return None;
    }
    Some((head, tail))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '.')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn parse_operand(raw: &str, line: usize) -> Result<Operand, AsmError> {
    if raw.is_empty() {
        return Err(AsmError::new(line, "empty operand"));
    }

    if let Some(open) = raw.find('(') {
        let inner = raw[open + 1..]
            .strip_suffix(')')
            .ok_or_else(|| AsmError::new(line, format!("unterminated memory operand '{raw}'")))?;
        let base = reg_index(inner)
            .ok_or_else(|| AsmError::new(line, format!("unknown register '{}'", inner.trim())))?;
        let disp = raw[..open].trim();
        let offset = if disp.is_empty() {
            0
        } else {
            parse_number(disp)
                .ok_or_else(|| AsmError::new(line, format!("invalid offset '{disp}'")))?
        };
        return Ok(Operand::Memory { offset, base });
    }

    if let Some(reg) = reg_index(raw) {
        return Ok(Operand::Register(reg));
    }
    if let Some(value) = parse_number(raw) {
        return Ok(Operand::Immediate(value));
    }
    if is_identifier(raw) {
        return Ok(Operand::Label(raw.to_string()));
    }
    Err(AsmError::new(line, format!("invalid operand '{raw}'")))
}

/// Parses a decimal, `0x` hex or `0b` binary literal with an optional sign.
pub fn parse_number(text: &str) -> Option<i64> {
    let (negative, digits) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let lower = digits.to_ascii_lowercase();
    let magnitude = if let Some(hex) = lower.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = lower.strip_prefix("0b") {
        u64::from_str_radix(bin, 2).ok()?
    } else {
        lower.parse::<u64>().ok()?
    };
    let value = magnitude as i64;
    Some(if negative { value.wrapping_neg() } else { value })
}
