//! ABI register names and well-known register indices.

/// Register x0, hardwired to zero.
pub const REG_ZERO: usize = 0;
/// Register x1, return address.
pub const REG_RA: usize = 1;
/// Register x2, stack pointer.
pub const REG_SP: usize = 2;
/// Register x10, first argument and return value.
pub const REG_A0: usize = 10;
/// Register x17, system call number.
pub const REG_A7: usize = 17;

/// Number of integer registers.
pub const NUM_REGS: usize = 32;

/// ABI names for x0-x31.
pub const REG_NAMES: [&str; NUM_REGS] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

/// Returns the ABI name for an integer register index.
#[inline]
pub fn reg_name(idx: usize) -> &'static str {
    REG_NAMES.get(idx).copied().unwrap_or("x??")
}

/// Resolves an ABI name, `fp`, or `xN` spelling to a register index.
pub fn reg_index(name: &str) -> Option<usize> {
    let lower = name.trim().to_ascii_lowercase();
    if lower == "fp" {
        return Some(8);
    }
    if let Some(idx) = REG_NAMES.iter().position(|n| *n == lower) {
        return Some(idx);
    }
    lower
        .strip_prefix('x')
        .and_then(|n| n.parse::<usize>().ok())
        .filter(|&n| n < NUM_REGS)
}
