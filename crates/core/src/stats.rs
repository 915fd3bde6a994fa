//! Execution statistics.
//!
//! Counters are bumped from inside engine hooks, which may run on a worker
//! thread, so every counter is a shared atomic. The session resets them at
//! each setup.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Live hook counters shared between the session and its installed hooks.
#[derive(Debug, Clone, Default)]
pub struct ExecutionStats {
    blocks: Arc<AtomicU64>,
    instructions: Arc<AtomicU64>,
    interrupts: Arc<AtomicU64>,
    syscalls: Arc<AtomicU64>,
    mem_reads: Arc<AtomicU64>,
    mem_writes: Arc<AtomicU64>,
}

/// Point-in-time copy of [`ExecutionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Basic blocks entered.
    pub blocks: u64,
    /// Instructions about to execute (code hook firings).
    pub instructions: u64,
    /// Interrupts raised.
    pub interrupts: u64,
    /// System calls intercepted.
    pub syscalls: u64,
    /// Data loads.
    pub mem_reads: u64,
    /// Data stores.
    pub mem_writes: u64,
}

impl ExecutionStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Zeroes every counter.
    pub fn reset(&self) {
        for counter in self.counters() {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Copies the current values.
    pub fn snapshot(&self) -> StatsSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            blocks: get(&self.blocks),
            instructions: get(&self.instructions),
            interrupts: get(&self.interrupts),
            syscalls: get(&self.syscalls),
            mem_reads: get(&self.mem_reads),
            mem_writes: get(&self.mem_writes),
        }
    }

    pub(crate) fn count_block(&self) {
        let _ = self.blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn count_instruction(&self) {
        let _ = self.instructions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn count_interrupt(&self) {
        let _ = self.interrupts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn count_syscall(&self) {
        let _ = self.syscalls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn count_mem_read(&self) {
        let _ = self.mem_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn count_mem_write(&self) {
        let _ = self.mem_writes.fetch_add(1, Ordering::Relaxed);
    }

    fn counters(&self) -> [&AtomicU64; 6] {
        [
            &self.blocks,
            &self.instructions,
            &self.interrupts,
            &self.syscalls,
            &self.mem_reads,
            &self.mem_writes,
        ]
    }
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "blocks        {}", self.blocks)?;
        writeln!(f, "instructions  {}", self.instructions)?;
        writeln!(f, "interrupts    {}", self.interrupts)?;
        writeln!(f, "syscalls      {}", self.syscalls)?;
        writeln!(f, "mem reads     {}", self.mem_reads)?;
        write!(f, "mem writes    {}", self.mem_writes)
    }
}
