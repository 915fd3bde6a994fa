//! Built-in RV64IM interpreter.
//!
//! A single-hart, in-order interpreter with the behaviour the session expects
//! from an embedded engine:
//! 1. **Run Window:** [`Engine::emu_start`] executes until `pc == until`, a retired
//!    instruction budget is spent, or a stop is requested.
//! 2. **Hooks:** Block hooks fire on the first instruction of a run and after every
//!    control-flow change; code hooks fire before every instruction.
//! 3. **Faults:** Any fault aborts the run with the program counter left at the
//!    faulting instruction (or the faulting fetch target).
//!
//! Hook callbacks observe but cannot touch engine state; syscall emulation that
//! needs to write registers is done by the host between runs.

use std::fmt;

use tracing::trace;

use super::alu::{self, AluOp};
use super::memory::RegionMap;
use super::{
    Engine, EngineError, Fault, HookCallback, HookEvent, HookId, HookKind, RegisterId, StopHandle,
};
use crate::isa::abi::NUM_REGS;
use crate::isa::decode::decode;
use crate::isa::encoding::{INTNO_BREAKPOINT, INTNO_ECALL, funct3, opcodes, system};
use crate::memory::Permission;

/// Register id of the program counter; ids `0..32` are `x0..x31`.
pub const REG_PC: RegisterId = NUM_REGS as RegisterId;

/// The RV64IM interpreter engine.
pub struct Interpreter {
    regs: [u64; NUM_REGS],
    pc: u64,
    memory: RegionMap,
    hooks: Vec<(HookKind, HookCallback)>,
    stop: StopHandle,
}

impl Interpreter {
    /// Creates an interpreter with no memory mapped and every register zero.
    pub fn new() -> Self {
        Self {
            regs: [0; NUM_REGS],
            pc: 0,
            memory: RegionMap::new(),
            hooks: Vec::new(),
            stop: StopHandle::new(),
        }
    }

    #[inline]
    const fn x(&self, idx: usize) -> u64 {
        self.regs[idx]
    }

    #[inline]
    fn set_x(&mut self, idx: usize, value: u64) {
        if idx != 0 {
            self.regs[idx] = value;
        }
    }

    fn has_hook(&self, kind: HookKind) -> bool {
        self.hooks.iter().any(|(k, _)| *k == kind)
    }

    fn fire(&mut self, event: &HookEvent<'_>) {
        let kind = event.kind();
        for (k, callback) in &mut self.hooks {
            if *k == kind {
                callback(event);
            }
        }
    }

    fn interrupt(&mut self, number: u32) -> Result<(), Fault> {
        if !self.has_hook(HookKind::Interrupt) {
            return Err(Fault::UnhandledInterrupt(number));
        }
        self.fire(&HookEvent::Interrupt { number });
        Ok(())
    }

    fn ecall(&mut self, pc: u64) -> Result<(), Fault> {
        if self.has_hook(HookKind::Syscall) {
            self.fire(&HookEvent::Syscall { address: pc });
            return Ok(());
        }
        self.interrupt(INTNO_ECALL)
    }

    /// Executes one instruction and returns the next program counter.
    fn execute(&mut self, word: u32, pc: u64) -> Result<u64, Fault> {
        let d = decode(word);
        let invalid = Fault::InvalidInstruction(word);
        let next = pc.wrapping_add(4);
        let rs1 = self.x(d.rs1);
        let rs2 = self.x(d.rs2);
        let imm = d.imm;

        match d.opcode {
            opcodes::OP_LUI => self.set_x(d.rd, imm as u64),
            opcodes::OP_AUIPC => self.set_x(d.rd, pc.wrapping_add(imm as u64)),
            opcodes::OP_JAL => {
                self.set_x(d.rd, next);
                return Ok(pc.wrapping_add(imm as u64));
            }
            opcodes::OP_JALR if d.funct3 == funct3::JALR => {
                let target = rs1.wrapping_add(imm as u64) & !1;
                self.set_x(d.rd, next);
                return Ok(target);
            }
            opcodes::OP_BRANCH => {
                let taken = match d.funct3 {
                    funct3::BEQ => rs1 == rs2,
                    funct3::BNE => rs1 != rs2,
                    funct3::BLT => (rs1 as i64) < (rs2 as i64),
                    funct3::BGE => (rs1 as i64) >= (rs2 as i64),
                    funct3::BLTU => rs1 < rs2,
                    funct3::BGEU => rs1 >= rs2,
                    _ => return Err(invalid),
                };
                if taken {
                    return Ok(pc.wrapping_add(imm as u64));
                }
            }
            opcodes::OP_LOAD => {
                let (size, signed) = match d.funct3 {
                    funct3::LB => (1, true),
                    funct3::LH => (2, true),
                    funct3::LW => (4, true),
                    funct3::LD => (8, false),
                    funct3::LBU => (1, false),
                    funct3::LHU => (2, false),
                    funct3::LWU => (4, false),
                    _ => return Err(invalid),
                };
                let address = rs1.wrapping_add(imm as u64);
                if address % size as u64 != 0 {
                    return Err(Fault::ReadUnaligned(address));
                }
                let raw = self.memory.load(address, size)?;
                self.fire(&HookEvent::MemRead { address, size });
                let value = if signed {
                    let shift = 64 - 8 * size as u32;
                    (((raw << shift) as i64) >> shift) as u64
                } else {
                    raw
                };
                self.set_x(d.rd, value);
            }
            opcodes::OP_STORE => {
                let size = match d.funct3 {
                    funct3::SB => 1,
                    funct3::SH => 2,
                    funct3::SW => 4,
                    funct3::SD => 8,
                    _ => return Err(invalid),
                };
                let address = rs1.wrapping_add(imm as u64);
                if address % size as u64 != 0 {
                    return Err(Fault::WriteUnaligned(address));
                }
                let value = if size == 8 { rs2 } else { rs2 & ((1u64 << (8 * size)) - 1) };
                self.memory.store(address, size, value)?;
                self.fire(&HookEvent::MemWrite { address, size, value });
            }
            opcodes::OP_IMM => {
                let op = AluOp::from_imm(d.funct3, imm);
                let upper = imm >> 6;
                match op {
                    AluOp::Sll if upper != 0 => return Err(invalid),
                    AluOp::Srl | AluOp::Sra if upper & !0x10 != 0 => return Err(invalid),
                    _ => {}
                }
                self.set_x(d.rd, alu::execute(op, rs1, imm as u64, false));
            }
            opcodes::OP_IMM_32 => {
                let op = AluOp::from_imm(d.funct3, imm);
                let upper = imm >> 5;
                let valid = match op {
                    AluOp::Add => true,
                    AluOp::Sll => upper == 0,
                    AluOp::Srl | AluOp::Sra => upper & !0x20 == 0,
                    _ => false,
                };
                if !valid {
                    return Err(invalid);
                }
                self.set_x(d.rd, alu::execute(op, rs1, imm as u64, true));
            }
            opcodes::OP_REG => {
                let op = AluOp::from_reg(d.funct3, d.funct7).ok_or(invalid)?;
                self.set_x(d.rd, alu::execute(op, rs1, rs2, false));
            }
            opcodes::OP_REG_32 => {
                let op = AluOp::from_reg(d.funct3, d.funct7)
                    .filter(|op| op.has_word_form())
                    .ok_or(invalid)?;
                self.set_x(d.rd, alu::execute(op, rs1, rs2, true));
            }
            opcodes::OP_MISC_MEM if d.funct3 <= 1 => {}
            opcodes::OP_SYSTEM => match word {
                system::ECALL => self.ecall(pc)?,
                system::EBREAK => self.interrupt(INTNO_BREAKPOINT)?,
                _ => return Err(invalid),
            },
            _ => return Err(invalid),
        }
        Ok(next)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("pc", &format_args!("{:#x}", self.pc))
            .field("regions", &self.memory.len())
            .field("hooks", &self.hooks.len())
            .finish_non_exhaustive()
    }
}

impl Engine for Interpreter {
    fn mem_map(&mut self, address: u64, size: u64, perms: Permission) -> Result<(), EngineError> {
        self.memory.map(address, size, perms)
    }

    fn mem_unmap(&mut self, address: u64, size: u64) -> Result<(), EngineError> {
        self.memory.unmap(address, size)
    }

    fn mem_read(&self, address: u64, size: usize) -> Result<Vec<u8>, EngineError> {
        self.memory.read(address, size)
    }

    fn mem_write(&mut self, address: u64, data: &[u8]) -> Result<(), EngineError> {
        self.memory.write(address, data)
    }

    fn reg_read(&self, reg: RegisterId) -> Result<u64, EngineError> {
        match reg {
            REG_PC => Ok(self.pc),
            r if (r as usize) < NUM_REGS => Ok(self.regs[r as usize]),
            r => Err(EngineError::InvalidRegister(r)),
        }
    }

    fn reg_write(&mut self, reg: RegisterId, value: u64) -> Result<(), EngineError> {
        match reg {
            REG_PC => self.pc = value,
            r if (r as usize) < NUM_REGS => self.set_x(r as usize, value),
            r => return Err(EngineError::InvalidRegister(r)),
        }
        Ok(())
    }

    fn add_hook(&mut self, kind: HookKind, callback: HookCallback) -> Result<HookId, EngineError> {
        self.hooks.push((kind, callback));
        Ok(HookId(self.hooks.len() - 1))
    }

    fn emu_start(&mut self, begin: u64, until: u64, count: usize) -> Result<(), EngineError> {
        self.pc = begin;
        let mut executed = 0usize;
        let mut block_start = true;

        while self.pc != until && (count == 0 || executed < count) && !self.stop.is_requested() {
            let pc = self.pc;
            let word = self.memory.fetch(pc)?;
            if block_start {
                self.fire(&HookEvent::Block { address: pc });
            }
            let bytes = word.to_le_bytes();
            self.fire(&HookEvent::Code { address: pc, bytes: &bytes });

            let next = self.execute(word, pc)?;
            block_start = next != pc.wrapping_add(4);
            self.pc = next;
            executed += 1;
        }

        if self.stop.is_requested() {
            // Consumed: the next run starts unstopped.
            self.stop.clear();
        }
        trace!(pc = self.pc, executed, "run window closed");
        Ok(())
    }

    fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }
}
