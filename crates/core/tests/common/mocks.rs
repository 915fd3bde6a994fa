use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mockall::mock;
use stepwise_core::arch::{Architecture, RiscV64};
use stepwise_core::engine::{
    Engine, EngineError, HookCallback, HookId, HookKind, Interpreter, RegisterId, StopHandle,
};
use stepwise_core::isa::Instruction;
use stepwise_core::isa::asm::AsmError;
use stepwise_core::memory::{MemorySection, Permission};

mock! {
    #[derive(Debug)]
    pub Cpu {}
    impl Engine for Cpu {
        fn mem_map(&mut self, address: u64, size: u64, perms: Permission) -> Result<(), EngineError>;
        fn mem_unmap(&mut self, address: u64, size: u64) -> Result<(), EngineError>;
        fn mem_read(&self, address: u64, size: usize) -> Result<Vec<u8>, EngineError>;
        fn mem_write(&mut self, address: u64, data: &[u8]) -> Result<(), EngineError>;
        fn reg_read(&self, reg: RegisterId) -> Result<u64, EngineError>;
        fn reg_write(&mut self, reg: RegisterId, value: u64) -> Result<(), EngineError>;
        fn add_hook(&mut self, kind: HookKind, callback: HookCallback) -> Result<HookId, EngineError>;
        fn emu_start(&mut self, begin: u64, until: u64, count: usize) -> Result<(), EngineError>;
        fn stop_handle(&self) -> StopHandle;
    }
}

/// RV64 backend whose engine is a prepared [`MockCpu`].
///
/// The mock is handed out once; a second `create_engine` fails.
#[derive(Debug)]
pub struct MockArch {
    inner: RiscV64,
    engine: Mutex<Option<MockCpu>>,
}

impl MockArch {
    pub fn new(engine: MockCpu) -> Self {
        Self {
            inner: RiscV64::new(),
            engine: Mutex::new(Some(engine)),
        }
    }
}

impl Architecture for MockArch {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn registers(&self) -> &[&'static str] {
        self.inner.registers()
    }

    fn pc(&self) -> &'static str {
        self.inner.pc()
    }

    fn sp(&self) -> &'static str {
        self.inner.sp()
    }

    fn engine_register(&self, name: &str) -> Option<RegisterId> {
        self.inner.engine_register(name)
    }

    fn assemble(&self, source: &str, base: u64) -> Result<Vec<Instruction>, AsmError> {
        self.inner.assemble(source, base)
    }

    fn disassemble<'a>(
        &'a self,
        code: &'a [u8],
        base: u64,
    ) -> Box<dyn Iterator<Item = Instruction> + 'a> {
        self.inner.disassemble(code, base)
    }

    fn create_engine(&self) -> Result<Box<dyn Engine>, EngineError> {
        match self.engine.lock().unwrap().take() {
            Some(engine) => Ok(Box::new(engine)),
            None => Err(EngineError::InvalidRegister(u32::MAX)),
        }
    }
}

/// An [`Interpreter`] that counts the regions mapped into it.
#[derive(Debug)]
pub struct CountingEngine {
    inner: Interpreter,
    maps: Arc<AtomicUsize>,
}

impl Engine for CountingEngine {
    fn mem_map(&mut self, address: u64, size: u64, perms: Permission) -> Result<(), EngineError> {
        let _ = self.maps.fetch_add(1, Ordering::SeqCst);
        self.inner.mem_map(address, size, perms)
    }

    fn mem_unmap(&mut self, address: u64, size: u64) -> Result<(), EngineError> {
        self.inner.mem_unmap(address, size)
    }

    fn mem_read(&self, address: u64, size: usize) -> Result<Vec<u8>, EngineError> {
        self.inner.mem_read(address, size)
    }

    fn mem_write(&mut self, address: u64, data: &[u8]) -> Result<(), EngineError> {
        self.inner.mem_write(address, data)
    }

    fn reg_read(&self, reg: RegisterId) -> Result<u64, EngineError> {
        self.inner.reg_read(reg)
    }

    fn reg_write(&mut self, reg: RegisterId, value: u64) -> Result<(), EngineError> {
        self.inner.reg_write(reg, value)
    }

    fn add_hook(&mut self, kind: HookKind, callback: HookCallback) -> Result<HookId, EngineError> {
        self.inner.add_hook(kind, callback)
    }

    fn emu_start(&mut self, begin: u64, until: u64, count: usize) -> Result<(), EngineError> {
        self.inner.emu_start(begin, until, count)
    }

    fn stop_handle(&self) -> StopHandle {
        self.inner.stop_handle()
    }
}

/// RV64 backend that counts engine creations and mappings.
#[derive(Debug, Default)]
pub struct CountingArch {
    inner: RiscV64,
    pub engines: Arc<AtomicUsize>,
    pub maps: Arc<AtomicUsize>,
}

impl CountingArch {
    pub fn engines_created(&self) -> usize {
        self.engines.load(Ordering::SeqCst)
    }

    pub fn regions_mapped(&self) -> usize {
        self.maps.load(Ordering::SeqCst)
    }
}

impl Architecture for CountingArch {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn registers(&self) -> &[&'static str] {
        self.inner.registers()
    }

    fn pc(&self) -> &'static str {
        self.inner.pc()
    }

    fn sp(&self) -> &'static str {
        self.inner.sp()
    }

    fn engine_register(&self, name: &str) -> Option<RegisterId> {
        self.inner.engine_register(name)
    }

    fn assemble(&self, source: &str, base: u64) -> Result<Vec<Instruction>, AsmError> {
        self.inner.assemble(source, base)
    }

    fn disassemble<'a>(
        &'a self,
        code: &'a [u8],
        base: u64,
    ) -> Box<dyn Iterator<Item = Instruction> + 'a> {
        self.inner.disassemble(code, base)
    }

    fn create_engine(&self) -> Result<Box<dyn Engine>, EngineError> {
        let _ = self.engines.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingEngine {
            inner: Interpreter::new(),
            maps: Arc::clone(&self.maps),
        }))
    }

    fn has_syscall_hook(&self) -> bool {
        true
    }
}

const SELECTOR_REGISTERS: [&str; 36] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6", "pc", "cs", "ds", "ss",
];

/// RV64 backend with three segment-selector pseudo-registers.
///
/// The selectors report engine ids the interpreter rejects, so pushing one
/// into the engine would fail setup.
#[derive(Debug, Default)]
pub struct SelectorArch {
    inner: RiscV64,
}

impl Architecture for SelectorArch {
    fn name(&self) -> &'static str {
        "selector"
    }

    fn registers(&self) -> &[&'static str] {
        &SELECTOR_REGISTERS
    }

    fn pc(&self) -> &'static str {
        "pc"
    }

    fn sp(&self) -> &'static str {
        "sp"
    }

    fn engine_register(&self, name: &str) -> Option<RegisterId> {
        match name {
            "cs" => Some(100),
            "ds" => Some(101),
            "ss" => Some(102),
            other => self.inner.engine_register(other),
        }
    }

    fn assemble(&self, source: &str, base: u64) -> Result<Vec<Instruction>, AsmError> {
        self.inner.assemble(source, base)
    }

    fn disassemble<'a>(
        &'a self,
        code: &'a [u8],
        base: u64,
    ) -> Box<dyn Iterator<Item = Instruction> + 'a> {
        self.inner.disassemble(code, base)
    }

    fn create_engine(&self) -> Result<Box<dyn Engine>, EngineError> {
        self.inner.create_engine()
    }

    fn selector_registers(&self) -> &[&'static str] {
        &["cs", "ds", "ss"]
    }

    fn synthesize_selectors(
        &self,
        text: &MemorySection,
        data: &MemorySection,
        stack: &MemorySection,
    ) -> Vec<(&'static str, u64)> {
        vec![
            ("cs", text.address() >> 4),
            ("ds", data.address() >> 4),
            ("ss", stack.address() >> 4),
        ]
    }
}

/// RV64 backend whose program counter has no engine id.
///
/// Setup succeeds because unrouted registers are skipped, but no run can be dispatched.
#[derive(Debug, Default)]
pub struct UnroutedPcArch {
    inner: RiscV64,
}

impl Architecture for UnroutedPcArch {
    fn name(&self) -> &'static str {
        "unrouted-pc"
    }

    fn registers(&self) -> &[&'static str] {
        self.inner.registers()
    }

    fn pc(&self) -> &'static str {
        self.inner.pc()
    }

    fn sp(&self) -> &'static str {
        self.inner.sp()
    }

    fn engine_register(&self, name: &str) -> Option<RegisterId> {
        if name == self.inner.pc() { None } else { self.inner.engine_register(name) }
    }

    fn assemble(&self, source: &str, base: u64) -> Result<Vec<Instruction>, AsmError> {
        self.inner.assemble(source, base)
    }

    fn disassemble<'a>(
        &'a self,
        code: &'a [u8],
        base: u64,
    ) -> Box<dyn Iterator<Item = Instruction> + 'a> {
        self.inner.disassemble(code, base)
    }

    fn create_engine(&self) -> Result<Box<dyn Engine>, EngineError> {
        self.inner.create_engine()
    }
}

/// A mock engine that accepts every setup call and tracks the pc it was given.
///
/// `emu_start` jumps straight to `until`; `reg_read` reports `a0_value` for `a0`.
pub fn permissive_cpu(a0_value: u64) -> MockCpu {
    use stepwise_core::engine::interp::REG_PC;

    let pc = Arc::new(std::sync::atomic::AtomicU64::new(0));
    let mut cpu = MockCpu::new();
    let _ = cpu.expect_add_hook().returning(|_, _| Ok(HookId(0)));
    let _ = cpu.expect_mem_write().returning(|_, _| Ok(()));
    let _ = cpu.expect_stop_handle().returning(StopHandle::new);

    let written = Arc::clone(&pc);
    let _ = cpu.expect_reg_write().returning(move |reg, value| {
        if reg == REG_PC {
            written.store(value, Ordering::SeqCst);
        }
        Ok(())
    });
    let ran = Arc::clone(&pc);
    let _ = cpu.expect_emu_start().returning(move |_, until, _| {
        ran.store(until, Ordering::SeqCst);
        Ok(())
    });
    let _ = cpu.expect_reg_read().returning(move |reg| {
        Ok(match reg {
            REG_PC => pc.load(Ordering::SeqCst),
            10 => a0_value,
            _ => 0,
        })
    });
    cpu
}
