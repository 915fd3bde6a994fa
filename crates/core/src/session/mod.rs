//! Emulation session.
//!
//! The [`Session`] owns the engine handle, the memory layout, the register
//! cache and the compiled code, and moves through [`EmulatorState`]s:
//! 1. **Configuration:** While `NotRunning`, sections, registers and source are
//!    plain data; nothing touches an engine.
//! 2. **Arming:** Entering `Running` or `Idle` creates the engine on demand
//!    ([`Session::setup`]): map sections, seed registers, assemble and write code.
//! 3. **Execution:** Entering `Running` hands one run window to the [`Runner`];
//!    the outcome moves the session to `Idle` or `Finished`.
//! 4. **Release:** Entering `Teardown` unmaps and drops the engine, then resets
//!    to `NotRunning`.
//!
//! Observers subscribed per state are the only way the session talks to its host.

/// Run window planning and outcome handling.
pub mod driver;

/// Per-state observer registry.
pub mod observers;

/// Register cache.
pub mod registers;

/// Run executors.
pub mod runner;

/// States and the transition table.
pub mod state;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{Level, debug, info, trace, warn};

use crate::arch::{Architecture, RiscV64};
use crate::common::constants::{DATA_SECTION, STACK_SECTION, TEXT_SECTION};
use crate::common::{EmulatorError, Result};
use crate::config::Config;
use crate::engine::{Engine, EngineError, HookEvent, HookKind, StopHandle};
use crate::isa::Instruction;
use crate::memory::MemoryLayout;
use crate::stats::{ExecutionStats, StatsSnapshot};

pub use driver::Window;
pub use observers::{Observer, ObserverRegistry};
pub use registers::{RegisterCache, RegisterSource};
pub use runner::{InlineRunner, RunExit, RunJob, RunOutcome, Runner, SharedEngine, ThreadedRunner};
pub use state::{EmulatorState, EntryAction, ExitAction, Transition};

use runner::{lock_engine, try_lock_engine};

/// Host-provided collaborators of a session.
#[derive(Debug, Clone)]
pub struct Context {
    /// Instruction set backend.
    pub arch: Arc<dyn Architecture>,
    /// Configuration the session starts from.
    pub config: Config,
}

impl Context {
    /// Bundles an architecture and a configuration.
    pub fn new(arch: Arc<dyn Architecture>, config: Config) -> Self {
        Self { arch, config }
    }

    /// RV64 backend with `config`.
    pub fn riscv64(config: Config) -> Self {
        Self::new(Arc::new(RiscV64::new()), config)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::riscv64(Config::default())
    }
}

/// Reads live register values through the architecture's id mapping.
struct EngineRegisters<'a> {
    engine: &'a dyn Engine,
    arch: &'a dyn Architecture,
}

impl RegisterSource for EngineRegisters<'_> {
    fn read_register(&self, name: &str) -> Option<u64> {
        let id = self.arch.engine_register(name)?;
        self.engine.reg_read(id).ok()
    }
}

/// An assemble-and-run emulation session.
pub struct Session {
    ctx: Context,
    state: EmulatorState,
    initial_layout: MemoryLayout,
    sections: MemoryLayout,
    registers: RegisterCache,
    source: String,
    code: Vec<u8>,
    start_addr: u64,
    end_addr: u64,
    engine: Option<SharedEngine>,
    stop: Option<StopHandle>,
    observers: ObserverRegistry,
    runner: Box<dyn Runner>,
    step_mode: Arc<AtomicBool>,
    stats: ExecutionStats,
    last_fault: Option<EngineError>,
    generation: u64,
}

impl Session {
    /// Builds a session and performs the initial reset, leaving it `NotRunning`.
    ///
    /// # Errors
    ///
    /// Fails if the configured layout is invalid (bad permission string,
    /// misaligned or overlapping sections).
    pub fn new(ctx: Context) -> Result<Self> {
        let layout = ctx.config.memory_layout()?;
        layout.validate()?;

        let mut session = Self {
            state: EmulatorState::Starting,
            initial_layout: layout.clone(),
            sections: layout,
            registers: RegisterCache::new(ctx.arch.registers()),
            source: String::new(),
            code: Vec::new(),
            start_addr: 0,
            end_addr: 0,
            engine: None,
            stop: None,
            observers: ObserverRegistry::new(),
            runner: Box::new(InlineRunner),
            step_mode: Arc::new(AtomicBool::new(ctx.config.general.step_mode)),
            stats: ExecutionStats::new(),
            last_fault: None,
            generation: 0,
            ctx,
        };
        session.reset();
        Ok(session)
    }

    /// Replaces the runner.
    #[must_use]
    pub fn with_runner(mut self, runner: impl Runner + 'static) -> Self {
        self.runner = Box::new(runner);
        self
    }

    /// Current state.
    pub const fn state(&self) -> EmulatorState {
        self.state
    }

    /// `true` while `Running` or `Idle`.
    pub const fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// The architecture backend.
    pub fn arch(&self) -> &dyn Architecture {
        &*self.ctx.arch
    }

    /// The session's configuration.
    pub const fn config(&self) -> &Config {
        &self.ctx.config
    }

    /// Returns `true` once the engine has been created and not yet released.
    pub const fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    /// The memory layout.
    pub const fn sections(&self) -> &MemoryLayout {
        &self.sections
    }

    /// Replaces the memory layout.
    ///
    /// # Errors
    ///
    /// [`EmulatorError::InvalidState`] while an engine exists; layout validation errors.
    pub fn set_sections(&mut self, layout: MemoryLayout) -> Result<()> {
        if self.engine.is_some() {
            return Err(EmulatorError::invalid_state("set sections", self.state));
        }
        layout.validate()?;
        self.sections = layout;
        Ok(())
    }

    /// The assembly source.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Replaces the assembly source. Takes effect at the next setup.
    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }

    /// Compiled bytes of the current code window.
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// First address of the code window.
    pub const fn start_addr(&self) -> u64 {
        self.start_addr
    }

    /// One past the last address of the code window.
    pub const fn end_addr(&self) -> u64 {
        self.end_addr
    }

    /// Whether run requests execute a single instruction.
    pub fn step_mode(&self) -> bool {
        self.step_mode.load(Ordering::Relaxed)
    }

    /// Switches between step and free-run mode.
    pub fn set_step_mode(&self, enabled: bool) {
        self.step_mode.store(enabled, Ordering::Relaxed);
    }

    /// The register cache, without refreshing anything.
    pub const fn registers(&self) -> &RegisterCache {
        &self.registers
    }

    /// Value of register `name`.
    ///
    /// In `Running`, `Idle` and `Finished` the value is first pulled from the
    /// engine, unless a run currently holds it, in which case the cached value
    /// is returned. In every other state the engine is not consulted.
    ///
    /// # Errors
    ///
    /// [`EmulatorError::UnknownRegister`].
    pub fn register(&mut self, name: &str) -> Result<u64> {
        if self.state.is_execution_capable()
            && let Some(engine) = &self.engine
            && let Some(guard) = try_lock_engine(engine)
        {
            let source = EngineRegisters {
                engine: &**guard,
                arch: &*self.ctx.arch,
            };
            return self.registers.get(name, Some(&source));
        }
        self.registers.get(name, None)
    }

    /// Program counter.
    ///
    /// # Errors
    ///
    /// Propagates [`Session::register`] errors.
    pub fn pc(&mut self) -> Result<u64> {
        let name = self.ctx.arch.pc();
        self.register(name)
    }

    /// Stack pointer.
    ///
    /// # Errors
    ///
    /// Propagates [`Session::register`] errors.
    pub fn sp(&mut self) -> Result<u64> {
        let name = self.ctx.arch.sp();
        self.register(name)
    }

    /// Stores `value` for `name` and pushes it into the engine if one exists.
    ///
    /// Blocks while a background run holds the engine.
    ///
    /// # Errors
    ///
    /// [`EmulatorError::UnknownRegister`] or an engine write error.
    pub fn set_register(&mut self, name: &str, value: u64) -> Result<()> {
        self.registers.set(name, value)?;
        if let Some(engine) = &self.engine
            && let Some(id) = self.ctx.arch.engine_register(name)
        {
            lock_engine(engine).reg_write(id, value)?;
        }
        Ok(())
    }

    /// Reads guest memory.
    ///
    /// # Errors
    ///
    /// [`EmulatorError::InvalidState`] outside `Running`/`Idle`/`Finished`;
    /// engine errors for unmapped ranges.
    pub fn read_memory(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let engine = self
            .engine
            .as_ref()
            .filter(|_| self.state.is_execution_capable())
            .ok_or_else(|| EmulatorError::invalid_state("read memory", self.state))?;
        Ok(lock_engine(engine).mem_read(address, size)?)
    }

    /// Writes guest memory.
    ///
    /// # Errors
    ///
    /// [`EmulatorError::InvalidState`] outside `Running`/`Idle`; engine errors
    /// for unmapped ranges.
    pub fn write_memory(&mut self, address: u64, data: &[u8]) -> Result<()> {
        let engine = self
            .engine
            .as_ref()
            .filter(|_| self.state.is_running())
            .ok_or_else(|| EmulatorError::invalid_state("write memory", self.state))?;
        Ok(lock_engine(engine).mem_write(address, data)?)
    }

    /// Registers `observer` to run each time the session enters `state`.
    pub fn subscribe(
        &mut self,
        state: EmulatorState,
        observer: impl FnMut(&mut Self) + Send + 'static,
    ) {
        self.observers.subscribe(state, Box::new(observer));
    }

    /// Counters collected by the hooks since the last setup.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// The engine error of the last faulted run, cleared at reset.
    pub const fn last_fault(&self) -> Option<&EngineError> {
        self.last_fault.as_ref()
    }

    /// Stop handle of the live engine, usable from other threads.
    pub fn stop_handle(&self) -> Option<StopHandle> {
        self.stop.clone()
    }

    /// Asks the engine to abort the current run.
    ///
    /// # Errors
    ///
    /// [`EmulatorError::InvalidState`] unless `Running` or `Idle`.
    pub fn stop(&self) -> Result<()> {
        if !self.is_running() {
            return Err(EmulatorError::invalid_state("stop", self.state));
        }
        if let Some(stop) = &self.stop {
            info!("stop requested");
            stop.request_stop();
        }
        Ok(())
    }

    /// Assembles the current source at `base` without touching any engine.
    ///
    /// # Errors
    ///
    /// [`EmulatorError::Assembly`] on a diagnostic or when nothing was produced.
    pub fn compile(&self, base: u64) -> Result<Vec<Instruction>> {
        debug!(arch = self.ctx.arch.name(), base, "assembling source");
        let insns = self
            .ctx
            .arch
            .assemble(&self.source, base)
            .map_err(|e| EmulatorError::Assembly(e.to_string()))?;
        if insns.is_empty() {
            return Err(EmulatorError::Assembly("no instruction".to_string()));
        }
        debug!(count = insns.len(), "instructions compiled");
        Ok(insns)
    }

    /// Checks that the source assembles at the text section's address.
    ///
    /// # Errors
    ///
    /// Layout lookup errors and [`EmulatorError::Assembly`].
    pub fn validate_assembly(&self) -> Result<Vec<Instruction>> {
        let base = self.sections.require(TEXT_SECTION)?.address();
        self.compile(base)
    }

    /// Creates and arms the engine. Does nothing if an engine already exists.
    ///
    /// Either completes fully or leaves no engine behind.
    ///
    /// # Errors
    ///
    /// [`EmulatorError::MissingRequiredSection`], [`EmulatorError::AmbiguousSection`],
    /// [`EmulatorError::Assembly`], [`EmulatorError::CodeOverflow`] or an engine error.
    pub fn setup(&mut self) -> Result<()> {
        if self.engine.is_some() {
            return Ok(());
        }
        info!(arch = self.ctx.arch.name(), "setting up emulation environment");
        self.sections.check_reserved()?;

        let mut engine = self.ctx.arch.create_engine()?;
        self.stats.reset();
        self.install_hooks(engine.as_mut())?;

        let provisional_start = self.populate_memory(engine.as_mut())?;
        trace!(provisional_start, "memory populated");

        let mut registers = self.registers.clone();
        self.populate_registers(engine.as_mut(), &mut registers)?;

        let (code, start, end) = self.populate_text(engine.as_mut())?;

        self.registers = registers;
        self.code = code;
        self.start_addr = start;
        self.end_addr = end;
        self.stop = Some(engine.stop_handle());
        self.engine = Some(Arc::new(Mutex::new(engine)));
        Ok(())
    }

    fn install_hooks(&self, engine: &mut dyn Engine) -> Result<()> {
        let general = &self.ctx.config.general;
        let trace_memory = general.trace_memory;
        let trace_instructions = general.trace_instructions;

        let stats = self.stats.clone();
        let _ = engine.add_hook(
            HookKind::Block,
            Box::new(move |event: &HookEvent<'_>| {
                if let HookEvent::Block { address } = event {
                    stats.count_block();
                    trace!("entering block at {address:#x}");
                }
            }),
        )?;

        let stats = self.stats.clone();
        let step_mode = Arc::clone(&self.step_mode);
        let arch = Arc::clone(&self.ctx.arch);
        let _ = engine.add_hook(
            HookKind::Code,
            Box::new(move |event: &HookEvent<'_>| {
                let HookEvent::Code { address, bytes } = event else {
                    return;
                };
                stats.count_instruction();
                let promoted = trace_instructions && tracing::enabled!(Level::DEBUG);
                if !promoted && !tracing::enabled!(Level::TRACE) {
                    return;
                }
                let Some(insn) = arch.disassemble(bytes, *address).next() else {
                    return;
                };
                let verb = if step_mode.load(Ordering::Relaxed) { "Stepping" } else { "Executing" };
                if promoted {
                    debug!("{verb} @ {insn}");
                } else {
                    trace!("{verb} @ {insn}");
                }
            }),
        )?;

        let stats = self.stats.clone();
        let _ = engine.add_hook(
            HookKind::Interrupt,
            Box::new(move |event: &HookEvent<'_>| {
                if let HookEvent::Interrupt { number } = event {
                    stats.count_interrupt();
                    debug!("triggering interrupt #{number}");
                }
            }),
        )?;

        let stats = self.stats.clone();
        let _ = engine.add_hook(
            HookKind::MemRead,
            Box::new(move |event: &HookEvent<'_>| {
                if let HookEvent::MemRead { address, size } = event {
                    stats.count_mem_read();
                    if trace_memory {
                        debug!("read: *{address:#x} (size={size})");
                    }
                }
            }),
        )?;

        let stats = self.stats.clone();
        let _ = engine.add_hook(
            HookKind::MemWrite,
            Box::new(move |event: &HookEvent<'_>| {
                if let HookEvent::MemWrite { address, size, value } = event {
                    stats.count_mem_write();
                    if trace_memory {
                        debug!("write: *{address:#x} = {value:#x} (size={size})");
                    }
                }
            }),
        )?;

        if self.ctx.arch.has_syscall_hook() {
            let stats = self.stats.clone();
            let _ = engine.add_hook(
                HookKind::Syscall,
                Box::new(move |event: &HookEvent<'_>| {
                    if let HookEvent::Syscall { address } = event {
                        stats.count_syscall();
                        debug!("syscall at {address:#x}");
                    }
                }),
            )?;
        }
        Ok(())
    }

    /// Maps every section and writes its initial content. Returns the lowest address.
    fn populate_memory(&self, engine: &mut dyn Engine) -> Result<u64> {
        for section in &self.sections {
            engine.mem_map(section.address(), section.size(), section.permission())?;
            match section.content() {
                Some(content) => {
                    engine.mem_write(section.address(), content)?;
                    debug!("mapping {section}, imported {} bytes", content.len());
                }
                None => debug!("mapping {section}"),
            }
        }
        Ok(self.sections.lowest_address().unwrap_or_default())
    }

    fn populate_registers(&self, engine: &mut dyn Engine, registers: &mut RegisterCache) -> Result<()> {
        let arch = &*self.ctx.arch;
        let text = self.sections.require(TEXT_SECTION)?;
        let data = self.sections.require(DATA_SECTION)?;
        let stack = self.sections.require(STACK_SECTION)?;

        if registers.cached(arch.pc())? == 0 {
            registers.set(arch.pc(), text.address())?;
            warn!("no value specified for PC register, setting to {:#x}", text.address());
        }
        if registers.cached(arch.sp())? == 0 {
            let sp = stack.address() + stack.size() / 2;
            registers.set(arch.sp(), sp)?;
            warn!("no value specified for SP register, setting to {sp:#x}");
        }

        for (name, value) in arch.synthesize_selectors(text, data, stack) {
            registers.set(name, value)?;
        }

        let selectors = arch.selector_registers();
        for (name, value) in registers.iter() {
            if selectors.contains(&name) {
                continue;
            }
            if let Some(id) = arch.engine_register(name) {
                engine.reg_write(id, value)?;
            }
        }
        debug!(count = registers.len(), "registers seeded");
        Ok(())
    }

    /// Assembles into the text section. Returns the code and its window.
    fn populate_text(&self, engine: &mut dyn Engine) -> Result<(Vec<u8>, u64, u64)> {
        let text = self.sections.require(TEXT_SECTION)?;
        info!("using text section {text}");

        // The window is anchored at the text section, which is where the code is written.
        let start = text.address();
        let insns = self.compile(start)?;
        let code: Vec<u8> = insns.iter().flat_map(|i| i.bytes.iter().copied()).collect();
        if code.len() as u64 > text.size() {
            return Err(EmulatorError::CodeOverflow {
                size: code.len(),
                capacity: text.size(),
            });
        }

        engine.mem_write(start, &code)?;
        debug!("populated text section with {} compiled bytes", code.len());
        let end = start + code.len() as u64;
        Ok((code, start, end))
    }

    /// Unmaps every section and releases the engine. Does nothing without an engine.
    pub fn teardown(&mut self) {
        let Some(engine) = self.engine.take() else {
            return;
        };
        if let Some(stop) = self.stop.take() {
            stop.request_stop();
        }
        info!(
            "ending emulation context at {:#x}",
            self.registers.cached(self.ctx.arch.pc()).unwrap_or_default()
        );

        let mut guard = lock_engine(&engine);
        for section in &self.sections {
            debug!("unmapping {section}");
            if let Err(e) = guard.mem_unmap(section.address(), section.size()) {
                warn!(section = section.name(), error = %e, "unmap failed");
            }
        }
        drop(guard);
        debug!("releasing engine");
    }

    /// Releases any engine, restores the initial layout, zeroes the registers and
    /// enters `NotRunning`. The source text is kept.
    pub fn reset(&mut self) {
        self.teardown();
        self.sections = self.initial_layout.clone();
        self.registers.reset();
        self.code.clear();
        self.start_addr = 0;
        self.end_addr = 0;
        self.last_fault = None;
        self.commit(EmulatorState::NotRunning);
    }

    /// Moves the session to `new_state`.
    ///
    /// Entry work (engine setup, register refresh) happens before the state is
    /// committed and observers fire; exit work (starting a run, releasing the
    /// engine) happens afterwards, unless an observer already moved the session on.
    ///
    /// # Errors
    ///
    /// Setup errors abort the transition with the state unchanged. Run faults are
    /// reported after the session has been forced to `Finished`.
    pub fn transition_to(&mut self, new_state: EmulatorState) -> Result<()> {
        let Some(transition) = state::plan(self.state, new_state)? else {
            return Ok(());
        };
        debug!(from = %transition.from, to = %transition.to, "emulator state transition");

        match transition.entry {
            EntryAction::None => {}
            EntryAction::EnsureEngine => self.setup()?,
            EntryAction::EnsureEngineAndRefresh => {
                self.setup()?;
                self.refresh_registers();
            }
            EntryAction::Refresh => self.refresh_registers(),
        }

        self.commit(new_state);
        if self.state != new_state {
            return Ok(());
        }

        match transition.exit {
            ExitAction::None => Ok(()),
            ExitAction::Run => self.run_window(),
            ExitAction::Release => {
                self.reset();
                Ok(())
            }
        }
    }

    /// Sets the state and fires its observers.
    fn commit(&mut self, new_state: EmulatorState) {
        if self.state == new_state {
            return;
        }
        self.state = new_state;
        let mut fired = self.observers.take(new_state);
        for observer in &mut fired {
            observer(self);
        }
        self.observers.restore(new_state, fired);
    }

    fn refresh_registers(&mut self) {
        let Some(engine) = &self.engine else {
            return;
        };
        let guard = lock_engine(engine);
        let source = EngineRegisters {
            engine: &**guard,
            arch: &*self.ctx.arch,
        };
        self.registers.refresh_all(&source);
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_running() {
            return f.write_str("Emulator instance is not running");
        }
        let arch = &*self.ctx.arch;
        let pc = self.registers.cached(arch.pc()).unwrap_or_default();
        let sp = self.registers.cached(arch.sp()).unwrap_or_default();
        write!(f, "Emulator is running, IP={pc:#x}, SP={sp:#x}")
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("arch", &self.ctx.arch.name())
            .field("state", &self.state)
            .field("sections", &self.sections.len())
            .field("code_len", &self.code.len())
            .field("start_addr", &format_args!("{:#x}", self.start_addr))
            .field("end_addr", &format_args!("{:#x}", self.end_addr))
            .field("engine", &self.engine.is_some())
            .field("observers", &self.observers)
            .field("runner", &self.runner)
            .finish_non_exhaustive()
    }
}
