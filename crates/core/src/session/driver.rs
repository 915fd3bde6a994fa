//! Execution driver.
//!
//! Decides the window of the next run from the program counter and the
//! execution policy, hands it to the runner and applies the outcome:
//! 1. **Step mode:** one instruction, decoded from the compiled code at the
//!    current pc. No decodable instruction left means the window is exhausted.
//! 2. **Free-run mode:** from the current pc to the end of the code window.
//! 3. **Outcome:** pc at the end of the window moves the session to `Finished`,
//!    anywhere else to `Idle`; an engine fault forces `Finished` and is reported.
//!    A faulted engine is never resumed; later run requests go straight to `Finished`.

use tracing::{debug, error, info};

use super::runner::{RunExit, RunJob, RunOutcome};
use super::{EmulatorState, Session};
use crate::common::{EmulatorError, Result};

/// The next run window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// Nothing left to execute.
    Exhausted,
    /// Run from `start` until `stop` or `count` instructions (`0` = unbounded).
    Range {
        /// First address executed.
        start: u64,
        /// Address the engine stops at.
        stop: u64,
        /// Instruction budget.
        count: usize,
    },
}

impl Session {
    /// Computes the next run window without running anything.
    ///
    /// # Errors
    ///
    /// Propagates register read errors.
    pub fn plan_window(&mut self) -> Result<Window> {
        let pc = self.pc()?;
        let start = if pc == 0 { self.start_addr } else { pc };

        if !self.step_mode() {
            return Ok(Window::Range {
                start,
                stop: self.end_addr,
                count: 0,
            });
        }

        let remaining = start
            .checked_sub(self.start_addr)
            .and_then(|offset| usize::try_from(offset).ok())
            .and_then(|offset| self.code.get(offset..));
        let Some(code) = remaining else {
            return Ok(Window::Exhausted);
        };
        Ok(match self.ctx.arch.disassemble(code, start).next() {
            Some(insn) => Window::Range {
                start,
                stop: insn.end(),
                count: 1,
            },
            None => Window::Exhausted,
        })
    }

    /// Plans and starts the next run window.
    ///
    /// A window that cannot be planned or dispatched leaves the session `Finished`.
    pub(super) fn run_window(&mut self) -> Result<()> {
        if self.last_fault.is_some() {
            debug!("engine faulted earlier, not resuming");
            return self.transition_to(EmulatorState::Finished);
        }
        let job = match self.prepare_job() {
            Ok(Some(job)) => job,
            Ok(None) => {
                debug!("code window exhausted");
                return self.transition_to(EmulatorState::Finished);
            }
            Err(err) => {
                error!("cannot start run: {err}");
                self.transition_to(EmulatorState::Finished)?;
                return Err(err);
            }
        };

        // Cleared here, on the host thread, so a stop issued after dispatch is never lost.
        if let Some(handle) = &self.stop {
            handle.clear();
        }
        debug!(
            generation = job.generation,
            "running from {:#x} to {:#x} (count={})", job.start, job.stop, job.count
        );
        match self.runner.run(job) {
            Some(outcome) => self.complete_run(outcome),
            None => Ok(()),
        }
    }

    /// Builds the job for the next window, `None` if nothing is left to run.
    fn prepare_job(&mut self) -> Result<Option<RunJob>> {
        let Window::Range { start, stop, count } = self.plan_window()? else {
            return Ok(None);
        };

        let engine = self
            .engine
            .clone()
            .ok_or_else(|| EmulatorError::invalid_state("run", self.state))?;
        let arch = &*self.ctx.arch;
        let register = |name: &str| {
            arch.engine_register(name)
                .ok_or_else(|| EmulatorError::UnknownRegister(name.to_string()))
        };
        let pc_reg = register(arch.pc())?;
        let sp_reg = register(arch.sp())?;
        self.generation += 1;
        Ok(Some(RunJob {
            engine,
            start,
            stop,
            count,
            pc_reg,
            sp_reg,
            generation: self.generation,
        }))
    }

    /// Applies the outcome of a run.
    ///
    /// Outcomes that arrive when the session is no longer `Running` (for example
    /// after a teardown), or that belong to an earlier run request, are discarded.
    ///
    /// # Errors
    ///
    /// [`EmulatorError::EngineFault`] after a faulted run, once the session is `Finished`.
    pub fn complete_run(&mut self, outcome: RunOutcome) -> Result<()> {
        if self.state != EmulatorState::Running {
            debug!(state = %self.state, "discarding stale run outcome");
            return Ok(());
        }
        if outcome.generation != self.generation {
            debug!(
                generation = outcome.generation,
                current = self.generation,
                "discarding outcome of an earlier run"
            );
            return Ok(());
        }

        match outcome.exit {
            RunExit::Completed { pc } => {
                let next = if pc == self.end_addr {
                    info!("reached end of code window at {pc:#x}");
                    EmulatorState::Finished
                } else {
                    EmulatorState::Idle
                };
                self.transition_to(next)
            }
            RunExit::Faulted { error, pc, sp } => {
                error!(code = error.code(), "engine fault at pc={pc:#x}, sp={sp:#x}: {error}");
                let fault = EmulatorError::EngineFault {
                    code: error.code(),
                    pc,
                    sp,
                    reason: error.to_string(),
                };
                self.last_fault = Some(error);
                self.transition_to(EmulatorState::Finished)?;
                Err(fault)
            }
        }
    }

    /// Applies a finished background run, if any. Returns `true` if one was applied.
    ///
    /// # Errors
    ///
    /// As [`Session::complete_run`].
    pub fn poll(&mut self) -> Result<bool> {
        match self.runner.try_recv() {
            Some(outcome) => self.complete_run(outcome).map(|()| true),
            None => Ok(false),
        }
    }

    /// Blocks for the oldest background run and applies it. Returns `false` if none was in flight.
    ///
    /// # Errors
    ///
    /// As [`Session::complete_run`].
    pub fn wait(&mut self) -> Result<bool> {
        match self.runner.wait() {
            Some(outcome) => self.complete_run(outcome).map(|()| true),
            None => Ok(false),
        }
    }

    /// Returns `true` while the runner has an uncollected run.
    pub fn is_busy(&self) -> bool {
        self.runner.is_busy()
    }
}
