//! Run executors.
//!
//! A [`Runner`] performs the engine's blocking run call for the session. The
//! inline runner blocks the requesting thread; the threaded runner moves the
//! call onto a worker and hands the outcome back over a channel so that
//! session state is still only mutated on the host thread.

use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread;

use tracing::debug;

use crate::engine::{Engine, EngineError, RegisterId};

/// The session's engine, shared with in-flight runs.
pub type SharedEngine = Arc<Mutex<Box<dyn Engine>>>;

/// Locks the engine, recovering from a poisoned lock.
pub(crate) fn lock_engine(engine: &Mutex<Box<dyn Engine>>) -> MutexGuard<'_, Box<dyn Engine>> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Locks the engine only if no run currently holds it.
pub(crate) fn try_lock_engine(
    engine: &Mutex<Box<dyn Engine>>,
) -> Option<MutexGuard<'_, Box<dyn Engine>>> {
    match engine.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}

/// One run window handed to a runner.
pub struct RunJob {
    pub(crate) engine: SharedEngine,
    /// Address execution starts at.
    pub start: u64,
    /// Address execution stops at.
    pub stop: u64,
    /// Instruction budget, `0` for unbounded.
    pub count: usize,
    pub(crate) pc_reg: RegisterId,
    pub(crate) sp_reg: RegisterId,
    /// Run request this job was planned for.
    pub generation: u64,
}

impl fmt::Debug for RunJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunJob")
            .field("start", &format_args!("{:#x}", self.start))
            .field("stop", &format_args!("{:#x}", self.stop))
            .field("count", &self.count)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl RunJob {
    /// Performs the blocking run under the engine lock.
    pub fn execute(self) -> RunOutcome {
        let mut engine = lock_engine(&self.engine);
        let result = engine.emu_start(self.start, self.stop, self.count);
        let pc = engine.reg_read(self.pc_reg).unwrap_or_default();
        let exit = match result {
            Ok(()) => RunExit::Completed { pc },
            Err(error) => RunExit::Faulted {
                error,
                pc,
                sp: engine.reg_read(self.sp_reg).unwrap_or_default(),
            },
        };
        RunOutcome {
            generation: self.generation,
            exit,
        }
    }
}

/// A finished run, tagged with the run request it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Generation of the [`RunJob`] that produced this outcome.
    pub generation: u64,
    /// How the run ended.
    pub exit: RunExit,
}

/// How a run window ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunExit {
    /// The engine returned normally with the program counter at `pc`.
    Completed {
        /// Program counter after the run.
        pc: u64,
    },
    /// The engine raised.
    Faulted {
        /// The engine error.
        error: EngineError,
        /// Program counter at the fault.
        pc: u64,
        /// Stack pointer at the fault.
        sp: u64,
    },
}

/// Executes run windows on behalf of a session.
pub trait Runner: Send + fmt::Debug {
    /// Starts `job`. Returns the outcome if the run completed synchronously.
    fn run(&mut self, job: RunJob) -> Option<RunOutcome>;

    /// Returns a finished outcome without blocking, if one is ready.
    fn try_recv(&mut self) -> Option<RunOutcome> {
        None
    }

    /// Blocks until the oldest in-flight run finishes. `None` if nothing is in flight.
    fn wait(&mut self) -> Option<RunOutcome> {
        None
    }

    /// Returns `true` while a run has not been collected.
    fn is_busy(&self) -> bool {
        false
    }
}

/// Runs on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineRunner;

impl Runner for InlineRunner {
    fn run(&mut self, job: RunJob) -> Option<RunOutcome> {
        Some(job.execute())
    }
}

/// Runs each window on a fresh worker thread.
#[derive(Debug)]
pub struct ThreadedRunner {
    tx: Sender<RunOutcome>,
    rx: Receiver<RunOutcome>,
    in_flight: usize,
}

impl ThreadedRunner {
    /// Creates a runner with nothing in flight.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx, in_flight: 0 }
    }
}

impl Default for ThreadedRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner for ThreadedRunner {
    fn run(&mut self, job: RunJob) -> Option<RunOutcome> {
        let tx = self.tx.clone();
        debug!(?job, "spawning run worker");
        // Detached: the outcome comes back over the channel.
        let _ = thread::spawn(move || {
            let _ = tx.send(job.execute());
        });
        self.in_flight += 1;
        None
    }

    fn try_recv(&mut self) -> Option<RunOutcome> {
        let outcome = self.rx.try_recv().ok()?;
        self.in_flight = self.in_flight.saturating_sub(1);
        Some(outcome)
    }

    fn wait(&mut self) -> Option<RunOutcome> {
        if self.in_flight == 0 {
            return None;
        }
        let outcome = self.rx.recv().ok()?;
        self.in_flight -= 1;
        Some(outcome)
    }

    fn is_busy(&self) -> bool {
        self.in_flight > 0
    }
}
