//! Session lifecycle states and the transition table.
//!
//! Every state change goes through [`plan`], which decides what must happen on
//! entry to the new state (before observers fire) and on exit (after).

use std::fmt;

use serde::Serialize;

use crate::common::{EmulatorError, Result};

/// Lifecycle state of an emulation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
#[repr(u8)]
pub enum EmulatorState {
    /// Construction default; never a valid runtime value.
    #[default]
    Invalid = 0,
    /// The session is being built.
    Starting = 1,
    /// No engine; sections and registers are configuration only.
    NotRunning = 2,
    /// Engine exists, execution paused after a step.
    Idle = 3,
    /// Engine executing a run window.
    Running = 4,
    /// Engine being released.
    Teardown = 5,
    /// Engine exists, execution reached the end of the code window or faulted.
    Finished = 6,
}

impl EmulatorState {
    /// All states in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Invalid,
        Self::Starting,
        Self::NotRunning,
        Self::Idle,
        Self::Running,
        Self::Teardown,
        Self::Finished,
    ];

    /// States in which register reads are refreshed from the engine.
    pub const fn is_execution_capable(self) -> bool {
        matches!(self, Self::Running | Self::Idle | Self::Finished)
    }

    /// States in which a run may be in progress or resumed.
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running | Self::Idle)
    }

    /// Lower-case display name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Starting => "starting",
            Self::NotRunning => "not running",
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Teardown => "teardown",
            Self::Finished => "finished",
        }
    }
}

impl fmt::Display for EmulatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Work done before the new state is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryAction {
    /// Nothing.
    None,
    /// Create and arm the engine if it does not exist.
    EnsureEngine,
    /// As [`EnsureEngine`](Self::EnsureEngine), then pull registers from the engine
    /// because the previous run has just stopped.
    EnsureEngineAndRefresh,
    /// Pull registers from the engine.
    Refresh,
}

/// Work done after the new state is committed and observers have fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitAction {
    /// Nothing.
    None,
    /// Hand the next run window to the runner.
    Run,
    /// Unmap, release the engine and reset the session.
    Release,
}

/// A planned state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State being left.
    pub from: EmulatorState,
    /// State being entered.
    pub to: EmulatorState,
    /// Pre-commit action.
    pub entry: EntryAction,
    /// Post-commit action.
    pub exit: ExitAction,
}

/// Plans the change from `from` to `to`.
///
/// Returns `Ok(None)` when the states are equal.
///
/// # Errors
///
/// [`EmulatorError::InvalidState`] if `to` is [`EmulatorState::Invalid`].
pub fn plan(from: EmulatorState, to: EmulatorState) -> Result<Option<Transition>> {
    use EmulatorState as S;

    if to == S::Invalid {
        return Err(EmulatorError::invalid_state("transition to invalid", from));
    }
    if from == to {
        return Ok(None);
    }

    let entry = match to {
        S::Running | S::Idle if from == S::Running => EntryAction::EnsureEngineAndRefresh,
        S::Running | S::Idle => EntryAction::EnsureEngine,
        S::Finished => EntryAction::Refresh,
        _ => EntryAction::None,
    };
    let exit = match to {
        S::Running => ExitAction::Run,
        S::Teardown => ExitAction::Release,
        _ => ExitAction::None,
    };
    Ok(Some(Transition { from, to, entry, exit }))
}
