//! Per-state observer registry.
//!
//! Observers run synchronously on the thread performing the transition, in
//! registration order. They receive the session and may request further
//! transitions.

use std::collections::HashMap;
use std::fmt;

use super::{EmulatorState, Session};

/// Callback fired when the session enters a state.
pub type Observer = Box<dyn FnMut(&mut Session) + Send>;

/// Observers keyed by the state they watch.
#[derive(Default)]
pub struct ObserverRegistry {
    by_state: HashMap<EmulatorState, Vec<Observer>>,
}

impl ObserverRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `observer` to the list for `state`.
    pub fn subscribe(&mut self, state: EmulatorState, observer: Observer) {
        self.by_state.entry(state).or_default().push(observer);
    }

    /// Number of observers watching `state`.
    pub fn count(&self, state: EmulatorState) -> usize {
        self.by_state.get(&state).map_or(0, Vec::len)
    }

    /// Removes the list for `state` so it can be fired without borrowing the registry.
    pub(crate) fn take(&mut self, state: EmulatorState) -> Vec<Observer> {
        self.by_state.remove(&state).unwrap_or_default()
    }

    /// Puts a fired list back, keeping observers subscribed while it was out.
    pub(crate) fn restore(&mut self, state: EmulatorState, mut fired: Vec<Observer>) {
        let added = self.take(state);
        fired.extend(added);
        if !fired.is_empty() {
            let _ = self.by_state.insert(state, fired);
        }
    }
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for state in EmulatorState::ALL {
            let n = self.count(state);
            if n > 0 {
                let _ = map.entry(&state, &n);
            }
        }
        map.finish()
    }
}
