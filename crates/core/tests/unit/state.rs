//! Transition Table Tests.
//!
//! Checks every `(from, to)` pair of the lifecycle table, plus properties that
//! must hold for arbitrary pairs.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;
use stepwise_core::EmulatorError;
use stepwise_core::session::state::plan;
use stepwise_core::session::{EmulatorState as S, EntryAction, ExitAction};

fn expected_entry(from: S, to: S) -> EntryAction {
    match (from, to) {
        (S::Running, S::Running | S::Idle) => EntryAction::EnsureEngineAndRefresh,
        (_, S::Running | S::Idle) => EntryAction::EnsureEngine,
        (_, S::Finished) => EntryAction::Refresh,
        _ => EntryAction::None,
    }
}

fn expected_exit(to: S) -> ExitAction {
    match to {
        S::Running => ExitAction::Run,
        S::Teardown => ExitAction::Release,
        _ => ExitAction::None,
    }
}

#[test]
fn every_pair_follows_the_table() {
    for from in S::ALL {
        for to in S::ALL {
            let planned = plan(from, to);
            if to == S::Invalid {
                assert!(matches!(planned, Err(EmulatorError::InvalidState { .. })), "{from} -> {to}");
                continue;
            }
            let planned = planned.unwrap();
            if from == to {
                assert_eq!(planned, None, "{from} -> {to}");
                continue;
            }
            let t = planned.unwrap();
            assert_eq!((t.from, t.to), (from, to));
            assert_eq!(t.entry, expected_entry(from, to), "entry of {from} -> {to}");
            assert_eq!(t.exit, expected_exit(to), "exit of {from} -> {to}");
        }
    }
}

#[rstest]
#[case(S::NotRunning, S::Running, EntryAction::EnsureEngine, ExitAction::Run)]
#[case(S::Idle, S::Running, EntryAction::EnsureEngine, ExitAction::Run)]
#[case(S::Running, S::Idle, EntryAction::EnsureEngineAndRefresh, ExitAction::None)]
#[case(S::Running, S::Finished, EntryAction::Refresh, ExitAction::None)]
#[case(S::Finished, S::Teardown, EntryAction::None, ExitAction::Release)]
#[case(S::Teardown, S::NotRunning, EntryAction::None, ExitAction::None)]
fn lifecycle_edges(#[case] from: S, #[case] to: S, #[case] entry: EntryAction, #[case] exit: ExitAction) {
    let t = plan(from, to).unwrap().unwrap();
    assert_eq!((t.entry, t.exit), (entry, exit));
}

#[test]
fn state_predicates() {
    let capable: Vec<S> = S::ALL.into_iter().filter(|s| s.is_execution_capable()).collect();
    assert_eq!(capable, [S::Idle, S::Running, S::Finished]);
    let running: Vec<S> = S::ALL.into_iter().filter(|s| s.is_running()).collect();
    assert_eq!(running, [S::Idle, S::Running]);
    assert_eq!(S::NotRunning.to_string(), "not running");
    assert!(S::Starting < S::NotRunning && S::Teardown < S::Finished);
}

fn any_state() -> impl Strategy<Value = S> {
    prop::sample::select(S::ALL.to_vec())
}

proptest! {
    #[test]
    fn only_engine_states_create_engines(from in any_state(), to in any_state()) {
        if let Ok(Some(t)) = plan(from, to) {
            let creates = matches!(t.entry, EntryAction::EnsureEngine | EntryAction::EnsureEngineAndRefresh);
            prop_assert_eq!(creates, matches!(to, S::Running | S::Idle));
        }
    }

    #[test]
    fn only_teardown_releases(from in any_state(), to in any_state()) {
        if let Ok(Some(t)) = plan(from, to) {
            prop_assert_eq!(t.exit == ExitAction::Release, to == S::Teardown);
        }
    }

    #[test]
    fn invalid_is_never_a_target(from in any_state()) {
        prop_assert!(plan(from, S::Invalid).is_err());
    }
}
