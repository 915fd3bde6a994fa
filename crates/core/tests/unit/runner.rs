//! Run Executor Tests.
//!
//! Background runs over [`ThreadedRunner`], stop and teardown while a worker
//! holds the engine, and a hand-driven runner that exercises the runner seam.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use stepwise_core::common::constants::TEXT_BASE;
use stepwise_core::config::Config;
use stepwise_core::session::{InlineRunner, RunExit, RunJob, RunOutcome, Runner, ThreadedRunner};
use stepwise_core::{Context, EmulatorError, EmulatorState};

use crate::common::harness::{LI_ECALL, SPIN, THREE_STEPS, TestSession, WILD_JUMP};

fn threaded(source: &str, step_mode: bool) -> TestSession {
    let mut config = Config::default();
    config.general.step_mode = step_mode;
    TestSession::from_context(Context::riscv64(config), source).with_runner(ThreadedRunner::new())
}

/// Keeps every job for the test to execute by hand.
#[derive(Debug, Default)]
struct DeferredRunner {
    jobs: Arc<Mutex<Vec<RunJob>>>,
}

impl Runner for DeferredRunner {
    fn run(&mut self, job: RunJob) -> Option<RunOutcome> {
        self.jobs.lock().unwrap().push(job);
        None
    }
}

// ══════════════════════════════════════════════════════════
// 1. Threaded runner
// ══════════════════════════════════════════════════════════

#[test]
fn run_request_returns_before_the_outcome_is_applied() {
    let mut t = threaded(LI_ECALL, false);
    t.run().unwrap();
    assert_eq!(t.state(), EmulatorState::Running);

    assert!(t.wait().unwrap());
    assert_eq!(t.state(), EmulatorState::Finished);
    assert_eq!(t.reg("a0"), 1);
    assert!(!t.is_busy());
    assert!(!t.wait().unwrap());
}

#[test]
fn poll_applies_the_outcome_once_ready() {
    let mut t = threaded(LI_ECALL, false);
    t.run().unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while !t.poll().unwrap() {
        assert!(Instant::now() < deadline, "run never completed");
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(t.state(), EmulatorState::Finished);
    assert!(!t.poll().unwrap());
}

#[test]
fn stepping_in_the_background() {
    let mut t = threaded(THREE_STEPS, true);
    let mut states = Vec::new();
    for _ in 0..3 {
        t.run().unwrap();
        assert!(t.wait().unwrap());
        states.push(t.state());
    }
    assert_eq!(states, [EmulatorState::Idle, EmulatorState::Idle, EmulatorState::Finished]);
    assert_eq!(t.reg("a0"), 3);
}

#[test]
fn background_fault_is_reported_by_wait() {
    let mut t = threaded(WILD_JUMP, false);
    t.run().unwrap();
    let err = t.wait().unwrap_err();
    assert!(matches!(err, EmulatorError::EngineFault { code: 8, pc: 0x10_0000, .. }), "{err}");
    assert_eq!(t.state(), EmulatorState::Finished);
    assert!(t.last_fault().is_some());
}

#[test]
fn stop_from_host_ends_a_spinning_run_in_idle() {
    let mut t = threaded(SPIN, false);
    t.run().unwrap();
    thread::sleep(Duration::from_millis(5));
    t.stop().unwrap();
    assert!(t.wait().unwrap());
    assert_eq!(t.state(), EmulatorState::Idle);
    assert_eq!(t.pc().unwrap(), TEXT_BASE);
}

#[test]
fn stop_handle_works_from_another_thread() {
    let mut t = threaded(SPIN, false);
    t.run().unwrap();
    let handle = t.stop_handle().unwrap();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(5));
        handle.request_stop();
    });
    assert!(t.wait().unwrap());
    stopper.join().unwrap();
    assert_eq!(t.state(), EmulatorState::Idle);
}

#[test]
fn teardown_during_a_run_discards_the_late_outcome() {
    let mut t = threaded(SPIN, false);
    let log = t.record(&[EmulatorState::Idle, EmulatorState::Finished]);
    t.run().unwrap();
    t.transition_to(EmulatorState::Teardown).unwrap();
    assert_eq!(t.state(), EmulatorState::NotRunning);
    assert!(!t.has_engine());

    assert!(t.wait().unwrap());
    assert_eq!(t.state(), EmulatorState::NotRunning);
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn late_outcome_does_not_leak_into_the_next_run() {
    let mut t = threaded(SPIN, false);
    t.run().unwrap();
    t.transition_to(EmulatorState::Teardown).unwrap();
    assert_eq!(t.state(), EmulatorState::NotRunning);

    t.set_source("li a0, 1\n");
    t.run().unwrap();
    while t.is_busy() {
        let _ = t.wait().unwrap();
    }
    assert_eq!(t.state(), EmulatorState::Finished);
    assert_eq!(t.pc().unwrap(), t.end_addr());
    assert_eq!(t.reg("a0"), 1);
}

#[test]
fn register_reads_during_a_run_fall_back_to_the_cache() {
    let mut t = threaded(SPIN, false);
    t.set_register("a3", 9).unwrap();
    t.run().unwrap();
    assert_eq!(t.reg("a3"), 9);
    t.stop().unwrap();
    assert!(t.wait().unwrap());
}

// ══════════════════════════════════════════════════════════
// 2. Runner seam
// ══════════════════════════════════════════════════════════

#[test]
fn deferred_job_carries_the_planned_window() {
    let runner = DeferredRunner::default();
    let jobs = Arc::clone(&runner.jobs);
    let mut t = TestSession::new(LI_ECALL).with_runner(runner);

    t.run().unwrap();
    assert_eq!(t.state(), EmulatorState::Running);
    let job = jobs.lock().unwrap().pop().unwrap();
    assert_eq!((job.start, job.stop, job.count), (TEXT_BASE, TEXT_BASE + 8, 0));
    let job_generation = job.generation;

    let outcome = job.execute();
    assert_eq!(outcome.exit, RunExit::Completed { pc: TEXT_BASE + 8 });
    assert_eq!(outcome.generation, job_generation);
    t.complete_run(outcome).unwrap();
    assert_eq!(t.state(), EmulatorState::Finished);
}

#[test]
fn outcome_applied_outside_running_is_ignored() {
    let mut t = TestSession::stepping(THREE_STEPS);
    t.run().unwrap();
    assert_eq!(t.state(), EmulatorState::Idle);
    let end = t.end_addr();
    let outcome = RunOutcome {
        generation: 1,
        exit: RunExit::Completed { pc: end },
    };
    t.complete_run(outcome).unwrap();
    assert_eq!(t.state(), EmulatorState::Idle);
}

#[test]
fn outcome_of_an_earlier_run_request_is_ignored() {
    let runner = DeferredRunner::default();
    let jobs = Arc::clone(&runner.jobs);
    let mut t = TestSession::new(LI_ECALL).with_runner(runner);

    t.run().unwrap();
    let job = jobs.lock().unwrap().pop().unwrap();
    let mut outcome = job.execute();
    outcome.generation -= 1;
    t.complete_run(outcome).unwrap();
    assert_eq!(t.state(), EmulatorState::Running);
}

#[test]
fn inline_runner_has_nothing_in_flight() {
    let mut runner = InlineRunner;
    assert!(!runner.is_busy());
    assert!(runner.try_recv().is_none());
    assert!(runner.wait().is_none());
}
