//! Test harness: named tests, subtests, fixtures, filtering, parallel
//! execution, and pluggable reporters.
//!
//! Each test runs with a rebound thread-local state carrying the current
//! name, accumulated error count, and captured log. Checks accumulate;
//! a fatal check unwinds immediately and the runner records the failure.
//! Test bodies run under `catch_unwind`, so one failing test can never
//! corrupt the state of the next — a panic with a lock held poisons that
//! lock, and the next acquisition aborts loudly rather than continuing on
//! torn state.
//!
//! Environment: `TEST_FILTER` substring-filters test names, `REPORTER`
//! selects `text` (default), `tap`, or `junit` output, and `JUNIT_FILE`
//! redirects the JUnit document from stdout into a file.

mod bench;
mod report;

pub use bench::{percentile, run_bench, BenchConfig, BenchReport, BenchTimer, Sample, Summary};
pub use report::{xml_escape, Reporter};

use crate::platform;
use crate::sync::Mutex;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};

/// A named nullary test function.
#[derive(Clone, Copy)]
pub struct TestCase {
    pub name: &'static str,
    pub run: fn(),
}

/// Optional suite and per-test hooks.
#[derive(Clone, Copy, Default)]
pub struct Fixtures {
    /// Before the first test.
    pub setup_all: Option<fn()>,
    /// After the last test.
    pub teardown_all: Option<fn()>,
    /// Before each test.
    pub setup_each: Option<fn()>,
    /// After each test, even when it failed.
    pub teardown_each: Option<fn()>,
}

/// Result of one executed test.
#[derive(Clone, Debug)]
pub struct Outcome {
    pub name: String,
    pub errors: u32,
    pub skipped: bool,
    pub panicked: bool,
    pub log: String,
    pub duration_ns: u64,
}

impl Outcome {
    pub fn failed(&self) -> bool {
        !self.skipped && (self.errors > 0 || self.panicked)
    }
}

#[derive(Default)]
struct TestState {
    name: String,
    errors: u32,
    log: String,
    skipped: bool,
}

std::thread_local! {
    static STATE: RefCell<TestState> = RefCell::new(TestState::default());
}

/// Panic payload distinguishing a skip from a failure.
struct SkipSignal;

/// Record a failed expectation and keep running the test.
pub fn check(cond: bool, msg: &str) {
    if cond {
        return;
    }
    STATE.with(|s| {
        let mut s = s.borrow_mut();
        s.errors += 1;
        let name = s.name.clone();
        s.log.push_str(&format!("check failed [{name}]: {msg}\n"));
    });
}

/// Record equality, logging both sides on mismatch.
pub fn check_eq<T: PartialEq + core::fmt::Debug>(left: T, right: T, msg: &str) {
    if left == right {
        return;
    }
    check(false, &format!("{msg}: left={left:?} right={right:?}"));
}

/// A failed fatal check records the error and unwinds out of the test
/// immediately.
pub fn check_fatal(cond: bool, msg: &str) {
    if cond {
        return;
    }
    check(false, msg);
    panic::panic_any(FatalCheck);
}

struct FatalCheck;

/// Append a line to the current test's captured log.
pub fn log(msg: &str) {
    STATE.with(|s| {
        let mut s = s.borrow_mut();
        s.log.push_str(msg);
        s.log.push('\n');
    });
}

/// Mark the current test skipped and leave it.
pub fn skip(reason: &str) -> ! {
    STATE.with(|s| {
        let mut s = s.borrow_mut();
        s.skipped = true;
        let reason = if reason.is_empty() { "skipped" } else { reason };
        s.log.push_str(&format!("skip: {reason}\n"));
    });
    panic::panic_any(SkipSignal)
}

/// Run `body` as a nested test: errors and log lines accumulate into the
/// parent, attributed to `parent/name`.
pub fn subtest(name: &str, body: impl FnOnce()) {
    let previous = STATE.with(|s| {
        let mut s = s.borrow_mut();
        let prev = s.name.clone();
        s.name = if prev.is_empty() {
            name.to_string()
        } else {
            format!("{prev}/{name}")
        };
        prev
    });
    let result = panic::catch_unwind(AssertUnwindSafe(body));
    STATE.with(|s| s.borrow_mut().name = previous);
    if let Err(payload) = result {
        // A fatal check inside a subtest stops the subtest, not the test.
        if !payload.is::<FatalCheck>() {
            panic::resume_unwind(payload);
        }
    }
}

/// Test suite executor.
pub struct Runner {
    suite: &'static str,
    cases: Vec<TestCase>,
    fixtures: Fixtures,
}

impl Runner {
    pub fn new(suite: &'static str) -> Self {
        Self {
            suite,
            cases: Vec::new(),
            fixtures: Fixtures::default(),
        }
    }

    pub fn fixtures(mut self, fixtures: Fixtures) -> Self {
        self.fixtures = fixtures;
        self
    }

    pub fn add(mut self, name: &'static str, run: fn()) -> Self {
        self.cases.push(TestCase { name, run });
        self
    }

    pub fn cases(mut self, cases: &[TestCase]) -> Self {
        self.cases.extend_from_slice(cases);
        self
    }

    fn filtered(&self) -> Vec<TestCase> {
        match std::env::var("TEST_FILTER") {
            Ok(filter) if !filter.is_empty() => self
                .cases
                .iter()
                .copied()
                .filter(|c| c.name.contains(&filter))
                .collect(),
            _ => self.cases.clone(),
        }
    }

    fn run_one(&self, case: TestCase) -> Outcome {
        STATE.with(|s| {
            *s.borrow_mut() = TestState {
                name: case.name.to_string(),
                ..TestState::default()
            };
        });

        if let Some(setup) = self.fixtures.setup_each {
            setup();
        }
        let start = platform::monotonic_ns();
        let result = panic::catch_unwind(AssertUnwindSafe(case.run));
        let duration_ns = platform::monotonic_ns() - start;
        if let Some(teardown) = self.fixtures.teardown_each {
            teardown();
        }

        STATE.with(|s| {
            let mut s = s.borrow_mut();
            let mut panicked = false;
            if let Err(payload) = result {
                if payload.is::<SkipSignal>() || s.skipped {
                    s.skipped = true;
                } else if payload.is::<FatalCheck>() {
                    // Already counted by check_fatal.
                } else {
                    panicked = true;
                    let msg = payload
                        .downcast_ref::<&str>()
                        .map(|m| m.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "panic".to_string());
                    s.log.push_str(&format!("panic: {msg}\n"));
                }
            }
            Outcome {
                name: case.name.to_string(),
                errors: s.errors,
                skipped: s.skipped,
                panicked,
                log: std::mem::take(&mut s.log),
                duration_ns,
            }
        })
    }

    /// Run every (filtered) test on this thread. Returns the process exit
    /// code: 0 when nothing failed.
    pub fn run(&self) -> i32 {
        let cases = self.filtered();
        if let Some(setup) = self.fixtures.setup_all {
            setup();
        }
        let outcomes: Vec<Outcome> = cases.into_iter().map(|c| self.run_one(c)).collect();
        if let Some(teardown) = self.fixtures.teardown_all {
            teardown();
        }
        self.finish(&outcomes)
    }

    /// Run the (filtered) tests on `threads` worker threads sharing one
    /// next-test cursor. Results keep the original test order.
    pub fn run_parallel(&self, threads: usize) -> i32 {
        let cases = self.filtered();
        let threads = threads.max(1).min(cases.len().max(1));
        if let Some(setup) = self.fixtures.setup_all {
            setup();
        }

        let next = Mutex::new(0usize);
        let results: Mutex<Vec<Option<Outcome>>> = Mutex::new(vec![None; cases.len()]);

        std::thread::scope(|scope| {
            for _ in 0..threads {
                scope.spawn(|| loop {
                    let idx = {
                        let mut next = next.lock();
                        let idx = *next;
                        *next += 1;
                        idx
                    };
                    if idx >= cases.len() {
                        break;
                    }
                    let outcome = self.run_one(cases[idx]);
                    results.lock()[idx] = Some(outcome);
                });
            }
        });

        if let Some(teardown) = self.fixtures.teardown_all {
            teardown();
        }
        let outcomes: Vec<Outcome> = results
            .into_inner()
            .into_iter()
            .map(|o| o.expect("worker skipped a test slot"))
            .collect();
        self.finish(&outcomes)
    }

    fn finish(&self, outcomes: &[Outcome]) -> i32 {
        Reporter::from_env().emit_to_env(self.suite, outcomes);
        if outcomes.iter().any(Outcome::failed) {
            1
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passing() {
        check(true, "fine");
        log("ran");
    }

    fn failing() {
        check(1 + 1 == 3, "math broke");
        check(true, "still runs after a failed check");
    }

    fn fatal() {
        check_fatal(false, "stop here");
        unreachable!("fatal check must not fall through");
    }

    fn skipping() {
        skip("not on this platform");
    }

    fn panicking() {
        panic!("boom");
    }

    fn with_subtests() {
        subtest("inner-ok", || check(true, "ok"));
        subtest("inner-bad", || check(false, "inner failure"));
        check(true, "parent continues");
    }

    fn runner_for(cases: &[TestCase]) -> Runner {
        Runner::new("selftest").cases(cases)
    }

    fn outcome_of(f: fn(), name: &'static str) -> Outcome {
        let runner = runner_for(&[TestCase { name, run: f }]);
        runner.run_one(TestCase { name, run: f })
    }

    #[test]
    fn test_pass_fail_counts() {
        assert!(!outcome_of(passing, "p").failed());
        let fail = outcome_of(failing, "f");
        assert!(fail.failed());
        assert_eq!(fail.errors, 1);
        assert!(fail.log.contains("math broke"));
    }

    #[test]
    fn test_fatal_check_stops_test() {
        let out = outcome_of(fatal, "fatal");
        assert!(out.failed());
        assert_eq!(out.errors, 1);
        assert!(!out.panicked);
    }

    #[test]
    fn test_skip_is_not_failure() {
        let out = outcome_of(skipping, "s");
        assert!(out.skipped);
        assert!(!out.failed());
    }

    #[test]
    fn test_panic_is_captured() {
        let out = outcome_of(panicking, "boom");
        assert!(out.panicked);
        assert!(out.failed());
        assert!(out.log.contains("boom"));
    }

    #[test]
    fn test_subtest_errors_roll_up() {
        let out = outcome_of(with_subtests, "parent");
        assert_eq!(out.errors, 1);
        assert!(out.log.contains("parent/inner-bad"));
    }

    #[test]
    fn test_parallel_runs_everything() {
        let cases: Vec<TestCase> = vec![
            TestCase { name: "a", run: passing },
            TestCase { name: "b", run: passing },
            TestCase { name: "c", run: failing },
            TestCase { name: "d", run: passing },
        ];
        let runner = runner_for(&cases);
        let mut outcomes = Vec::new();
        for c in runner.filtered() {
            outcomes.push(runner.run_one(c));
        }
        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes.iter().filter(|o| o.failed()).count(), 1);
    }
}
