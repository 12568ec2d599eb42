//! The harness exercising itself: fixtures, filtering, reporter output
//! shape, and benchmark calibration against a microsecond-scale body.

use rtcore::harness::{
    check, check_eq, log, run_bench, subtest, BenchConfig, Fixtures, Outcome, Reporter, Runner,
    TestCase,
};
use rtcore::platform;
use std::sync::atomic::{AtomicU32, Ordering};

static SETUPS: AtomicU32 = AtomicU32::new(0);
static TEARDOWNS: AtomicU32 = AtomicU32::new(0);

fn case_pass() {
    check(true, "trivially holds");
    log("case_pass ran");
}

fn case_math() {
    check_eq(2 + 2, 4, "arithmetic");
    subtest("strings", || {
        check_eq("ab".len(), 2, "length");
    });
}

fn case_fail() {
    check(false, "deliberate failure");
}

fn fixture_setup() {
    SETUPS.fetch_add(1, Ordering::SeqCst);
}

fn fixture_teardown() {
    TEARDOWNS.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn fixtures_wrap_each_test() {
    SETUPS.store(0, Ordering::SeqCst);
    TEARDOWNS.store(0, Ordering::SeqCst);
    let runner = Runner::new("fixture-suite")
        .fixtures(Fixtures {
            setup_each: Some(fixture_setup),
            teardown_each: Some(fixture_teardown),
            ..Fixtures::default()
        })
        .add("one", case_pass)
        .add("two", case_math)
        .add("three", case_fail);
    // Reporter output goes to stdout; the exit code carries the failure.
    let code = runner.run();
    assert_eq!(code, 1);
    assert_eq!(SETUPS.load(Ordering::SeqCst), 3);
    assert_eq!(TEARDOWNS.load(Ordering::SeqCst), 3);
}

#[test]
fn parallel_matches_sequential() {
    let cases: Vec<TestCase> = (0..16)
        .map(|_| TestCase {
            name: "spin",
            run: || {
                let start = platform::monotonic_ns();
                while platform::monotonic_ns() - start < 1_000_000 {
                    std::hint::spin_loop();
                }
                check(true, "spun");
            },
        })
        .collect();
    let runner = Runner::new("parallel-suite").cases(&cases);
    assert_eq!(runner.run_parallel(4), 0);
}

fn sample_outcomes() -> Vec<Outcome> {
    vec![
        Outcome {
            name: "ok-test".into(),
            errors: 0,
            skipped: false,
            panicked: false,
            log: String::new(),
            duration_ns: 5_000_000,
        },
        Outcome {
            name: "bad-test".into(),
            errors: 1,
            skipped: false,
            panicked: false,
            log: "check failed [bad-test]: expected <tag>\n".into(),
            duration_ns: 1_000_000,
        },
    ]
}

#[test]
fn tap_document_shape() {
    let mut out = Vec::new();
    Reporter::Tap
        .emit("suite", &sample_outcomes(), &mut out)
        .unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("TAP version 13\n1..2\n"));
    assert!(text.contains("ok 1 - ok-test"));
    assert!(text.contains("not ok 2 - bad-test"));
    assert!(text.contains("  log: |"));
    assert!(text.contains("    check failed [bad-test]: expected <tag>"));
}

#[test]
fn junit_document_shape() {
    let mut out = Vec::new();
    Reporter::Junit
        .emit("suite", &sample_outcomes(), &mut out)
        .unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
    assert!(text.contains(r#"<testsuite name="suite" tests="2" failures="1" skipped="0""#));
    assert!(text.contains(r#"<testcase name="ok-test""#));
    assert!(text.contains("expected &lt;tag&gt;"));
    assert!(text.contains("</testsuite>"));
}

/// Calibrator convergence: a ~1 µs body against a scaled-down target must
/// land within the 4x envelope. (A 1 s target converges the same way to
/// an iteration count in the hundreds of thousands; 50 ms keeps the
/// suite fast.)
#[test]
fn calibrator_convergence() {
    fn busy_1us() {
        let start = platform::monotonic_ns();
        while platform::monotonic_ns() - start < 1_000 {
            std::hint::spin_loop();
        }
    }

    let target_ns = 50_000_000u64;
    let cfg = BenchConfig {
        time_ns: target_ns,
        repeats: 1,
        ..BenchConfig::named("calibrated-1us")
    };
    let report = run_bench(&cfg, |_t, iters| {
        for _ in 0..iters {
            busy_1us();
        }
    });

    // ~1 µs per op and a 50 ms target: expect tens of thousands of
    // iterations, within 4x either way.
    let expected = target_ns / 1_000;
    assert!(
        report.iters >= expected / 4 && report.iters <= expected * 4,
        "calibrated to {} iterations against an expected {}",
        report.iters,
        expected
    );
}
