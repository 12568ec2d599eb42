//! Benchmark measurement: calibration, warmup, repeated sampling, and
//! distribution statistics.
//!
//! The timer belongs to the benchmark body: `reset`/`start`/`stop` let a
//! body exclude setup from the measured window. A body that never touches
//! the timer is measured wall-to-wall.

use crate::config::{BENCH_REPEATS, BENCH_TARGET_NS};
use crate::platform;
use core::fmt;

/// Iteration cap during calibration and scaling.
const MAX_ITERS: u64 = 1 << 30;

/// Benchmark configuration. `Default` gives a calibrated run against the
/// configured target time.
#[derive(Clone, Copy, Debug)]
pub struct BenchConfig {
    pub name: &'static str,
    /// Fixed iteration count; 0 defers to calibration.
    pub iters: u64,
    /// Target measured time per sample, used by calibration.
    pub time_ns: u64,
    /// Warmup as iterations (takes precedence) ...
    pub warmup_iters: u64,
    /// ... or as a time budget.
    pub warmup_ns: u64,
    /// Pin the measuring thread to a CPU first.
    pub pin_cpu: Option<usize>,
    /// Measured samples.
    pub repeats: usize,
    /// Calibrate `iters` when it is 0.
    pub auto_calibrate: bool,
    /// Bytes processed per iteration; enables MB/s reporting.
    pub bytes_per_op: u64,
}

impl BenchConfig {
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            iters: 0,
            time_ns: BENCH_TARGET_NS,
            warmup_iters: 0,
            warmup_ns: 0,
            pin_cpu: None,
            repeats: BENCH_REPEATS,
            auto_calibrate: true,
            bytes_per_op: 0,
        }
    }
}

/// Body-controlled stopwatch over the monotonic clock and cycle counter.
pub struct BenchTimer {
    running: bool,
    started_ns: u64,
    started_cycles: u64,
    accum_ns: u64,
    accum_cycles: u64,
}

impl BenchTimer {
    fn new() -> Self {
        Self {
            running: false,
            started_ns: 0,
            started_cycles: 0,
            accum_ns: 0,
            accum_cycles: 0,
        }
    }

    /// Discard everything measured so far (running or not).
    pub fn reset(&mut self) {
        self.running = false;
        self.accum_ns = 0;
        self.accum_cycles = 0;
    }

    /// Start (or restart) the measured window.
    pub fn start(&mut self) {
        self.running = true;
        self.started_ns = platform::monotonic_ns();
        self.started_cycles = platform::cycles();
    }

    /// Close the measured window, accumulating into the total.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.accum_ns += platform::monotonic_ns() - self.started_ns;
        self.accum_cycles += platform::cycles() - self.started_cycles;
    }
}

/// One measured sample.
#[derive(Clone, Copy, Debug)]
pub struct Sample {
    pub ns_per_op: f64,
    pub cycles_per_op: f64,
    /// 0 unless `bytes_per_op` was configured.
    pub mb_per_s: f64,
}

/// Distribution of `ns_per_op` across samples.
#[derive(Clone, Copy, Debug, Default)]
pub struct Summary {
    pub min: f64,
    pub median: f64,
    pub mean: f64,
    pub stddev: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Nearest-rank percentile over an ascending-sorted slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

impl Summary {
    fn from_samples(samples: &[Sample]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let mut ns: Vec<f64> = samples.iter().map(|s| s.ns_per_op).collect();
        ns.sort_by(|a, b| a.total_cmp(b));
        let mean = ns.iter().sum::<f64>() / ns.len() as f64;
        let variance = ns.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / ns.len() as f64;
        Self {
            min: ns[0],
            median: percentile(&ns, 50.0),
            mean,
            stddev: variance.sqrt(),
            p90: percentile(&ns, 90.0),
            p95: percentile(&ns, 95.0),
            p99: percentile(&ns, 99.0),
        }
    }
}

/// Result of a benchmark run.
#[derive(Clone, Debug)]
pub struct BenchReport {
    pub name: &'static str,
    /// Iterations per sample (after calibration).
    pub iters: u64,
    pub samples: Vec<Sample>,
    pub summary: Summary,
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.summary;
        write!(
            f,
            "{:<32} {:>10} iters  min {:>10.1} ns/op  median {:>10.1}  mean {:>10.1} ± {:<8.1} p90 {:>10.1}  p95 {:>10.1}  p99 {:>10.1}",
            self.name, self.iters, s.min, s.median, s.mean, s.stddev, s.p90, s.p95, s.p99
        )?;
        if let Some(sample) = self.samples.first() {
            if sample.mb_per_s > 0.0 {
                let best = self
                    .samples
                    .iter()
                    .map(|s| s.mb_per_s)
                    .fold(0.0f64, f64::max);
                write!(f, "  {best:>8.1} MB/s")?;
            }
        }
        Ok(())
    }
}

/// Time `body` per `cfg`. The body receives the timer and the iteration
/// count and is responsible for looping `iters` times.
pub fn run_bench(
    cfg: &BenchConfig,
    mut body: impl FnMut(&mut BenchTimer, u64),
) -> BenchReport {
    if let Some(cpu) = cfg.pin_cpu {
        if !platform::pin_to_cpu(cpu) {
            log::debug!("bench {}: cpu pin to {} not applied", cfg.name, cpu);
        }
    }

    let iters = if cfg.iters != 0 {
        cfg.iters
    } else if cfg.auto_calibrate {
        calibrate(cfg.time_ns, &mut body)
    } else {
        1
    };

    // Warmup: excluded from every sample.
    if cfg.warmup_iters > 0 {
        measure(cfg.warmup_iters, &mut body);
    } else if cfg.warmup_ns > 0 {
        let start = platform::monotonic_ns();
        while platform::monotonic_ns() - start < cfg.warmup_ns {
            measure(iters.min(1024), &mut body);
        }
    }

    let mut samples = Vec::with_capacity(cfg.repeats);
    for _ in 0..cfg.repeats.max(1) {
        let (ns, cycles) = measure(iters, &mut body);
        let ns_per_op = ns as f64 / iters as f64;
        let mb_per_s = if cfg.bytes_per_op > 0 && ns > 0 {
            let bytes = cfg.bytes_per_op as f64 * iters as f64;
            bytes / (ns as f64 / 1e9) / 1e6
        } else {
            0.0
        };
        samples.push(Sample {
            ns_per_op,
            cycles_per_op: cycles as f64 / iters as f64,
            mb_per_s,
        });
    }

    let summary = Summary::from_samples(&samples);
    BenchReport {
        name: cfg.name,
        iters,
        samples,
        summary,
    }
}

/// One timed run of `iters` iterations.
fn measure(iters: u64, body: &mut impl FnMut(&mut BenchTimer, u64)) -> (u64, u64) {
    let mut timer = BenchTimer::new();
    timer.start();
    body(&mut timer, iters);
    timer.stop();
    (timer.accum_ns, timer.accum_cycles)
}

/// Grow the iteration count until a run covers an eighth of the target,
/// then scale linearly to the target and settle there.
fn calibrate(target_ns: u64, body: &mut impl FnMut(&mut BenchTimer, u64)) -> u64 {
    let mut n: u64 = 1;
    loop {
        let (ns, _) = measure(n, body);
        if ns >= target_ns / 8 || n >= MAX_ITERS {
            let scaled = if ns == 0 {
                MAX_ITERS
            } else {
                ((n as u128 * target_ns as u128) / ns as u128) as u64
            };
            return scaled.clamp(1, MAX_ITERS);
        }
        n = (n * 2).min(MAX_ITERS);
    }
}
