use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Default)]
struct AllocSection {
    arena_size: Option<usize>,
    arena_max: Option<usize>,
    free_list_cap: Option<usize>,
    cstr_arena_max: Option<usize>,
    #[serde(default)]
    classes: Vec<usize>,
}

#[derive(Deserialize, Default)]
struct SchedulerSection {
    workers: Option<usize>,
    local_batch: Option<usize>,
    idle_budget_ms: Option<u64>,
}

#[derive(Deserialize, Default)]
struct HarnessSection {
    bench_target_ns: Option<u64>,
    bench_repeats: Option<usize>,
}

#[derive(Deserialize, Default)]
struct Config {
    #[serde(default)]
    alloc: AllocSection,
    #[serde(default)]
    scheduler: SchedulerSection,
    #[serde(default)]
    harness: HarnessSection,
}

fn default_classes() -> Vec<usize> {
    vec![16, 32, 64, 128, 256, 512, 1024, 2048]
}

fn validate_classes(classes: &[usize]) {
    assert!(!classes.is_empty(), "runtime.toml: no size classes defined");
    assert!(
        classes.len() < 64,
        "runtime.toml: too many size classes ({}, max 63)",
        classes.len()
    );
    for (i, &size) in classes.iter().enumerate() {
        assert!(size > 0, "class {}: size must be > 0", i);
        assert!(
            size % 16 == 0,
            "class {}: size {} must be 16-byte aligned",
            i,
            size
        );
        if i > 0 {
            assert!(
                size > classes[i - 1],
                "class {}: size {} must be > previous size {}",
                i,
                size,
                classes[i - 1]
            );
        }
    }
}

fn main() {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let config_path = format!("{}/runtime.toml", manifest_dir);
    println!("cargo:rerun-if-changed={}", config_path);

    let config: Config = match fs::read_to_string(&config_path) {
        Ok(text) => toml::from_str(&text).expect("runtime.toml: parse error"),
        Err(_) => Config::default(),
    };

    let arena_size = config.alloc.arena_size.unwrap_or(1 << 20);
    assert!(
        arena_size.is_power_of_two() && arena_size >= 4096,
        "runtime.toml: arena_size ({}) must be a power of two >= 4096",
        arena_size
    );
    let arena_max = config.alloc.arena_max.unwrap_or(256);
    let free_list_cap = config.alloc.free_list_cap.unwrap_or(64);
    let cstr_arena_max = config.alloc.cstr_arena_max.unwrap_or(256);
    assert!(free_list_cap > 0, "runtime.toml: free_list_cap must be > 0");

    let mut classes = config.alloc.classes;
    if classes.is_empty() {
        classes = default_classes();
    }
    validate_classes(&classes);
    let max_small = *classes.last().unwrap();
    assert!(
        arena_max <= max_small,
        "runtime.toml: arena_max ({}) must be <= largest size class ({})",
        arena_max,
        max_small
    );

    let workers = config.scheduler.workers.unwrap_or(0);
    let local_batch = config.scheduler.local_batch.unwrap_or(16);
    assert!(local_batch > 0, "runtime.toml: local_batch must be > 0");
    let idle_budget_ms = config.scheduler.idle_budget_ms.unwrap_or(100);

    let bench_target_ns = config.harness.bench_target_ns.unwrap_or(1_000_000_000);
    let bench_repeats = config.harness.bench_repeats.unwrap_or(10);
    assert!(bench_repeats > 0, "runtime.toml: bench_repeats must be > 0");

    let classes_src = classes
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let code = format!(
        "// Auto-generated by build.rs from runtime.toml. Do not edit.\n\n\
         /// Bump-arena block size in bytes.\n\
         pub const ARENA_SIZE: usize = {arena_size};\n\
         /// Largest request served from the bump arena.\n\
         pub const ARENA_MAX: usize = {arena_max};\n\
         /// Cached free objects per size class.\n\
         pub const FREE_LIST_CAP: usize = {free_list_cap};\n\
         /// duplicate_cstr arena fast path ceiling.\n\
         pub const CSTR_ARENA_MAX: usize = {cstr_arena_max};\n\
         /// Free-list size classes, ascending.\n\
         pub const SIZE_CLASSES: [usize; {num_classes}] = [{classes_src}];\n\
         /// Largest size served by the class free lists.\n\
         pub const MAX_SMALL: usize = {max_small};\n\
         /// Scheduler workers; 0 means one per available CPU.\n\
         pub const WORKERS: usize = {workers};\n\
         /// Tasks drained from the local queue per worker tick.\n\
         pub const LOCAL_BATCH: usize = {local_batch};\n\
         /// Longest reactor block while idle, in milliseconds.\n\
         pub const IDLE_BUDGET_MS: u64 = {idle_budget_ms};\n\
         /// Default benchmark target time in nanoseconds.\n\
         pub const BENCH_TARGET_NS: u64 = {bench_target_ns};\n\
         /// Default measured repeats per benchmark.\n\
         pub const BENCH_REPEATS: usize = {bench_repeats};\n",
        num_classes = classes.len(),
    );

    let out_dir = env::var("OUT_DIR").unwrap();
    let dest = Path::new(&out_dir).join("config.rs");
    fs::write(&dest, code).expect("failed to write generated config");
}
