//! rtcore: the core runtime linked against programs produced by a
//! statically compiled language toolchain.
//!
//! Generated code cannot express these facilities inline; the runtime
//! supplies them:
//!
//! - [`alloc`] — tiered allocator: per-thread size-class free lists over a
//!   1 MiB bump arena over the system allocator.
//! - [`vec`], [`map`] — growable vector and a control-byte open-addressed
//!   map with 16-byte SIMD group scanning and three back-ends.
//! - [`text`] — strict UTF-8 validation, indexing, and UTF-16/32
//!   transcoding.
//! - [`sync`] — shared cells (atomic and single-threaded), locks with
//!   fatal poisoning, atomics, barrier, once, condvar.
//! - [`task`] — work-stealing stackless-task scheduler with an event-loop
//!   bridge and a timer heap.
//! - [`num`], [`io`], [`panic`] — numeric parsing, boundary I/O, and the
//!   abort surface.
//! - [`harness`] — the test runner and benchmark calibrator used to
//!   validate all of the above.
//!
//! # Features
//!
//! | feature | effect |
//! |---|---|
//! | `tracking` | 8-byte allocation headers; `free` refills the size-class lists and `reallocate` stays in place within a class |
//! | `stats` | atomic counters + size histogram behind [`stats`] |
//! | `global-cache` | one locked allocation cache instead of thread-locals |
//! | `rdtsc` *(default)* | cycle counts in benchmarks via `rdtscp` on x86_64 |
//! | `strtod-fallback` *(default)* | platform `strtod` for float parses outside the fast path |
//!
//! Numeric tuning (size classes, arena size, scheduler defaults) comes
//! from `runtime.toml`, baked in by the build script.

pub mod alloc;
pub mod harness;
pub mod io;
pub mod map;
pub mod num;
pub mod panic;
pub mod platform;
#[cfg(feature = "stats")]
pub mod stats;
pub mod sync;
pub mod task;
pub mod text;
pub mod vec;

mod macros;

/// Constants generated from `runtime.toml` by the build script.
pub mod config {
    include!(concat!(env!("OUT_DIR"), "/config.rs"));
}

pub use alloc::RtAlloc;
pub use map::{Map, Set};
pub use sync::{Mutex, RwLock, Shared};
pub use task::{Context, Runtime, TaskStatus};
pub use vec::Vector;
