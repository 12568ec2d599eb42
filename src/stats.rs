//! Runtime statistics counters.
//!
//! All counters use `Relaxed` ordering — they are observational only and
//! never used as synchronization. The allocator's own locks and the shared
//! cell's reference counts provide the ordering guarantees for correctness;
//! these counters are purely for monitoring and tests.
//!
//! Obtain a [`Snapshot`] with [`snapshot()`]. Individual counter loads are
//! each atomic but not globally consistent with one another.

use core::sync::atomic::{AtomicU64, Ordering};

pub struct Stats {
    // ---- Allocator ----
    /// Total calls to `allocate` (and the allocating half of `reallocate`).
    pub alloc_count: AtomicU64,
    /// Total calls to `free` with a non-null pointer.
    pub free_count: AtomicU64,
    /// Total calls to `reallocate`.
    pub realloc_count: AtomicU64,
    /// Sum of requested byte sizes passed to `allocate`.
    pub alloc_bytes: AtomicU64,
    /// Allocations served by a per-thread size-class free list.
    pub freelist_hits: AtomicU64,
    /// Allocations served by the bump arena.
    pub arena_hits: AtomicU64,
    /// Allocations that fell through to the system allocator.
    pub system_allocs: AtomicU64,
    /// Bytes requested from the system allocator.
    pub system_bytes: AtomicU64,
    /// Fresh 1 MiB arena blocks chained.
    pub arenas_chained: AtomicU64,
    /// `duplicate_cstr` calls served from the arena fast path.
    pub cstr_arena_hits: AtomicU64,

    // ---- Shared cells ----
    /// Atomic shared cells whose backing allocation was released.
    pub shared_frees: AtomicU64,
    /// Single-threaded shared cells whose backing allocation was released.
    pub local_frees: AtomicU64,

    // ---- Scheduler ----
    /// Tasks spawned.
    pub tasks_spawned: AtomicU64,
    /// Tasks that returned `Done` and were freed.
    pub tasks_completed: AtomicU64,
    /// Successful steals between workers.
    pub steals: AtomicU64,
    /// Timer entries fired.
    pub timers_fired: AtomicU64,
}

impl Stats {
    const fn new() -> Self {
        Self {
            alloc_count: AtomicU64::new(0),
            free_count: AtomicU64::new(0),
            realloc_count: AtomicU64::new(0),
            alloc_bytes: AtomicU64::new(0),
            freelist_hits: AtomicU64::new(0),
            arena_hits: AtomicU64::new(0),
            system_allocs: AtomicU64::new(0),
            system_bytes: AtomicU64::new(0),
            arenas_chained: AtomicU64::new(0),
            cstr_arena_hits: AtomicU64::new(0),
            shared_frees: AtomicU64::new(0),
            local_frees: AtomicU64::new(0),
            tasks_spawned: AtomicU64::new(0),
            tasks_completed: AtomicU64::new(0),
            steals: AtomicU64::new(0),
            timers_fired: AtomicU64::new(0),
        }
    }
}

pub static STATS: Stats = Stats::new();

/// A point-in-time snapshot of all runtime statistics.
///
/// Fields are plain `u64` values loaded from the global atomic counters.
/// Concurrent activity may race between loads; for monitoring and test
/// assertions over quiesced state this is always sufficient.
#[derive(Clone, Copy, Debug, Default)]
pub struct Snapshot {
    pub alloc_count: u64,
    pub free_count: u64,
    pub realloc_count: u64,
    pub alloc_bytes: u64,
    pub freelist_hits: u64,
    pub arena_hits: u64,
    pub system_allocs: u64,
    pub system_bytes: u64,
    pub arenas_chained: u64,
    pub cstr_arena_hits: u64,
    pub shared_frees: u64,
    pub local_frees: u64,
    pub tasks_spawned: u64,
    pub tasks_completed: u64,
    pub steals: u64,
    pub timers_fired: u64,
}

/// Load all counters with `Relaxed` ordering and return a [`Snapshot`].
pub fn snapshot() -> Snapshot {
    let s = &STATS;
    Snapshot {
        alloc_count: s.alloc_count.load(Ordering::Relaxed),
        free_count: s.free_count.load(Ordering::Relaxed),
        realloc_count: s.realloc_count.load(Ordering::Relaxed),
        alloc_bytes: s.alloc_bytes.load(Ordering::Relaxed),
        freelist_hits: s.freelist_hits.load(Ordering::Relaxed),
        arena_hits: s.arena_hits.load(Ordering::Relaxed),
        system_allocs: s.system_allocs.load(Ordering::Relaxed),
        system_bytes: s.system_bytes.load(Ordering::Relaxed),
        arenas_chained: s.arenas_chained.load(Ordering::Relaxed),
        cstr_arena_hits: s.cstr_arena_hits.load(Ordering::Relaxed),
        shared_frees: s.shared_frees.load(Ordering::Relaxed),
        local_frees: s.local_frees.load(Ordering::Relaxed),
        tasks_spawned: s.tasks_spawned.load(Ordering::Relaxed),
        tasks_completed: s.tasks_completed.load(Ordering::Relaxed),
        steals: s.steals.load(Ordering::Relaxed),
        timers_fired: s.timers_fired.load(Ordering::Relaxed),
    }
}

pub mod histogram {
    //! Allocation size histogram.
    //!
    //! Records the distribution of allocation sizes in 8-byte buckets up to
    //! [`MAX_TRACKED`] bytes. Use [`report`] to render the distribution.

    use core::sync::atomic::{AtomicU64, Ordering};

    /// Maximum allocation size tracked in a bucket (inclusive).
    pub const MAX_TRACKED: usize = 4096;
    /// Width of each bucket in bytes.
    pub const BUCKET_SIZE: usize = 8;
    /// Number of buckets: sizes 1–8 → bucket 0, 9–16 → bucket 1, and so on.
    pub const NUM_BUCKETS: usize = MAX_TRACKED / BUCKET_SIZE;

    struct BucketArray([AtomicU64; NUM_BUCKETS]);

    #[allow(clippy::declare_interior_mutable_const)]
    static BUCKETS: BucketArray = {
        const ZERO: AtomicU64 = AtomicU64::new(0);
        BucketArray([ZERO; NUM_BUCKETS])
    };
    static OVERFLOW: AtomicU64 = AtomicU64::new(0);

    /// Record one allocation of `size` bytes.
    ///
    /// Called from the `hist_record!` macro. Safe in the allocator hot
    /// path — a single relaxed increment, no allocation.
    #[inline]
    pub fn record(size: usize) {
        if size == 0 {
            return;
        }
        if size <= MAX_TRACKED {
            BUCKETS.0[(size - 1) / BUCKET_SIZE].fetch_add(1, Ordering::Relaxed);
        } else {
            OVERFLOW.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Count recorded in the bucket covering `size`.
    pub fn bucket_count(size: usize) -> u64 {
        if size == 0 || size > MAX_TRACKED {
            return 0;
        }
        BUCKETS.0[(size - 1) / BUCKET_SIZE].load(Ordering::Relaxed)
    }

    /// Allocations larger than [`MAX_TRACKED`].
    pub fn overflow_count() -> u64 {
        OVERFLOW.load(Ordering::Relaxed)
    }

    /// Render the non-empty buckets as `size_lo-size_hi: count` lines.
    pub fn report() -> String {
        use std::fmt::Write;
        let mut out = String::new();
        for (i, bucket) in BUCKETS.0.iter().enumerate() {
            let n = bucket.load(Ordering::Relaxed);
            if n > 0 {
                let lo = i * BUCKET_SIZE + 1;
                let hi = (i + 1) * BUCKET_SIZE;
                let _ = writeln!(out, "{lo:>5}-{hi:<5} {n}");
            }
        }
        let over = overflow_count();
        if over > 0 {
            let _ = writeln!(out, ">{MAX_TRACKED}      {over}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_is_monotonic_under_increments() {
        let before = snapshot();
        STATS.alloc_count.fetch_add(3, Ordering::Relaxed);
        let after = snapshot();
        assert!(after.alloc_count >= before.alloc_count + 3);
    }

    #[test]
    fn test_histogram_bucketing() {
        histogram::record(1);
        histogram::record(8);
        histogram::record(9);
        // 1 and 8 share a bucket; 9 starts the next one.
        assert!(histogram::bucket_count(8) >= 2);
        assert!(histogram::bucket_count(9) >= 1);
        histogram::record(histogram::MAX_TRACKED + 1);
        assert!(histogram::overflow_count() >= 1);
    }
}
