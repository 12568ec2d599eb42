//! OS / CPU / SIMD discovery and the thin services layered on them.
//!
//! Everything the rest of the runtime needs from the machine lives here:
//! clocks, CPU pinning, prefetch and fence hints, the spin-wait hint, and
//! aligned allocation that is safe for arbitrary power-of-two alignment on
//! every supported platform. Per-OS code is split into `unix` / `windows`
//! submodules dispatched from this facade.

#[cfg(unix)]
mod unix;

#[cfg(windows)]
mod windows;

/// Operating-system class, resolved at compile time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Os {
    Linux,
    Macos,
    Windows,
    OtherUnix,
    Unknown,
}

impl Os {
    /// The OS this build targets.
    pub const fn current() -> Os {
        if cfg!(target_os = "linux") {
            Os::Linux
        } else if cfg!(target_os = "macos") {
            Os::Macos
        } else if cfg!(windows) {
            Os::Windows
        } else if cfg!(unix) {
            Os::OtherUnix
        } else {
            Os::Unknown
        }
    }
}

/// CPU architecture, resolved at compile time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arch {
    X86_64,
    Aarch64,
    Other,
}

impl Arch {
    pub const fn current() -> Arch {
        if cfg!(target_arch = "x86_64") {
            Arch::X86_64
        } else if cfg!(target_arch = "aarch64") {
            Arch::Aarch64
        } else {
            Arch::Other
        }
    }
}

/// Widest SIMD dialect the build can use, ordered narrow to wide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SimdLevel {
    None,
    Sse2,
    Avx,
    Avx2,
    Avx512,
    Neon,
    Sve,
}

impl SimdLevel {
    /// Widest level enabled for this compilation target.
    ///
    /// x86_64 always has SSE2; wider dialects are reported only when the
    /// build enables them (`-C target-feature`). aarch64 always has NEON.
    pub const fn detected() -> SimdLevel {
        if cfg!(target_arch = "x86_64") {
            if cfg!(target_feature = "avx512f") {
                SimdLevel::Avx512
            } else if cfg!(target_feature = "avx2") {
                SimdLevel::Avx2
            } else if cfg!(target_feature = "avx") {
                SimdLevel::Avx
            } else {
                SimdLevel::Sse2
            }
        } else if cfg!(target_arch = "aarch64") {
            if cfg!(target_feature = "sve") {
                SimdLevel::Sve
            } else {
                SimdLevel::Neon
            }
        } else {
            SimdLevel::None
        }
    }
}

/// Monotonic clock in nanoseconds from an arbitrary fixed epoch.
///
/// Never runs backward. This is the time base for timers, benchmarks, and
/// scheduler deadlines.
#[inline]
pub fn monotonic_ns() -> u64 {
    #[cfg(unix)]
    {
        unix::monotonic_ns()
    }
    #[cfg(not(unix))]
    {
        // Anchor an Instant once and report elapsed time against it.
        use once_cell::sync::Lazy;
        use std::time::Instant;
        static ANCHOR: Lazy<Instant> = Lazy::new(Instant::now);
        ANCHOR.elapsed().as_nanos() as u64
    }
}

/// Wall clock in milliseconds since the Unix epoch.
#[inline]
pub fn wall_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_millis() as u64,
        Err(_) => 0,
    }
}

/// Pin the calling thread to the given CPU. Best-effort: returns `true`
/// only when the request was actually applied (Linux); a no-op elsewhere.
#[inline]
pub fn pin_to_cpu(cpu: usize) -> bool {
    #[cfg(target_os = "linux")]
    {
        unix::pin_to_cpu(cpu)
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = cpu;
        false
    }
}

/// Prefetch locality hint: `L0` is "use once", `L3` is "keep in all levels".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Locality {
    L0,
    L1,
    L2,
    L3,
}

/// Hint that `ptr` will soon be read.
#[inline(always)]
pub fn prefetch_read(ptr: *const u8, locality: Locality) {
    #[cfg(target_arch = "x86_64")]
    {
        use core::arch::x86_64::{
            _mm_prefetch, _MM_HINT_NTA, _MM_HINT_T0, _MM_HINT_T1, _MM_HINT_T2,
        };
        unsafe {
            match locality {
                Locality::L0 => _mm_prefetch::<_MM_HINT_NTA>(ptr as *const i8),
                Locality::L1 => _mm_prefetch::<_MM_HINT_T2>(ptr as *const i8),
                Locality::L2 => _mm_prefetch::<_MM_HINT_T1>(ptr as *const i8),
                Locality::L3 => _mm_prefetch::<_MM_HINT_T0>(ptr as *const i8),
            }
        }
    }
    #[cfg(target_arch = "aarch64")]
    {
        unsafe {
            match locality {
                Locality::L0 => core::arch::asm!("prfm pldl1strm, [{0}]", in(reg) ptr),
                Locality::L1 => core::arch::asm!("prfm pldl3keep, [{0}]", in(reg) ptr),
                Locality::L2 => core::arch::asm!("prfm pldl2keep, [{0}]", in(reg) ptr),
                Locality::L3 => core::arch::asm!("prfm pldl1keep, [{0}]", in(reg) ptr),
            }
        }
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        let _ = (ptr, locality);
    }
}

/// Hint that `ptr` will soon be written.
#[inline(always)]
pub fn prefetch_write(ptr: *const u8, locality: Locality) {
    #[cfg(target_arch = "aarch64")]
    {
        unsafe {
            match locality {
                Locality::L0 => core::arch::asm!("prfm pstl1strm, [{0}]", in(reg) ptr),
                Locality::L1 => core::arch::asm!("prfm pstl3keep, [{0}]", in(reg) ptr),
                Locality::L2 => core::arch::asm!("prfm pstl2keep, [{0}]", in(reg) ptr),
                Locality::L3 => core::arch::asm!("prfm pstl1keep, [{0}]", in(reg) ptr),
            }
        }
    }
    #[cfg(not(target_arch = "aarch64"))]
    {
        // x86 has no separate write prefetch below prefetchw; the read
        // hint pulls the line into cache either way.
        prefetch_read(ptr, locality);
    }
}

/// Acquire fence.
#[inline(always)]
pub fn fence_acquire() {
    core::sync::atomic::fence(core::sync::atomic::Ordering::Acquire);
}

/// Release fence.
#[inline(always)]
pub fn fence_release() {
    core::sync::atomic::fence(core::sync::atomic::Ordering::Release);
}

/// Sequentially consistent fence.
#[inline(always)]
pub fn fence_seqcst() {
    core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
}

/// Spin-wait hint: `pause` on x86, `yield` on ARM, compiler barrier elsewhere.
#[inline(always)]
pub fn spin_hint() {
    core::hint::spin_loop();
}

/// Cycle counter for benchmark reporting.
///
/// `rdtscp` on x86_64 when the `rdtsc` feature is enabled (serializing, so
/// it does not reorder around the measured region); the monotonic clock in
/// nanoseconds elsewhere.
#[inline]
pub fn cycles() -> u64 {
    #[cfg(all(target_arch = "x86_64", feature = "rdtsc"))]
    {
        let mut aux = 0u32;
        unsafe { core::arch::x86_64::__rdtscp(&mut aux) }
    }
    #[cfg(not(all(target_arch = "x86_64", feature = "rdtsc")))]
    {
        monotonic_ns()
    }
}

/// Allocate `size` bytes aligned to `align` (any power of two).
/// Returns null on failure; memory content is undefined.
///
/// # Safety
///
/// `align` must be a power of two. The returned pointer must be released
/// with [`aligned_free`].
#[inline]
pub unsafe fn aligned_alloc(size: usize, align: usize) -> *mut u8 {
    #[cfg(unix)]
    {
        unsafe { unix::aligned_alloc(size, align) }
    }
    #[cfg(windows)]
    {
        unsafe { windows::aligned_alloc(size, align) }
    }
    #[cfg(not(any(unix, windows)))]
    {
        compile_error!("rtcore requires a unix or windows target for aligned allocation");
    }
}

/// Free memory returned by [`aligned_alloc`]. Tolerates null.
///
/// # Safety
///
/// `ptr` must be null or a live pointer from [`aligned_alloc`].
#[inline]
pub unsafe fn aligned_free(ptr: *mut u8) {
    if ptr.is_null() {
        return;
    }
    #[cfg(unix)]
    {
        unsafe { unix::aligned_free(ptr) }
    }
    #[cfg(windows)]
    {
        unsafe { windows::aligned_free(ptr) }
    }
}
