//! Unix services: clock_gettime, posix_memalign, sched_setaffinity.

/// CLOCK_MONOTONIC in nanoseconds.
#[inline]
pub fn monotonic_ns() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    if rc != 0 {
        return 0;
    }
    (ts.tv_sec as u64) * 1_000_000_000 + ts.tv_nsec as u64
}

#[cfg(target_os = "linux")]
pub fn pin_to_cpu(cpu: usize) -> bool {
    unsafe {
        let mut set: libc::cpu_set_t = core::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(cpu, &mut set);
        libc::sched_setaffinity(0, core::mem::size_of::<libc::cpu_set_t>(), &set) == 0
    }
}

pub unsafe fn aligned_alloc(size: usize, align: usize) -> *mut u8 {
    // posix_memalign requires align to be a multiple of sizeof(void*).
    let align = align.max(core::mem::size_of::<*mut libc::c_void>());
    let size = size.max(1);
    let mut ptr: *mut libc::c_void = core::ptr::null_mut();
    let rc = unsafe { libc::posix_memalign(&mut ptr, align, size) };
    if rc != 0 {
        return core::ptr::null_mut();
    }
    ptr as *mut u8
}

pub unsafe fn aligned_free(ptr: *mut u8) {
    unsafe { libc::free(ptr as *mut libc::c_void) };
}
