//! Tiered runtime allocator.
//!
//! Three tiers, hot to cold:
//!
//! 1. per-thread size-class free lists (16..=2048 bytes, up to
//!    [`FREE_LIST_CAP`](crate::config::FREE_LIST_CAP) objects per class) —
//!    pop/push of an intrusive stack, no locks;
//! 2. a per-thread 1 MiB bump arena for requests up to
//!    [`ARENA_MAX`](crate::config::ARENA_MAX) bytes — one add, one compare;
//! 3. the system allocator for everything else.
//!
//! All returned pointers are 16-byte aligned. Allocation failure with no
//! channel to report it is fatal.
//!
//! With the `tracking` feature, every allocation carries an 8-byte header
//! inside a 16-byte prefix, so `free` can reinsert the object into the
//! originating free list and `reallocate` can stay in place within a size
//! class. Without it there is no header: `free` of non-arena memory defers
//! to the system allocator and the cache accelerates allocation only.
//!
//! With the `global-cache` feature the cache is one process-wide instance
//! behind a spinlock instead of a thread-local (for targets without TLS).

mod arena;
mod cache;
mod class;

pub use class::{class_for, class_size, NUM_CLASSES};

use crate::config::{ARENA_MAX, CSTR_ARENA_MAX};
#[cfg(feature = "tracking")]
use crate::config::FREE_LIST_CAP;
use crate::platform;
use crate::{hist_record, stat_add, stat_inc};
use cache::Cache;
use core::alloc::{GlobalAlloc, Layout};
use core::ffi::{c_char, CStr};
use core::ptr::{self, NonNull};

/// Alignment guaranteed by every allocation.
pub const ALIGN: usize = 16;

#[cfg(not(feature = "tracking"))]
#[inline]
const fn round16(n: usize) -> usize {
    (n + 15) & !15
}

// ---------------------------------------------------------------------------
// Cache access: thread-local by default, one locked instance with
// `global-cache`. `with_cache` returns `None` only when the thread-local
// has already been torn down (thread exit).
// ---------------------------------------------------------------------------

#[cfg(feature = "global-cache")]
mod cache_access {
    use super::Cache;
    use crate::sync::spin::SpinMutex;

    static CACHE: SpinMutex<Cache> = SpinMutex::new(Cache::new());

    #[inline]
    pub(super) fn with_cache<R>(f: impl FnOnce(&mut Cache) -> R) -> Option<R> {
        Some(f(&mut CACHE.lock()))
    }
}

#[cfg(not(feature = "global-cache"))]
mod cache_access {
    use super::Cache;
    use core::cell::UnsafeCell;

    struct CacheCell(UnsafeCell<Cache>);

    impl Drop for CacheCell {
        fn drop(&mut self) {
            // Thread exit: system-backed cached objects are returned to the
            // system; arena-backed ones die with the arena blocks.
            let cache = self.0.get_mut();
            cache.drain_lists(|ptr| unsafe { super::release_cached(ptr) });
            cache.arena.release_all();
        }
    }

    std::thread_local! {
        static CACHE: CacheCell = const { CacheCell(UnsafeCell::new(Cache::new())) };
    }

    #[inline]
    pub(super) fn with_cache<R>(f: impl FnOnce(&mut Cache) -> R) -> Option<R> {
        // try_with: during thread teardown the slot is gone; callers fall
        // back to the system tier.
        CACHE.try_with(|cell| f(unsafe { &mut *cell.0.get() })).ok()
    }
}

use cache_access::with_cache;

// ---------------------------------------------------------------------------
// Tracking header
// ---------------------------------------------------------------------------

cfg_if::cfg_if! {
    if #[cfg(feature = "tracking")] {
        /// Bytes reserved before the payload. The header occupies the last
        /// 8; the full 16 keep the payload 16-byte aligned.
        const PREFIX: usize = 16;

        /// Class field value for allocations outside the class table.
        const NO_CLASS: u16 = u16::MAX;

        const FLAG_ARENA: u8 = 0b01;
        const FLAG_SYSTEM: u8 = 0b10;

        #[repr(C)]
        #[derive(Clone, Copy)]
        struct Header {
            size: u32,
            class: u16,
            flags: u8,
            _pad: u8,
        }

        static_assertions::const_assert_eq!(core::mem::size_of::<Header>(), 8);

        #[inline]
        unsafe fn header_of(payload: *mut u8) -> *mut Header {
            unsafe { payload.sub(8) as *mut Header }
        }

        #[inline]
        unsafe fn base_of(payload: *mut u8) -> *mut u8 {
            unsafe { payload.sub(PREFIX) }
        }

        #[inline]
        unsafe fn write_header(base: *mut u8, size: usize, class: u16, flags: u8) -> *mut u8 {
            let payload = unsafe { base.add(PREFIX) };
            unsafe {
                *header_of(payload) = Header {
                    size: size.min(u32::MAX as usize) as u32,
                    class,
                    flags,
                    _pad: 0,
                };
            }
            payload
        }

        /// Release one object drained from a free list at thread exit.
        unsafe fn release_cached(payload: *mut u8) {
            let h = unsafe { *header_of(payload) };
            if h.flags & FLAG_SYSTEM != 0 {
                unsafe { platform::aligned_free(base_of(payload)) };
            }
        }
    } else {
        /// Without tracking nothing precedes the payload.
        unsafe fn release_cached(_payload: *mut u8) {
            // Lists are never populated without the tracking header.
        }
    }
}

// ---------------------------------------------------------------------------
// Fallible core (GlobalAlloc surface); public API adds the fatal escalation
// ---------------------------------------------------------------------------

#[cfg(feature = "tracking")]
fn try_allocate_raw(size: usize) -> *mut u8 {
    let size = size.max(1);
    stat_inc!(alloc_count);
    stat_add!(alloc_bytes, size);
    hist_record!(size);

    if let Some(class) = class_for(size) {
        let payload_size = class_size(class);
        let served = with_cache(|c| {
            let hit = c.lists[class].pop();
            if !hit.is_null() {
                stat_inc!(freelist_hits);
                unsafe { (*header_of(hit)).size = size as u32 };
                return hit;
            }
            if payload_size <= ARENA_MAX {
                let base = c.arena.alloc(PREFIX + payload_size);
                if base.is_null() {
                    return ptr::null_mut();
                }
                stat_inc!(arena_hits);
                return unsafe { write_header(base, size, class as u16, FLAG_ARENA) };
            }
            system_class_alloc(size, class, payload_size)
        });
        match served {
            Some(p) => p,
            // Thread cache torn down: straight to the system tier.
            None => system_class_alloc(size, class, payload_size),
        }
    } else {
        let total = match size.checked_add(PREFIX) {
            Some(t) => t,
            None => return ptr::null_mut(),
        };
        stat_inc!(system_allocs);
        stat_add!(system_bytes, size);
        let base = unsafe { platform::aligned_alloc(total, ALIGN) };
        if base.is_null() {
            return ptr::null_mut();
        }
        unsafe { write_header(base, size, NO_CLASS, FLAG_SYSTEM) }
    }
}

#[cfg(feature = "tracking")]
fn system_class_alloc(size: usize, class: usize, payload_size: usize) -> *mut u8 {
    stat_inc!(system_allocs);
    stat_add!(system_bytes, payload_size);
    let base = unsafe { platform::aligned_alloc(PREFIX + payload_size, ALIGN) };
    if base.is_null() {
        return ptr::null_mut();
    }
    unsafe { write_header(base, size, class as u16, FLAG_SYSTEM) }
}

#[cfg(not(feature = "tracking"))]
fn try_allocate_raw(size: usize) -> *mut u8 {
    let size = size.max(1);
    stat_inc!(alloc_count);
    stat_add!(alloc_bytes, size);
    hist_record!(size);

    if size <= ARENA_MAX {
        if let Some(p) = with_cache(|c| {
            let p = c.arena.alloc(round16(size));
            if !p.is_null() {
                stat_inc!(arena_hits);
            }
            p
        }) {
            if !p.is_null() {
                return p;
            }
            // Arena exhausted and could not grow: fall through to system.
        }
    }
    stat_inc!(system_allocs);
    stat_add!(system_bytes, size);
    unsafe { platform::aligned_alloc(size, ALIGN) }
}

#[cfg(feature = "tracking")]
unsafe fn free_raw(ptr: *mut u8) {
    if ptr.is_null() {
        return;
    }
    stat_inc!(free_count);
    let h = unsafe { *header_of(ptr) };
    if h.class == NO_CLASS {
        unsafe { platform::aligned_free(base_of(ptr)) };
        return;
    }
    let class = h.class as usize;
    let cached = with_cache(|c| {
        if h.flags & FLAG_ARENA != 0 && !c.arena.contains(ptr) {
            crate::panic::fatal("free of arena memory from a foreign thread");
        }
        if c.lists[class].len() < FREE_LIST_CAP {
            c.lists[class].push(ptr);
            true
        } else {
            // List is full; arena-backed objects stay with the arena.
            false
        }
    });
    match cached {
        Some(true) => {}
        Some(false) | None => {
            if h.flags & FLAG_SYSTEM != 0 {
                unsafe { platform::aligned_free(base_of(ptr)) };
            }
        }
    }
}

#[cfg(not(feature = "tracking"))]
unsafe fn free_raw(ptr: *mut u8) {
    if ptr.is_null() {
        return;
    }
    stat_inc!(free_count);
    let in_arena = with_cache(|c| c.arena.contains(ptr)).unwrap_or(false);
    if in_arena {
        // Arena memory is reclaimed wholesale when the thread exits.
        return;
    }
    unsafe { platform::aligned_free(ptr) };
}

#[cfg(feature = "tracking")]
unsafe fn try_reallocate_raw(ptr: *mut u8, old_size: usize, new_size: usize) -> *mut u8 {
    if ptr.is_null() {
        return try_allocate_raw(new_size);
    }
    let new_size = new_size.max(1);
    stat_inc!(realloc_count);

    let h = unsafe { *header_of(ptr) };
    let old_live = if h.class != NO_CLASS {
        // The header's request size is authoritative for class'd objects:
        // a prior shrink may have left the caller's old_size stale.
        if class_for(new_size) == Some(h.class as usize) {
            unsafe { (*header_of(ptr)).size = new_size as u32 };
            return ptr;
        }
        h.size as usize
    } else {
        if new_size <= old_size && class_for(new_size).is_none() {
            return ptr;
        }
        old_size
    };

    let fresh = try_allocate_raw(new_size);
    if !fresh.is_null() {
        unsafe {
            ptr::copy_nonoverlapping(ptr, fresh, old_live.min(new_size));
            free_raw(ptr);
        }
    }
    fresh
}

#[cfg(not(feature = "tracking"))]
unsafe fn try_reallocate_raw(ptr: *mut u8, old_size: usize, new_size: usize) -> *mut u8 {
    if ptr.is_null() {
        return try_allocate_raw(new_size);
    }
    let new_size = new_size.max(1);
    stat_inc!(realloc_count);

    // Without the header the only safe in-place move is a shrink.
    if new_size <= old_size {
        return ptr;
    }
    let fresh = try_allocate_raw(new_size);
    if !fresh.is_null() {
        unsafe {
            ptr::copy_nonoverlapping(ptr, fresh, old_size);
            free_raw(ptr);
        }
    }
    fresh
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Allocate `size` bytes, 16-byte aligned. Fatal on exhaustion.
#[inline]
pub fn allocate(size: usize) -> NonNull<u8> {
    match NonNull::new(try_allocate_raw(size)) {
        Some(p) => p,
        None => crate::panic::fatal("out of memory"),
    }
}

/// Allocate `nmemb * size` zeroed bytes. The product is overflow-checked;
/// overflow and exhaustion are fatal.
pub fn allocate_zeroed(nmemb: usize, size: usize) -> NonNull<u8> {
    let total = match nmemb.checked_mul(size) {
        Some(t) => t,
        None => crate::panic::fatal("allocation size overflow"),
    };
    let p = allocate(total.max(1));
    unsafe { ptr::write_bytes(p.as_ptr(), 0, total.max(1)) };
    p
}

/// Resize an allocation. Stays in place when the size class is unchanged
/// (`tracking`) or on shrink; otherwise allocate + copy + free. Fatal on
/// exhaustion.
///
/// # Safety
///
/// `ptr` must be null or a live pointer from this allocator, and
/// `old_size` must be the size it was last allocated or resized with.
pub unsafe fn reallocate(ptr: *mut u8, old_size: usize, new_size: usize) -> NonNull<u8> {
    match NonNull::new(unsafe { try_reallocate_raw(ptr, old_size, new_size) }) {
        Some(p) => p,
        None => crate::panic::fatal("out of memory"),
    }
}

/// Release an allocation. Tolerates null.
///
/// # Safety
///
/// `ptr` must be null or a live pointer from this allocator, not freed
/// before. Arena-backed memory must be freed on the owning thread.
#[inline]
pub unsafe fn free(ptr: *mut u8) {
    unsafe { free_raw(ptr) }
}

/// Copy a NUL-terminated string. Lengths up to
/// [`CSTR_ARENA_MAX`](crate::config::CSTR_ARENA_MAX) bytes take a dedicated
/// bump-arena path that skips the free lists entirely. Release with
/// [`free`].
pub fn duplicate_cstr(s: &CStr) -> NonNull<c_char> {
    let bytes = s.to_bytes_with_nul();
    let n = bytes.len();

    let p = if n <= CSTR_ARENA_MAX {
        match with_cache(|c| cstr_from_arena(c, n)) {
            Some(p) if !p.is_null() => {
                stat_inc!(cstr_arena_hits);
                p
            }
            _ => allocate(n).as_ptr(),
        }
    } else {
        allocate(n).as_ptr()
    };

    unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), p, n) };
    match NonNull::new(p as *mut c_char) {
        Some(p) => p,
        None => crate::panic::fatal("out of memory"),
    }
}

#[cfg(feature = "tracking")]
fn cstr_from_arena(c: &mut Cache, n: usize) -> *mut u8 {
    // Header carries the matching class so a later free feeds the list.
    let class = match class_for(n) {
        Some(cl) => cl,
        None => return ptr::null_mut(),
    };
    let base = c.arena.alloc(PREFIX + class_size(class));
    if base.is_null() {
        return ptr::null_mut();
    }
    unsafe { write_header(base, n, class as u16, FLAG_ARENA) }
}

#[cfg(not(feature = "tracking"))]
fn cstr_from_arena(c: &mut Cache, n: usize) -> *mut u8 {
    c.arena.alloc(round16(n))
}

// ---------------------------------------------------------------------------
// GlobalAlloc adapter
// ---------------------------------------------------------------------------

/// The runtime allocator as a standard Rust allocator.
///
/// ```ignore
/// #[global_allocator]
/// static GLOBAL: rtcore::alloc::RtAlloc = rtcore::alloc::RtAlloc;
/// ```
pub struct RtAlloc;

unsafe impl GlobalAlloc for RtAlloc {
    #[inline]
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > ALIGN {
            // Over-aligned requests bypass the cache; dealloc sees the
            // same layout and routes back to the system tier.
            return unsafe { platform::aligned_alloc(layout.size().max(1), layout.align()) };
        }
        try_allocate_raw(layout.size())
    }

    #[inline]
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if layout.align() > ALIGN {
            unsafe { platform::aligned_free(ptr) };
            return;
        }
        unsafe { free_raw(ptr) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let p = unsafe { self.alloc(layout) };
        if !p.is_null() && layout.size() > 0 {
            unsafe { ptr::write_bytes(p, 0, layout.size()) };
        }
        p
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if layout.align() > ALIGN {
            let fresh = unsafe { platform::aligned_alloc(new_size.max(1), layout.align()) };
            if !fresh.is_null() && !ptr.is_null() {
                unsafe {
                    ptr::copy_nonoverlapping(ptr, fresh, layout.size().min(new_size));
                    platform::aligned_free(ptr);
                }
            }
            return fresh;
        }
        unsafe { try_reallocate_raw(ptr, layout.size(), new_size) }
    }
}
