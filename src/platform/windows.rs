//! Windows services: _aligned_malloc / _aligned_free from the CRT.

use core::ffi::c_void;

extern "C" {
    #[link_name = "_aligned_malloc"]
    fn crt_aligned_malloc(size: usize, align: usize) -> *mut c_void;

    #[link_name = "_aligned_free"]
    fn crt_aligned_free(ptr: *mut c_void);
}

pub unsafe fn aligned_alloc(size: usize, align: usize) -> *mut u8 {
    let size = size.max(1);
    unsafe { crt_aligned_malloc(size, align) as *mut u8 }
}

pub unsafe fn aligned_free(ptr: *mut u8) {
    unsafe { crt_aligned_free(ptr as *mut c_void) };
}
