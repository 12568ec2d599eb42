//! Atomic cells with an explicit memory-order argument.
//!
//! The [`Ordering`] enum maps 1:1 onto the standard orderings; nothing is
//! strengthened or weakened in the translation. Invalid combinations (a
//! release load, an acquire store) keep the standard library's behavior.

use core::sync::atomic;

/// Memory ordering for atomic operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ordering {
    Relaxed,
    Acquire,
    Release,
    AcqRel,
    SeqCst,
}

impl Ordering {
    #[inline]
    pub(crate) fn to_std(self) -> atomic::Ordering {
        match self {
            Ordering::Relaxed => atomic::Ordering::Relaxed,
            Ordering::Acquire => atomic::Ordering::Acquire,
            Ordering::Release => atomic::Ordering::Release,
            Ordering::AcqRel => atomic::Ordering::AcqRel,
            Ordering::SeqCst => atomic::Ordering::SeqCst,
        }
    }
}

macro_rules! atomic_int {
    ($(#[$doc:meta])* $name:ident, $std:ident, $prim:ty) => {
        $(#[$doc])*
        #[derive(Default)]
        pub struct $name {
            inner: atomic::$std,
        }

        impl $name {
            pub const fn new(value: $prim) -> Self {
                Self {
                    inner: atomic::$std::new(value),
                }
            }

            #[inline]
            pub fn load(&self, order: Ordering) -> $prim {
                self.inner.load(order.to_std())
            }

            #[inline]
            pub fn store(&self, value: $prim, order: Ordering) {
                self.inner.store(value, order.to_std())
            }

            #[inline]
            pub fn swap(&self, value: $prim, order: Ordering) -> $prim {
                self.inner.swap(value, order.to_std())
            }

            /// Strong compare-exchange: never fails spuriously.
            #[inline]
            pub fn compare_exchange(
                &self,
                current: $prim,
                new: $prim,
                success: Ordering,
                failure: Ordering,
            ) -> Result<$prim, $prim> {
                self.inner
                    .compare_exchange(current, new, success.to_std(), failure.to_std())
            }

            #[inline]
            pub fn fetch_add(&self, value: $prim, order: Ordering) -> $prim {
                self.inner.fetch_add(value, order.to_std())
            }

            #[inline]
            pub fn fetch_sub(&self, value: $prim, order: Ordering) -> $prim {
                self.inner.fetch_sub(value, order.to_std())
            }

            pub fn into_inner(self) -> $prim {
                self.inner.into_inner()
            }
        }
    };
}

atomic_int!(
    /// Atomic `i32`.
    AtomicI32,
    AtomicI32,
    i32
);
atomic_int!(
    /// Atomic `i64`.
    AtomicI64,
    AtomicI64,
    i64
);
atomic_int!(
    /// Atomic `u32`.
    AtomicU32,
    AtomicU32,
    u32
);
atomic_int!(
    /// Atomic `u64`.
    AtomicU64,
    AtomicU64,
    u64
);

/// Atomic `bool`.
#[derive(Default)]
pub struct AtomicBool {
    inner: atomic::AtomicBool,
}

impl AtomicBool {
    pub const fn new(value: bool) -> Self {
        Self {
            inner: atomic::AtomicBool::new(value),
        }
    }

    #[inline]
    pub fn load(&self, order: Ordering) -> bool {
        self.inner.load(order.to_std())
    }

    #[inline]
    pub fn store(&self, value: bool, order: Ordering) {
        self.inner.store(value, order.to_std())
    }

    #[inline]
    pub fn swap(&self, value: bool, order: Ordering) -> bool {
        self.inner.swap(value, order.to_std())
    }

    #[inline]
    pub fn compare_exchange(
        &self,
        current: bool,
        new: bool,
        success: Ordering,
        failure: Ordering,
    ) -> Result<bool, bool> {
        self.inner
            .compare_exchange(current, new, success.to_std(), failure.to_std())
    }
}

/// Atomic raw pointer.
pub struct AtomicPtr<T> {
    inner: atomic::AtomicPtr<T>,
}

impl<T> AtomicPtr<T> {
    pub const fn new(value: *mut T) -> Self {
        Self {
            inner: atomic::AtomicPtr::new(value),
        }
    }

    #[inline]
    pub fn load(&self, order: Ordering) -> *mut T {
        self.inner.load(order.to_std())
    }

    #[inline]
    pub fn store(&self, value: *mut T, order: Ordering) {
        self.inner.store(value, order.to_std())
    }

    #[inline]
    pub fn swap(&self, value: *mut T, order: Ordering) -> *mut T {
        self.inner.swap(value, order.to_std())
    }

    #[inline]
    pub fn compare_exchange(
        &self,
        current: *mut T,
        new: *mut T,
        success: Ordering,
        failure: Ordering,
    ) -> Result<*mut T, *mut T> {
        self.inner
            .compare_exchange(current, new, success.to_std(), failure.to_std())
    }
}

impl<T> Default for AtomicPtr<T> {
    fn default() -> Self {
        Self::new(core::ptr::null_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_load_store_swap() {
        let a = AtomicU64::new(1);
        assert_eq!(a.load(Ordering::SeqCst), 1);
        a.store(2, Ordering::Release);
        assert_eq!(a.swap(3, Ordering::AcqRel), 2);
        assert_eq!(a.load(Ordering::Acquire), 3);
    }

    #[test]
    fn test_compare_exchange() {
        let a = AtomicI32::new(10);
        assert_eq!(
            a.compare_exchange(10, 20, Ordering::AcqRel, Ordering::Acquire),
            Ok(10)
        );
        assert_eq!(
            a.compare_exchange(10, 30, Ordering::AcqRel, Ordering::Acquire),
            Err(20)
        );
    }

    #[test]
    fn test_fetch_add_concurrent() {
        let a = Arc::new(AtomicU32::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let a = Arc::clone(&a);
                std::thread::spawn(move || {
                    for _ in 0..25_000 {
                        a.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(a.load(Ordering::SeqCst), 100_000);
    }

    #[test]
    fn test_bool_and_ptr() {
        let b = AtomicBool::new(false);
        assert!(!b.swap(true, Ordering::AcqRel));
        assert!(b.load(Ordering::Acquire));

        let mut x = 5u32;
        let p = AtomicPtr::new(core::ptr::null_mut());
        p.store(&mut x, Ordering::Release);
        assert_eq!(unsafe { *p.load(Ordering::Acquire) }, 5);
    }
}
