//! Mutual exclusion and reader/writer locks over the platform primitives.
//!
//! `std::sync` supplies the pthread / SRWLOCK wrapper and the poison bit;
//! this layer changes the poisoning contract: a thread that panics while
//! holding a guard poisons the lock, and any later acquisition attempt is
//! fatal. There is no recovery path — a poisoned lock guards state that
//! may be torn mid-update.

use core::fmt;
use core::ops::{Deref, DerefMut};
use std::sync;

/// A mutual-exclusion lock around a `T`.
pub struct Mutex<T> {
    inner: sync::Mutex<T>,
}

/// Scoped handle to a locked [`Mutex`]; releases on drop.
pub struct MutexGuard<'a, T> {
    pub(super) inner: sync::MutexGuard<'a, T>,
}

impl<T> Mutex<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: sync::Mutex::new(value),
        }
    }

    /// Block until the lock is held. Fatal if the lock is poisoned.
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T> {
        match self.inner.lock() {
            Ok(inner) => MutexGuard { inner },
            Err(_) => crate::panic::fatal("mutex poisoned by a panicked holder"),
        }
    }

    /// Take the lock if it is free. Fatal if poisoned.
    #[inline]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        match self.inner.try_lock() {
            Ok(inner) => Some(MutexGuard { inner }),
            Err(sync::TryLockError::WouldBlock) => None,
            Err(sync::TryLockError::Poisoned(_)) => {
                crate::panic::fatal("mutex poisoned by a panicked holder")
            }
        }
    }

    /// Whether a holder has panicked with the lock held.
    pub fn is_poisoned(&self) -> bool {
        self.inner.is_poisoned()
    }

    /// Exclusive access without locking (the borrow proves uniqueness).
    pub fn get_mut(&mut self) -> &mut T {
        match self.inner.get_mut() {
            Ok(v) => v,
            Err(_) => crate::panic::fatal("mutex poisoned by a panicked holder"),
        }
    }

    pub fn into_inner(self) -> T {
        match self.inner.into_inner() {
            Ok(v) => v,
            Err(_) => crate::panic::fatal("mutex poisoned by a panicked holder"),
        }
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_lock() {
            Some(guard) => f.debug_struct("Mutex").field("data", &*guard).finish(),
            None => f.write_str("Mutex { <locked> }"),
        }
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

/// A reader/writer lock around a `T`.
///
/// Read and write guards are distinct types; mutable access through a read
/// guard is unrepresentable.
pub struct RwLock<T> {
    inner: sync::RwLock<T>,
}

/// Shared-access guard; many may exist at once.
pub struct RwLockReadGuard<'a, T> {
    inner: sync::RwLockReadGuard<'a, T>,
}

/// Exclusive-access guard.
pub struct RwLockWriteGuard<'a, T> {
    inner: sync::RwLockWriteGuard<'a, T>,
}

impl<T> RwLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: sync::RwLock::new(value),
        }
    }

    /// Block for shared access. Fatal if the lock is poisoned.
    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        match self.inner.read() {
            Ok(inner) => RwLockReadGuard { inner },
            Err(_) => crate::panic::fatal("rwlock poisoned by a panicked holder"),
        }
    }

    /// Block for exclusive access. Fatal if the lock is poisoned.
    #[inline]
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        match self.inner.write() {
            Ok(inner) => RwLockWriteGuard { inner },
            Err(_) => crate::panic::fatal("rwlock poisoned by a panicked holder"),
        }
    }

    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, T>> {
        match self.inner.try_read() {
            Ok(inner) => Some(RwLockReadGuard { inner }),
            Err(sync::TryLockError::WouldBlock) => None,
            Err(sync::TryLockError::Poisoned(_)) => {
                crate::panic::fatal("rwlock poisoned by a panicked holder")
            }
        }
    }

    pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, T>> {
        match self.inner.try_write() {
            Ok(inner) => Some(RwLockWriteGuard { inner }),
            Err(sync::TryLockError::WouldBlock) => None,
            Err(sync::TryLockError::Poisoned(_)) => {
                crate::panic::fatal("rwlock poisoned by a panicked holder")
            }
        }
    }

    pub fn is_poisoned(&self) -> bool {
        self.inner.is_poisoned()
    }

    pub fn get_mut(&mut self) -> &mut T {
        match self.inner.get_mut() {
            Ok(v) => v,
            Err(_) => crate::panic::fatal("rwlock poisoned by a panicked holder"),
        }
    }
}

impl<T: Default> Default for RwLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Deref for RwLockReadGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> Deref for RwLockWriteGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> DerefMut for RwLockWriteGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_mutex_guard_scope() {
        let m = Mutex::new(1);
        {
            let mut g = m.lock();
            *g = 2;
        }
        assert_eq!(*m.lock(), 2);
    }

    #[test]
    fn test_try_lock_blocked() {
        let m = Mutex::new(());
        let g = m.lock();
        assert!(m.try_lock().is_none());
        drop(g);
        assert!(m.try_lock().is_some());
    }

    #[test]
    fn test_mutex_across_threads() {
        let m = Arc::new(Mutex::new(0u64));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let m = Arc::clone(&m);
                std::thread::spawn(move || {
                    for _ in 0..10_000 {
                        *m.lock() += 1;
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*m.lock(), 40_000);
    }

    #[test]
    fn test_poison_flag_set_on_panic() {
        let m = Arc::new(Mutex::new(()));
        let m2 = Arc::clone(&m);
        let _ = std::thread::spawn(move || {
            let _g = m2.lock();
            panic!("poison it");
        })
        .join();
        // The flag is observable; acquiring now would abort the process.
        assert!(m.is_poisoned());
    }

    #[test]
    fn test_rwlock_many_readers() {
        let l = RwLock::new(5);
        let r1 = l.read();
        let r2 = l.read();
        assert_eq!(*r1 + *r2, 10);
        assert!(l.try_write().is_none());
        drop(r1);
        drop(r2);
        *l.write() = 6;
        assert_eq!(*l.read(), 6);
    }
}
