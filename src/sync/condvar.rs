//! Condition variable over the platform primitive.
//!
//! `wait` consumes the mutex guard and hands it back on wakeup, so the
//! lock is provably released for the duration of the wait and re-held
//! after it. Spurious wakeups are possible; callers loop on their
//! predicate.

use super::MutexGuard;
use std::sync;
use std::time::Duration;

pub struct Condvar {
    inner: sync::Condvar,
}

impl Condvar {
    pub const fn new() -> Self {
        Self {
            inner: sync::Condvar::new(),
        }
    }

    /// Release the guard's lock, sleep until notified, re-acquire, return
    /// the guard. Fatal if the mutex was poisoned while unlocked.
    pub fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        match self.inner.wait(guard.inner) {
            Ok(inner) => MutexGuard { inner },
            Err(_) => crate::panic::fatal("mutex poisoned by a panicked holder"),
        }
    }

    /// [`wait`](Self::wait) with a timeout. The boolean is `true` when the
    /// wait timed out rather than being notified.
    pub fn wait_timeout<'a, T>(
        &self,
        guard: MutexGuard<'a, T>,
        timeout: Duration,
    ) -> (MutexGuard<'a, T>, bool) {
        match self.inner.wait_timeout(guard.inner, timeout) {
            Ok((inner, result)) => (MutexGuard { inner }, result.timed_out()),
            Err(_) => crate::panic::fatal("mutex poisoned by a panicked holder"),
        }
    }

    /// Wake one waiter.
    pub fn notify_one(&self) {
        self.inner.notify_one();
    }

    /// Wake every waiter.
    pub fn notify_all(&self) {
        self.inner.notify_all();
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_notify_wakes_waiter() {
        let pair = Arc::new((Mutex::new(false), Condvar::new()));
        let pair2 = Arc::clone(&pair);

        let waiter = std::thread::spawn(move || {
            let (lock, cvar) = &*pair2;
            let mut ready = lock.lock();
            while !*ready {
                ready = cvar.wait(ready);
            }
        });

        std::thread::sleep(Duration::from_millis(20));
        {
            let (lock, cvar) = &*pair;
            *lock.lock() = true;
            cvar.notify_one();
        }
        waiter.join().unwrap();
    }

    #[test]
    fn test_wait_timeout_expires() {
        let lock = Mutex::new(());
        let cvar = Condvar::new();
        let guard = lock.lock();
        let (_guard, timed_out) = cvar.wait_timeout(guard, Duration::from_millis(10));
        assert!(timed_out);
    }
}
