//! One-time initialization.
//!
//! Three states in one atomic: `UNINIT`, `RUNNING`, `DONE`. The fast path
//! is a single acquire load. The slow path takes a mutex only to elect the
//! initializer; contenders that find the election over but the init still
//! running spin on the atomic with the platform pause hint.

use super::Mutex;
use crate::platform;
use core::sync::atomic::{AtomicU8, Ordering};

const UNINIT: u8 = 0;
const RUNNING: u8 = 1;
const DONE: u8 = 2;

/// Runs exactly one closure, ever.
pub struct Once {
    state: AtomicU8,
    lock: Mutex<()>,
}

/// Aborts if the initializer unwinds: spinning waiters would otherwise
/// never observe `DONE`.
struct AbortOnUnwind;

impl Drop for AbortOnUnwind {
    fn drop(&mut self) {
        crate::panic::fatal("Once initializer panicked");
    }
}

impl Once {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(UNINIT),
            lock: Mutex::new(()),
        }
    }

    /// Whether the initializer has completed.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.state.load(Ordering::Acquire) == DONE
    }

    /// Run `init` if no call has run it yet; otherwise wait until the
    /// winning call has finished.
    #[inline]
    pub fn call_once(&self, init: impl FnOnce()) {
        if self.state.load(Ordering::Acquire) == DONE {
            return;
        }
        self.call_once_slow(init);
    }

    #[cold]
    fn call_once_slow(&self, init: impl FnOnce()) {
        let guard = self.lock.lock();
        match self.state.load(Ordering::Acquire) {
            DONE => {}
            UNINIT => {
                self.state.store(RUNNING, Ordering::Relaxed);
                // Run the initializer outside the mutex so latecomers can
                // fall through to the spin-wait instead of queueing.
                drop(guard);
                let bomb = AbortOnUnwind;
                init();
                core::mem::forget(bomb);
                self.state.store(DONE, Ordering::Release);
            }
            _ => {
                // Another thread is mid-init; it already released the
                // mutex, so wait on the atomic.
                drop(guard);
                while self.state.load(Ordering::Acquire) == RUNNING {
                    platform::spin_hint();
                }
            }
        }
    }
}

impl Default for Once {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering as StdOrdering};
    use std::sync::Arc;

    #[test]
    fn test_runs_exactly_once() {
        let once = Once::new();
        let runs = AtomicU32::new(0);
        for _ in 0..10 {
            once.call_once(|| {
                runs.fetch_add(1, StdOrdering::SeqCst);
            });
        }
        assert_eq!(runs.load(StdOrdering::SeqCst), 1);
        assert!(once.is_completed());
    }

    #[test]
    fn test_concurrent_single_winner() {
        let once = Arc::new(Once::new());
        let runs = Arc::new(AtomicU32::new(0));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let once = Arc::clone(&once);
                let runs = Arc::clone(&runs);
                std::thread::spawn(move || {
                    once.call_once(|| {
                        // Lengthen the window so other threads pile up.
                        std::thread::sleep(std::time::Duration::from_millis(10));
                        runs.fetch_add(1, StdOrdering::SeqCst);
                    });
                    // Whoever returns must observe the completed init.
                    assert_eq!(runs.load(StdOrdering::SeqCst), 1);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(runs.load(StdOrdering::SeqCst), 1);
    }
}
