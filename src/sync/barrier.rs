//! Count-down barrier with a generation counter.
//!
//! The portable mutex + condvar formulation is used on every OS: macOS has
//! no native barrier, and one implementation everywhere keeps wakeup
//! behavior identical across platforms. The generation counter lets the
//! barrier be reused immediately: a stale waiter from round N can never be
//! confused with a waiter from round N+1.

use super::{Condvar, Mutex};

struct BarrierState {
    count: usize,
    generation: u64,
}

/// Rendezvous point for a fixed number of threads.
pub struct Barrier {
    state: Mutex<BarrierState>,
    cvar: Condvar,
    total: usize,
}

/// Tells one arriving thread (the last) that it is the leader.
pub struct BarrierWaitResult(bool);

impl BarrierWaitResult {
    pub fn is_leader(&self) -> bool {
        self.0
    }
}

impl Barrier {
    /// A barrier for `n` threads. `n == 0` behaves as `1`.
    pub fn new(n: usize) -> Self {
        Self {
            state: Mutex::new(BarrierState {
                count: 0,
                generation: 0,
            }),
            cvar: Condvar::new(),
            total: n.max(1),
        }
    }

    /// Block until `n` threads have arrived. The last arriver resets the
    /// count, bumps the generation, and wakes the rest.
    pub fn wait(&self) -> BarrierWaitResult {
        let mut state = self.state.lock();
        state.count += 1;
        if state.count == self.total {
            state.count = 0;
            state.generation = state.generation.wrapping_add(1);
            self.cvar.notify_all();
            return BarrierWaitResult(true);
        }
        let generation = state.generation;
        while state.generation == generation {
            state = self.cvar.wait(state);
        }
        BarrierWaitResult(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_all_threads_pass_together() {
        let n = 8;
        let barrier = Arc::new(Barrier::new(n));
        let before = Arc::new(AtomicUsize::new(0));
        let leaders = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..n)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let before = Arc::clone(&before);
                let leaders = Arc::clone(&leaders);
                std::thread::spawn(move || {
                    before.fetch_add(1, Ordering::SeqCst);
                    let result = barrier.wait();
                    // Nobody passes until everyone arrived.
                    assert_eq!(before.load(Ordering::SeqCst), n);
                    if result.is_leader() {
                        leaders.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(leaders.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reusable_across_rounds() {
        let n = 4;
        let barrier = Arc::new(Barrier::new(n));
        let handles: Vec<_> = (0..n)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        barrier.wait();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}
