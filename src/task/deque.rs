//! Per-worker work-stealing queue.
//!
//! Single owner pushes at the bottom; every consumer — the owner popping
//! its own work and thieves stealing — takes from the top with one CAS.
//! That keeps the queue FIFO for its owner, which is what makes a
//! fairness yield fair: a re-queued task goes behind everything already
//! waiting, it cannot elbow back to the front.
//!
//! The buffer is a fixed power-of-two ring: a full queue reports the
//! overflow and the scheduler spills to the global injector instead of
//! growing the buffer, which sidesteps reclamation of a resized ring
//! entirely.
//!
//! Tasks travel as raw pointers (`Box::into_raw`); exactly one consumer
//! ever wins a slot, so ownership transfers atomically with the index
//! CAS.

use super::task::Task;
use crate::platform;
use core::sync::atomic::{fence, AtomicIsize, AtomicPtr, Ordering};
use crossbeam_utils::CachePadded;

/// Result of a steal attempt.
pub(super) enum Steal {
    /// Nothing to take.
    Empty,
    /// Lost a race; the caller may try again.
    Retry,
    /// One task, now owned by the thief.
    Success(*mut Task),
}

pub(super) struct Deque {
    /// Next slot the owner writes. Owner-written, thief-read.
    bottom: CachePadded<AtomicIsize>,
    /// Next slot a thief takes. CAS-advanced by thieves and the owner's
    /// last-element race.
    top: CachePadded<AtomicIsize>,
    slots: Box<[AtomicPtr<Task>]>,
    mask: usize,
}

impl Deque {
    pub(super) fn new(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        let slots = (0..capacity)
            .map(|_| AtomicPtr::new(core::ptr::null_mut()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            bottom: CachePadded::new(AtomicIsize::new(0)),
            top: CachePadded::new(AtomicIsize::new(0)),
            slots,
            mask: capacity - 1,
        }
    }

    /// Append at the bottom. Owner thread only. `Err` returns the task
    /// when the ring is full.
    pub(super) fn push(&self, task: *mut Task) -> Result<(), *mut Task> {
        let b = self.bottom.load(Ordering::Relaxed);
        let t = self.top.load(Ordering::Acquire);
        if b - t >= self.slots.len() as isize {
            return Err(task);
        }
        self.slots[b as usize & self.mask].store(task, Ordering::Relaxed);
        // Publish the slot before the new bottom becomes visible.
        self.bottom.store(b + 1, Ordering::Release);
        Ok(())
    }

    /// Take the oldest task. Owner's pop: the same top CAS as a thief,
    /// retried through interference.
    pub(super) fn pop(&self) -> Option<*mut Task> {
        loop {
            match self.steal() {
                Steal::Success(task) => return Some(task),
                Steal::Retry => platform::spin_hint(),
                Steal::Empty => return None,
            }
        }
    }

    /// Take from the top. Any thread.
    pub(super) fn steal(&self) -> Steal {
        let t = self.top.load(Ordering::Acquire);
        fence(Ordering::SeqCst);
        let b = self.bottom.load(Ordering::Acquire);
        if t >= b {
            return Steal::Empty;
        }
        let task = self.slots[t as usize & self.mask].load(Ordering::Relaxed);
        if self
            .top
            .compare_exchange(t, t + 1, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
        {
            Steal::Success(task)
        } else {
            Steal::Retry
        }
    }

    /// Whether the deque looks empty (racy, advisory).
    pub(super) fn is_empty(&self) -> bool {
        let t = self.top.load(Ordering::Acquire);
        let b = self.bottom.load(Ordering::Acquire);
        b <= t
    }
}

unsafe impl Send for Deque {}
unsafe impl Sync for Deque {}
